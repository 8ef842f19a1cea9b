//! URL handling module
//!
//! This module validates URLs against the protocol allow-list, resolves
//! references found in pages against their base, and derives file names and
//! extensions for downloaded resources.

mod resolve;
mod validate;

// Re-export main functions
pub use resolve::{file_name_from_url, guess_extension, resolve_link};
pub use validate::{validate_url, ValidatedUrl};
