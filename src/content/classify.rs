//! Content-type classification
//!
//! File names are looked up first (web-development additions, then the
//! standard MIME table); content sniffing only runs when no name is given or
//! the extension is unknown.

use std::path::Path;

pub const HTML: &str = "text/html";
pub const CSS: &str = "text/css";
pub const JAVASCRIPT: &str = "application/javascript";
pub const JSON: &str = "application/json";
pub const YAML: &str = "application/x-yaml";
pub const PLAIN_TEXT: &str = "text/plain";
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensions whose standard mapping is missing or not what web tooling expects
const EXTRA_TYPES: &[(&str, &str)] = &[
    ("js", JAVASCRIPT),
    ("mjs", JAVASCRIPT),
    ("cjs", JAVASCRIPT),
    ("jsx", JAVASCRIPT),
    ("ts", "application/typescript"),
    ("tsx", "application/typescript"),
    ("md", "text/markdown"),
    ("yaml", YAML),
    ("yml", YAML),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("woff", "font/woff"),
    ("woff2", "font/woff2"),
    ("ttf", "font/ttf"),
    ("eot", "application/vnd.ms-fontobject"),
];

const JS_KEYWORDS: &[&[u8]] = &[
    b"function", b"var", b"let", b"const", b"class", b"import", b"export",
];

const CSS_PROPERTIES: &[&[u8]] = &[b"margin", b"padding", b"color"];

/// Broad content family used to pick processing steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Html,
    Css,
    JavaScript,
    Json,
    Yaml,
    Text,
    Binary,
}

impl ContentKind {
    /// Maps a MIME type (parameters allowed) onto a content family
    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.contains("html") {
            Self::Html
        } else if mime.contains("css") {
            Self::Css
        } else if mime.contains("javascript") || mime.contains("ecmascript") {
            Self::JavaScript
        } else if mime.contains("json") {
            Self::Json
        } else if mime.contains("yaml") || mime.contains("yml") {
            Self::Yaml
        } else if mime.starts_with("text/")
            || mime.contains("xml")
            || mime.contains("typescript")
            || mime.contains("toml")
        {
            Self::Text
        } else {
            Self::Binary
        }
    }

    pub fn is_text(&self) -> bool {
        !matches!(self, Self::Binary)
    }
}

/// Classifies content, preferring the file name when one is given
///
/// Always returns a MIME type; unknown content ends up as `text/plain` or
/// `application/octet-stream`.
pub fn classify(content: &[u8], filename: Option<&str>) -> String {
    if let Some(mime) = filename.and_then(mime_from_filename) {
        return mime;
    }
    sniff(content).to_string()
}

/// Looks a file name up in the extension tables
pub fn mime_from_filename(filename: &str) -> Option<String> {
    let ext = Path::new(filename)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();

    if let Some((_, mime)) = EXTRA_TYPES.iter().find(|(e, _)| *e == ext) {
        return Some(mime.to_string());
    }

    mime_guess::from_ext(&ext).first_raw().map(str::to_string)
}

/// Guesses the content type from the bytes alone, in fixed priority order
pub fn sniff(content: &[u8]) -> &'static str {
    if looks_like_html(content) {
        return HTML;
    }

    if content.contains(&b'{') && CSS_PROPERTIES.iter().any(|p| contains(content, p)) {
        return CSS;
    }

    if JS_KEYWORDS.iter().any(|k| contains(content, k)) {
        return JAVASCRIPT;
    }

    if let Ok(text) = std::str::from_utf8(content) {
        let trimmed = text.trim();
        if trimmed.starts_with('{')
            && trimmed.ends_with('}')
            && matches!(
                serde_json::from_str::<serde_json::Value>(trimmed),
                Ok(serde_json::Value::Object(_))
            )
        {
            return JSON;
        }

        // Only structured documents count; nearly any text is a valid YAML scalar
        if matches!(
            serde_yaml::from_str::<serde_yaml::Value>(text),
            Ok(serde_yaml::Value::Mapping(_)) | Ok(serde_yaml::Value::Sequence(_))
        ) {
            return YAML;
        }
    }

    if is_binary(content) {
        OCTET_STREAM
    } else {
        PLAIN_TEXT
    }
}

/// True when any byte falls outside the text allow-list
///
/// Allowed: tab, newline, form feed, carriage return, escape, and every byte
/// from 0x20 to 0xFF except DEL.
pub fn is_binary(content: &[u8]) -> bool {
    content.iter().any(|&b| !is_text_byte(b))
}

fn is_text_byte(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0c | b'\r' | 0x1b) || (b >= 0x20 && b != 0x7f)
}

fn looks_like_html(content: &[u8]) -> bool {
    let content = content.strip_prefix(b"\xef\xbb\xbf").unwrap_or(content);
    let start = content
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(content.len());
    let head = &content[start..content.len().min(start + 16)];
    let head = head.to_ascii_lowercase();
    head.starts_with(b"<!doctype html") || head.starts_with(b"<html")
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}
