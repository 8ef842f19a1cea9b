//! Run statistics display

use super::ArchiveStatistics;
use std::path::Path;

/// Share of observed items that were archived with content, in percent
pub fn success_rate(stats: &ArchiveStatistics) -> f64 {
    if stats.total_files > 0 {
        (stats.processed_files as f64 / stats.total_files as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `path` - Where the archive was written
/// * `stats` - The statistics to display
pub fn print_statistics(path: &Path, stats: &ArchiveStatistics) {
    println!("=== Archive Statistics ===\n");

    println!("Output: {}", path.display());
    println!();

    println!("Items:");
    println!("  Observed: {}", stats.total_files);
    if stats.expected_files > 0 {
        println!("  Expected: {}", stats.expected_files);
    }
    println!("  Processed: {}", stats.processed_files);
    println!("  Skipped: {}", stats.skipped_files);
    println!("  Errors: {}", stats.error_files);
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} items archived with content)",
        success_rate(stats),
        stats.processed_files,
        stats.total_files
    );
}
