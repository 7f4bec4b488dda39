//! Helpers shared by the CLI, the batch driver and the size report.

use crate::constants::{
    COMPRESSED_SIZE_PREFIX, COMPRESSION_RATIO_PREFIX, ORIGINAL_SIZE_PREFIX,
    PROGRESS_BAR_TEMPLATE, PROGRESS_SPINNER_TEMPLATE, SUCCESS_PREFIX, WEBP_EXTENSION,
};
use crate::processing::SizeReport;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;

/// Check whether a path carries the `.webp` extension (any case)
pub fn is_webp_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(WEBP_EXTENSION))
        .unwrap_or(false)
}

/// Create a progress spinner with consistent styling
pub fn create_progress_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template(PROGRESS_SPINNER_TEMPLATE)
            .expect("Invalid progress template"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Create a progress bar for `len` batch items
pub fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(PROGRESS_BAR_TEMPLATE)
            .expect("Invalid progress template")
            .progress_chars("#>-"),
    );
    pb
}

/// Kilobytes as reported to users: plain division by 1024, unrounded.
pub fn bytes_to_kb(bytes: u64) -> f64 {
    bytes as f64 / 1024.0
}

/// Format file size in human-readable format
///
/// # Arguments
/// * `bytes` - Size in bytes
///
/// # Returns
/// * Human-readable size string (e.g., "1.2 MB", "512 B")
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: f64 = 1024.0;

    if bytes == 0 {
        return "0 B".to_string();
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

/// Calculate compression ratio as a percentage
///
/// Positive means the output is smaller, negative means it grew.
pub fn calculate_compression_ratio(original_size: u64, compressed_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    ((original_size as f64 - compressed_size as f64) / original_size as f64) * 100.0
}

/// Print the size statistics of one recompressed file
pub fn print_size_report(report: &SizeReport) {
    crate::info!(
        "{} {:.2} KB ({})",
        ORIGINAL_SIZE_PREFIX,
        report.original_size_kb(),
        format_file_size(report.original_size)
    );
    crate::info!(
        "{} {:.2} KB ({})",
        COMPRESSED_SIZE_PREFIX,
        report.output_size_kb(),
        format_file_size(report.output_size)
    );

    let ratio = report.compression_ratio();
    crate::info!("{} {:.1}%", COMPRESSION_RATIO_PREFIX, ratio);
    if ratio > 0.0 {
        crate::info!("{} Successfully reduced file size by {:.1}%", SUCCESS_PREFIX, ratio);
    } else {
        crate::warn!("File size increased by {:.1}%", ratio.abs());
    }
}
