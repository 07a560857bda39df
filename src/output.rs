//! CLI output formatting.
//!
//! Each display has a `format_*` function returning lines (for testability)
//! and, where the CLI prints directly, a `print_*` wrapper. Format functions
//! are pure — no I/O, no side effects.
//!
//! # Output Format
//!
//! Per item:
//!
//! ```text
//! holiday.png → holiday-compressed.jpg
//!     2.1 MB → 812 KB (saved 62%)
//!     1920x1280 @ q80
//! ```
//!
//! Summary:
//!
//! ```text
//! Compressed 12 images (1 failed)
//!     14.2 MB → 5.1 MB (saved 64%)
//!     Cache: 5 cached, 7 encoded (12 total)
//! ```

use crate::batch::{BatchTotals, CacheDisposition, ItemReport};
use crate::cache::CacheStats;
use crate::pipeline::Dimensions;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a byte count for humans: `640 B`, `812 KB`, `2.1 MB`.
pub fn human_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.0} KB", b / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Percentage saved relative to the original size. Negative when the output
/// grew. Zero-size originals report 0 rather than dividing by zero.
pub fn percent_saved(original: u64, compressed: u64) -> i64 {
    if original == 0 {
        return 0;
    }
    let saved = original as i64 - compressed as i64;
    saved * 100 / original as i64
}

/// The `2.1 MB → 812 KB (saved 62%)` size-delta line, shared by items and
/// the summary.
fn size_delta(original: u64, compressed: u64) -> String {
    let pct = percent_saved(original, compressed);
    let verdict = if pct >= 0 {
        format!("saved {}%", pct)
    } else {
        format!("grew {}%", -pct)
    };
    format!(
        "{} \u{2192} {} ({})",
        human_size(original),
        human_size(compressed),
        verdict
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Per-item output
// ============================================================================

/// Format a completed item: header with the name mapping, then indented
/// size delta and provenance.
pub fn format_item_report(source: &Path, report: &ItemReport) -> Vec<String> {
    let mut lines = vec![format!(
        "{} \u{2192} {}",
        display_name(source),
        report.output_name
    )];
    lines.push(format!(
        "    {}",
        size_delta(report.original_size, report.compressed_size)
    ));

    match report.cache {
        CacheDisposition::Encoded => {
            if let Some(info) = &report.encode {
                let mut detail = format!(
                    "    {}x{} @ q{}",
                    info.width, info.height, info.quality_used
                );
                if info.dimension_factor < 1.0 {
                    detail.push_str(&format!(" ({:.0}% scale)", info.dimension_factor * 100.0));
                }
                lines.push(detail);
            }
        }
        CacheDisposition::Cached => lines.push("    cached".to_string()),
        CacheDisposition::Copied => lines.push("    copied from cache".to_string()),
    }

    lines
}

/// Format a failed item as a single line.
pub fn format_item_failure(source: &Path, message: &str) -> String {
    format!("{}: {}", display_name(source), message)
}

// ============================================================================
// Summary output
// ============================================================================

/// Format the end-of-run summary.
pub fn format_summary(totals: &BatchTotals, cache_stats: &CacheStats) -> Vec<String> {
    let mut header = format!("Compressed {} images", totals.completed);
    let mut qualifiers = Vec::new();
    if totals.errors > 0 {
        qualifiers.push(format!("{} failed", totals.errors));
    }
    if totals.pending > 0 {
        qualifiers.push(format!("{} not started", totals.pending));
    }
    if !qualifiers.is_empty() {
        header.push_str(&format!(" ({})", qualifiers.join(", ")));
    }

    let mut lines = vec![header];
    if totals.completed > 0 {
        lines.push(format!(
            "    {}",
            size_delta(totals.original_bytes, totals.compressed_bytes)
        ));
        lines.push(format!("    Cache: {}", cache_stats));
    }
    lines
}

/// Print the summary to stdout.
pub fn print_summary(totals: &BatchTotals, cache_stats: &CacheStats) {
    for line in format_summary(totals, cache_stats) {
        println!("{}", line);
    }
}

// ============================================================================
// Inspect output
// ============================================================================

/// Format the `inspect` display for one image file. `planned` is the output
/// size the current dimension bound would produce, shown only when it
/// differs from the source.
pub fn format_inspect(
    path: &Path,
    format_name: &str,
    dims: &Dimensions,
    file_size: u64,
    planned: &Dimensions,
) -> Vec<String> {
    let mut lines = vec![
        display_name(path),
        format!("    Format: {}", format_name),
        format!("    Dimensions: {}x{}", dims.width, dims.height),
        format!("    Size: {}", human_size(file_size)),
    ];
    if planned != dims {
        lines.push(format!(
            "    Planned output: {}x{}",
            planned.width, planned.height
        ));
    }
    lines
}

/// Print the inspect display to stdout.
pub fn print_inspect(
    path: &Path,
    format_name: &str,
    dims: &Dimensions,
    file_size: u64,
    planned: &Dimensions,
) {
    for line in format_inspect(path, format_name, dims, file_size, planned) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
