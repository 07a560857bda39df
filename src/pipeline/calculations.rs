//! Pure calculation functions for output dimensions and size targets.
//!
//! All functions here are pure and testable without any I/O or images.

/// Calculate output dimensions bounded by a maximum edge length.
///
/// Sources already within the bound keep their exact dimensions — this
/// function never upscales. Otherwise the longer edge is scaled down to
/// `max_edge` and the shorter edge proportionally, rounded to the nearest
/// pixel.
///
/// # Examples
/// ```
/// # use imgpress::pipeline::bounded_dimensions;
/// // 3000x2000 bounded to 1920 → 1920x1280
/// assert_eq!(bounded_dimensions((3000, 2000), 1920), (1920, 1280));
///
/// // Already within the bound: unchanged
/// assert_eq!(bounded_dimensions((800, 600), 1920), (800, 600));
/// ```
pub fn bounded_dimensions(source: (u32, u32), max_edge: u32) -> (u32, u32) {
    let (w, h) = source;
    let longer = w.max(h);

    if longer <= max_edge {
        return (w, h);
    }

    let ratio = max_edge as f64 / longer as f64;
    // Extreme aspect ratios can round the shorter edge to zero; a valid
    // source must never produce a zero-area output
    if w >= h {
        (max_edge, ((h as f64 * ratio).round() as u32).max(1))
    } else {
        (((w as f64 * ratio).round() as u32).max(1), max_edge)
    }
}

/// Scale dimensions by a factor, rounding and keeping both edges >= 1.
///
/// Used by the target-size dimension ladder.
pub fn scaled_dimensions(source: (u32, u32), factor: f32) -> (u32, u32) {
    let (w, h) = source;
    let sw = ((w as f64 * factor as f64).round() as u32).max(1);
    let sh = ((h as f64 * factor as f64).round() as u32).max(1);
    (sw, sh)
}

/// Whether `size` is within `tolerance` (a fraction) of `target`.
pub fn within_tolerance(size: usize, target: usize, tolerance: f64) -> bool {
    let diff = size.abs_diff(target) as f64;
    diff <= target as f64 * tolerance
}
