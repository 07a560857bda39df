//! Parameter types for recompression operations.
//!
//! These structs describe *what* to do, not *how* to do it. They are the
//! interface between callers (the batch runner, the CLI) and the
//! [`backend`](super::backend) that does the actual pixel work. Values are
//! validated on construction so the backend never sees an out-of-range
//! quality or a zero dimension bound.

use super::backend::PipelineError;

/// Default JPEG quality when the caller doesn't specify one.
pub const DEFAULT_QUALITY: u32 = 80;

/// Default bound on the longer edge, in pixels.
pub const DEFAULT_MAX_EDGE: u32 = 1920;

/// Quality range searched in target-size mode. The floor keeps the search
/// from producing unusably blocky output; the ceiling leaves headroom below
/// the maximum so the first midpoint starts in a productive region.
pub const SEARCH_QUALITY_MIN: u32 = 10;
pub const SEARCH_QUALITY_MAX: u32 = 95;

/// Dimension factors tried in order when quality reduction alone cannot
/// reach the target size.
pub const DIMENSION_LADDER: &[f32] = &[1.0, 0.9, 0.8, 0.7, 0.6, 0.5];

/// Accept immediately when within this fraction of the target size.
pub const FINE_TOLERANCE: f64 = 0.05;

/// Accept a ladder step's best result when within this fraction.
pub const COARSE_TOLERANCE: f64 = 0.10;

/// Quality setting for JPEG encoding (1-100).
///
/// Out-of-range values are rejected, not clamped: a caller asking for
/// quality 0 or 101 has a bug worth surfacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(u8);

impl Quality {
    pub fn new(value: u32) -> Result<Self, PipelineError> {
        if !(1..=100).contains(&value) {
            return Err(PipelineError::InvalidParameter(format!(
                "quality must be 1-100, got {value}"
            )));
        }
        Ok(Self(value as u8))
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(DEFAULT_QUALITY as u8)
    }
}

/// Target output size for size-bounded compression, in kilobytes (5-1000).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSize(u32);

impl TargetSize {
    pub fn new(kb: u32) -> Result<Self, PipelineError> {
        if !(5..=1000).contains(&kb) {
            return Err(PipelineError::InvalidParameter(format!(
                "target size must be 5-1000 KB, got {kb}"
            )));
        }
        Ok(Self(kb))
    }

    pub fn kilobytes(self) -> u32 {
        self.0
    }

    pub fn bytes(self) -> usize {
        self.0 as usize * 1024
    }
}

/// Parameters for a fixed-quality recompression.
#[derive(Debug, Clone, PartialEq)]
pub struct RecompressParams {
    pub quality: Quality,
    /// Bound on the longer edge. Sources already within the bound keep
    /// their dimensions — the pipeline never upscales.
    pub max_edge: u32,
    /// Rotate the decoded raster per the EXIF orientation tag.
    pub auto_rotate: bool,
    /// Splice the source's EXIF (APP1) segment into the output JPEG.
    pub keep_exif: bool,
}

impl RecompressParams {
    pub fn new(quality: u32, max_edge: u32) -> Result<Self, PipelineError> {
        if max_edge == 0 {
            return Err(PipelineError::InvalidParameter(
                "max_edge must be non-zero".into(),
            ));
        }
        Ok(Self {
            quality: Quality::new(quality)?,
            max_edge,
            auto_rotate: true,
            keep_exif: false,
        })
    }
}

impl Default for RecompressParams {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            max_edge: DEFAULT_MAX_EDGE,
            auto_rotate: true,
            keep_exif: false,
        }
    }
}

/// Parameters for compress-to-target-size mode.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetSizeParams {
    pub target: TargetSize,
    /// Maximum encode attempts per dimension ladder step.
    pub max_iterations: u32,
    pub auto_rotate: bool,
    pub keep_exif: bool,
}

impl TargetSizeParams {
    pub fn new(target_kb: u32) -> Result<Self, PipelineError> {
        Ok(Self {
            target: TargetSize::new(target_kb)?,
            max_iterations: 10,
            auto_rotate: true,
            keep_exif: false,
        })
    }

    /// Override the per-step iteration budget. Zero would leave the search
    /// with no attempts at all, so it is rejected like any other
    /// out-of-range parameter.
    pub fn with_max_iterations(mut self, iterations: u32) -> Result<Self, PipelineError> {
        if iterations == 0 {
            return Err(PipelineError::InvalidParameter(
                "max_iterations must be at least 1".into(),
            ));
        }
        self.max_iterations = iterations;
        Ok(self)
    }
}
