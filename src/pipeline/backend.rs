//! Compression backend trait and shared types.
//!
//! The [`CompressBackend`] trait defines the three operations every backend
//! must support: identify, recompress at fixed quality, and recompress to a
//! target file size. The production implementation is
//! [`RasterBackend`](super::codec::RasterBackend) — pure Rust, statically
//! linked. A recording mock lives in this module's test code so the batch
//! runner can be exercised without encoding pixels.

use super::params::{RecompressParams, TargetSizeParams};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Per-request failure. All variants are local to one input: a failure on
/// one image never aborts the rest of a batch.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Result of an identify operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Raw backend output: encoded bytes plus how they were produced.
#[derive(Debug, Clone)]
pub struct Recompressed {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// JPEG quality the output was encoded at. For fixed-quality mode this
    /// echoes the request; for target-size mode it is the quality the
    /// search settled on.
    pub quality_used: u8,
    /// Dimension ladder factor applied (1.0 outside target-size mode).
    pub dimension_factor: f32,
}

impl Recompressed {
    /// Attach size-delta metadata, consuming the backend output.
    pub fn into_result(self, original_size: usize) -> RecompressionResult {
        let compressed_size = self.bytes.len();
        RecompressionResult {
            saved_bytes: original_size as i64 - compressed_size as i64,
            original_size,
            compressed_size,
            bytes: self.bytes,
            width: self.width,
            height: self.height,
            quality_used: self.quality_used,
            dimension_factor: self.dimension_factor,
        }
    }
}

/// A completed recompression with size-delta metadata.
///
/// `saved_bytes` may be negative — recompressing an already-tiny or
/// well-optimized source can grow it. That is reported, not treated as an
/// error.
#[derive(Debug, Clone)]
pub struct RecompressionResult {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub original_size: usize,
    pub compressed_size: usize,
    pub saved_bytes: i64,
    pub quality_used: u8,
    pub dimension_factor: f32,
}

/// Best-effort cancellation handle, shared between a batch run and whoever
/// wants to stop it. Checked between items and between encode attempts in
/// target-size mode; an operation already past its last checkpoint runs to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Trait for recompression backends.
///
/// `Sync` so a single backend can be shared across rayon workers.
pub trait CompressBackend: Sync {
    /// Read image dimensions without a full decode where possible.
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, PipelineError>;

    /// Decode, bound-resize, and re-encode at a fixed quality.
    fn recompress(
        &self,
        bytes: &[u8],
        params: &RecompressParams,
    ) -> Result<Recompressed, PipelineError>;

    /// Search quality (and, if needed, dimensions) for an output near the
    /// target size. Always returns the best encoding found; cancellation
    /// stops the search early with whatever it has.
    fn recompress_to_size(
        &self,
        bytes: &[u8],
        params: &TargetSizeParams,
        cancel: &CancelToken,
    ) -> Result<Recompressed, PipelineError>;
}
