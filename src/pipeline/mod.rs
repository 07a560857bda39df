//! The recompression pipeline — pure Rust, zero system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::ImageReader` |
//! | **Orientation** | custom EXIF parser (JPEG APP1 + TIFF IFD) |
//! | **Resize** | Lanczos3, bounded by max edge, never upscaling |
//! | **Encode** | `image` JPEG encoder at a caller-chosen quality |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Validated data structures describing operations
//! - **Backend**: [`CompressBackend`] trait + [`RasterBackend`]
//! - **Exif**: orientation tag parsing and APP1 preservation
//!
//! Each invocation is independent and side-effect-free; a shared
//! [`RasterBackend`] may serve any number of concurrent requests.

pub mod backend;
mod calculations;
pub mod codec;
pub(crate) mod exif;
pub mod params;

pub use backend::{
    CancelToken, CompressBackend, Dimensions, PipelineError, Recompressed, RecompressionResult,
};
pub use calculations::{bounded_dimensions, scaled_dimensions, within_tolerance};
pub use codec::RasterBackend;
pub use params::{Quality, RecompressParams, TargetSize, TargetSizeParams};

/// Recompress a single image held in memory.
///
/// Convenience wrapper over [`RasterBackend`] for library callers that
/// don't need batching: decode → orient → bounded resize → JPEG encode,
/// with size-delta metadata attached.
pub fn recompress(
    bytes: &[u8],
    params: &RecompressParams,
) -> Result<RecompressionResult, PipelineError> {
    RasterBackend::new()
        .recompress(bytes, params)
        .map(|r| r.into_result(bytes.len()))
}

/// Compress a single in-memory image toward a target file size.
pub fn recompress_to_size(
    bytes: &[u8],
    params: &TargetSizeParams,
) -> Result<RecompressionResult, PipelineError> {
    RasterBackend::new()
        .recompress_to_size(bytes, params, &CancelToken::new())
        .map(|r| r.into_result(bytes.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use image::codecs::jpeg::JpegEncoder;
    use std::io::Cursor;

    fn photo_like_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8])
        });
        let mut cursor = Cursor::new(Vec::new());
        img.write_with_encoder(JpegEncoder::new_with_quality(&mut cursor, 95))
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn recompress_attaches_size_metadata() {
        let source = photo_like_jpeg(3000, 2000);
        let result = recompress(&source, &RecompressParams::new(80, 1920).unwrap()).unwrap();

        assert_eq!((result.width, result.height), (1920, 1280));
        assert_eq!(result.original_size, source.len());
        assert_eq!(result.compressed_size, result.bytes.len());
        assert_eq!(
            result.saved_bytes,
            source.len() as i64 - result.bytes.len() as i64
        );
        assert!(result.compressed_size > 0);
    }

    #[test]
    fn recompress_to_size_attaches_size_metadata() {
        let source = photo_like_jpeg(640, 480);
        let result = recompress_to_size(&source, &TargetSizeParams::new(15).unwrap()).unwrap();
        assert_eq!(result.compressed_size, result.bytes.len());
        assert!(result.compressed_size > 0);
    }
}
