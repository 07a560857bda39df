//! Pure Rust recompression backend — statically linked, no system deps.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::ImageReader::into_dimensions` |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Orientation fix | custom `exif` parser + `DynamicImage::rotate*` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//!
//! JPEG cannot carry an alpha channel, so every raster is converted to RGB8
//! before encoding (paletted and RGBA sources included).

use super::backend::{CancelToken, CompressBackend, Dimensions, PipelineError, Recompressed};
use super::calculations::{bounded_dimensions, scaled_dimensions, within_tolerance};
use super::exif::{self, Orientation};
use super::params::{
    COARSE_TOLERANCE, DIMENSION_LADDER, FINE_TOLERANCE, RecompressParams, SEARCH_QUALITY_MAX,
    SEARCH_QUALITY_MIN, TargetSizeParams,
};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RasterBackend;

impl RasterBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RasterBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode raw bytes into a raster, format sniffed from magic bytes.
fn decode(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    image::load_from_memory(bytes)
        .map_err(|e| PipelineError::Decode(format!("not a decodable raster image: {e}")))
}

/// Rotate the raster upright per the source's EXIF orientation tag.
fn apply_orientation(img: DynamicImage, source_bytes: &[u8]) -> DynamicImage {
    match exif::orientation(source_bytes) {
        Orientation::Normal => img,
        Orientation::Rotate90 => img.rotate90(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::Rotate270 => img.rotate270(),
    }
}

/// Encode a raster as JPEG at the given quality.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, PipelineError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(PipelineError::Encode("zero-area image".into()));
    }
    let rgb = img.to_rgb8();
    let mut cursor = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| PipelineError::Encode(format!("JPEG encode failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Carry the source's APP1 Exif segment over to the output when requested.
fn carry_exif(output: Vec<u8>, source_bytes: &[u8], keep: bool) -> Vec<u8> {
    if !keep {
        return output;
    }
    match exif::exif_segment(source_bytes) {
        Some(segment) => exif::splice_exif(output, &segment),
        None => output,
    }
}

impl CompressBackend for RasterBackend {
    fn identify(&self, bytes: &[u8]) -> Result<Dimensions, PipelineError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode(format!("format sniff failed: {e}")))?;
        let (width, height) = reader
            .into_dimensions()
            .map_err(|e| PipelineError::Decode(format!("failed to read dimensions: {e}")))?;
        Ok(Dimensions { width, height })
    }

    fn recompress(
        &self,
        bytes: &[u8],
        params: &RecompressParams,
    ) -> Result<Recompressed, PipelineError> {
        let img = decode(bytes)?;
        let img = if params.auto_rotate {
            apply_orientation(img, bytes)
        } else {
            img
        };

        let source_dims = (img.width(), img.height());
        let (out_w, out_h) = bounded_dimensions(source_dims, params.max_edge);
        let img = if (out_w, out_h) != source_dims {
            img.resize_exact(out_w, out_h, FilterType::Lanczos3)
        } else {
            img
        };

        let encoded = encode_jpeg(&img, params.quality.value())?;
        Ok(Recompressed {
            bytes: carry_exif(encoded, bytes, params.keep_exif),
            width: out_w,
            height: out_h,
            quality_used: params.quality.value(),
            dimension_factor: 1.0,
        })
    }

    fn recompress_to_size(
        &self,
        bytes: &[u8],
        params: &TargetSizeParams,
        cancel: &CancelToken,
    ) -> Result<Recompressed, PipelineError> {
        let img = decode(bytes)?;
        let img = if params.auto_rotate {
            apply_orientation(img, bytes)
        } else {
            img
        };

        let source_dims = (img.width(), img.height());
        let target = params.target.bytes();
        let mut best: Option<Recompressed> = None;

        'ladder: for &factor in DIMENSION_LADDER {
            if cancel.is_cancelled() && best.is_some() {
                break;
            }
            let working = if factor < 1.0 {
                let (w, h) = scaled_dimensions(source_dims, factor);
                img.resize_exact(w, h, FilterType::Lanczos3)
            } else {
                img.clone()
            };

            // Binary search the quality range for this ladder step
            let mut lo = SEARCH_QUALITY_MIN;
            let mut hi = SEARCH_QUALITY_MAX;
            for _ in 0..params.max_iterations {
                if cancel.is_cancelled() && best.is_some() {
                    break 'ladder;
                }
                let quality = (lo + hi) / 2;
                let encoded = encode_jpeg(&working, quality as u8)?;
                let size = encoded.len();
                let candidate = Recompressed {
                    bytes: encoded,
                    width: working.width(),
                    height: working.height(),
                    quality_used: quality as u8,
                    dimension_factor: factor,
                };

                if within_tolerance(size, target, FINE_TOLERANCE) {
                    return Ok(finish(candidate, bytes, params));
                }

                let closer = best
                    .as_ref()
                    .is_none_or(|b| size.abs_diff(target) < b.bytes.len().abs_diff(target));
                if closer {
                    best = Some(candidate);
                }

                if size > target {
                    if quality <= lo {
                        break;
                    }
                    hi = quality - 1;
                } else {
                    lo = quality + 1;
                }
                if lo >= hi {
                    break;
                }
            }

            // Good enough at this dimension — keep the quality we found
            if let Some(b) = &best
                && within_tolerance(b.bytes.len(), target, COARSE_TOLERANCE)
            {
                return Ok(finish(b.clone(), bytes, params));
            }
        }

        best.map(|b| finish(b, bytes, params))
            .ok_or_else(|| PipelineError::Encode("no encoding produced".into()))
    }
}

fn finish(result: Recompressed, source_bytes: &[u8], params: &TargetSizeParams) -> Recompressed {
    Recompressed {
        bytes: carry_exif(result.bytes, source_bytes, params.keep_exif),
        ..result
    }
}
