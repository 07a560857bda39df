//! Batch compression over files and directories.
//!
//! Takes a list of input paths (files or directories), expands them into a
//! work list, and runs each image through the compression pipeline in
//! parallel using [rayon](https://docs.rs/rayon).
//!
//! ## Per-item isolation
//!
//! Each input succeeds or fails on its own. A corrupt file, an oversized
//! file, or an encode failure marks that one item as `Error` and the batch
//! continues. Only setup problems (missing input path, unwritable output
//! directory) abort the whole run.
//!
//! ## Item lifecycle
//!
//! Every item moves through `Pending → Processing → Completed | Error`.
//! `Completed` and `Error` are terminal. When a run is cancelled, items
//! that never started stay `Pending` in the final outcome.
//!
//! ## Caching
//!
//! Unless disabled, the runner consults the skip cache in the output
//! directory (see [`crate::cache`]) and reuses existing outputs whose
//! source bytes and parameters are unchanged. Cache bookkeeping happens
//! after the parallel section, on the calling thread.

use crate::cache::{self, CacheManifest, CacheStats};
use crate::pipeline::{
    CancelToken, CompressBackend, PipelineError, RecompressParams, TargetSizeParams,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use thiserror::Error;
use walkdir::WalkDir;

/// File extensions accepted when expanding directories.
const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tif", "tiff", "webp"];

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("no supported images found in inputs")]
    NoInputs,
}

/// What to do with each image.
#[derive(Debug, Clone)]
pub enum BatchMode {
    /// Fixed quality plus dimension bound.
    Quality(RecompressParams),
    /// Search for an output near a target file size.
    TargetSize(TargetSizeParams),
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub mode: BatchMode,
    /// Consult and update the skip cache in the output directory.
    pub use_cache: bool,
    /// Inputs larger than this are rejected per-item.
    pub max_input_bytes: u64,
}

/// How an item's output came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDisposition {
    /// Freshly encoded this run.
    Encoded,
    /// Output from a previous run reused as-is.
    Cached,
    /// Cached output copied to a new name (input was renamed).
    Copied,
}

/// Encoder details, absent when the output came from the cache.
#[derive(Debug, Clone, Copy)]
pub struct EncodeInfo {
    pub width: u32,
    pub height: u32,
    pub quality_used: u8,
    pub dimension_factor: f32,
}

/// Report for one completed item.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub output_name: String,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Negative when the output is larger than the source.
    pub saved_bytes: i64,
    pub cache: CacheDisposition,
    pub encode: Option<EncodeInfo>,
}

/// Terminal (or never-started) state of one item.
#[derive(Debug, Clone)]
pub enum ItemStatus {
    /// Never started, e.g. because the run was cancelled first.
    Pending,
    Completed(ItemReport),
    Error(String),
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed(_) | ItemStatus::Error(_))
    }
}

/// One entry in the batch outcome, pairing a source path with its result.
#[derive(Debug)]
pub struct BatchItem {
    pub source: PathBuf,
    pub status: ItemStatus,
}

/// Aggregate numbers for a batch run. Accumulated sequentially after the
/// parallel section, so the totals never race.
#[derive(Debug, Default, Clone, Copy)]
pub struct BatchTotals {
    pub completed: u32,
    pub errors: u32,
    pub pending: u32,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
    pub saved_bytes: i64,
}

/// Result of a full batch run.
#[derive(Debug)]
pub struct BatchOutcome {
    pub items: Vec<BatchItem>,
    pub totals: BatchTotals,
    pub cache_stats: CacheStats,
}

/// Progress events, sent as items move through the run. The CLI listens on
/// the other end of the channel and prints; library callers can ignore them.
#[derive(Debug)]
pub enum BatchEvent {
    Started { total: usize },
    ItemStarted { source: PathBuf },
    ItemCompleted { source: PathBuf, report: ItemReport },
    ItemFailed { source: PathBuf, message: String },
    Finished,
}

/// Expand input paths into a sorted work list of image files.
///
/// Files are taken as given (any extension — the format sniff at processing
/// time is the real gate). Directories are expanded to their supported image
/// files, one level deep unless `recursive` is set. A path that exists but
/// yields nothing is fine; a path that doesn't exist is an error.
pub fn collect_inputs(paths: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, BatchError> {
    let mut inputs = Vec::new();

    for path in paths {
        if path.is_file() {
            inputs.push(path.clone());
        } else if path.is_dir() {
            let max_depth = if recursive { usize::MAX } else { 1 };
            for entry in WalkDir::new(path)
                .max_depth(max_depth)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file() && has_supported_extension(entry.path()) {
                    inputs.push(entry.path().to_path_buf());
                }
            }
        } else {
            return Err(BatchError::InputNotFound(path.clone()));
        }
    }

    inputs.sort();
    inputs.dedup();
    Ok(inputs)
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .is_some_and(|e| SUPPORTED_EXTENSIONS.contains(&e.as_str()))
}

/// Output filename for a source image under the given mode.
///
/// Fixed quality: `photo.png` → `photo-compressed.jpg`.
/// Target size: `photo.png` → `photo-200kb.jpg`.
pub fn output_name(source: &Path, mode: &BatchMode) -> String {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    match mode {
        BatchMode::Quality(_) => format!("{stem}-compressed.jpg"),
        BatchMode::TargetSize(p) => format!("{stem}-{}kb.jpg", p.target.kilobytes()),
    }
}

/// Assign an output filename to each input, disambiguating stem collisions.
///
/// `a/photo.jpg` and `b/photo.jpg` both want `photo-compressed.jpg`; writing
/// both to the same path would silently lose one. The first keeps the plain
/// name, later ones get a counter: `photo-1-compressed.jpg`. Inputs are
/// sorted by `collect_inputs`, so assignment is deterministic across runs.
fn assign_output_names(inputs: &[PathBuf], mode: &BatchMode) -> Vec<String> {
    let mut seen: HashMap<String, u32> = HashMap::new();
    inputs
        .iter()
        .map(|source| {
            let base = output_name(source, mode);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                return base;
            }
            let stem = source
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("image");
            let suffix = *count - 1;
            match mode {
                BatchMode::Quality(_) => format!("{stem}-{suffix}-compressed.jpg"),
                BatchMode::TargetSize(p) => {
                    format!("{stem}-{suffix}-{}kb.jpg", p.target.kilobytes())
                }
            }
        })
        .collect()
}

/// What a worker hands back for one item.
struct WorkerResult {
    status: ItemStatus,
    /// Manifest entry to record, applied after the parallel section.
    cache_record: Option<(String, String, String)>,
}

/// Run the batch. Items are processed in parallel on the current rayon
/// pool; totals and cache updates are folded in sequentially afterwards.
pub fn run(
    backend: &impl CompressBackend,
    inputs: &[PathBuf],
    options: &BatchOptions,
    cancel: &CancelToken,
    events: Option<mpsc::Sender<BatchEvent>>,
) -> Result<BatchOutcome, BatchError> {
    if inputs.is_empty() {
        return Err(BatchError::NoInputs);
    }

    std::fs::create_dir_all(&options.output_dir)?;

    let mut manifest = if options.use_cache {
        CacheManifest::load(&options.output_dir)
    } else {
        CacheManifest::empty()
    };

    if let Some(tx) = &events {
        let _ = tx.send(BatchEvent::Started {
            total: inputs.len(),
        });
    }

    let output_names = assign_output_names(inputs, &options.mode);

    let worker_results: Vec<WorkerResult> = inputs
        .par_iter()
        .zip(output_names.par_iter())
        .map_with(events.clone(), |tx, (source, name)| {
            if cancel.is_cancelled() {
                return WorkerResult {
                    status: ItemStatus::Pending,
                    cache_record: None,
                };
            }
            if let Some(tx) = tx {
                let _ = tx.send(BatchEvent::ItemStarted {
                    source: source.clone(),
                });
            }
            let result = process_item(backend, source, name, options, &manifest, cancel);
            if let Some(tx) = tx {
                let event = match &result.status {
                    ItemStatus::Completed(report) => Some(BatchEvent::ItemCompleted {
                        source: source.clone(),
                        report: report.clone(),
                    }),
                    ItemStatus::Error(message) => Some(BatchEvent::ItemFailed {
                        source: source.clone(),
                        message: message.clone(),
                    }),
                    ItemStatus::Pending => None,
                };
                if let Some(event) = event {
                    let _ = tx.send(event);
                }
            }
            result
        })
        .collect();

    // Sequential fold: totals, cache stats, manifest updates. Single
    // writer, so no accumulation races.
    let mut totals = BatchTotals::default();
    let mut cache_stats = CacheStats::default();
    let mut items = Vec::with_capacity(inputs.len());

    for (source, result) in inputs.iter().zip(worker_results) {
        match &result.status {
            ItemStatus::Completed(report) => {
                totals.completed += 1;
                totals.original_bytes += report.original_size;
                totals.compressed_bytes += report.compressed_size;
                totals.saved_bytes += report.saved_bytes;
                match report.cache {
                    CacheDisposition::Encoded => cache_stats.misses += 1,
                    CacheDisposition::Cached => cache_stats.hits += 1,
                    CacheDisposition::Copied => cache_stats.copies += 1,
                }
            }
            ItemStatus::Error(_) => totals.errors += 1,
            ItemStatus::Pending => totals.pending += 1,
        }
        if let Some((output_name, source_hash, params_hash)) = result.cache_record {
            manifest.insert(output_name, source_hash, params_hash);
        }
        items.push(BatchItem {
            source: source.clone(),
            status: result.status,
        });
    }

    if options.use_cache {
        manifest.save(&options.output_dir)?;
    }

    if let Some(tx) = &events {
        let _ = tx.send(BatchEvent::Finished);
    }

    Ok(BatchOutcome {
        items,
        totals,
        cache_stats,
    })
}

/// Process one input file. Every failure path returns an `Error` status
/// rather than propagating, so one bad file never sinks the batch.
fn process_item(
    backend: &impl CompressBackend,
    source: &Path,
    name: &str,
    options: &BatchOptions,
    manifest: &CacheManifest,
    cancel: &CancelToken,
) -> WorkerResult {
    let fail = |message: String| WorkerResult {
        status: ItemStatus::Error(message),
        cache_record: None,
    };

    let bytes = match std::fs::read(source) {
        Ok(b) => b,
        Err(e) => return fail(format!("read failed: {e}")),
    };

    if bytes.len() as u64 > options.max_input_bytes {
        return fail(format!(
            "input is {} bytes, over the {} byte limit",
            bytes.len(),
            options.max_input_bytes
        ));
    }

    if image::guess_format(&bytes).is_err() {
        return fail("unrecognized image format".to_string());
    }

    let source_hash = cache::hash_bytes(&bytes);
    let params_hash = match &options.mode {
        BatchMode::Quality(p) => cache::hash_recompress_params(p),
        BatchMode::TargetSize(p) => cache::hash_target_size_params(p),
    };

    if options.use_cache
        && let Some(stored) = manifest.find_cached(&source_hash, &params_hash, &options.output_dir)
    {
        return cached_item(
            &stored,
            name,
            bytes.len() as u64,
            options,
            source_hash,
            params_hash,
        );
    }

    let encoded = match &options.mode {
        BatchMode::Quality(params) => backend.recompress(&bytes, params),
        BatchMode::TargetSize(params) => backend.recompress_to_size(&bytes, params, cancel),
    };
    let encoded = match encoded {
        Ok(out) => out,
        Err(PipelineError::Decode(e)) => return fail(format!("decode failed: {e}")),
        Err(e) => return fail(e.to_string()),
    };

    let output_path = options.output_dir.join(name);
    if let Err(e) = std::fs::write(&output_path, &encoded.bytes) {
        return fail(format!("write failed: {e}"));
    }

    let compressed_size = encoded.bytes.len() as u64;
    let report = ItemReport {
        output_name: name.to_string(),
        original_size: bytes.len() as u64,
        compressed_size,
        saved_bytes: bytes.len() as i64 - compressed_size as i64,
        cache: CacheDisposition::Encoded,
        encode: Some(EncodeInfo {
            width: encoded.width,
            height: encoded.height,
            quality_used: encoded.quality_used,
            dimension_factor: encoded.dimension_factor,
        }),
    };

    WorkerResult {
        status: ItemStatus::Completed(report),
        cache_record: Some((name.to_string(), source_hash, params_hash)),
    }
}

/// Build a completed status from a cache hit, copying the stored file when
/// the expected output name changed (renamed input).
fn cached_item(
    stored_name: &str,
    expected_name: &str,
    original_size: u64,
    options: &BatchOptions,
    source_hash: String,
    params_hash: String,
) -> WorkerResult {
    let stored_path = options.output_dir.join(stored_name);

    let disposition = if stored_name == expected_name {
        CacheDisposition::Cached
    } else {
        let new_path = options.output_dir.join(expected_name);
        if let Err(e) = std::fs::copy(&stored_path, &new_path) {
            return WorkerResult {
                status: ItemStatus::Error(format!("cache copy failed: {e}")),
                cache_record: None,
            };
        }
        CacheDisposition::Copied
    };

    let compressed_size = match std::fs::metadata(options.output_dir.join(expected_name)) {
        Ok(m) => m.len(),
        Err(e) => {
            return WorkerResult {
                status: ItemStatus::Error(format!("cached output unreadable: {e}")),
                cache_record: None,
            };
        }
    };

    let report = ItemReport {
        output_name: expected_name.to_string(),
        original_size,
        compressed_size,
        saved_bytes: original_size as i64 - compressed_size as i64,
        cache: disposition,
        encode: None,
    };

    WorkerResult {
        status: ItemStatus::Completed(report),
        // Re-record under the expected name so renames settle after one run
        cache_record: Some((expected_name.to_string(), source_hash, params_hash)),
    }
}
