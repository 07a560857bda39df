//! Skip cache for repeated batch runs.
//!
//! Re-running `imgpress` over a directory that is mostly unchanged should
//! not re-encode everything. This module lets the batch runner skip the
//! encode when the source bytes and encoding parameters match a previous
//! run whose output file is still on disk.
//!
//! ## Cache keys
//!
//! The cache is **content-addressed**: lookups are by the combination of
//! `source_hash` and `params_hash`, not by output file path. Renaming an
//! input file does not invalidate its cache entry — only changed image
//! content or changed encoding parameters do.
//!
//! - **`source_hash`**: SHA-256 of the source file contents. Content-based
//!   rather than mtime-based so it survives `git checkout` (which resets
//!   modification times).
//!
//! - **`params_hash`**: SHA-256 of the encoding parameters (quality,
//!   max edge, rotation and EXIF flags — or the target size and iteration
//!   budget in target-size mode). Any config change re-encodes.
//!
//! A cache hit requires:
//! 1. An entry with matching `source_hash` and `params_hash` exists
//! 2. The previously-written output file still exists on disk
//!
//! When a hit is found but the output path has changed (input renamed), the
//! cached file is copied to the new location instead of re-encoding.
//!
//! ## Storage
//!
//! The cache manifest is a JSON file at `<output_dir>/.imgpress-cache.json`,
//! living alongside the compressed outputs. Pass `--no-cache` to bypass:
//! an empty manifest is loaded and every image is re-encoded.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the output directory.
const MANIFEST_FILENAME: &str = ".imgpress-cache.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single cached output file.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub source_hash: String,
    pub params_hash: String,
}

/// On-disk cache manifest mapping output filenames to their cache entries.
///
/// Lookups go through a runtime `content_index` that maps
/// `"{source_hash}:{params_hash}"` to the stored output filename, making
/// the cache resilient to input renames.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
    /// Runtime reverse index: `"{source_hash}:{params_hash}"` → output name.
    /// Built at load time, maintained on insert. Never serialized.
    #[serde(skip)]
    content_index: HashMap<String, String>,
}

impl CacheManifest {
    /// Create an empty manifest (used for `--no-cache` or first run).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
            content_index: HashMap::new(),
        }
    }

    /// Load from the output directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(output_dir: &Path) -> Self {
        let path = manifest_path(output_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let mut manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest.content_index = build_content_index(&manifest.entries);
        manifest
    }

    /// Save to the output directory.
    pub fn save(&self, output_dir: &Path) -> io::Result<()> {
        let path = manifest_path(output_dir);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Look up a cached output file by content hashes.
    ///
    /// Returns `Some(stored_output_name)` if an entry with matching
    /// `source_hash` and `params_hash` exists **and** the file is still on
    /// disk. The returned name may differ from the caller's expected output
    /// name (input renamed since the last run); the caller copies the file
    /// to the new name in that case.
    pub fn find_cached(
        &self,
        source_hash: &str,
        params_hash: &str,
        output_dir: &Path,
    ) -> Option<String> {
        let content_key = format!("{}:{}", source_hash, params_hash);
        let stored = self.content_index.get(&content_key)?;
        if output_dir.join(stored).exists() {
            Some(stored.clone())
        } else {
            None
        }
    }

    /// Record a cache entry for an output file.
    ///
    /// If an entry with the same content (source_hash + params_hash) already
    /// exists under a different output name, the old entry is removed to
    /// keep the manifest clean when inputs are renamed.
    pub fn insert(&mut self, output_name: String, source_hash: String, params_hash: String) {
        let content_key = format!("{}:{}", source_hash, params_hash);

        // Remove stale entry if content moved to a new name
        if let Some(old_name) = self.content_index.get(&content_key)
            && *old_name != output_name
        {
            self.entries.remove(old_name.as_str());
        }

        self.content_index.insert(content_key, output_name.clone());
        self.entries.insert(
            output_name,
            CacheEntry {
                source_hash,
                params_hash,
            },
        );
    }
}

/// Build the content_index reverse map from the entries map.
fn build_content_index(entries: &HashMap<String, CacheEntry>) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(output_name, entry)| {
            let content_key = format!("{}:{}", entry.source_hash, entry.params_hash);
            (content_key, output_name.clone())
        })
        .collect()
}

/// SHA-256 hash of raw bytes, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// SHA-256 hash of fixed-quality encoding parameters.
pub fn hash_recompress_params(params: &crate::pipeline::RecompressParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"recompress\0");
    hasher.update((params.quality.value() as u32).to_le_bytes());
    hasher.update(params.max_edge.to_le_bytes());
    hasher.update([params.auto_rotate as u8, params.keep_exif as u8]);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 hash of target-size encoding parameters.
pub fn hash_target_size_params(params: &crate::pipeline::TargetSizeParams) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"to-size\0");
    hasher.update(params.target.kilobytes().to_le_bytes());
    hasher.update(params.max_iterations.to_le_bytes());
    hasher.update([params.auto_rotate as u8, params.keep_exif as u8]);
    format!("{:x}", hasher.finalize())
}

/// Summary of cache performance for a batch run.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: u32,
    pub copies: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.hits + self.copies + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 || self.copies > 0 {
            if self.copies > 0 {
                write!(
                    f,
                    "{} cached, {} copied, {} encoded ({} total)",
                    self.hits,
                    self.copies,
                    self.misses,
                    self.total()
                )
            } else {
                write!(
                    f,
                    "{} cached, {} encoded ({} total)",
                    self.hits,
                    self.misses,
                    self.total()
                )
            }
        } else {
            write!(f, "{} encoded", self.misses)
        }
    }
}

/// Resolve the cache manifest path for an output directory.
pub fn manifest_path(output_dir: &Path) -> PathBuf {
    output_dir.join(MANIFEST_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{RecompressParams, TargetSizeParams};
    use std::fs;
    use tempfile::TempDir;

    // =========================================================================
    // CacheManifest basics
    // =========================================================================

    #[test]
    fn empty_manifest_has_no_entries() {
        let m = CacheManifest::empty();
        assert_eq!(m.version, MANIFEST_VERSION);
        assert!(m.entries.is_empty());
        assert!(m.content_index.is_empty());
    }

    #[test]
    fn find_cached_hit() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("photo-compressed.jpg".into(), "src123".into(), "prm456".into());
        fs::write(tmp.path().join("photo-compressed.jpg"), "data").unwrap();

        assert_eq!(
            m.find_cached("src123", "prm456", tmp.path()),
            Some("photo-compressed.jpg".to_string())
        );
    }

    #[test]
    fn find_cached_miss_wrong_source_hash() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("out.jpg".into(), "hash_a".into(), "params".into());
        fs::write(tmp.path().join("out.jpg"), "data").unwrap();

        assert_eq!(m.find_cached("hash_b", "params", tmp.path()), None);
    }

    #[test]
    fn find_cached_miss_wrong_params_hash() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("out.jpg".into(), "hash".into(), "params_a".into());
        fs::write(tmp.path().join("out.jpg"), "data").unwrap();

        assert_eq!(m.find_cached("hash", "params_b", tmp.path()), None);
    }

    #[test]
    fn find_cached_miss_file_deleted() {
        let mut m = CacheManifest::empty();
        m.insert("gone.jpg".into(), "h".into(), "p".into());
        let tmp = TempDir::new().unwrap();
        assert_eq!(m.find_cached("h", "p", tmp.path()), None);
    }

    #[test]
    fn find_cached_returns_old_name_after_rename() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("old-name.jpg".into(), "srchash".into(), "prmhash".into());
        fs::write(tmp.path().join("old-name.jpg"), "jpeg data").unwrap();

        // Same content looked up for a renamed input: old output name returned
        let result = m.find_cached("srchash", "prmhash", tmp.path());
        assert_eq!(result, Some("old-name.jpg".to_string()));
    }

    #[test]
    fn insert_removes_stale_entry_on_rename() {
        let mut m = CacheManifest::empty();
        m.insert("old.jpg".into(), "src".into(), "prm".into());
        m.insert("new.jpg".into(), "src".into(), "prm".into());

        assert!(!m.entries.contains_key("old.jpg"));
        assert!(m.entries.contains_key("new.jpg"));
    }

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut m = CacheManifest::empty();
        m.insert("x.jpg".into(), "s1".into(), "p1".into());
        m.insert("y.jpg".into(), "s2".into(), "p2".into());

        m.save(tmp.path()).unwrap();
        let loaded = CacheManifest::load(tmp.path());

        assert_eq!(loaded.version, MANIFEST_VERSION);
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(
            loaded.content_index.get("s1:p1"),
            Some(&"x.jpg".to_string())
        );
    }

    #[test]
    fn manifest_path_joins_hidden_filename() {
        assert_eq!(
            manifest_path(Path::new("/out")),
            Path::new("/out/.imgpress-cache.json")
        );
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILENAME), "not json").unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"a.jpg": {{"source_hash":"h","params_hash":"p"}}}}}}"#,
            MANIFEST_VERSION + 1
        );
        fs::write(tmp.path().join(MANIFEST_FILENAME), json).unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    // =========================================================================
    // Hash functions
    // =========================================================================

    #[test]
    fn hash_bytes_deterministic() {
        let h1 = hash_bytes(b"hello world");
        let h2 = hash_bytes(b"hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 64); // SHA-256 hex is 64 chars
        assert_ne!(h1, hash_bytes(b"hello worlds"));
    }

    #[test]
    fn recompress_params_hash_varies_with_quality() {
        let a = RecompressParams::new(80, 1920).unwrap();
        let b = RecompressParams::new(85, 1920).unwrap();
        assert_ne!(hash_recompress_params(&a), hash_recompress_params(&b));
    }

    #[test]
    fn recompress_params_hash_varies_with_flags() {
        let a = RecompressParams::default();
        let b = RecompressParams {
            keep_exif: true,
            ..RecompressParams::default()
        };
        assert_ne!(hash_recompress_params(&a), hash_recompress_params(&b));
    }

    #[test]
    fn target_params_hash_varies_with_target() {
        let a = TargetSizeParams::new(50).unwrap();
        let b = TargetSizeParams::new(100).unwrap();
        assert_ne!(hash_target_size_params(&a), hash_target_size_params(&b));
    }

    #[test]
    fn mode_prefixes_keep_hash_spaces_distinct() {
        // Same numeric inputs through the two hashers must not collide
        let r = RecompressParams::new(50, 1920).unwrap();
        let t = TargetSizeParams::new(50).unwrap();
        assert_ne!(hash_recompress_params(&r), hash_target_size_params(&t));
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats {
            hits: 5,
            copies: 0,
            misses: 2,
        };
        assert_eq!(format!("{}", s), "5 cached, 2 encoded (7 total)");
    }

    #[test]
    fn cache_stats_display_with_copies() {
        let s = CacheStats {
            hits: 3,
            copies: 2,
            misses: 1,
        };
        assert_eq!(format!("{}", s), "3 cached, 2 copied, 1 encoded (6 total)");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let s = CacheStats {
            hits: 0,
            copies: 0,
            misses: 3,
        };
        assert_eq!(format!("{}", s), "3 encoded");
    }
}
