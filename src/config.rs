//! Tool configuration module.
//!
//! Handles loading and validating `imgpress.toml`. Config files are sparse —
//! override just the values you want:
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [compression]
//! quality = 80              # JPEG quality (1-100)
//! max_edge = 1920           # Bound on the longer edge; never upscales
//!
//! [limits]
//! max_input_bytes = 10485760  # Reject inputs larger than this (10 MiB)
//!
//! [processing]
//! max_workers = 4           # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early. The file is looked up at
//! an explicit `--config` path or `imgpress.toml` in the working directory;
//! a missing file just means stock defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Tool configuration loaded from `imgpress.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Compression defaults (quality, dimension bound).
    pub compression: CompressionConfig,
    /// Input acceptance limits.
    pub limits: LimitsConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ToolConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `imgpress.toml` from a directory if present, else defaults.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join("imgpress.toml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.compression.quality) {
            return Err(ConfigError::Validation(
                "compression.quality must be 1-100".into(),
            ));
        }
        if self.compression.max_edge == 0 {
            return Err(ConfigError::Validation(
                "compression.max_edge must be non-zero".into(),
            ));
        }
        if self.limits.max_input_bytes == 0 {
            return Err(ConfigError::Validation(
                "limits.max_input_bytes must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Compression defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionConfig {
    /// JPEG quality (1-100).
    pub quality: u32,
    /// Bound on the longer edge, in pixels.
    pub max_edge: u32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            quality: crate::pipeline::params::DEFAULT_QUALITY,
            max_edge: crate::pipeline::params::DEFAULT_MAX_EDGE,
        }
    }
}

/// Input acceptance limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum accepted input file size in bytes.
    pub max_input_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_workers: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_workers(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_workers.map(|n| n.min(cores)).unwrap_or(cores)
}

/// A documented stock config file, printed by `imgpress gen-config`.
pub fn stock_config_toml() -> String {
    let defaults = ToolConfig::default();
    format!(
        r#"# imgpress configuration
# All options are optional - the values below are the stock defaults.

[compression]
# JPEG quality (1-100)
quality = {quality}
# Bound on the longer edge in pixels; smaller sources are never upscaled
max_edge = {max_edge}

[limits]
# Reject input files larger than this many bytes
max_input_bytes = {max_input}

[processing]
# Max parallel workers; omit for auto (number of CPU cores)
# max_workers = 4
"#,
        quality = defaults.compression.quality,
        max_edge = defaults.compression.max_edge,
        max_input = defaults.limits.max_input_bytes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_values() {
        let config = ToolConfig::default();
        assert_eq!(config.compression.quality, 80);
        assert_eq!(config.compression.max_edge, 1920);
        assert_eq!(config.limits.max_input_bytes, 10 * 1024 * 1024);
        assert_eq!(config.processing.max_workers, None);
    }

    #[test]
    fn sparse_override_keeps_other_defaults() {
        let config: ToolConfig = toml::from_str(
            r#"
            [compression]
            quality = 65
            "#,
        )
        .unwrap();
        assert_eq!(config.compression.quality, 65);
        assert_eq!(config.compression.max_edge, 1920);
        assert_eq!(config.limits.max_input_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn unknown_keys_rejected() {
        let result: Result<ToolConfig, _> = toml::from_str(
            r#"
            [compression]
            qality = 65
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn validate_rejects_bad_quality() {
        let mut config = ToolConfig::default();
        config.compression.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
        config.compression.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_max_edge() {
        let mut config = ToolConfig::default();
        config.compression.max_edge = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_from_dir_missing_file_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = ToolConfig::load_from_dir(tmp.path()).unwrap();
        assert_eq!(config.compression.quality, 80);
    }

    #[test]
    fn load_from_dir_reads_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("imgpress.toml"),
            "[compression]\nmax_edge = 1024\n",
        )
        .unwrap();
        let config = ToolConfig::load_from_dir(tmp.path()).unwrap();
        assert_eq!(config.compression.max_edge, 1024);
    }

    #[test]
    fn load_rejects_invalid_values() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("imgpress.toml");
        std::fs::write(&path, "[compression]\nquality = 400\n").unwrap();
        assert!(ToolConfig::load(&path).is_err());
    }

    #[test]
    fn stock_config_parses_back() {
        let config: ToolConfig = toml::from_str(&stock_config_toml()).unwrap();
        assert_eq!(config.compression.quality, 80);
        assert_eq!(config.compression.max_edge, 1920);
    }

    #[test]
    fn effective_workers_clamps_to_cores() {
        let cores = std::thread::available_parallelism().unwrap().get();
        assert_eq!(
            effective_workers(&ProcessingConfig {
                max_workers: Some(usize::MAX)
            }),
            cores
        );
        assert_eq!(
            effective_workers(&ProcessingConfig { max_workers: None }),
            cores
        );
        assert_eq!(
            effective_workers(&ProcessingConfig {
                max_workers: Some(1)
            }),
            1
        );
    }
}
