//! Configuration for defectrisk
//!
//! Sources, highest priority first:
//! 1. CLI flags (applied by the caller)
//! 2. `DEFECTRISK_MODEL_DIR` environment variable
//! 3. `--config <FILE>`, else `./defectrisk.toml`, else
//!    `~/.config/defectrisk/config.toml`
//! 4. Built-in defaults
//!
//! A config file that fails to parse is reported and ignored.

use crate::classifier::GbdtParams;
use crate::scan::ScanOptions;
use crate::train::TrainConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Project-local config file name.
pub const CONFIG_FILE_NAME: &str = "defectrisk.toml";

/// Environment variable overriding the model directory.
pub const MODEL_DIR_ENV: &str = "DEFECTRISK_MODEL_DIR";

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DefectConfig {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub scan: ScanSection,
    #[serde(default)]
    pub train: TrainSection,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ModelSection {
    /// Directory holding model.json, feature_names.json, feature_means.json
    pub dir: PathBuf,
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScanSection {
    pub max_files: usize,
    pub max_duration_secs: u64,
    pub min_content_len: usize,
    /// Shallow clone depth (0 = full history)
    pub clone_depth: u32,
}

impl Default for ScanSection {
    fn default() -> Self {
        let options = ScanOptions::default();
        Self {
            max_files: options.max_files,
            max_duration_secs: options.max_duration.as_secs(),
            min_content_len: options.min_content_len,
            clone_depth: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrainSection {
    pub trees: usize,
    pub max_depth: u32,
    pub learning_rate: f64,
    pub min_leaf_size: usize,
    pub k_neighbors: usize,
    pub seed: u64,
    pub overfit_gap: f64,
}

impl Default for TrainSection {
    fn default() -> Self {
        let config = TrainConfig::default();
        Self {
            trees: config.gbdt.trees,
            max_depth: config.gbdt.max_depth,
            learning_rate: config.gbdt.learning_rate,
            min_leaf_size: config.gbdt.min_leaf_size,
            k_neighbors: config.k_neighbors,
            seed: config.seed,
            overfit_gap: config.overfit_gap,
        }
    }
}

impl DefectConfig {
    /// Load from the first config file found, then apply the environment.
    ///
    /// Never fails: unreadable or invalid files fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> Self {
        let mut config = match Self::locate(explicit) {
            Some(path) => match Self::from_file(&path) {
                Ok(config) => {
                    debug!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to load {}: {:#}", path.display(), e);
                    Self::default()
                }
            },
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid TOML in {}", path.display()))
    }

    fn locate(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            if !path.exists() {
                warn!("Config file {} not found; using defaults", path.display());
                return None;
            }
            return Some(path.to_path_buf());
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Some(local);
        }
        Self::user_config_path().filter(|p| p.exists())
    }

    /// `~/.config/defectrisk/config.toml`
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("defectrisk").join("config.toml"))
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(MODEL_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            self.model.dir = PathBuf::from(dir);
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            max_files: self.scan.max_files,
            max_duration: Duration::from_secs(self.scan.max_duration_secs),
            min_content_len: self.scan.min_content_len,
        }
    }

    pub fn train_config(&self) -> TrainConfig {
        TrainConfig {
            gbdt: GbdtParams {
                trees: self.train.trees,
                max_depth: self.train.max_depth,
                learning_rate: self.train.learning_rate,
                min_leaf_size: self.train.min_leaf_size,
            },
            k_neighbors: self.train.k_neighbors,
            seed: self.train.seed,
            overfit_gap: self.train.overfit_gap,
            ..TrainConfig::default()
        }
    }
}

const EXAMPLE_CONFIG: &str = r#"# defectrisk configuration

[model]
# Directory with model.json, feature_names.json and feature_means.json
# (DEFECTRISK_MODEL_DIR overrides this)
dir = "models"

[scan]
max_files = 2000
max_duration_secs = 300
# Files whose trimmed content is shorter than this are skipped
min_content_len = 10
# Shallow clone depth for remote repositories (0 = full history)
clone_depth = 1

[train]
trees = 150
max_depth = 6
learning_rate = 0.1
min_leaf_size = 8
# SMOTE neighbourhood size
k_neighbors = 5
seed = 42
# Warn when train accuracy exceeds validation accuracy by more than this
overfit_gap = 0.15
"#;

/// Write an example config to `path` unless one already exists.
///
/// Returns true when a file was created.
pub fn init_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_example_config_matches_defaults() {
        let parsed: DefectConfig = toml::from_str(EXAMPLE_CONFIG).expect("example parses");
        assert_eq!(parsed, DefectConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[scan]\nmax_files = 10\n").expect("write");

        let config = DefectConfig::from_file(&path).expect("parse");
        assert_eq!(config.scan.max_files, 10);
        assert_eq!(config.scan.max_duration_secs, 300);
        assert_eq!(config.model.dir, PathBuf::from("models"));
        assert_eq!(config.scan_options().max_files, 10);
    }

    #[test]
    fn test_invalid_file_falls_back_to_defaults() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[scan\nmax_files = ").expect("write");

        assert!(DefectConfig::from_file(&path).is_err());
        let mut config = DefectConfig::load(Some(&path));
        // Environment may set the model dir; compare the rest
        config.model = ModelSection::default();
        assert_eq!(config, DefectConfig::default());
    }

    #[test]
    fn test_env_override() {
        let mut config = DefectConfig::default();
        config.apply_env(|key| (key == MODEL_DIR_ENV).then(|| "/opt/models".to_string()));
        assert_eq!(config.model.dir, PathBuf::from("/opt/models"));

        let mut config = DefectConfig::default();
        config.apply_env(|_| Some("  ".to_string()));
        assert_eq!(config.model.dir, PathBuf::from("models"));
    }

    #[test]
    fn test_train_config_mapping() {
        let mut config = DefectConfig::default();
        config.train.trees = 7;
        config.train.seed = 9;
        let train = config.train_config();
        assert_eq!(train.gbdt.trees, 7);
        assert_eq!(train.seed, 9);
        assert_eq!(train.test_fraction, 0.15);
    }

    #[test]
    fn test_init_config_does_not_overwrite() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        assert!(init_config(&path).expect("init"));
        std::fs::write(&path, "# custom\n").expect("write");
        assert!(!init_config(&path).expect("init"));
        assert_eq!(std::fs::read_to_string(&path).expect("read"), "# custom\n");
    }
}
