//! Defect classifier collaborator
//!
//! The scorer only sees the [`DefectClassifier`] trait. The concrete model is
//! a [`RiskPipeline`] (standard scaler + gradient boosted trees) persisted as
//! JSON next to the feature schema and the training-set means.
//!
//! All three files are loaded once into an immutable [`ModelArtifacts`]
//! value. A missing or unreadable model is not an error: scoring continues
//! on the heuristic alone.

pub mod pipeline;

pub use pipeline::{train_gbdt, GbdtParams, RiskPipeline, StandardScaler};

use crate::features::{FeatureMeans, FeatureSchema, FeatureVector};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Serialized scaler + trees
pub const MODEL_FILE: &str = "model.json";
/// Ordered feature names
pub const SCHEMA_FILE: &str = "feature_names.json";
/// Feature name → training-set mean
pub const MEANS_FILE: &str = "feature_means.json";

/// Errors raised by a classifier at prediction time.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("expected {expected} features, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    #[error("invalid classifier output: {0}")]
    InvalidOutput(String),

    #[error("classifier failure: {0}")]
    Model(String),
}

/// Anything that can turn a feature vector into class probabilities.
pub trait DefectClassifier: Send + Sync {
    /// `[p(clean), p(defect)]`
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], ClassifierError>;

    /// Number of features the classifier expects, when known.
    fn feature_count(&self) -> Option<usize> {
        None
    }
}

/// Errors from loading or persisting model artifacts.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid artifact {path}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Classifier, schema and means, loaded once and shared by reference.
pub struct ModelArtifacts {
    classifier: Option<Box<dyn DefectClassifier>>,
    schema: FeatureSchema,
    means: FeatureMeans,
    model_modified: Option<DateTime<Local>>,
}

impl std::fmt::Debug for ModelArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifacts")
            .field("classifier", &self.classifier.is_some())
            .field("schema", &self.schema)
            .field("means", &self.means.len())
            .field("model_modified", &self.model_modified)
            .finish()
    }
}

impl ModelArtifacts {
    /// No classifier: every assessment is heuristic-only.
    pub fn heuristic_only() -> Self {
        Self {
            classifier: None,
            schema: FeatureSchema::default(),
            means: FeatureMeans::default(),
            model_modified: None,
        }
    }

    /// Assemble artifacts from parts (used by tests and the trainer).
    pub fn new(
        classifier: Option<Box<dyn DefectClassifier>>,
        schema: FeatureSchema,
        means: FeatureMeans,
    ) -> Self {
        Self {
            classifier,
            schema,
            means,
            model_modified: None,
        }
    }

    /// Load artifacts from a model directory.
    ///
    /// Never fails: each missing or malformed file is logged and the
    /// corresponding piece is left empty. The classifier is only enabled when
    /// both the model and a non-empty schema loaded.
    pub fn load(dir: &Path) -> Self {
        let model_path = dir.join(MODEL_FILE);
        let schema_path = dir.join(SCHEMA_FILE);
        let means_path = dir.join(MEANS_FILE);

        let pipeline = match load_pipeline(&model_path) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("Model unavailable, scoring with heuristic only: {}", e);
                None
            }
        };

        let schema = read_json::<FeatureSchema>(&schema_path).unwrap_or_else(|e| {
            warn!("Feature schema unavailable: {}", e);
            FeatureSchema::default()
        });

        let means = read_json::<FeatureMeans>(&means_path).unwrap_or_else(|e| {
            warn!("Feature means unavailable, missing features default to 0: {}", e);
            FeatureMeans::default()
        });

        let classifier: Option<Box<dyn DefectClassifier>> = match pipeline {
            Some(_) if schema.is_empty() => {
                warn!("Model loaded without a feature schema; ignoring model");
                None
            }
            Some(p) => {
                if p.feature_count() != Some(schema.len()) {
                    warn!(
                        "Model expects {:?} features but schema lists {}",
                        p.feature_count(),
                        schema.len()
                    );
                }
                Some(Box::new(p))
            }
            None => None,
        };

        let model_modified = fs::metadata(&model_path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Local>::from);

        if classifier.is_some() {
            info!(
                "Loaded model from {} ({} features)",
                dir.display(),
                schema.len()
            );
        }

        Self {
            classifier,
            schema,
            means,
            model_modified,
        }
    }

    pub fn classifier(&self) -> Option<&dyn DefectClassifier> {
        self.classifier.as_deref()
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn means(&self) -> &FeatureMeans {
        &self.means
    }

    /// Modification time of the model file, when it exists.
    pub fn model_modified(&self) -> Option<DateTime<Local>> {
        self.model_modified
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }
}

fn load_pipeline(path: &Path) -> Result<RiskPipeline, ArtifactError> {
    let json = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    RiskPipeline::from_json(&json).map_err(|message| ArtifactError::Invalid {
        path: path.to_path_buf(),
        message,
    })
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let json = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&json).map_err(|e| ArtifactError::Invalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn write_file(path: &Path, contents: &str) -> Result<(), ArtifactError> {
    fs::write(path, contents).map_err(|source| ArtifactError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn to_json_pretty<T: serde::Serialize>(path: &Path, value: &T) -> Result<String, ArtifactError> {
    serde_json::to_string_pretty(value).map_err(|e| ArtifactError::Invalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Persist the three artifacts into `dir`, creating it if needed.
pub fn save_artifacts(
    dir: &Path,
    pipeline: &RiskPipeline,
    schema: &FeatureSchema,
    means: &FeatureMeans,
) -> Result<(), ArtifactError> {
    fs::create_dir_all(dir).map_err(|source| ArtifactError::Write {
        path: dir.to_path_buf(),
        source,
    })?;

    let model_path = dir.join(MODEL_FILE);
    let model_json = pipeline.to_json().map_err(|message| ArtifactError::Invalid {
        path: model_path.clone(),
        message,
    })?;
    write_file(&model_path, &model_json)?;

    let schema_path = dir.join(SCHEMA_FILE);
    write_file(&schema_path, &to_json_pretty(&schema_path, schema)?)?;

    let means_path = dir.join(MEANS_FILE);
    write_file(&means_path, &to_json_pretty(&means_path, means)?)?;

    debug!("Saved model artifacts to {}", dir.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn tiny_pipeline() -> RiskPipeline {
        let rows: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![i as f64, (i % 3) as f64])
            .collect();
        let labels: Vec<f64> = (0..12).map(|i| if i >= 6 { 1.0 } else { -1.0 }).collect();
        let scaler = StandardScaler::fit(&rows);
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| scaler.transform(r)).collect();
        let params = GbdtParams {
            trees: 5,
            max_depth: 2,
            learning_rate: 0.3,
            min_leaf_size: 1,
        };
        let model = train_gbdt(&scaled, &labels, &params).expect("train");
        RiskPipeline::new(scaler, model)
    }

    #[test]
    fn test_missing_directory_is_heuristic_only() {
        let dir = tempdir().expect("tempdir");
        let artifacts = ModelArtifacts::load(&dir.path().join("nope"));
        assert!(!artifacts.has_classifier());
        assert!(artifacts.schema().is_empty());
        assert!(artifacts.means().is_empty());
        assert!(artifacts.model_modified().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().expect("tempdir");
        let schema = FeatureSchema::new(vec!["loc".into(), "v(g)".into()]);
        let mut map = BTreeMap::new();
        map.insert("loc".to_string(), 5.5);
        let means = FeatureMeans::new(map);

        save_artifacts(dir.path(), &tiny_pipeline(), &schema, &means).expect("save");
        assert!(dir.path().join(MODEL_FILE).exists());

        let artifacts = ModelArtifacts::load(dir.path());
        assert!(artifacts.has_classifier());
        assert_eq!(artifacts.schema(), &schema);
        assert_eq!(artifacts.means().get("loc"), 5.5);
        assert!(artifacts.model_modified().is_some());
        assert_eq!(
            artifacts.classifier().and_then(|c| c.feature_count()),
            Some(2)
        );
    }

    #[test]
    fn test_model_without_schema_is_ignored() {
        let dir = tempdir().expect("tempdir");
        let json = tiny_pipeline().to_json().expect("json");
        std::fs::write(dir.path().join(MODEL_FILE), json).expect("write");

        let artifacts = ModelArtifacts::load(dir.path());
        assert!(!artifacts.has_classifier());
    }

    #[test]
    fn test_corrupt_model_is_ignored() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join(MODEL_FILE), "{not json").expect("write");
        std::fs::write(dir.path().join(SCHEMA_FILE), r#"["loc"]"#).expect("write");

        let artifacts = ModelArtifacts::load(dir.path());
        assert!(!artifacts.has_classifier());
        assert_eq!(artifacts.schema().len(), 1);
    }
}
