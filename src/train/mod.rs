//! Offline model trainer
//!
//! dataset → feature matrix → stratified 70/15/15 split → standard scaler
//! (fit on train) → SMOTE on the scaled training split → gradient boosted
//! trees. The fitted scaler and trees are persisted together, alongside the
//! ordered feature schema and the training-set means the reconciler uses for
//! features the live extractor cannot measure.

pub mod dataset;
pub mod eval;
pub mod smote;
pub mod split;

pub use dataset::{Dataset, FeatureMatrix, FEATURE_CANDIDATES};
pub use eval::ConfusionMatrix;

use crate::classifier::{
    save_artifacts, train_gbdt, ArtifactError, GbdtParams, RiskPipeline, StandardScaler,
};
use crate::features::{FeatureMeans, FeatureSchema};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Fewer rows than this cannot be split meaningfully.
const MIN_SAMPLES: usize = 10;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parse error: {0}")]
    Parse(String),

    #[error("no training data: {0}")]
    NoData(String),

    #[error("no usable feature columns: {0}")]
    NoFeatures(String),

    #[error("training data contains only one class")]
    SingleClass,

    #[error("model training failed: {0}")]
    Model(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Trainer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub gbdt: GbdtParams,
    /// SMOTE neighbourhood size
    pub k_neighbors: usize,
    pub seed: u64,
    pub validation_fraction: f64,
    pub test_fraction: f64,
    /// Train − validation accuracy above this flags overfitting
    pub overfit_gap: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            gbdt: GbdtParams::default(),
            k_neighbors: 5,
            seed: 42,
            validation_fraction: 0.15,
            test_fraction: 0.15,
            overfit_gap: 0.15,
        }
    }
}

/// Class counts before and after oversampling, plus held-out metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainReport {
    pub samples: usize,
    pub features: Vec<String>,
    pub clean: usize,
    pub defective: usize,
    pub train_size: usize,
    pub validation_size: usize,
    pub test_size: usize,
    /// Training rows after SMOTE
    pub resampled_size: usize,
    pub train_accuracy: Option<f64>,
    pub validation_accuracy: Option<f64>,
    pub validation_auc: Option<f64>,
    pub test_accuracy: Option<f64>,
    pub test_auc: Option<f64>,
    pub confusion: ConfusionMatrix,
    pub overfitting: bool,
}

/// Everything a training run produces.
pub struct TrainOutcome {
    pub pipeline: RiskPipeline,
    pub schema: FeatureSchema,
    pub means: FeatureMeans,
    pub report: TrainReport,
}

impl TrainOutcome {
    /// Write model, schema and means into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), TrainError> {
        save_artifacts(dir, &self.pipeline, &self.schema, &self.means)?;
        info!("Model artifacts written to {}", dir.display());
        Ok(())
    }
}

/// Load, clean and train from a directory of CSV files.
pub fn train_from_dir(dir: &Path, config: &TrainConfig) -> Result<TrainOutcome, TrainError> {
    let matrix = Dataset::load_dir(dir)?.clean().feature_matrix()?;
    train(&matrix, config)
}

/// Fit the scaler + trees pipeline on a feature matrix.
pub fn train(matrix: &FeatureMatrix, config: &TrainConfig) -> Result<TrainOutcome, TrainError> {
    if matrix.len() < MIN_SAMPLES {
        return Err(TrainError::NoData(format!(
            "need at least {} samples, found {}",
            MIN_SAMPLES,
            matrix.len()
        )));
    }
    let defective = matrix.positives();
    let clean = matrix.len() - defective;
    if defective == 0 || clean == 0 {
        return Err(TrainError::SingleClass);
    }

    info!(
        "Training on {} samples ({} clean, {} defective) with features {:?}",
        matrix.len(),
        clean,
        defective,
        matrix.names
    );

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let split = split::stratified_split(
        &matrix.labels,
        config.validation_fraction,
        config.test_fraction,
        &mut rng,
    );

    let pick = |indices: &[usize]| -> (Vec<Vec<f64>>, Vec<bool>) {
        (
            indices.iter().map(|&i| matrix.rows[i].clone()).collect(),
            indices.iter().map(|&i| matrix.labels[i]).collect(),
        )
    };
    let (train_rows, train_labels) = pick(&split.train);
    let (val_rows, val_labels) = pick(&split.validation);
    let (test_rows, test_labels) = pick(&split.test);

    let scaler = StandardScaler::fit(&train_rows);
    let scaled: Vec<Vec<f64>> = train_rows.iter().map(|r| scaler.transform(r)).collect();
    let (balanced_rows, balanced_labels) =
        smote::oversample(&scaled, &train_labels, config.k_neighbors, &mut rng);
    info!(
        "After SMOTE: {} training rows ({} defective)",
        balanced_rows.len(),
        balanced_labels.iter().filter(|&&l| l).count()
    );

    let targets: Vec<f64> = balanced_labels
        .iter()
        .map(|&l| if l { 1.0 } else { -1.0 })
        .collect();
    let model = train_gbdt(&balanced_rows, &targets, &config.gbdt).map_err(TrainError::Model)?;
    let pipeline = RiskPipeline::new(scaler, model);

    let train_proba = pipeline.predict_rows(&train_rows);
    let val_proba = pipeline.predict_rows(&val_rows);
    let test_proba = pipeline.predict_rows(&test_rows);

    let train_accuracy = eval::accuracy(&train_labels, &eval::classify(&train_proba));
    let validation_accuracy = eval::accuracy(&val_labels, &eval::classify(&val_proba));
    let test_predicted = eval::classify(&test_proba);

    let overfitting = match (train_accuracy, validation_accuracy) {
        (Some(t), Some(v)) => t - v > config.overfit_gap,
        _ => false,
    };
    if overfitting {
        warn!(
            "Possible overfitting: train accuracy exceeds validation by more than {:.2}",
            config.overfit_gap
        );
    }

    let report = TrainReport {
        samples: matrix.len(),
        features: matrix.names.clone(),
        clean,
        defective,
        train_size: train_rows.len(),
        validation_size: val_rows.len(),
        test_size: test_rows.len(),
        resampled_size: balanced_rows.len(),
        train_accuracy,
        validation_accuracy,
        validation_auc: eval::roc_auc(&val_labels, &val_proba),
        test_accuracy: eval::accuracy(&test_labels, &test_predicted),
        test_auc: eval::roc_auc(&test_labels, &test_proba),
        confusion: ConfusionMatrix::from_predictions(&test_labels, &test_predicted),
        overfitting,
    };

    Ok(TrainOutcome {
        pipeline,
        schema: FeatureSchema::new(matrix.names.clone()),
        means: matrix.column_means(),
        report,
    })
}
