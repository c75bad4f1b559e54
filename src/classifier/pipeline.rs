//! Scaler + GBDT pipeline
//!
//! Wraps the `gbdt` crate the way the model is persisted: one JSON blob
//! holding the fitted standard scaler and the boosted trees. The trees use
//! the `LogLikelyhood` loss, so label 1.0 is "defect" and -1.0 is "clean",
//! and `predict` yields the probability of the defect class.
//!
//! Note: the gbdt crate works in `f32` (`ValueType`); feature vectors are
//! `f64`. Conversion happens at the crate boundary.

use gbdt::config::Config;
use gbdt::decision_tree::Data;
use gbdt::gradient_boost::GBDT;
use serde::{Deserialize, Serialize};

use super::{ClassifierError, DefectClassifier};
use crate::features::FeatureVector;

/// Per-feature standardization: (x - mean) / scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Fit on row-major samples. Zero-variance columns get scale 1.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let n = rows.len().max(1) as f64;

        let means: Vec<f64> = (0..width)
            .map(|j| rows.iter().map(|r| r[j]).sum::<f64>() / n)
            .collect();
        let scales = (0..width)
            .map(|j| {
                let var = rows.iter().map(|r| (r[j] - means[j]).powi(2)).sum::<f64>() / n;
                let std = var.sqrt();
                if std > f64::EPSILON {
                    std
                } else {
                    1.0
                }
            })
            .collect();

        Self { means, scales }
    }

    pub fn width(&self) -> usize {
        self.means.len()
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(self.scales.iter()))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect()
    }
}

/// Hyperparameters for the boosted trees.
#[derive(Debug, Clone, PartialEq)]
pub struct GbdtParams {
    pub trees: usize,
    pub max_depth: u32,
    pub learning_rate: f64,
    pub min_leaf_size: usize,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            trees: 150,
            max_depth: 6,
            learning_rate: 0.1,
            min_leaf_size: 8,
        }
    }
}

/// The persisted classifier: scaler followed by gradient boosted trees.
#[derive(Serialize, Deserialize)]
pub struct RiskPipeline {
    scaler: StandardScaler,
    model: GBDT,
}

impl RiskPipeline {
    pub fn new(scaler: StandardScaler, model: GBDT) -> Self {
        Self { scaler, model }
    }

    /// Parse the JSON blob written by [`RiskPipeline::to_json`].
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| format!("failed to parse model JSON: {e}"))
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| format!("failed to serialise model: {e}"))
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Defect probability for already-scaled rows.
    pub fn predict_scaled(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        if rows.is_empty() {
            return Vec::new();
        }
        let data: Vec<Data> = rows
            .iter()
            .map(|r| Data::new_test_data(to_f32(r), None))
            .collect();
        self.model
            .predict(&data)
            .into_iter()
            .map(|p| p as f64)
            .collect()
    }

    /// Defect probability for raw (unscaled) rows.
    pub fn predict_rows(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| self.scaler.transform(r)).collect();
        self.predict_scaled(&scaled)
    }
}

impl DefectClassifier for RiskPipeline {
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], ClassifierError> {
        let expected = self.scaler.width();
        if features.len() != expected {
            return Err(ClassifierError::FeatureMismatch {
                expected,
                actual: features.len(),
            });
        }

        let scaled = self.scaler.transform(features.values());
        let p = self
            .predict_scaled(&[scaled])
            .first()
            .copied()
            .ok_or_else(|| ClassifierError::InvalidOutput("empty prediction".to_string()))?;

        if !p.is_finite() {
            return Err(ClassifierError::InvalidOutput(format!(
                "non-finite probability {p}"
            )));
        }
        let p = p.clamp(0.0, 1.0);
        Ok([1.0 - p, p])
    }

    fn feature_count(&self) -> Option<usize> {
        Some(self.scaler.width())
    }
}

#[inline]
fn to_f32(row: &[f64]) -> Vec<f32> {
    row.iter().map(|&v| v as f32).collect()
}

/// Train boosted trees on scaled rows.
///
/// - `labels`: 1.0 for defect, -1.0 for clean (LogLikelyhood convention)
pub fn train_gbdt(rows: &[Vec<f64>], labels: &[f64], params: &GbdtParams) -> Result<GBDT, String> {
    if rows.is_empty() {
        return Err("no training samples provided".into());
    }
    if rows.len() != labels.len() {
        return Err(format!(
            "feature count ({}) does not match label count ({})",
            rows.len(),
            labels.len()
        ));
    }

    let feature_size = rows[0].len();

    let mut cfg = Config::new();
    cfg.set_feature_size(feature_size);
    cfg.set_max_depth(params.max_depth);
    cfg.set_iterations(params.trees);
    cfg.set_shrinkage(params.learning_rate as f32);
    cfg.set_loss("LogLikelyhood");
    cfg.set_debug(false);
    cfg.set_training_optimization_level(2);
    cfg.set_min_leaf_size(params.min_leaf_size);

    let mut gbdt = GBDT::new(&cfg);

    let mut training_data: Vec<Data> = rows
        .iter()
        .zip(labels.iter())
        .map(|(r, &label)| Data::new_training_data(to_f32(r), 1.0_f32, label as f32, None))
        .collect();

    gbdt.fit(&mut training_data);

    Ok(gbdt)
}
