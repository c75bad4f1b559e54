//! Hybrid risk scoring
//!
//! Blends the classifier's defect probability with a rule-based heuristic
//! computed from the raw metrics.
//!
//! # Heuristic bands
//!
//! ```text
//! loc        > 150 → +0.25    > 100 → +0.15
//! complexity > 10  → +0.35    > 5   → +0.20    > 3 → +0.10
//! volume     > 500 → +0.15    > 300 → +0.08
//! heuristic = min(1, Σ)
//! ```
//!
//! # Blend
//!
//! ```text
//! ml < 0.1 and heuristic > 0.3 → 0.3·ml + 0.7·heuristic   (HeuristicWeighted)
//! otherwise                    → 0.7·ml + 0.3·heuristic   (ModelWeighted)
//! ```
//!
//! A model that is near-certain the code is clean while the metrics look
//! bad is trusted less.
//!
//! Without a classifier the heuristic is the risk. When the classifier fails
//! the score degrades to `min(1, (complexity/10)·0.5 + (loc/100)·0.5)`.

use crate::classifier::{ClassifierError, DefectClassifier, ModelArtifacts};
use crate::features::{reconcile, FeatureVector};
use crate::metrics::{extract, panic_message, ExtractError, Extraction};
use crate::models::{CodeArtifact, MetricRecord, RiskAssessment};
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

/// Which blend weights were applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendRegime {
    ModelWeighted,
    HeuristicWeighted,
}

/// How the final score was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoringPath {
    /// Classifier probability blended with the heuristic
    Hybrid { regime: BlendRegime },
    /// No classifier loaded
    HeuristicOnly,
    /// Classifier failed; simple metrics formula
    Fallback { reason: String },
}

/// Rule-based score in [0, 1] from raw metrics.
pub fn heuristic_score(metrics: &MetricRecord) -> f64 {
    let mut score: f64 = 0.0;

    if metrics.loc > 150 {
        score += 0.25;
    } else if metrics.loc > 100 {
        score += 0.15;
    }

    let cc = metrics.cyclomatic_complexity;
    if cc > 10.0 {
        score += 0.35;
    } else if cc > 5.0 {
        score += 0.20;
    } else if cc > 3.0 {
        score += 0.10;
    }

    let volume = metrics.halstead_volume;
    if volume > 500.0 {
        score += 0.15;
    } else if volume > 300.0 {
        score += 0.08;
    }

    score.min(1.0)
}

/// Combine classifier and heuristic scores, clamped to [0, 1].
pub fn blend(ml_score: f64, heuristic: f64) -> (f64, BlendRegime) {
    let (risk, regime) = if ml_score < 0.1 && heuristic > 0.3 {
        (0.3 * ml_score + 0.7 * heuristic, BlendRegime::HeuristicWeighted)
    } else {
        (0.7 * ml_score + 0.3 * heuristic, BlendRegime::ModelWeighted)
    };
    (risk.clamp(0.0, 1.0), regime)
}

/// Score used when the classifier cannot be consulted.
pub fn fallback_score(metrics: &MetricRecord) -> f64 {
    let raw = (metrics.cyclomatic_complexity / 10.0) * 0.5 + (metrics.loc as f64 / 100.0) * 0.5;
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Score one measured artifact. Never fails.
pub fn score(
    artifact: &CodeArtifact,
    extraction: &Extraction,
    vector: &FeatureVector,
    classifier: Option<&dyn DefectClassifier>,
) -> RiskAssessment {
    let metrics = extraction.record;
    let heuristic = heuristic_score(&metrics);

    let (ml_score, risk_score, scoring) = match classifier {
        None => (None, heuristic, ScoringPath::HeuristicOnly),
        Some(model) => match defect_probability(model, vector) {
            Ok(ml) => {
                let (risk, regime) = blend(ml, heuristic);
                (Some(ml), risk, ScoringPath::Hybrid { regime })
            }
            Err(e) => {
                warn!(
                    "Classifier failed for {}, using fallback score: {}",
                    artifact.effective_name(),
                    e
                );
                (
                    None,
                    fallback_score(&metrics),
                    ScoringPath::Fallback {
                        reason: e.to_string(),
                    },
                )
            }
        },
    };

    debug!(
        "{}: ml={:?} heuristic={:.3} risk={:.3}",
        artifact.effective_name(),
        ml_score,
        heuristic,
        risk_score
    );

    RiskAssessment {
        artifact: artifact.identity(),
        ml_score,
        heuristic_score: heuristic,
        risk_score: risk_score.clamp(0.0, 1.0),
        metrics,
        scoring,
        extraction: extraction.path.clone(),
    }
}

/// `p(defect)` with every classifier failure mode turned into an error.
fn defect_probability(
    model: &dyn DefectClassifier,
    vector: &FeatureVector,
) -> Result<f64, ClassifierError> {
    if let Some(expected) = model.feature_count() {
        if expected != vector.len() {
            return Err(ClassifierError::FeatureMismatch {
                expected,
                actual: vector.len(),
            });
        }
    }

    let proba = catch_unwind(AssertUnwindSafe(|| model.predict_proba(vector)))
        .map_err(|panic_info| ClassifierError::Model(panic_message(panic_info.as_ref())))??;

    let p = proba[1];
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(ClassifierError::InvalidOutput(format!(
            "defect probability {p} outside [0, 1]"
        )));
    }
    Ok(p)
}

/// Extract, reconcile and score in one step.
pub fn assess(
    artifact: &CodeArtifact,
    artifacts: &ModelArtifacts,
) -> Result<RiskAssessment, ExtractError> {
    let extraction = extract(artifact)?;
    Ok(assess_extracted(artifact, &extraction, artifacts))
}

/// Reconcile and score an already-measured artifact.
pub fn assess_extracted(
    artifact: &CodeArtifact,
    extraction: &Extraction,
    artifacts: &ModelArtifacts,
) -> RiskAssessment {
    let vector = reconcile(
        Some(&extraction.record),
        artifacts.schema(),
        artifacts.means(),
    );
    score(artifact, extraction, &vector, artifacts.classifier())
}
