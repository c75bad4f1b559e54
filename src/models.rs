//! Core data models for defectrisk
//!
//! These models flow through the whole pipeline: a [`CodeArtifact`] is
//! measured into a [`MetricRecord`], reconciled into a feature vector and
//! finally scored into a [`RiskAssessment`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::metrics::ExtractionPath;
use crate::scoring::ScoringPath;

/// Name given to pasted text that arrives without a filename.
///
/// The `.py` suffix routes unnamed snippets to the syntax-aware path first.
pub const PASTED_CODE_NAME: &str = "pasted_code.py";

/// Risk above this threshold is labelled [`RiskLevel::High`].
pub const HIGH_RISK_THRESHOLD: f64 = 0.5;

/// A piece of source code to be measured and scored.
#[derive(Debug, Clone)]
pub struct CodeArtifact {
    /// Raw source text
    pub content: String,
    /// Filename or repository-relative path (None for pasted text)
    pub name: Option<String>,
}

impl CodeArtifact {
    /// Pasted text with no filename.
    pub fn pasted(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            name: None,
        }
    }

    /// A named file (upload or repository entry).
    pub fn named(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            name: Some(name.into()),
        }
    }

    /// Name used for language inference, falling back to [`PASTED_CODE_NAME`].
    pub fn effective_name(&self) -> &str {
        self.name.as_deref().unwrap_or(PASTED_CODE_NAME)
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(self.effective_name())
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    /// True for pasted text (no filename or the implicit pasted name).
    pub fn is_pasted(&self) -> bool {
        self.name.is_none() || self.name.as_deref() == Some(PASTED_CODE_NAME)
    }

    /// Stable identity: display name plus a short SHA-256 digest of the content.
    pub fn identity(&self) -> ArtifactId {
        let digest = Sha256::digest(self.content.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        ArtifactId {
            name: self
                .name
                .clone()
                .unwrap_or_else(|| "Pasted Code".to_string()),
            digest: hex[..16].to_string(),
        }
    }
}

/// Identity of a scored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactId {
    pub name: String,
    pub digest: String,
}

/// Canonical static metrics for one artifact.
///
/// Produced per extraction call and never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// Raw line count (normalized line count on the generic path)
    pub loc: usize,
    /// Source lines: lines that carry at least one non-comment token
    pub sloc: usize,
    /// Mean cyclomatic complexity across discovered functions
    pub cyclomatic_complexity: f64,
    /// Halstead volume (0 when the extractor cannot compute it)
    pub halstead_volume: f64,
}

impl MetricRecord {
    /// True when the extractor saw no code at all.
    pub fn is_empty(&self) -> bool {
        self.loc == 0 && self.sloc == 0
    }
}

/// Coarse label for ranked batch output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Low,
}

impl RiskLevel {
    pub fn from_score(risk_score: f64) -> Self {
        if risk_score > HIGH_RISK_THRESHOLD {
            RiskLevel::High
        } else {
            RiskLevel::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Low => write!(f, "Low"),
        }
    }
}

/// Result of scoring one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub artifact: ArtifactId,
    /// Classifier probability of the defect class (None when no classifier ran)
    pub ml_score: Option<f64>,
    pub heuristic_score: f64,
    /// Final blended score, always within [0, 1]
    pub risk_score: f64,
    pub metrics: MetricRecord,
    pub scoring: ScoringPath,
    pub extraction: ExtractionPath,
}

impl RiskAssessment {
    pub fn level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }
}
