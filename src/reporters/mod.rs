//! Output reporters for defectrisk results
//!
//! Supports two output formats:
//! - `text` - Terminal output with colors
//! - `json` - Machine-readable JSON with a generation timestamp

mod json;
mod text;

use crate::models::RiskAssessment;
use crate::scan::BatchResult;
use anyhow::{anyhow, Result};
use std::str::FromStr;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" | "terminal" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(anyhow!("Unknown format '{}'. Valid formats: text, json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// A batch result plus what was scanned and how much to show.
#[derive(Debug, Clone, Copy)]
pub struct BatchView<'a> {
    pub source: &'a str,
    pub result: &'a BatchResult,
    /// Show at most this many entries (None = all)
    pub top: Option<usize>,
}

impl BatchView<'_> {
    fn shown(&self) -> &[crate::scan::FileRisk] {
        match self.top {
            Some(n) => self.result.top(n),
            None => &self.result.entries,
        }
    }
}

/// Render one assessment
pub fn render_assessment(assessment: &RiskAssessment, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render_assessment(assessment),
        OutputFormat::Json => json::render_assessment(assessment),
    }
}

/// Render a ranked scan result
pub fn render_batch(view: &BatchView<'_>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => text::render_batch(view),
        OutputFormat::Json => json::render_batch(view),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::metrics::ExtractionPath;
    use crate::models::{CodeArtifact, MetricRecord, RiskLevel};
    use crate::scan::FileRisk;
    use crate::scoring::{BlendRegime, ScoringPath};

    pub(crate) fn test_assessment(name: &str, risk: f64) -> RiskAssessment {
        RiskAssessment {
            artifact: CodeArtifact::named(name, "x = 1\n").identity(),
            ml_score: Some(risk),
            heuristic_score: 0.25,
            risk_score: risk,
            metrics: MetricRecord {
                loc: 120,
                sloc: 100,
                cyclomatic_complexity: 4.5,
                halstead_volume: 310.0,
            },
            scoring: ScoringPath::Hybrid {
                regime: BlendRegime::ModelWeighted,
            },
            extraction: ExtractionPath::SyntaxAware,
        }
    }

    pub(crate) fn test_batch() -> BatchResult {
        let entries = [("src/core.py", 0.82), ("src/util.py", 0.41), ("app.js", 0.12)]
            .iter()
            .map(|(path, risk)| FileRisk {
                path: path.to_string(),
                level: RiskLevel::from_score(*risk),
                assessment: test_assessment(path, *risk),
            })
            .collect();
        BatchResult {
            entries,
            scored: 3,
            skipped: 2,
            failed: 1,
            truncated: false,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>().expect("json"), OutputFormat::Json);
        assert_eq!("txt".parse::<OutputFormat>().expect("text"), OutputFormat::Text);
        assert!("sarif".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.to_string(), "json");
    }

    #[test]
    fn test_top_limits_entries() {
        let result = test_batch();
        let view = BatchView {
            source: "repo",
            result: &result,
            top: Some(2),
        };
        assert_eq!(view.shown().len(), 2);
        let all = BatchView { top: None, ..view };
        assert_eq!(all.shown().len(), 3);
    }
}
