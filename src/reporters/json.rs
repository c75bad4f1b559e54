//! JSON reporter
//!
//! Wraps results in an envelope with the tool version and a generation
//! timestamp. Useful for piping to jq or further processing.

use super::BatchView;
use crate::models::RiskAssessment;
use crate::scan::FileRisk;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Serialize)]
struct AssessmentEnvelope<'a> {
    version: &'static str,
    generated_at: DateTime<Utc>,
    risk_level: String,
    #[serde(flatten)]
    assessment: &'a RiskAssessment,
}

#[derive(Serialize)]
struct BatchEnvelope<'a> {
    version: &'static str,
    generated_at: DateTime<Utc>,
    source: &'a str,
    scored: usize,
    skipped: usize,
    failed: usize,
    high_risk: usize,
    truncated: bool,
    files: &'a [FileRisk],
}

/// Render one assessment as JSON
pub fn render_assessment(assessment: &RiskAssessment) -> Result<String> {
    let envelope = AssessmentEnvelope {
        version: env!("CARGO_PKG_VERSION"),
        generated_at: Utc::now(),
        risk_level: assessment.level().to_string(),
        assessment,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

/// Render a batch result as JSON
pub fn render_batch(view: &BatchView<'_>) -> Result<String> {
    let envelope = BatchEnvelope {
        version: env!("CARGO_PKG_VERSION"),
        generated_at: Utc::now(),
        source: view.source,
        scored: view.result.scored,
        skipped: view.result.skipped,
        failed: view.result.failed,
        high_risk: view.result.high_risk_count(),
        truncated: view.result.truncated,
        files: view.shown(),
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::{test_assessment, test_batch};

    #[test]
    fn test_assessment_json() {
        let json = render_assessment(&test_assessment("a.py", 0.7)).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse JSON");
        assert_eq!(parsed["risk_level"], "High");
        assert_eq!(parsed["risk_score"], 0.7);
        assert_eq!(parsed["artifact"]["name"], "a.py");
        assert_eq!(parsed["scoring"]["kind"], "hybrid");
        assert_eq!(parsed["scoring"]["regime"], "model_weighted");
        assert_eq!(parsed["extraction"]["kind"], "syntax_aware");
        assert!(parsed["generated_at"].is_string());
    }

    #[test]
    fn test_batch_json() {
        let result = test_batch();
        let view = BatchView {
            source: "https://example.com/repo.git",
            result: &result,
            top: Some(1),
        };
        let json = render_batch(&view).expect("render JSON");
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("parse JSON");
        assert_eq!(parsed["scored"], 3);
        assert_eq!(parsed["high_risk"], 1);
        let files = parsed["files"].as_array().expect("files array");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0]["path"], "src/core.py");
        assert_eq!(files[0]["level"], "High");
    }
}
