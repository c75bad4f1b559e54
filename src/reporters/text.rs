//! Text (terminal) reporter with colors and formatting

use super::BatchView;
use crate::metrics::ExtractionPath;
use crate::models::{RiskAssessment, RiskLevel};
use crate::scoring::{BlendRegime, ScoringPath};
use anyhow::Result;

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";

fn level_color(level: RiskLevel) -> &'static str {
    match level {
        RiskLevel::High => "\x1b[31m", // Red
        RiskLevel::Low => "\x1b[32m",  // Green
    }
}

fn percent(score: f64) -> String {
    format!("{:.1}%", score * 100.0)
}

fn describe_scoring(path: &ScoringPath) -> String {
    match path {
        ScoringPath::Hybrid {
            regime: BlendRegime::ModelWeighted,
        } => "hybrid (70% model, 30% heuristic)".to_string(),
        ScoringPath::Hybrid {
            regime: BlendRegime::HeuristicWeighted,
        } => "hybrid (30% model, 70% heuristic)".to_string(),
        ScoringPath::HeuristicOnly => "heuristic only (no model loaded)".to_string(),
        ScoringPath::Fallback { reason } => format!("fallback formula ({})", reason),
    }
}

fn describe_extraction(path: &ExtractionPath) -> String {
    match path {
        ExtractionPath::SyntaxAware => "syntax-aware".to_string(),
        ExtractionPath::Generic => "generic walker".to_string(),
        ExtractionPath::GenericFallback { reason } => {
            format!("generic walker after: {}", reason)
        }
    }
}

/// Render one assessment
pub fn render_assessment(a: &RiskAssessment) -> Result<String> {
    let mut out = String::new();
    let level = a.level();
    let color = level_color(level);

    out.push_str(&format!("\n{BOLD}Defect Risk: {}{RESET}\n", a.artifact.name));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Risk: {color}{BOLD}{}{RESET}  Level: {color}{}{RESET}\n",
        percent(a.risk_score),
        level
    ));
    match a.ml_score {
        Some(ml) => out.push_str(&format!(
            "Model: {}  Heuristic: {}\n",
            percent(ml),
            percent(a.heuristic_score)
        )),
        None => out.push_str(&format!("Heuristic: {}\n", percent(a.heuristic_score))),
    }

    out.push_str(&format!("\n{BOLD}METRICS{RESET}\n"));
    out.push_str(&format!(
        "  LOC: {}  SLOC: {}  Complexity: {:.2}  Halstead volume: {:.1}\n",
        a.metrics.loc, a.metrics.sloc, a.metrics.cyclomatic_complexity, a.metrics.halstead_volume
    ));

    out.push_str(&format!(
        "\n{DIM}Scoring: {}{RESET}\n",
        describe_scoring(&a.scoring)
    ));
    out.push_str(&format!(
        "{DIM}Extraction: {}  Digest: {}{RESET}\n",
        describe_extraction(&a.extraction),
        a.artifact.digest
    ));

    Ok(out)
}

/// Render a ranked scan result
pub fn render_batch(view: &BatchView<'_>) -> Result<String> {
    let result = view.result;
    let mut out = String::new();

    out.push_str(&format!("\n{BOLD}Defect Risk Scan: {}{RESET}\n", view.source));
    out.push_str(&format!(
        "{DIM}──────────────────────────────────────{RESET}\n"
    ));
    out.push_str(&format!(
        "Scored: {}  Skipped: {}  Failed: {}  High risk: {}\n",
        result.scored,
        result.skipped,
        result.failed,
        result.high_risk_count()
    ));
    if result.truncated {
        out.push_str(&format!(
            "{DIM}Scan stopped early at a file or time limit{RESET}\n"
        ));
    }

    let shown = view.shown();
    if shown.is_empty() {
        out.push_str("\nNo eligible source files found.\n");
        return Ok(out);
    }

    out.push_str(&format!("\n{BOLD}FILES{RESET} (highest risk first)\n"));
    for (i, entry) in shown.iter().enumerate() {
        let color = level_color(entry.level);
        out.push_str(&format!(
            "{:>4}. {color}{:>6}{RESET}  {color}{:<4}{RESET}  {}  {DIM}(loc {}, cc {:.1}){RESET}\n",
            i + 1,
            percent(entry.assessment.risk_score),
            entry.level.to_string(),
            entry.path,
            entry.assessment.metrics.loc,
            entry.assessment.metrics.cyclomatic_complexity
        ));
    }

    if shown.len() < result.entries.len() {
        out.push_str(&format!(
            "{DIM}… {} more files not shown{RESET}\n",
            result.entries.len() - shown.len()
        ));
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporters::tests::{test_assessment, test_batch};
    use crate::scan::BatchResult;

    #[test]
    fn test_assessment_text() {
        let out = render_assessment(&test_assessment("calc.py", 0.82)).expect("render");
        assert!(out.contains("calc.py"));
        assert!(out.contains("82.0%"));
        assert!(out.contains("High"));
        assert!(out.contains("LOC: 120"));
        assert!(out.contains("70% model"));
    }

    #[test]
    fn test_heuristic_only_omits_model() {
        let mut a = test_assessment("x.py", 0.1);
        a.ml_score = None;
        a.scoring = ScoringPath::HeuristicOnly;
        let out = render_assessment(&a).expect("render");
        assert!(!out.contains("Model:"));
        assert!(out.contains("no model loaded"));
    }

    #[test]
    fn test_batch_text() {
        let result = test_batch();
        let view = BatchView {
            source: "demo",
            result: &result,
            top: Some(2),
        };
        let out = render_batch(&view).expect("render");
        assert!(out.contains("Scored: 3"));
        assert!(out.contains("src/core.py"));
        assert!(!out.contains("app.js"));
        assert!(out.contains("1 more files not shown"));
    }

    #[test]
    fn test_empty_batch_text() {
        let result = BatchResult::default();
        let view = BatchView {
            source: "empty",
            result: &result,
            top: None,
        };
        let out = render_batch(&view).expect("render");
        assert!(out.contains("No eligible source files"));
    }
}
