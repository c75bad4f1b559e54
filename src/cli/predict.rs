//! Predict command - score one snippet or file

use super::Context;
use crate::classifier::ModelArtifacts;
use crate::intake::{AnalysisError, Analyzer};
use crate::models::RiskAssessment;
use crate::reporters::{self, OutputFormat};
use anyhow::{Context as _, Result};
use std::io::Read;
use std::path::PathBuf;
use tracing::info;

/// Where the code comes from
#[derive(Debug)]
pub(super) enum Input {
    Text(String),
    Stdin,
    File(PathBuf),
}

pub(super) fn run(ctx: &Context, input: Input, format: &str) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    let artifacts = ModelArtifacts::load(&ctx.config.model.dir);
    let analyzer = Analyzer::new(&artifacts);

    let assessment = analyze(&analyzer, input)?;
    info!(
        "{}: risk {:.3} ({})",
        assessment.artifact.name,
        assessment.risk_score,
        assessment.level()
    );

    println!("{}", reporters::render_assessment(&assessment, format)?);
    Ok(())
}

/// Validation failures stay typed as `InputError` inside the anyhow chain so
/// `main` can map them to exit code 2.
fn analyze(analyzer: &Analyzer<'_>, input: Input) -> Result<RiskAssessment> {
    let outcome = match input {
        Input::Text(text) => analyzer.assess_snippet(&text),
        Input::Stdin => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read standard input")?;
            analyzer.assess_snippet(&text)
        }
        Input::File(path) => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            analyzer.assess_upload(&filename, &bytes)
        }
    };

    outcome.map_err(|e| match e {
        AnalysisError::Invalid(invalid) => anyhow::Error::new(invalid),
        AnalysisError::Internal(internal) => internal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::InputError;
    use tempfile::tempdir;

    #[test]
    fn test_invalid_input_keeps_its_type() {
        let artifacts = ModelArtifacts::heuristic_only();
        let analyzer = Analyzer::new(&artifacts);

        let err = analyze(&analyzer, Input::Text("asdf".to_string())).unwrap_err();
        assert_eq!(err.downcast_ref::<InputError>(), Some(&InputError::TooShort));
    }

    #[test]
    fn test_file_input_uses_file_name() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("calc.py");
        std::fs::write(&path, "def add(a, b):\n    return a + b\n").expect("write");

        let artifacts = ModelArtifacts::heuristic_only();
        let analyzer = Analyzer::new(&artifacts);
        let assessment = analyze(&analyzer, Input::File(path)).expect("assess");
        assert_eq!(assessment.artifact.name, "calc.py");
        assert_eq!(assessment.metrics.loc, 2);
    }

    #[test]
    fn test_missing_file_is_internal() {
        let artifacts = ModelArtifacts::heuristic_only();
        let analyzer = Analyzer::new(&artifacts);
        let err = analyze(&analyzer, Input::File(PathBuf::from("/nonexistent/x.py"))).unwrap_err();
        assert!(err.downcast_ref::<InputError>().is_none());
    }
}
