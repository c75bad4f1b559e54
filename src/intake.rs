//! Request intake: validation and single-artifact analysis
//!
//! Pasted snippets and uploaded files are checked before any metrics run so
//! that garbage input gets a precise, user-facing reason instead of a
//! meaningless score.

use crate::classifier::ModelArtifacts;
use crate::metrics::{extract, is_allowed_extension, looks_like_code, panic_message};
use crate::models::{CodeArtifact, RiskAssessment};
use crate::scoring::assess_extracted;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, error};

/// Trimmed snippets shorter than this are rejected.
pub const MIN_SNIPPET_LEN: usize = 10;

/// Characters that real code nearly always contains.
const STRUCTURE_SYMBOLS: &[char] = &['{', '}', ';', '(', ')', '='];

/// Invalid input, reported to the caller verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Please provide some code to analyze.")]
    EmptySnippet,

    #[error("The provided text is too short to be valid code.")]
    TooShort,

    #[error("No valid code structure detected (missing syntax like {{ }} ; =).")]
    NoCodeStructure,

    /// Extraction found no code lines at all
    #[error("No valid code structure detected. Please check your input.")]
    Unmeasurable,

    #[error("Unsupported file type: .{ext}. Please upload a code file.")]
    UnsupportedType { ext: String },

    #[error("The file is empty. Please upload a file with code.")]
    EmptyFile,

    #[error("No selected file")]
    NoFileName,
}

/// Failure of a single-artifact analysis.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Invalid(#[from] InputError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Check pasted text and wrap it as an artifact.
pub fn validate_snippet(text: &str) -> Result<CodeArtifact, InputError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InputError::EmptySnippet);
    }
    if trimmed.chars().count() < MIN_SNIPPET_LEN {
        return Err(InputError::TooShort);
    }

    let has_symbols = text.contains(STRUCTURE_SYMBOLS);
    if !has_symbols && !looks_like_code(text) {
        return Err(InputError::NoCodeStructure);
    }

    Ok(CodeArtifact::pasted(text))
}

/// Check an uploaded file and wrap it as an artifact.
///
/// Content is decoded as lossy UTF-8.
pub fn validate_upload(filename: &str, bytes: &[u8]) -> Result<CodeArtifact, InputError> {
    if filename.trim().is_empty() {
        return Err(InputError::NoFileName);
    }

    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext {
        Some(ref e) if is_allowed_extension(e) => {}
        Some(e) => return Err(InputError::UnsupportedType { ext: e }),
        None => {
            return Err(InputError::UnsupportedType {
                ext: "no extension".to_string(),
            })
        }
    }

    let content = String::from_utf8_lossy(bytes).into_owned();
    if content.trim().is_empty() {
        return Err(InputError::EmptyFile);
    }

    Ok(CodeArtifact::named(filename, content))
}

/// Validates, measures and scores one artifact at a time.
pub struct Analyzer<'a> {
    artifacts: &'a ModelArtifacts,
}

impl<'a> Analyzer<'a> {
    pub fn new(artifacts: &'a ModelArtifacts) -> Self {
        Self { artifacts }
    }

    pub fn assess_snippet(&self, text: &str) -> Result<RiskAssessment, AnalysisError> {
        let artifact = validate_snippet(text)?;
        self.assess(&artifact)
    }

    pub fn assess_upload(
        &self,
        filename: &str,
        bytes: &[u8],
    ) -> Result<RiskAssessment, AnalysisError> {
        let artifact = validate_upload(filename, bytes)?;
        self.assess(&artifact)
    }

    /// Measure and score an already-validated artifact.
    pub fn assess(&self, artifact: &CodeArtifact) -> Result<RiskAssessment, AnalysisError> {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let extraction = match extract(artifact) {
                Ok(extraction) => extraction,
                Err(e) => {
                    debug!("No metrics for {}: {}", artifact.effective_name(), e);
                    return Err(AnalysisError::Invalid(InputError::Unmeasurable));
                }
            };

            if extraction.record.is_empty() {
                return Err(AnalysisError::Invalid(InputError::Unmeasurable));
            }

            Ok(assess_extracted(artifact, &extraction, self.artifacts))
        }));

        match result {
            Ok(outcome) => outcome,
            Err(panic_info) => {
                let message = panic_message(panic_info.as_ref());
                error!(
                    "Analysis panicked for {}: {}",
                    artifact.effective_name(),
                    message
                );
                Err(AnalysisError::Internal(anyhow::anyhow!(
                    "analysis panicked: {}",
                    message
                )))
            }
        }
    }
}
