//! Metric extraction
//!
//! Turns raw source text into a canonical [`MetricRecord`]. Two strategies
//! are tried in order:
//!
//! 1. **Syntax-aware** (Python only): full tree-sitter parse; computes raw and
//!    source line counts, per-function cyclomatic complexity and Halstead
//!    volume. Rejects trees containing syntax errors.
//! 2. **Generic walker**: error-tolerant tree-sitter walk for languages with a
//!    bundled grammar, lexical keyword counting for the rest. Computes a
//!    normalized line count and per-function complexity; volume is always 0.
//!
//! Which strategy produced a record is reported as an [`ExtractionPath`], so
//! callers and tests can tell a clean parse from a fallback.

mod language;
mod lexical;
mod python;
mod walker;

pub use language::{is_allowed_extension, Language, ALLOWED_EXTENSIONS};
pub use python::looks_like_code;

use crate::models::{CodeArtifact, MetricRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};
use tree_sitter::Node;

/// Errors raised by a single extraction strategy.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("syntax error near line {line}")]
    Syntax { line: usize },

    #[error("parser failure: {0}")]
    Parser(String),

    #[error("analyzer panicked: {0}")]
    Panicked(String),

    /// Every strategy failed; the input cannot be measured.
    #[error("unusable input: {0}")]
    Unusable(String),
}

/// Which strategy produced a metric record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractionPath {
    /// Full syntax-aware analysis
    SyntaxAware,
    /// Generic walker chosen up front (non-primary language)
    Generic,
    /// Generic walker used after the syntax-aware path failed
    GenericFallback { reason: String },
}

/// A metric record plus the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub record: MetricRecord,
    pub path: ExtractionPath,
}

/// Measure an artifact.
///
/// Returns `Err(ExtractError::Unusable)` only when every strategy failed.
pub fn extract(artifact: &CodeArtifact) -> Result<Extraction, ExtractError> {
    let ext = artifact.extension();
    let language = ext.as_deref().and_then(Language::from_extension);

    if uses_syntax_aware_path(artifact, language) {
        match guarded(|| python::analyze(&artifact.content)) {
            Ok(record) => {
                return Ok(Extraction {
                    record,
                    path: ExtractionPath::SyntaxAware,
                })
            }
            Err(primary) => {
                debug!(
                    "Syntax-aware extraction failed for {}: {}; falling back to generic walker",
                    artifact.effective_name(),
                    primary
                );
                return guarded(|| analyze_generic(&artifact.content, language))
                    .map(|record| Extraction {
                        record,
                        path: ExtractionPath::GenericFallback {
                            reason: primary.to_string(),
                        },
                    })
                    .map_err(|generic| {
                        warn!(
                            "All extraction strategies failed for {}: {}",
                            artifact.effective_name(),
                            generic
                        );
                        ExtractError::Unusable(format!("{primary}; {generic}"))
                    });
            }
        }
    }

    guarded(|| analyze_generic(&artifact.content, language))
        .map(|record| Extraction {
            record,
            path: ExtractionPath::Generic,
        })
        .map_err(|e| {
            warn!("Extraction failed for {}: {}", artifact.effective_name(), e);
            ExtractError::Unusable(e.to_string())
        })
}

/// Python files and unnamed pasted text go through the syntax-aware path.
fn uses_syntax_aware_path(artifact: &CodeArtifact, language: Option<Language>) -> bool {
    artifact.is_pasted() || language == Some(Language::Python)
}

/// Generic walker: tree-sitter where a grammar exists, lexical otherwise.
fn analyze_generic(
    source: &str,
    language: Option<Language>,
) -> Result<MetricRecord, ExtractError> {
    match language {
        Some(lang) if lang.grammar().is_some() => walker::analyze(source, lang),
        other => Ok(lexical::analyze(source, other)),
    }
}

/// Run one strategy, turning a panic inside the analyzer into an error.
fn guarded<F>(f: F) -> Result<MetricRecord, ExtractError>
where
    F: FnOnce() -> Result<MetricRecord, ExtractError>,
{
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic_info) => Err(ExtractError::Panicked(panic_message(panic_info.as_ref()))),
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic_info: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Mean of per-function complexities.
///
/// With no functions, a non-empty artifact counts as one straight-line path
/// (complexity 1) and an empty one as 0.
pub(crate) fn mean_complexity(complexities: &[u32], size: usize) -> f64 {
    if complexities.is_empty() {
        return if size > 0 { 1.0 } else { 0.0 };
    }
    let total: u64 = complexities.iter().map(|&c| c as u64).sum();
    total as f64 / complexities.len() as f64
}

/// Pre-order walk over `root` and its descendants using a tree cursor.
///
/// `visit` returns false to skip a node's children. Iterative, so nesting
/// depth is bounded by the heap and not the thread stack.
pub(crate) fn walk_tree<'t, F>(root: Node<'t>, mut visit: F)
where
    F: FnMut(&Node<'t>) -> bool,
{
    let mut cursor = root.walk();
    loop {
        let node = cursor.node();
        if visit(&node) && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Count the rows that carry at least one non-comment token.
pub(crate) fn code_lines(root: &Node) -> usize {
    let mut rows = BTreeSet::new();
    walk_tree(*root, |node| {
        if node.kind().contains("comment") {
            return false;
        }
        if node.child_count() == 0 && node.start_byte() < node.end_byte() {
            rows.extend(node.start_position().row..=node.end_position().row);
        }
        true
    });
    rows.len()
}
