//! defectrisk - hybrid defect-risk scoring for source code
//!
//! Static metrics (LOC, SLOC, cyclomatic complexity, Halstead volume) feed
//! both a trained gradient-boosted classifier and a banded heuristic; the two
//! are blended into a single risk score per file. Works on pasted snippets,
//! single files and whole repositories.

pub mod classifier;
pub mod cli;
pub mod config;
pub mod features;
pub mod intake;
pub mod metrics;
pub mod models;
pub mod reporters;
pub mod scan;
pub mod scoring;
pub mod train;
