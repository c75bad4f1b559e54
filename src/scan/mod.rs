//! Batch repository scanner
//!
//! Runs extraction, reconciliation and scoring over every eligible file of a
//! repository and ranks the results.
//!
//! - Remote sources are cloned into a [`WorkingCopy`] that is always removed.
//! - Local directories are scanned in place and never modified.
//! - Per-file errors and panics are logged and counted, never propagated.
//! - `max_files` and `max_duration` bound the work; hitting either sets
//!   [`BatchResult::truncated`].

mod fetch;
mod workdir;

pub use fetch::{GitFetcher, RepositoryFetcher};
pub use workdir::WorkingCopy;

use crate::classifier::ModelArtifacts;
use crate::metrics::{self, is_allowed_extension, panic_message, ExtractError, Extraction};
use crate::models::{CodeArtifact, RiskAssessment, RiskLevel};
use crate::scoring::assess_extracted;
use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Version-control metadata directories never descended into.
const VCS_DIRS: &[&str] = &[".git", ".hg", ".svn"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("failed to acquire repository {source_url}: {message}")]
    Acquisition { source_url: String, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Where the repository comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanSource {
    /// Clone URL
    Remote(String),
    /// Existing directory, scanned in place
    Local(PathBuf),
}

impl ScanSource {
    /// URLs (`scheme://`, `git@host:`) are remote, everything else a path.
    pub fn parse(input: &str) -> Self {
        if input.contains("://") || input.starts_with("git@") {
            ScanSource::Remote(input.to_string())
        } else {
            ScanSource::Local(PathBuf::from(input))
        }
    }
}

impl std::fmt::Display for ScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanSource::Remote(url) => write!(f, "{}", url),
            ScanSource::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Scan ceilings and skip rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanOptions {
    pub max_files: usize,
    pub max_duration: Duration,
    /// Trimmed content shorter than this is skipped
    pub min_content_len: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            max_files: 2000,
            max_duration: Duration::from_secs(300),
            min_content_len: 10,
        }
    }
}

/// One ranked file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRisk {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    pub level: RiskLevel,
    pub assessment: RiskAssessment,
}

/// Ranked scan output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Sorted by risk descending; ties keep traversal order
    pub entries: Vec<FileRisk>,
    pub scored: usize,
    pub skipped: usize,
    pub failed: usize,
    /// A ceiling stopped the scan early
    pub truncated: bool,
}

impl BatchResult {
    pub fn high_risk_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.level == RiskLevel::High)
            .count()
    }

    /// Highest-risk entries, at most `n`.
    pub fn top(&self, n: usize) -> &[FileRisk] {
        &self.entries[..n.min(self.entries.len())]
    }
}

/// Outcome of processing one file.
enum FileOutcome {
    Scored(Box<FileRisk>),
    Skipped,
    Failed,
    NotReached,
}

/// Extraction entry point used per file.
pub type Extractor = fn(&CodeArtifact) -> Result<Extraction, ExtractError>;

type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// Drives the per-file pipeline over a directory tree.
pub struct Scanner<'a> {
    artifacts: &'a ModelArtifacts,
    options: ScanOptions,
    extractor: Extractor,
    progress: Option<Box<ProgressFn>>,
}

impl<'a> Scanner<'a> {
    pub fn new(artifacts: &'a ModelArtifacts, options: ScanOptions) -> Self {
        Self {
            artifacts,
            options,
            extractor: metrics::extract,
            progress: None,
        }
    }

    /// Replace the metric extractor.
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Called with (files processed, files total) as the scan advances.
    pub fn with_progress<F>(mut self, progress: F) -> Self
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Scan a remote or local source.
    pub fn scan(
        &self,
        source: &ScanSource,
        fetcher: &dyn RepositoryFetcher,
    ) -> Result<BatchResult, ScanError> {
        match source {
            ScanSource::Local(path) => self.scan_dir(path),
            ScanSource::Remote(url) => {
                let working_copy = WorkingCopy::create().map_err(|source| ScanError::Io {
                    path: std::env::temp_dir(),
                    source,
                })?;

                fetcher
                    .fetch(url, working_copy.path())
                    .map_err(|e| ScanError::Acquisition {
                        source_url: url.clone(),
                        message: format!("{:#}", e),
                    })?;

                self.scan_dir(working_copy.path())
            }
        }
    }

    /// Scan a directory in place.
    pub fn scan_dir(&self, root: &Path) -> Result<BatchResult, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let started = Instant::now();
        let (files, walk_truncated) = self.collect_files(root, started);
        info!("Scanning {} files under {}", files.len(), root.display());

        let truncated = AtomicBool::new(walk_truncated);
        let done = AtomicUsize::new(0);
        let total = files.len();

        let outcomes: Vec<FileOutcome> = files
            .par_iter()
            .map(|path| {
                if started.elapsed() > self.options.max_duration {
                    truncated.store(true, Ordering::Relaxed);
                    return FileOutcome::NotReached;
                }

                let outcome = self.process_guarded(root, path);

                let count = done.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(cb) = &self.progress {
                    cb(count, total);
                }
                outcome
            })
            .collect();

        let mut result = BatchResult {
            truncated: truncated.load(Ordering::Relaxed),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                FileOutcome::Scored(entry) => {
                    result.scored += 1;
                    result.entries.push(*entry);
                }
                FileOutcome::Skipped => result.skipped += 1,
                FileOutcome::Failed => result.failed += 1,
                FileOutcome::NotReached => {}
            }
        }

        // Stable: equal scores keep traversal order
        result.entries.sort_by(|a, b| {
            b.assessment
                .risk_score
                .total_cmp(&a.assessment.risk_score)
        });

        info!(
            "Scan finished in {:.1}s: {} scored, {} skipped, {} failed{}",
            started.elapsed().as_secs_f64(),
            result.scored,
            result.skipped,
            result.failed,
            if result.truncated { " (truncated)" } else { "" }
        );

        Ok(result)
    }

    /// Eligible files in name order, capped by the ceilings.
    fn collect_files(&self, root: &Path, started: Instant) -> (Vec<PathBuf>, bool) {
        let mut builder = WalkBuilder::new(root);
        builder
            .standard_filters(false)
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map(|name| !VCS_DIRS.contains(&name))
                    .unwrap_or(true)
            })
            .sort_by_file_name(|a, b| a.cmp(b));

        let mut files = Vec::new();
        for entry in builder.build() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let allowed = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| is_allowed_extension(&ext.to_ascii_lowercase()));
            if !allowed {
                continue;
            }

            if files.len() >= self.options.max_files {
                debug!("File ceiling of {} reached", self.options.max_files);
                return (files, true);
            }
            if started.elapsed() > self.options.max_duration {
                debug!("Time ceiling reached during traversal");
                return (files, true);
            }
            files.push(path.to_path_buf());
        }

        (files, false)
    }

    fn process_guarded(&self, root: &Path, path: &Path) -> FileOutcome {
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.process_file(root, path)
        }));

        match result {
            Ok(outcome) => outcome,
            Err(panic_info) => {
                error!(
                    "Processing panicked on {}: {}",
                    path.display(),
                    panic_message(panic_info.as_ref())
                );
                FileOutcome::Failed
            }
        }
    }

    fn process_file(&self, root: &Path, path: &Path) -> FileOutcome {
        let relative = relative_path(root, path);

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to read {}: {}", relative, e);
                return FileOutcome::Failed;
            }
        };
        let content = String::from_utf8_lossy(&bytes).into_owned();

        if content.trim().chars().count() < self.options.min_content_len.max(1) {
            debug!("Skipping {}: too little content", relative);
            return FileOutcome::Skipped;
        }

        let artifact = CodeArtifact::named(relative.clone(), content);
        let extraction = match (self.extractor)(&artifact) {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Extraction failed for {}: {}", relative, e);
                return FileOutcome::Failed;
            }
        };

        if extraction.record.loc == 0 {
            debug!("Skipping {}: no code lines", relative);
            return FileOutcome::Skipped;
        }

        let assessment = assess_extracted(&artifact, &extraction, self.artifacts);
        FileOutcome::Scored(Box::new(FileRisk {
            path: relative,
            level: assessment.level(),
            assessment,
        }))
    }
}

/// `/`-separated path relative to the scan root.
fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
