//! Scan command - rank all files of a repository

use super::Context;
use crate::classifier::ModelArtifacts;
use crate::reporters::{self, BatchView, OutputFormat};
use crate::scan::{GitFetcher, ScanSource, Scanner};
use anyhow::Result;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

fn create_bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░  ")
}

pub(super) fn run(ctx: &Context, source: &str, top: Option<usize>, format: &str) -> Result<()> {
    let format: OutputFormat = format.parse()?;
    let source = ScanSource::parse(source);
    let artifacts = ModelArtifacts::load(&ctx.config.model.dir);

    // Progress goes to stderr and only for interactive text output
    let show_progress = format == OutputFormat::Text && console::Term::stderr().is_term();

    if show_progress {
        let verb = match source {
            ScanSource::Remote(_) => "Cloning and scanning",
            ScanSource::Local(_) => "Scanning",
        };
        eprintln!("{} {}", style(verb).bold(), style(&source).cyan());
        if !artifacts.has_classifier() {
            eprintln!(
                "{} no model loaded from {}; using heuristic scores only",
                style("!").yellow(),
                ctx.config.model.dir.display()
            );
        }
    }

    let bar = ProgressBar::new(0);
    if show_progress {
        bar.set_style(create_bar_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("files");
    } else {
        bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let mut scanner = Scanner::new(&artifacts, ctx.config.scan_options());
    {
        let bar = bar.clone();
        scanner = scanner.with_progress(move |done, total| {
            bar.set_length(total as u64);
            bar.set_position(done as u64);
        });
    }

    let fetcher = GitFetcher {
        depth: ctx.config.scan.clone_depth,
    };
    let result = scanner.scan(&source, &fetcher);
    bar.finish_and_clear();
    let result = result?;

    let label = source.to_string();
    let view = BatchView {
        source: &label,
        result: &result,
        top,
    };
    println!("{}", reporters::render_batch(&view, format)?);
    Ok(())
}
