//! CLI command definitions and handlers

mod init;
mod model;
mod predict;
mod scan;
mod train;

use crate::config::DefectConfig;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse and validate `--top` (at least 1)
fn parse_top(s: &str) -> Result<usize, String> {
    let n: usize = s
        .parse()
        .map_err(|_| format!("'{}' is not a valid number", s))?;
    if n == 0 {
        Err("top must be at least 1".to_string())
    } else {
        Ok(n)
    }
}

/// defectrisk - hybrid defect-risk scoring for source code
#[derive(Parser, Debug)]
#[command(name = "defectrisk")]
#[command(
    version,
    about = "Estimate defect risk for source files and repositories from static metrics, a trained classifier and heuristics",
    after_help = "\
Examples:
  defectrisk predict --file src/app.py           Score one file
  defectrisk predict --text 'def f(x): return x'  Score a snippet
  defectrisk scan https://github.com/o/r.git     Rank every file in a repository
  defectrisk scan . --top 20 --format json       Top 20 files of a local checkout
  defectrisk train data/ --output models/        Train a model from CSV datasets"
)]
pub struct Cli {
    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    pub log_level: String,

    /// Config file (default: ./defectrisk.toml, then ~/.config/defectrisk/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding model.json, feature_names.json and feature_means.json
    #[arg(long, global = true, env = "DEFECTRISK_MODEL_DIR")]
    pub model_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Score a single snippet or file
    #[command(after_help = "\
Examples:
  defectrisk predict --file src/app.py
  defectrisk predict --text 'int main() { return 0; }'
  cat handler.go | defectrisk predict --stdin
  defectrisk predict --file lib.rs --format json")]
    Predict {
        /// Code to score, passed inline
        #[arg(long, conflicts_with_all = ["stdin", "file"], required_unless_present_any = ["stdin", "file"])]
        text: Option<String>,

        /// Read the snippet from standard input
        #[arg(long, conflicts_with = "file")]
        stdin: bool,

        /// Score a file (its extension must be a supported language)
        #[arg(long, short = 'f')]
        file: Option<PathBuf>,

        /// Output format: text, json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Rank every source file of a repository by defect risk
    #[command(after_help = "\
Examples:
  defectrisk scan https://github.com/owner/repo.git
  defectrisk scan git@github.com:owner/repo.git --top 10
  defectrisk scan ./checkout --format json > report.json")]
    Scan {
        /// Clone URL or local directory
        source: String,

        /// Show only the N riskiest files
        #[arg(long, value_parser = parse_top)]
        top: Option<usize>,

        /// Output format: text, json
        #[arg(long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Train a classifier from a directory of labelled CSV files
    #[command(after_help = "\
Each CSV needs a header row; the last column is the defect label
(true/false, yes/no or 0/1). Known metric columns are used as features.

Examples:
  defectrisk train datasets/
  defectrisk train datasets/ --output /opt/defectrisk/models")]
    Train {
        /// Directory containing *.csv datasets
        data_dir: PathBuf,

        /// Where to write the model artifacts (default: the model directory)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show which model artifacts are loaded
    Model,

    /// Write an example defectrisk.toml to the current directory
    Init,
}

/// Resolved settings shared by all commands
pub(crate) struct Context {
    pub config: DefectConfig,
}

impl Context {
    fn resolve(cli: &Cli) -> Self {
        let mut config = DefectConfig::load(cli.config.as_deref());
        if let Some(dir) = &cli.model_dir {
            config.model.dir = dir.clone();
        }
        Self { config }
    }
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context::resolve(&cli);

    match cli.command {
        Commands::Predict {
            text,
            stdin,
            file,
            format,
        } => {
            let input = match (text, file) {
                (Some(text), _) => predict::Input::Text(text),
                (None, Some(path)) => predict::Input::File(path),
                (None, None) if stdin => predict::Input::Stdin,
                (None, None) => anyhow::bail!("one of --text, --stdin or --file is required"),
            };
            predict::run(&ctx, input, &format)
        }

        Commands::Scan {
            source,
            top,
            format,
        } => scan::run(&ctx, &source, top, &format),

        Commands::Train { data_dir, output } => train::run(&ctx, &data_dir, output.as_deref()),

        Commands::Model => model::run(&ctx),

        Commands::Init => init::run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top() {
        assert_eq!(parse_top("5"), Ok(5));
        assert!(parse_top("0").is_err());
        assert!(parse_top("abc").is_err());
    }

    #[test]
    fn test_cli_parses_predict() {
        let cli = Cli::try_parse_from(["defectrisk", "predict", "--text", "x = 1 + 2"])
            .expect("parse");
        match cli.command {
            Commands::Predict { text, stdin, .. } => {
                assert_eq!(text.as_deref(), Some("x = 1 + 2"));
                assert!(!stdin);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_predict_inputs_conflict() {
        assert!(Cli::try_parse_from([
            "defectrisk",
            "predict",
            "--text",
            "x = 1",
            "--file",
            "a.py"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["defectrisk", "predict"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "defectrisk",
            "scan",
            ".",
            "--top",
            "3",
            "--model-dir",
            "/tmp/models",
            "--log-level",
            "debug",
        ])
        .expect("parse");
        assert_eq!(cli.model_dir, Some(PathBuf::from("/tmp/models")));
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Scan { top: Some(3), .. }));
    }

    #[test]
    fn test_model_dir_flag_overrides_config() {
        let cli = Cli::try_parse_from(["defectrisk", "--model-dir", "/srv/m", "model"])
            .expect("parse");
        let ctx = Context::resolve(&cli);
        assert_eq!(ctx.config.model.dir, PathBuf::from("/srv/m"));
    }

    #[test]
    fn test_verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
