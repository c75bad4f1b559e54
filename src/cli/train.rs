//! Train command - fit a classifier from labelled CSV datasets

use super::Context;
use crate::train::{self, TrainReport};
use anyhow::{Context as _, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

pub(super) fn run(ctx: &Context, data_dir: &Path, output: Option<&Path>) -> Result<()> {
    let output = output.unwrap_or(ctx.config.model.dir.as_path());
    let config = ctx.config.train_config();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(create_spinner_style());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(format!("Training on {}", data_dir.display()));

    let outcome = train::train_from_dir(data_dir, &config);
    spinner.finish_and_clear();
    let outcome = outcome.with_context(|| format!("Training from {} failed", data_dir.display()))?;

    outcome
        .save(output)
        .with_context(|| format!("Failed to save model to {}", output.display()))?;

    print!("{}", format_report(&outcome.report));
    println!(
        "{} Model artifacts written to {}",
        style("✓").green(),
        style(output.display()).cyan()
    );
    Ok(())
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.3}", v))
}

fn format_report(report: &TrainReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n{}\n", style("Training summary").bold()));
    out.push_str(&format!(
        "  Samples: {} ({} clean, {} defective)\n",
        report.samples, report.clean, report.defective
    ));
    out.push_str(&format!("  Features: {}\n", report.features.join(", ")));
    out.push_str(&format!(
        "  Split: {} train / {} validation / {} test ({} after SMOTE)\n",
        report.train_size, report.validation_size, report.test_size, report.resampled_size
    ));
    out.push_str(&format!(
        "  Accuracy: train {}  validation {}  test {}\n",
        ratio(report.train_accuracy),
        ratio(report.validation_accuracy),
        ratio(report.test_accuracy)
    ));
    out.push_str(&format!(
        "  ROC AUC: validation {}  test {}\n",
        ratio(report.validation_auc),
        ratio(report.test_auc)
    ));

    let c = &report.confusion;
    out.push_str(&format!(
        "  Test confusion: TN {}  FP {}  FN {}  TP {}  (precision {}, recall {})\n",
        c.true_negatives,
        c.false_positives,
        c.false_negatives,
        c.true_positives,
        ratio(c.precision()),
        ratio(c.recall())
    ));
    if report.overfitting {
        out.push_str(&format!(
            "  {} train accuracy is well above validation accuracy; the model may be overfitting\n",
            style("!").yellow()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::train::ConfusionMatrix;

    #[test]
    fn test_format_report() {
        let report = TrainReport {
            samples: 40,
            features: vec!["loc".to_string(), "v(g)".to_string()],
            clean: 30,
            defective: 10,
            train_size: 28,
            validation_size: 6,
            test_size: 6,
            resampled_size: 42,
            train_accuracy: Some(1.0),
            validation_accuracy: Some(0.5),
            validation_auc: None,
            test_accuracy: Some(0.8333),
            test_auc: Some(0.75),
            confusion: ConfusionMatrix {
                true_negatives: 4,
                false_positives: 0,
                false_negatives: 1,
                true_positives: 1,
            },
            overfitting: true,
        };
        let out = format_report(&report);
        assert!(out.contains("Samples: 40 (30 clean, 10 defective)"));
        assert!(out.contains("loc, v(g)"));
        assert!(out.contains("validation n/a"));
        assert!(out.contains("test 0.833"));
        assert!(out.contains("overfitting"));
    }
}
