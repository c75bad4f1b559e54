//! Model command - report which artifacts are loaded

use super::Context;
use crate::classifier::{ModelArtifacts, MEANS_FILE, MODEL_FILE, SCHEMA_FILE};
use anyhow::Result;
use console::style;

pub(super) fn run(ctx: &Context) -> Result<()> {
    let dir = &ctx.config.model.dir;
    let artifacts = ModelArtifacts::load(dir);

    println!("\n{} {}\n", style("Model directory").bold(), style(dir.display()).cyan());
    for file in [MODEL_FILE, SCHEMA_FILE, MEANS_FILE] {
        let mark = if dir.join(file).is_file() {
            style("✓").green()
        } else {
            style("✗").red()
        };
        println!("  {} {}", mark, file);
    }
    println!();
    print!("{}", describe(&artifacts));
    Ok(())
}

fn describe(artifacts: &ModelArtifacts) -> String {
    let mut out = String::new();
    if artifacts.has_classifier() {
        out.push_str("Classifier: loaded\n");
    } else {
        out.push_str("Classifier: not loaded (heuristic scoring only)\n");
    }
    out.push_str(&format!("Features: {}\n", artifacts.schema().len()));
    if !artifacts.schema().is_empty() {
        out.push_str(&format!("  {}\n", artifacts.schema().names().join(", ")));
    }
    out.push_str(&format!("Feature means: {}\n", artifacts.means().len()));
    if let Some(modified) = artifacts.model_modified() {
        out.push_str(&format!(
            "Model last modified: {}\n",
            modified.format("%Y-%m-%d %H:%M:%S")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FeatureMeans, FeatureSchema};
    use std::collections::BTreeMap;

    #[test]
    fn test_describe_heuristic_only() {
        let out = describe(&ModelArtifacts::heuristic_only());
        assert!(out.contains("not loaded"));
        assert!(out.contains("Features: 0"));
        assert!(!out.contains("last modified"));
    }

    #[test]
    fn test_describe_lists_schema() {
        let schema = FeatureSchema::new(vec!["loc".to_string(), "v(g)".to_string()]);
        let means = FeatureMeans::new(BTreeMap::from([("loc".to_string(), 42.0)]));
        let out = describe(&ModelArtifacts::new(None, schema, means));
        assert!(out.contains("Features: 2"));
        assert!(out.contains("loc, v(g)"));
        assert!(out.contains("Feature means: 1"));
    }
}
