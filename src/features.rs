//! Feature reconciliation
//!
//! The live extractor measures four metrics; the classifier was trained on
//! whatever columns the training dataset had. This module bridges the two:
//! every schema name resolves through [`FEATURE_STRATEGIES`] to a direct copy,
//! a derived value, or the training-set mean. Names the table does not know
//! fall back to the mean, so the vector is always complete.

use crate::models::MetricRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Canonical metric fields that can be copied straight into a feature slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricField {
    Loc,
    Sloc,
    CyclomaticComplexity,
    HalsteadVolume,
}

impl MetricField {
    fn read(self, metrics: &MetricRecord) -> f64 {
        match self {
            MetricField::Loc => metrics.loc as f64,
            MetricField::Sloc => metrics.sloc as f64,
            MetricField::CyclomaticComplexity => metrics.cyclomatic_complexity,
            MetricField::HalsteadVolume => metrics.halstead_volume,
        }
    }
}

/// Engineered features computed from several metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedFeature {
    /// complexity / (loc + 1)
    ComplexityPerLoc,
}

impl DerivedFeature {
    fn compute(self, metrics: &MetricRecord) -> f64 {
        match self {
            DerivedFeature::ComplexityPerLoc => {
                metrics.cyclomatic_complexity / (metrics.loc as f64 + 1.0)
            }
        }
    }
}

/// How a schema slot gets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Direct(MetricField),
    Derived(DerivedFeature),
    MeanFallback,
}

/// Name → strategy table. Training-time aliases (`v(g)`, `lOCode`, `n`)
/// map onto the canonical fields.
pub const FEATURE_STRATEGIES: &[(&str, Resolution)] = &[
    ("loc", Resolution::Direct(MetricField::Loc)),
    ("sloc", Resolution::Direct(MetricField::Sloc)),
    ("lOCode", Resolution::Direct(MetricField::Sloc)),
    (
        "cyclomatic_complexity",
        Resolution::Direct(MetricField::CyclomaticComplexity),
    ),
    ("v(g)", Resolution::Direct(MetricField::CyclomaticComplexity)),
    (
        "halstead_volume",
        Resolution::Direct(MetricField::HalsteadVolume),
    ),
    ("n", Resolution::Direct(MetricField::HalsteadVolume)),
    (
        "complexity_per_loc",
        Resolution::Derived(DerivedFeature::ComplexityPerLoc),
    ),
    // The extractor does not count operators
    ("operators_per_loc", Resolution::MeanFallback),
];

/// Strategy for a feature name; unknown names use the mean.
pub fn resolution_for(name: &str) -> Resolution {
    FEATURE_STRATEGIES
        .iter()
        .find(|(feature, _)| *feature == name)
        .map(|(_, resolution)| *resolution)
        .unwrap_or(Resolution::MeanFallback)
}

/// Ordered feature names the classifier was trained on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSchema(Vec<String>);

impl FeatureSchema {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Training-set mean per feature name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureMeans(BTreeMap<String, f64>);

impl FeatureMeans {
    pub fn new(means: BTreeMap<String, f64>) -> Self {
        Self(means)
    }

    /// Mean for a feature, 0.0 when unknown.
    pub fn get(&self, name: &str) -> f64 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, f64>> for FeatureMeans {
    fn from(map: HashMap<String, f64>) -> Self {
        Self(map.into_iter().collect())
    }
}

/// Complete, schema-ordered feature values.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// Build the feature vector for a schema.
///
/// `metrics` may be `None` when nothing could be extracted; every slot then
/// takes its training-set mean.
pub fn reconcile(
    metrics: Option<&MetricRecord>,
    schema: &FeatureSchema,
    means: &FeatureMeans,
) -> FeatureVector {
    let values = schema
        .names()
        .iter()
        .map(|name| {
            let resolved = match (resolution_for(name), metrics) {
                (Resolution::Direct(field), Some(m)) => Some(field.read(m)),
                (Resolution::Derived(feature), Some(m)) => Some(feature.compute(m)),
                _ => None,
            };
            match resolved {
                Some(value) if value.is_finite() => value,
                _ => means.get(name),
            }
        })
        .collect();

    FeatureVector {
        names: schema.names().to_vec(),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_schema() -> FeatureSchema {
        FeatureSchema::new(
            [
                "loc",
                "v(g)",
                "n",
                "lOCode",
                "branchCount",
                "uniq_Op",
                "uniq_Opnd",
                "complexity_per_loc",
                "operators_per_loc",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }

    fn training_means() -> FeatureMeans {
        let mut map = BTreeMap::new();
        map.insert("branchCount".to_string(), 4.5);
        map.insert("uniq_Op".to_string(), 11.0);
        map.insert("operators_per_loc".to_string(), 0.3);
        map.insert("loc".to_string(), 42.0);
        FeatureMeans::new(map)
    }

    #[test]
    fn test_direct_aliases_and_derived() {
        let metrics = MetricRecord {
            loc: 49,
            sloc: 40,
            cyclomatic_complexity: 5.0,
            halstead_volume: 320.0,
        };
        let vector = reconcile(Some(&metrics), &training_schema(), &training_means());

        assert_eq!(vector.get("loc"), Some(49.0));
        assert_eq!(vector.get("v(g)"), Some(5.0));
        assert_eq!(vector.get("n"), Some(320.0));
        assert_eq!(vector.get("lOCode"), Some(40.0));
        assert_eq!(vector.get("complexity_per_loc"), Some(0.1));
    }

    #[test]
    fn test_unknown_and_unextractable_use_means() {
        let metrics = MetricRecord::default();
        let vector = reconcile(Some(&metrics), &training_schema(), &training_means());

        assert_eq!(vector.get("branchCount"), Some(4.5));
        assert_eq!(vector.get("uniq_Op"), Some(11.0));
        assert_eq!(vector.get("operators_per_loc"), Some(0.3));
        // No mean recorded
        assert_eq!(vector.get("uniq_Opnd"), Some(0.0));
    }

    #[test]
    fn test_order_and_length_follow_schema() {
        let schema = training_schema();
        let vector = reconcile(Some(&MetricRecord::default()), &schema, &FeatureMeans::default());
        assert_eq!(vector.len(), schema.len());
        assert_eq!(vector.names(), schema.names());
    }

    #[test]
    fn test_missing_metrics_fill_every_slot_with_means() {
        let schema = training_schema();
        let means = training_means();
        let vector = reconcile(None, &schema, &means);

        assert_eq!(vector.len(), schema.len());
        assert_eq!(vector.get("loc"), Some(42.0));
        assert_eq!(vector.get("v(g)"), Some(0.0));
        assert!(vector.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_non_finite_values_replaced_by_mean() {
        let metrics = MetricRecord {
            loc: 10,
            sloc: 10,
            cyclomatic_complexity: f64::NAN,
            halstead_volume: 0.0,
        };
        let schema = FeatureSchema::new(vec!["v(g)".to_string()]);
        let mut map = BTreeMap::new();
        map.insert("v(g)".to_string(), 2.5);
        let vector = reconcile(Some(&metrics), &schema, &FeatureMeans::new(map));
        assert_eq!(vector.values(), &[2.5]);
    }

    #[test]
    fn test_empty_schema_gives_empty_vector() {
        let vector = reconcile(None, &FeatureSchema::default(), &FeatureMeans::default());
        assert!(vector.is_empty());
    }

    #[test]
    fn test_resolution_table() {
        assert_eq!(
            resolution_for("v(g)"),
            Resolution::Direct(MetricField::CyclomaticComplexity)
        );
        assert_eq!(resolution_for("operators_per_loc"), Resolution::MeanFallback);
        assert_eq!(resolution_for("never_heard_of_it"), Resolution::MeanFallback);
    }

    #[test]
    fn test_schema_and_means_json_shape() {
        let schema: FeatureSchema = serde_json::from_str(r#"["loc","v(g)"]"#).expect("parse");
        assert_eq!(schema.len(), 2);
        let means: FeatureMeans = serde_json::from_str(r#"{"loc": 12.5}"#).expect("parse");
        assert_eq!(means.get("loc"), 12.5);
    }
}
