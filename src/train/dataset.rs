//! Training data ingestion
//!
//! Reads every `*.csv` in a directory (PROMISE-style defect datasets),
//! aligns them on the union of their feature headers, drops duplicate rows
//! and fills missing cells with 0. The last column of each file is that
//! file's defect label, whatever it is named.

use super::TrainError;
use crate::features::FeatureMeans;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Columns the trainer looks for, in schema order.
pub const FEATURE_CANDIDATES: &[&str] = &[
    "loc",
    "v(g)",
    "n",
    "lOCode",
    "branchCount",
    "uniq_Op",
    "uniq_Opnd",
];

/// Raw tabular data, header-aligned. Missing cells are empty strings.
///
/// Labels are held apart from the feature columns so that files with
/// different headers keep their own label when stacked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    labels: Vec<String>,
}

/// Numeric training matrix with engineered features and binary labels.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    /// Per-feature mean over every row.
    pub fn column_means(&self) -> FeatureMeans {
        let n = self.rows.len().max(1) as f64;
        let map: BTreeMap<String, f64> = self
            .names
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let sum: f64 = self.rows.iter().map(|r| r[j]).sum();
                (name.clone(), sum / n)
            })
            .collect();
        FeatureMeans::new(map)
    }
}

impl Dataset {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>, labels: Vec<String>) -> Self {
        Self {
            columns,
            rows,
            labels,
        }
    }

    /// Feature columns (the label column excluded).
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Parse CSV text with a header row; the last column is the label.
    ///
    /// Quoted fields may contain commas, doubled quotes and line breaks.
    pub fn from_csv_str(text: &str) -> Result<Self, TrainError> {
        let mut records = parse_records(text).into_iter();
        let mut columns: Vec<String> = records
            .next()
            .ok_or_else(|| TrainError::Parse("missing header row".to_string()))?
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();
        let width = columns.len();
        columns.pop();

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (i, mut fields) in records.enumerate() {
            if fields.len() > width {
                return Err(TrainError::Parse(format!(
                    "record {} has {} fields, header has {}",
                    i + 2,
                    fields.len(),
                    width
                )));
            }
            fields.resize(width, String::new());
            labels.push(fields.pop().unwrap_or_default());
            rows.push(fields);
        }

        Ok(Self {
            columns,
            rows,
            labels,
        })
    }

    /// Load and concatenate every `*.csv` file in `dir`, in name order.
    pub fn load_dir(dir: &Path) -> Result<Self, TrainError> {
        let entries = fs::read_dir(dir).map_err(|source| TrainError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(TrainError::NoData(format!(
                "no CSV files found in {}",
                dir.display()
            )));
        }

        let mut parts = Vec::new();
        for path in &paths {
            let loaded = fs::read_to_string(path)
                .map_err(|source| TrainError::Io {
                    path: path.clone(),
                    source,
                })
                .and_then(|text| Self::from_csv_str(&text));
            match loaded {
                Ok(part) => {
                    debug!("Loaded {} rows from {}", part.len(), path.display());
                    parts.push(part);
                }
                Err(e) => warn!("Error loading {}: {}", path.display(), e),
            }
        }

        let dataset = Self::concat(parts);
        info!(
            "Loaded {} rows from {} CSV files",
            dataset.len(),
            paths.len()
        );
        Ok(dataset)
    }

    /// Stack datasets on the union of their feature columns (first-seen
    /// order). Each row keeps the label it was read with.
    pub fn concat(parts: Vec<Dataset>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        for part in &parts {
            for col in &part.columns {
                if !index.contains_key(col) {
                    index.insert(col.clone(), columns.len());
                    columns.push(col.clone());
                }
            }
        }

        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for part in parts {
            let positions: Vec<usize> = part.columns.iter().map(|c| index[c]).collect();
            for row in part.rows {
                let mut aligned = vec![String::new(); columns.len()];
                for (value, &pos) in row.into_iter().zip(positions.iter()) {
                    aligned[pos] = value;
                }
                rows.push(aligned);
            }
            labels.extend(part.labels);
        }

        Self {
            columns,
            rows,
            labels,
        }
    }

    /// Drop exact duplicate records (keeping the first) and fill blanks with 0.
    pub fn clean(self) -> Self {
        let before = self.rows.len();
        let fill = |v: String| {
            if v.trim().is_empty() {
                "0".to_string()
            } else {
                v
            }
        };

        let mut seen = HashSet::new();
        let (rows, labels): (Vec<Vec<String>>, Vec<String>) = self
            .rows
            .into_iter()
            .zip(self.labels)
            .filter(|record| seen.insert(record.clone()))
            .map(|(row, label)| (row.into_iter().map(fill).collect(), fill(label)))
            .unzip();

        if rows.len() < before {
            debug!("Dropped {} duplicate rows", before - rows.len());
        }

        Self {
            columns: self.columns,
            rows,
            labels,
        }
    }

    /// Select candidate features, coerce them to numbers, engineer ratios
    /// and parse the per-row labels.
    pub fn feature_matrix(&self) -> Result<FeatureMatrix, TrainError> {
        if self.rows.is_empty() {
            return Err(TrainError::NoData("dataset has no rows".to_string()));
        }

        let selected: Vec<(String, usize)> = FEATURE_CANDIDATES
            .iter()
            .filter_map(|name| {
                self.columns
                    .iter()
                    .position(|c| c == name)
                    .map(|i| (name.to_string(), i))
            })
            .collect();
        if selected.is_empty() {
            return Err(TrainError::NoFeatures(format!(
                "none of {:?} present in columns {:?}",
                FEATURE_CANDIDATES, self.columns
            )));
        }

        let columns: Vec<Vec<f64>> = selected
            .iter()
            .map(|(_, i)| coerce_column(self.rows.iter().map(|r| r[*i].as_str())))
            .collect();

        let mut names: Vec<String> = selected.iter().map(|(n, _)| n.clone()).collect();
        let mut rows: Vec<Vec<f64>> = (0..self.rows.len())
            .map(|r| columns.iter().map(|c| c[r]).collect())
            .collect();

        let find = |name: &str| names.iter().position(|n| n == name);
        let loc = find("loc");
        let vg = find("v(g)");
        let uniq_op = find("uniq_Op");

        if let (Some(loc), Some(vg)) = (loc, vg) {
            for row in &mut rows {
                row.push(row[vg] / (row[loc] + 1.0));
            }
            names.push("complexity_per_loc".to_string());
        }
        if let (Some(loc), Some(op)) = (loc, uniq_op) {
            for row in &mut rows {
                row.push(row[op] / (row[loc] + 1.0));
            }
            names.push("operators_per_loc".to_string());
        }

        let labels = self.labels.iter().map(|l| parse_label(l)).collect();

        Ok(FeatureMatrix {
            names,
            rows,
            labels,
        })
    }
}

/// Numeric column; unparseable cells take the mean of the parseable ones.
fn coerce_column<'a>(cells: impl Iterator<Item = &'a str>) -> Vec<f64> {
    let parsed: Vec<Option<f64>> = cells
        .map(|c| c.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();
    let valid: Vec<f64> = parsed.iter().flatten().copied().collect();
    let mean = if valid.is_empty() {
        0.0
    } else {
        valid.iter().sum::<f64>() / valid.len() as f64
    };
    parsed.into_iter().map(|v| v.unwrap_or(mean)).collect()
}

/// Defect label: boolean words or any positive number.
pub fn parse_label(raw: &str) -> bool {
    let value = raw.trim().trim_matches('\'').trim_matches('"');
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "t" => true,
        "false" | "no" | "n" | "f" => false,
        other => other.parse::<f64>().map(|v| v > 0.0).unwrap_or(false),
    }
}

/// Split CSV text into records of fields.
///
/// Double-quoted fields may hold commas, `""` escapes and line breaks.
/// Blank lines are skipped.
fn parse_records(text: &str) -> Vec<Vec<String>> {
    fn end_record(records: &mut Vec<Vec<String>>, fields: &mut Vec<String>, field: &mut String) {
        fields.push(std::mem::take(field));
        let record = std::mem::take(fields);
        if !(record.len() == 1 && record[0].trim().is_empty()) {
            records.push(record);
        }
    }

    let mut records = Vec::new();
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            '\r' if !in_quotes && matches!(chars.peek(), Some('\n') | None) => {}
            '\n' if !in_quotes => end_record(&mut records, &mut fields, &mut field),
            _ => field.push(c),
        }
    }
    end_record(&mut records, &mut fields, &mut field);
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const KC1: &str = "loc,v(g),n,lOCode,uniq_Op,defects\n\
                       10,2,30,8,5,false\n\
                       200,15,900,180,20,true\n\
                       10,2,30,8,5,false\n\
                       50,?,100,40,9,false\n";

    #[test]
    fn test_parse_records_quotes() {
        assert_eq!(
            parse_records(r#"a,"b,c","d""e""#),
            vec![vec!["a", "b,c", "d\"e"]]
        );
        assert_eq!(
            parse_records("x,,y\r\n\n  \n1,2,3"),
            vec![vec!["x", "", "y"], vec!["1", "2", "3"]]
        );
    }

    #[test]
    fn test_quoted_field_spans_lines() {
        let ds = Dataset::from_csv_str(
            "loc,note,defects\n10,\"first line\nsecond, line\",1\n20,plain,0\n",
        )
        .expect("parse");
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[0], vec!["10", "first line\nsecond, line"]);
        assert_eq!(ds.labels(), &["1", "0"]);
    }

    #[test]
    fn test_parse_label_variants() {
        assert!(parse_label("true"));
        assert!(parse_label("Y"));
        assert!(parse_label("1"));
        assert!(parse_label("3.5"));
        assert!(!parse_label("FALSE"));
        assert!(!parse_label("0"));
        assert!(!parse_label("maybe"));
        assert!(parse_label("'yes'"));
    }

    #[test]
    fn test_clean_drops_duplicates_and_fills() {
        let ds = Dataset::from_csv_str("a,b,bug\n1,,\n1,,\n2,3,1\n1,,1\n").expect("parse");
        let cleaned = ds.clean();
        // Same features with a different label is not a duplicate
        assert_eq!(cleaned.len(), 3);
        assert_eq!(cleaned.rows[0], vec!["1", "0"]);
        assert_eq!(cleaned.labels(), &["0", "1", "1"]);
    }

    #[test]
    fn test_feature_matrix_engineering_and_coercion() {
        let matrix = Dataset::from_csv_str(KC1)
            .expect("parse")
            .clean()
            .feature_matrix()
            .expect("matrix");

        assert_eq!(
            matrix.names,
            vec![
                "loc",
                "v(g)",
                "n",
                "lOCode",
                "uniq_Op",
                "complexity_per_loc",
                "operators_per_loc"
            ]
        );
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.labels, vec![false, true, false]);
        assert_eq!(matrix.positives(), 1);

        // '?' becomes the mean of 2 and 15
        assert_eq!(matrix.rows[2][1], 8.5);
        assert_eq!(matrix.rows[1][5], 15.0 / 201.0);
        assert_eq!(matrix.rows[0][6], 5.0 / 11.0);
    }

    #[test]
    fn test_column_means() {
        let matrix = Dataset::from_csv_str("loc,bug\n10,0\n30,1\n")
            .expect("parse")
            .feature_matrix()
            .expect("matrix");
        assert_eq!(matrix.column_means().get("loc"), 20.0);
    }

    #[test]
    fn test_concat_unions_columns() {
        let a = Dataset::from_csv_str("loc,v(g),defects\n1,1,0\n").expect("parse");
        let b = Dataset::from_csv_str("loc,n,defects\n2,7,1\n").expect("parse");
        let merged = Dataset::concat(vec![a, b]);
        assert_eq!(merged.columns(), &["loc", "v(g)", "n"]);
        assert_eq!(merged.rows[1], vec!["2", "", "7"]);
        assert_eq!(merged.labels(), &["0", "1"]);
    }

    #[test]
    fn test_each_file_keeps_its_own_label() {
        let a = Dataset::from_csv_str("loc,v(g),defects\n10,2,true\n20,3,false\n")
            .expect("parse");
        let b = Dataset::from_csv_str("loc,n,defects\n30,40,false\n50,60,false\n")
            .expect("parse");
        let matrix = Dataset::concat(vec![a, b])
            .clean()
            .feature_matrix()
            .expect("matrix");

        assert_eq!(matrix.labels, vec![true, false, false, false]);
        assert_eq!(matrix.names, vec!["loc", "v(g)", "n", "complexity_per_loc"]);
        // Cells missing from a file's header are filled with 0
        assert_eq!(matrix.rows[0][2], 0.0);
        assert_eq!(matrix.rows[2][1], 0.0);
        assert_eq!(matrix.rows[3][2], 60.0);
    }

    #[test]
    fn test_no_candidate_columns() {
        let err = Dataset::from_csv_str("foo,bar\n1,0\n")
            .expect("parse")
            .feature_matrix()
            .unwrap_err();
        assert!(matches!(err, TrainError::NoFeatures(_)));
    }

    #[test]
    fn test_load_dir() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("b.csv"), "loc,defects\n5,1\n").expect("write");
        fs::write(dir.path().join("a.csv"), "loc,defects\n3,0\n").expect("write");
        fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

        let ds = Dataset::load_dir(dir.path()).expect("load");
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.rows[0][0], "3");
    }

    #[test]
    fn test_load_dir_without_csv() {
        let dir = tempdir().expect("tempdir");
        let err = Dataset::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, TrainError::NoData(_)));
    }
}
