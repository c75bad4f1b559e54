//! Stratified train/validation/test split

use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Row indices for each partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition rows so every split keeps the label ratio.
///
/// Each class is shuffled independently, then cut into
/// `test_fraction` / `validation_fraction` / remainder (train).
pub fn stratified_split(
    labels: &[bool],
    validation_fraction: f64,
    test_fraction: f64,
    rng: &mut ChaCha8Rng,
) -> Split {
    let mut split = Split::default();

    for class in [false, true] {
        let mut indices: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        indices.shuffle(rng);

        let n = indices.len();
        let n_test = ((n as f64) * test_fraction).round() as usize;
        let n_val = ((n as f64) * validation_fraction).round() as usize;
        // Keep at least one training row per class when possible
        let n_test = n_test.min(n.saturating_sub(1));
        let n_val = n_val.min(n.saturating_sub(1 + n_test));

        split.test.extend_from_slice(&indices[..n_test]);
        split
            .validation
            .extend_from_slice(&indices[n_test..n_test + n_val]);
        split.train.extend_from_slice(&indices[n_test + n_val..]);
    }

    split.train.shuffle(rng);
    split
}
