//! Synthetic minority oversampling (SMOTE)
//!
//! Balances the training split by interpolating between minority samples and
//! their nearest minority neighbours. Applied to scaled rows only, never to
//! validation or test data.

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, warn};

/// Oversample the minority class until both classes have equal counts.
///
/// Returns the original rows followed by the synthetic ones. With fewer than
/// two minority samples there is nothing to interpolate and the input is
/// returned unchanged.
pub fn oversample(
    rows: &[Vec<f64>],
    labels: &[bool],
    k_neighbors: usize,
    rng: &mut ChaCha8Rng,
) -> (Vec<Vec<f64>>, Vec<bool>) {
    let mut out_rows = rows.to_vec();
    let mut out_labels = labels.to_vec();

    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == negatives {
        return (out_rows, out_labels);
    }
    let minority_label = positives < negatives;
    let needed = positives.max(negatives) - positives.min(negatives);

    let minority: Vec<&Vec<f64>> = rows
        .iter()
        .zip(labels)
        .filter(|(_, &l)| l == minority_label)
        .map(|(r, _)| r)
        .collect();

    if minority.len() < 2 {
        warn!(
            "Only {} minority sample(s); skipping oversampling",
            minority.len()
        );
        return (out_rows, out_labels);
    }

    let k = k_neighbors.clamp(1, minority.len() - 1);
    let neighbours: Vec<Vec<usize>> = (0..minority.len())
        .map(|i| nearest(&minority, i, k))
        .collect();

    for _ in 0..needed {
        let i = rng.random_range(0..minority.len());
        let j = neighbours[i][rng.random_range(0..k)];
        let gap: f64 = rng.random();
        let synthetic: Vec<f64> = minority[i]
            .iter()
            .zip(minority[j].iter())
            .map(|(a, b)| a + gap * (b - a))
            .collect();
        out_rows.push(synthetic);
        out_labels.push(minority_label);
    }

    debug!(
        "SMOTE added {} synthetic samples (k = {})",
        needed, k
    );
    (out_rows, out_labels)
}

/// Indices of the `k` nearest other samples by Euclidean distance.
fn nearest(samples: &[&Vec<f64>], i: usize, k: usize) -> Vec<usize> {
    let mut distances: Vec<(usize, f64)> = samples
        .iter()
        .enumerate()
        .filter(|(j, _)| *j != i)
        .map(|(j, other)| (j, squared_distance(samples[i], other)))
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    distances.into_iter().take(k).map(|(j, _)| j).collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
