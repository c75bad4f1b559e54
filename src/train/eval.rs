//! Evaluation metrics for the binary defect classifier

use serde::{Deserialize, Serialize};

/// Decision threshold on `p(defect)`.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Counts of predicted vs actual labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    pub fn from_predictions(labels: &[bool], predicted: &[bool]) -> Self {
        let mut cm = Self::default();
        for (&actual, &guess) in labels.iter().zip(predicted) {
            match (actual, guess) {
                (false, false) => cm.true_negatives += 1,
                (false, true) => cm.false_positives += 1,
                (true, false) => cm.false_negatives += 1,
                (true, true) => cm.true_positives += 1,
            }
        }
        cm
    }

    pub fn precision(&self) -> Option<f64> {
        let predicted = self.true_positives + self.false_positives;
        (predicted > 0).then(|| self.true_positives as f64 / predicted as f64)
    }

    pub fn recall(&self) -> Option<f64> {
        let actual = self.true_positives + self.false_negatives;
        (actual > 0).then(|| self.true_positives as f64 / actual as f64)
    }
}

pub fn classify(probabilities: &[f64]) -> Vec<bool> {
    probabilities
        .iter()
        .map(|&p| p >= DECISION_THRESHOLD)
        .collect()
}

/// Fraction of correct predictions; None for an empty set.
pub fn accuracy(labels: &[bool], predicted: &[bool]) -> Option<f64> {
    if labels.is_empty() {
        return None;
    }
    let correct = labels
        .iter()
        .zip(predicted)
        .filter(|(a, b)| a == b)
        .count();
    Some(correct as f64 / labels.len() as f64)
}

/// Area under the ROC curve via the rank-sum statistic.
///
/// Tied scores share their average rank. None when only one class is present.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie group
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(&l, _)| l)
        .map(|(_, &r)| r)
        .sum();
    let p = positives as f64;
    let u = positive_rank_sum - p * (p + 1.0) / 2.0;
    Some(u / (p * negatives as f64))
}
