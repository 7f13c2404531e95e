//! Evaluation metrics
//!
//! Accuracy, ROC AUC and the confusion counts used to summarize a trial.

use crate::core::Label;

/// Fraction of predictions equal to the true label, 0 for empty input
pub fn accuracy(actual: &[Label], predicted: &[Label]) -> f64 {
    let total = actual.len().min(predicted.len());
    if total == 0 {
        return 0.0;
    }
    let correct = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| a == p)
        .count();
    correct as f64 / total as f64
}

/// Area under the ROC curve with `Normal` as the positive class
///
/// `scores` grow with confidence in the normal class. Computed through the
/// Mann-Whitney rank statistic with average ranks for ties. `None` when only
/// one class is present.
pub fn roc_auc(actual: &[Label], scores: &[f64]) -> Option<f64> {
    let n = actual.len().min(scores.len());
    let n_pos = actual[..n].iter().filter(|&&l| l == Label::Normal).count();
    let n_neg = n - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < n {
        let mut end = start + 1;
        while end < n && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // ranks are 1-based: the tie group spans start+1 ..= end
        let average_rank = (start + 1 + end) as f64 / 2.0;
        let positives = order[start..end]
            .iter()
            .filter(|&&i| actual[i] == Label::Normal)
            .count();
        rank_sum += average_rank * positives as f64;
        start = end;
    }

    let (p, q) = (n_pos as f64, n_neg as f64);
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * q))
}

/// Confusion counts with `Anomalous` as the positive class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationMetrics {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvaluationMetrics {
    pub fn new(tp: usize, tn: usize, fp: usize, fn_: usize) -> Self {
        Self {
            true_positives: tp,
            true_negatives: tn,
            false_positives: fp,
            false_negatives: fn_,
        }
    }

    pub fn from_predictions(actual: &[Label], predicted: &[Label]) -> Self {
        let mut metrics = Self::default();
        for (&a, &p) in actual.iter().zip(predicted) {
            match (p == Label::Anomalous, a == Label::Anomalous) {
                (true, true) => metrics.true_positives += 1,
                (false, false) => metrics.true_negatives += 1,
                (true, false) => metrics.false_positives += 1,
                (false, true) => metrics.false_negatives += 1,
            }
        }
        metrics
    }

    /// Calculate accuracy: (TP + TN) / (TP + TN + FP + FN)
    pub fn accuracy(&self) -> f64 {
        let total =
            self.true_positives + self.true_negatives + self.false_positives + self.false_negatives;
        ratio(self.true_positives + self.true_negatives, total)
    }

    /// Calculate precision: TP / (TP + FP)
    pub fn precision(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_positives,
        )
    }

    /// Calculate recall (detection rate): TP / (TP + FN)
    pub fn recall(&self) -> f64 {
        ratio(
            self.true_positives,
            self.true_positives + self.false_negatives,
        )
    }

    /// Calculate F1 score: 2 * (precision * recall) / (precision + recall)
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * (p * r) / (p + r)
        }
    }

    /// Calculate specificity: TN / (TN + FP)
    pub fn specificity(&self) -> f64 {
        ratio(
            self.true_negatives,
            self.true_negatives + self.false_positives,
        )
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::core::Label::{Anomalous as A, Normal as N};

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[N, A, N, A], &[N, A, A, A]), 0.75);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn test_roc_auc_perfect_and_inverted() {
        let actual = [N, N, A, A];
        assert_eq!(roc_auc(&actual, &[0.9, 0.8, 0.1, 0.2]), Some(1.0));
        assert_eq!(roc_auc(&actual, &[0.1, 0.2, 0.9, 0.8]), Some(0.0));
    }

    #[test]
    fn test_roc_auc_with_ties() {
        // Hard predictions: one normal misclassified
        let actual = [N, N, A, A];
        let scores = [1.0, -1.0, -1.0, -1.0];
        // pairs: (n0 > a0, a1) = 2, (n1 == a0, a1) = 1
        assert_relative_eq!(roc_auc(&actual, &scores).unwrap(), 0.75);

        assert_relative_eq!(roc_auc(&actual, &[0.5; 4]).unwrap(), 0.5);
    }

    #[test]
    fn test_roc_auc_undefined_for_single_class() {
        assert_eq!(roc_auc(&[N, N], &[1.0, -1.0]), None);
        assert_eq!(roc_auc(&[], &[]), None);
    }

    #[test]
    fn test_confusion_counts() {
        let actual = [A, A, N, N, N];
        let predicted = [A, N, A, N, N];
        let metrics = EvaluationMetrics::from_predictions(&actual, &predicted);

        assert_eq!(metrics, EvaluationMetrics::new(1, 2, 1, 1));
        assert_eq!(metrics.accuracy(), 0.6);
        assert_eq!(metrics.precision(), 0.5);
        assert_eq!(metrics.recall(), 0.5);
        assert_eq!(metrics.specificity(), 2.0 / 3.0);
        assert_relative_eq!(metrics.f1_score(), 0.5);
    }
}
