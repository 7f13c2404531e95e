//! One fold of the grid search

use crate::config::ExperimentConfig;
use crate::core::{
    is_zero_vector, ClassificationMode, Classifier, HarnessError, HistogramSet, Label, Result,
};
use crate::data::{compute_ranges, prepare_histograms, GroundTruth, Sample};
use crate::metrics::{accuracy, roc_auc, EvaluationMetrics};
use crate::models::ClassifierParams;
use crate::reduction::Reduction;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A scored configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub n_bins: usize,
    pub reduction: Reduction,
    pub classifier: ClassifierParams,
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n_bins: {}, reduction: {}, {}",
            self.n_bins, self.reduction, self.classifier
        )
    }
}

/// Accuracy and AUC of a grid point on one fold (or averaged over folds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialScore {
    pub point: GridPoint,
    pub accuracy: f64,
    pub auc: f64,
}

/// Force all-zero test vectors to `Normal` in frame mode
///
/// A frame without descriptors shows no motion at all, whatever the model says.
pub fn adjust_predictions(
    predictions: &mut [Label],
    histograms: &[Vec<f64>],
    mode: ClassificationMode,
) {
    if mode.is_video() {
        return;
    }
    for (prediction, histogram) in predictions.iter_mut().zip(histograms) {
        if is_zero_vector(histogram) {
            *prediction = Label::Normal;
        }
    }
}

/// Train and score every grid point on one training/test split
///
/// Ranges come from the training samples only. Scores are returned in grid
/// order: bins, then reductions, then classifier points.
pub fn train_and_test(
    training: &[Sample],
    test: &[Sample],
    ground_truth: &GroundTruth,
    mode: ClassificationMode,
    config: &ExperimentConfig,
    fold: usize,
    rng: &mut StdRng,
) -> Result<Vec<TrialScore>> {
    let ranges = compute_ranges(training)?;
    let grid = config.classifier.expand();
    let reductions = config.effective_reductions();
    let mut scores = Vec::with_capacity(config.n_points());

    for &n_bins in &config.bins {
        let train_set = prepare_histograms(
            training,
            ground_truth,
            &ranges,
            mode,
            n_bins,
            &config.excluded_features,
            true,
        )?;
        let test_set = prepare_histograms(
            test,
            ground_truth,
            &ranges,
            mode,
            n_bins,
            &config.excluded_features,
            false,
        )?;
        if train_set.is_empty() {
            return Err(HarnessError::InvalidDataset(format!(
                "Fold {fold}: every training histogram is empty"
            )));
        }
        let (normal, anomalous) = train_set.class_counts();
        log::debug!(
            "{n_bins} bins: {normal} normal and {anomalous} anomalous training histograms, {} test",
            test_set.len()
        );

        for reduction in &reductions {
            let reduced = reduction.apply(
                n_bins,
                config.encoder.as_ref(),
                &train_set.features,
                &test_set.features,
            )?;
            let reduced_train = HistogramSet {
                features: reduced.training,
                labels: train_set.labels.clone(),
            };

            for params in &grid {
                let point = GridPoint {
                    n_bins,
                    reduction: *reduction,
                    classifier: params.clone(),
                };
                let out_file = model_file(config, fold, scores.len());
                let model = params.train(&reduced_train, rng, out_file.as_deref())?;

                let mut predictions = model.predict_labels(&reduced.test);
                adjust_predictions(&mut predictions, &test_set.features, mode);

                let acc = accuracy(&test_set.labels, &predictions);
                let decision: Vec<f64> = predictions.iter().map(|l| l.as_f64()).collect();
                let auc = roc_auc(&test_set.labels, &decision).unwrap_or_else(|| {
                    log::debug!("AUC undefined for a single-class test set, recording 0");
                    0.0
                });

                let metrics = EvaluationMetrics::from_predictions(&test_set.labels, &predictions);
                log::debug!("ACC: {acc:.2} - AUC: {auc:.2} - {point}");
                log::trace!(
                    "TP: {} TN: {} FP: {} FN: {} - F1: {:.4}",
                    metrics.true_positives,
                    metrics.true_negatives,
                    metrics.false_positives,
                    metrics.false_negatives,
                    metrics.f1_score()
                );
                scores.push(TrialScore {
                    point,
                    accuracy: acc,
                    auc,
                });
            }
        }
    }

    Ok(scores)
}

fn model_file(config: &ExperimentConfig, fold: usize, index: usize) -> Option<PathBuf> {
    config
        .model_dir
        .as_ref()
        .map(|dir| dir.join(format!("fold{fold}_point{index}.json")))
}
