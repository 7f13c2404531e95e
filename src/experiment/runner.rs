//! Cross-validated grid search over a dataset

use crate::config::{ExperimentConfig, ExtractionParams};
use crate::core::{ClassificationMode, HarnessError, Result};
use crate::data::{list_samples, GroundTruth};
use crate::experiment::folds::FoldPlan;
use crate::experiment::grid::{train_and_test, GridPoint, TrialScore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;

/// Where a dataset lives and how it is classified
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    pub name: String,
    pub descriptors_dir: PathBuf,
    pub ground_truth: PathBuf,
    pub mode: ClassificationMode,
    pub n_folds: usize,
}

/// Best grid point averaged over the folds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentOutcome {
    pub dataset: String,
    pub point: GridPoint,
    pub accuracy: f64,
    pub auc: f64,
    pub n_folds: usize,
    /// Mean scores of every grid point
    pub scores: Vec<TrialScore>,
    /// Parameters the descriptors were extracted with, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction: Option<ExtractionParams>,
}

/// Per-point sums of fold scores
#[derive(Debug, Clone, Default)]
pub struct ScoreAccumulator {
    points: Vec<GridPoint>,
    accuracy: Vec<f64>,
    auc: Vec<f64>,
    folds: usize,
}

impl ScoreAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the scores of one fold; every fold must score the same grid
    pub fn add(&mut self, scores: &[TrialScore]) -> Result<()> {
        if self.folds == 0 {
            self.points = scores.iter().map(|s| s.point.clone()).collect();
            self.accuracy = vec![0.0; scores.len()];
            self.auc = vec![0.0; scores.len()];
        } else if scores.len() != self.points.len()
            || scores.iter().zip(&self.points).any(|(s, p)| &s.point != p)
        {
            return Err(HarnessError::InvalidParameter(
                "Folds scored different grids".to_string(),
            ));
        }

        for (i, score) in scores.iter().enumerate() {
            self.accuracy[i] += score.accuracy;
            self.auc[i] += score.auc;
        }
        self.folds += 1;
        Ok(())
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    /// Mean accuracy and AUC of every point
    pub fn means(&self) -> Vec<TrialScore> {
        let n = self.folds.max(1) as f64;
        self.points
            .iter()
            .zip(self.accuracy.iter().zip(&self.auc))
            .map(|(point, (&acc, &auc))| TrialScore {
                point: point.clone(),
                accuracy: acc / n,
                auc: auc / n,
            })
            .collect()
    }

    /// Point with the highest mean AUC, the first one on ties
    pub fn best(&self) -> Option<TrialScore> {
        best_by_auc(&self.means()).cloned()
    }
}

/// Highest AUC, earliest on ties
pub fn best_by_auc(scores: &[TrialScore]) -> Option<&TrialScore> {
    scores.iter().fold(None, |best: Option<&TrialScore>, s| match best {
        Some(b) if b.auc >= s.auc => Some(b),
        _ => Some(s),
    })
}

/// Cross-validate the configured grid on a dataset
pub fn try_dataset(spec: &DatasetSpec, config: &ExperimentConfig) -> Result<ExperimentOutcome> {
    config.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let ground_truth = GroundTruth::from_file(&spec.ground_truth)?;
    let samples = list_samples(&spec.descriptors_dir)?;
    if samples.is_empty() {
        return Err(HarnessError::InvalidDataset(format!(
            "No descriptor files in {}",
            spec.descriptors_dir.display()
        )));
    }
    if let Some(dir) = &config.model_dir {
        std::fs::create_dir_all(dir)?;
    }

    log::info!(
        "{}: {} samples, {} folds, {} grid points",
        spec.name,
        samples.len(),
        spec.n_folds,
        config.n_points()
    );

    let mut plan = FoldPlan::new(
        samples,
        &ground_truth,
        spec.mode,
        config.classifier.is_one_class(),
        spec.n_folds,
        &mut rng,
    )?;
    let mut accumulator = ScoreAccumulator::new();

    for i in 0..spec.n_folds {
        let start = Instant::now();
        let fold = plan.fold(i, &mut rng)?;
        log::debug!(
            "Fold {}: {} training, {} test samples",
            i + 1,
            fold.training.len(),
            fold.test.len()
        );

        let scores = train_and_test(
            &fold.training,
            &fold.test,
            &ground_truth,
            spec.mode,
            config,
            i,
            &mut rng,
        )?;

        log::info!("Fold {} time: {:.3?}", i + 1, start.elapsed());
        if let Some(best) = best_by_auc(&scores) {
            log::info!(
                "Best: {} - ACC: {:.3} AUC: {:.3}",
                best.point,
                best.accuracy,
                best.auc
            );
        }
        let max_acc = scores.iter().map(|s| s.accuracy).fold(0.0, f64::max);
        let max_auc = scores.iter().map(|s| s.auc).fold(0.0, f64::max);
        log::info!("Max Accuracy: {max_acc:.3} - Max AUC: {max_auc:.3}");

        accumulator.add(&scores)?;
    }

    let best = accumulator.best().ok_or(HarnessError::EmptyDataset)?;
    Ok(ExperimentOutcome {
        dataset: spec.name.clone(),
        point: best.point,
        accuracy: best.accuracy,
        auc: best.auc,
        n_folds: spec.n_folds,
        scores: accumulator.means(),
        extraction: config.extraction.clone(),
    })
}
