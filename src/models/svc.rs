//! Binary C-support vector classifier
//!
//! RBF kernel with `gamma = scale` and balanced class weights by default, so that
//! the rare anomalous frames weigh as much as the normal ones.

use crate::core::{Classifier, HarnessError, Label, Prediction, Result, SolverConfig};
use crate::kernel::{Gamma, Kernel, KernelFunction, KernelType};
use crate::models::{check_training_set, save_fitted, FittedModel};
use crate::solver::{DualProblem, SMOSolver};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Builder for binary SVM training
#[derive(Debug, Clone)]
pub struct SvcTrainer {
    c: f64,
    kernel: KernelType,
    gamma: Gamma,
    balanced: bool,
    solver: SolverConfig,
}

impl SvcTrainer {
    /// RBF kernel, `gamma = scale`, balanced class weights
    pub fn new(c: f64) -> Self {
        Self {
            c,
            kernel: KernelType::Rbf,
            gamma: Gamma::Scale,
            balanced: true,
            solver: SolverConfig::default(),
        }
    }

    /// Set the kernel family and its coefficient
    pub fn with_kernel(mut self, kernel: KernelType, gamma: Gamma) -> Self {
        self.kernel = kernel;
        self.gamma = gamma;
        self
    }

    /// Enable or disable balanced class weights
    pub fn with_balanced_weights(mut self, balanced: bool) -> Self {
        self.balanced = balanced;
        self
    }

    /// Set the dual solver configuration
    pub fn with_solver_config(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Fit the classifier
    pub fn train(&self, samples: &[Vec<f64>], labels: &[Label]) -> Result<TrainedSvc> {
        if !(self.c > 0.0) {
            return Err(HarnessError::InvalidParameter(format!(
                "C must be positive, got: {}",
                self.c
            )));
        }
        check_training_set(samples, labels)?;

        let n = samples.len();
        let n_normal = labels.iter().filter(|&&l| l == Label::Normal).count();
        let n_anomalous = n - n_normal;
        if n_normal == 0 || n_anomalous == 0 {
            return Err(HarnessError::SingleClass(format!(
                "{n_normal} normal and {n_anomalous} anomalous samples"
            )));
        }

        let class_weights = if self.balanced {
            ClassWeights {
                normal: n as f64 / (2.0 * n_normal as f64),
                anomalous: n as f64 / (2.0 * n_anomalous as f64),
            }
        } else {
            ClassWeights::default()
        };

        let kernel = KernelFunction::build(self.kernel, self.gamma, samples)?;
        let y: Vec<f64> = labels.iter().map(|l| l.as_f64()).collect();
        let upper = labels
            .iter()
            .map(|&l| self.c * class_weights.weight(l))
            .collect();

        let problem = DualProblem {
            kernel: &kernel,
            samples,
            y: y.clone(),
            p: vec![-1.0; n],
            upper,
            alpha: vec![0.0; n],
        };
        let result = SMOSolver::new(self.solver.clone()).solve(problem)?;

        log::trace!(
            "SVC fitted: {} support vectors, {} iterations",
            result.support_vectors.len(),
            result.iterations
        );

        let support_vectors = result
            .support_vectors
            .iter()
            .map(|&i| samples[i].clone())
            .collect();
        let dual_coef = result
            .support_vectors
            .iter()
            .map(|&i| result.alpha[i] * y[i])
            .collect();

        Ok(TrainedSvc {
            kernel,
            support_vectors,
            dual_coef,
            rho: result.rho,
            c: self.c,
            class_weights,
        })
    }
}

/// Per-class multipliers of C
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassWeights {
    pub normal: f64,
    pub anomalous: f64,
}

impl ClassWeights {
    pub fn weight(&self, label: Label) -> f64 {
        match label {
            Label::Normal => self.normal,
            Label::Anomalous => self.anomalous,
        }
    }
}

impl Default for ClassWeights {
    fn default() -> Self {
        Self {
            normal: 1.0,
            anomalous: 1.0,
        }
    }
}

/// A fitted binary SVM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedSvc {
    kernel: KernelFunction,
    support_vectors: Vec<Vec<f64>>,
    /// alpha_i * y_i for each support vector
    dual_coef: Vec<f64>,
    rho: f64,
    c: f64,
    class_weights: ClassWeights,
}

impl TrainedSvc {
    /// Get the decision function value for a vector
    pub fn decision_function(&self, features: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, &coef)| coef * self.kernel.compute(sv, features))
            .sum::<f64>()
            - self.rho
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn class_weights(&self) -> ClassWeights {
        self.class_weights
    }

    pub fn kernel(&self) -> &KernelFunction {
        &self.kernel
    }

    pub fn c(&self) -> f64 {
        self.c
    }

    pub fn n_features(&self) -> usize {
        self.support_vectors.first().map_or(0, Vec::len)
    }
}

impl Classifier for TrainedSvc {
    fn predict(&self, features: &[f64]) -> Prediction {
        let decision_value = self.decision_function(features);
        Prediction::new(Label::from_decision(decision_value), decision_value)
    }
}

/// Train a binary SVM (RBF kernel, balanced class weights), optionally saving it
pub fn train_svc(
    samples: &[Vec<f64>],
    labels: &[Label],
    c: f64,
    out_file: Option<&Path>,
) -> Result<TrainedSvc> {
    let model = SvcTrainer::new(c).train(samples, labels)?;
    if let Some(path) = out_file {
        save_fitted(&FittedModel::Svc(model.clone()), &format!("svc C={c}"), path)?;
    }
    Ok(model)
}
