//! ν one-class support vector machine
//!
//! Trained on normal samples only; the decision function is positive inside the
//! estimated support of the normal class. `nu` bounds the fraction of training
//! outliers from above and the fraction of support vectors from below.

use crate::core::{Classifier, HarnessError, Label, Prediction, Result, SolverConfig};
use crate::kernel::{Gamma, Kernel, KernelFunction, KernelType};
use crate::models::{save_fitted, FittedModel};
use crate::solver::{DualProblem, SMOSolver};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Builder for one-class SVM training
#[derive(Debug, Clone)]
pub struct OneClassTrainer {
    nu: f64,
    kernel: KernelType,
    gamma: Gamma,
    solver: SolverConfig,
}

impl OneClassTrainer {
    /// Sigmoid kernel with `gamma = scale`
    pub fn new(nu: f64) -> Self {
        Self {
            nu,
            kernel: KernelType::Sigmoid,
            gamma: Gamma::Scale,
            solver: SolverConfig::default(),
        }
    }

    pub fn with_kernel(mut self, kernel: KernelType, gamma: Gamma) -> Self {
        self.kernel = kernel;
        self.gamma = gamma;
        self
    }

    pub fn with_solver_config(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Fit the detector on (presumed normal) samples
    pub fn train(&self, samples: &[Vec<f64>]) -> Result<TrainedOneClassSvm> {
        if !(self.nu > 0.0 && self.nu <= 1.0) {
            return Err(HarnessError::InvalidParameter(format!(
                "nu must be in (0, 1], got: {}",
                self.nu
            )));
        }
        if samples.is_empty() {
            return Err(HarnessError::EmptyDataset);
        }

        let n = samples.len();
        let kernel = KernelFunction::build(self.kernel, self.gamma, samples)?;

        // Feasible start: Σα = ν·n with every α in [0, 1]
        let total = self.nu * n as f64;
        let full = (total.floor() as usize).min(n);
        let mut alpha = vec![0.0; n];
        alpha[..full].iter_mut().for_each(|a| *a = 1.0);
        if full < n {
            alpha[full] = total - full as f64;
        }

        let problem = DualProblem {
            kernel: &kernel,
            samples,
            y: vec![1.0; n],
            p: vec![0.0; n],
            upper: vec![1.0; n],
            alpha,
        };
        let result = SMOSolver::new(self.solver.clone()).solve(problem)?;

        let support_vectors = result
            .support_vectors
            .iter()
            .map(|&i| samples[i].clone())
            .collect();
        let coef = result
            .support_vectors
            .iter()
            .map(|&i| result.alpha[i])
            .collect();

        Ok(TrainedOneClassSvm {
            kernel,
            support_vectors,
            coef,
            rho: result.rho,
            nu: self.nu,
        })
    }
}

/// A fitted one-class SVM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedOneClassSvm {
    kernel: KernelFunction,
    support_vectors: Vec<Vec<f64>>,
    coef: Vec<f64>,
    rho: f64,
    nu: f64,
}

impl TrainedOneClassSvm {
    /// Positive inside the learned support, negative outside
    pub fn decision_function(&self, features: &[f64]) -> f64 {
        self.support_vectors
            .iter()
            .zip(&self.coef)
            .map(|(sv, &a)| a * self.kernel.compute(sv, features))
            .sum::<f64>()
            - self.rho
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.len()
    }

    pub fn nu(&self) -> f64 {
        self.nu
    }

    pub fn kernel(&self) -> &KernelFunction {
        &self.kernel
    }
}

impl Classifier for TrainedOneClassSvm {
    fn predict(&self, features: &[f64]) -> Prediction {
        let decision_value = self.decision_function(features);
        Prediction::new(Label::from_decision(decision_value), decision_value)
    }
}

/// Train a one-class SVM, optionally saving it
pub fn train_oc_svm(
    samples: &[Vec<f64>],
    nu: f64,
    kernel: KernelType,
    gamma: Gamma,
    out_file: Option<&Path>,
) -> Result<TrainedOneClassSvm> {
    let model = OneClassTrainer::new(nu)
        .with_kernel(kernel, gamma)
        .train(samples)?;
    if let Some(path) = out_file {
        let description = format!("one-class nu={nu} kernel={kernel} gamma={gamma}");
        save_fitted(&FittedModel::OneClass(model.clone()), &description, path)?;
    }
    Ok(model)
}
