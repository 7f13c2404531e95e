//! Kernel selection as used by configurations and persisted models

use crate::core::{HarnessError, Result};
use crate::kernel::{Kernel, LinearKernel, RBFKernel, SigmoidKernel};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kernel family named in a hyperparameter grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelType {
    Linear,
    Rbf,
    Sigmoid,
}

impl fmt::Display for KernelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KernelType::Linear => "linear",
            KernelType::Rbf => "rbf",
            KernelType::Sigmoid => "sigmoid",
        };
        f.write_str(name)
    }
}

/// Kernel coefficient, fixed or derived from the data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gamma {
    /// 1 / n_features
    Auto,
    /// 1 / (n_features * var(X)), 1.0 when the variance is zero
    Scale,
    /// Fixed positive value
    Value(f64),
}

impl Gamma {
    /// Resolve the coefficient against the training vectors
    pub fn resolve(&self, samples: &[Vec<f64>]) -> Result<f64> {
        let n_features = samples.first().map_or(0, Vec::len);
        let gamma = match *self {
            Gamma::Value(value) => value,
            Gamma::Auto | Gamma::Scale if n_features == 0 => {
                return Err(HarnessError::InvalidParameter(
                    "Cannot resolve gamma without features".to_string(),
                ))
            }
            Gamma::Auto => 1.0 / n_features as f64,
            Gamma::Scale => {
                let variance = overall_variance(samples);
                if variance == 0.0 {
                    1.0
                } else {
                    1.0 / (n_features as f64 * variance)
                }
            }
        };

        if !(gamma > 0.0 && gamma.is_finite()) {
            return Err(HarnessError::InvalidParameter(format!(
                "Gamma must be positive, got: {gamma}"
            )));
        }
        Ok(gamma)
    }
}

impl fmt::Display for Gamma {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gamma::Auto => f.write_str("auto"),
            Gamma::Scale => f.write_str("scale"),
            Gamma::Value(value) => write!(f, "{value}"),
        }
    }
}

/// Variance over every entry of the sample matrix
fn overall_variance(samples: &[Vec<f64>]) -> f64 {
    let count: usize = samples.iter().map(Vec::len).sum();
    if count == 0 {
        return 0.0;
    }
    let mean = samples.iter().flatten().sum::<f64>() / count as f64;
    samples
        .iter()
        .flatten()
        .map(|&v| (v - mean) * (v - mean))
        .sum::<f64>()
        / count as f64
}

/// A concrete kernel with resolved parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelFunction {
    Linear(LinearKernel),
    Rbf(RBFKernel),
    Sigmoid(SigmoidKernel),
}

impl KernelFunction {
    /// Build the kernel of the given family, resolving gamma on the training vectors
    pub fn build(kind: KernelType, gamma: Gamma, samples: &[Vec<f64>]) -> Result<Self> {
        Ok(match kind {
            KernelType::Linear => KernelFunction::Linear(LinearKernel::new()),
            KernelType::Rbf => KernelFunction::Rbf(RBFKernel::new(gamma.resolve(samples)?)?),
            KernelType::Sigmoid => {
                KernelFunction::Sigmoid(SigmoidKernel::zero_bias(gamma.resolve(samples)?)?)
            }
        })
    }

    pub fn kind(&self) -> KernelType {
        match self {
            KernelFunction::Linear(_) => KernelType::Linear,
            KernelFunction::Rbf(_) => KernelType::Rbf,
            KernelFunction::Sigmoid(_) => KernelType::Sigmoid,
        }
    }
}

impl Kernel for KernelFunction {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            KernelFunction::Linear(k) => k.compute(x, y),
            KernelFunction::Rbf(k) => k.compute(x, y),
            KernelFunction::Sigmoid(k) => k.compute(x, y),
        }
    }

    fn compute_with_norms(&self, x: &[f64], y: &[f64], x_norm_sq: f64, y_norm_sq: f64) -> f64 {
        match self {
            KernelFunction::Rbf(k) => k.compute_with_norms(x, y, x_norm_sq, y_norm_sq),
            _ => self.compute(x, y),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_gamma_auto() {
        let samples = vec![vec![1.0, 2.0, 3.0, 4.0]];
        assert_relative_eq!(Gamma::Auto.resolve(&samples).unwrap(), 0.25);
    }

    #[test]
    fn test_gamma_scale() {
        // entries 0, 1, 0, 1 -> variance 0.25, two features
        let samples = vec![vec![0.0, 1.0], vec![0.0, 1.0]];
        assert_relative_eq!(Gamma::Scale.resolve(&samples).unwrap(), 2.0);
    }

    #[test]
    fn test_gamma_scale_constant_data() {
        let samples = vec![vec![0.5, 0.5], vec![0.5, 0.5]];
        assert_eq!(Gamma::Scale.resolve(&samples).unwrap(), 1.0);
    }

    #[test]
    fn test_gamma_rejects_non_positive_value() {
        let samples = vec![vec![1.0]];
        assert!(Gamma::Value(0.0).resolve(&samples).is_err());
        assert!(Gamma::Auto.resolve(&[]).is_err());
    }

    #[test]
    fn test_kernel_function_dispatch() {
        let samples = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let rbf = KernelFunction::build(KernelType::Rbf, Gamma::Value(0.5), &samples).unwrap();
        assert_eq!(rbf.kind(), KernelType::Rbf);
        assert_relative_eq!(rbf.compute(&samples[0], &samples[1]), (-1.0_f64).exp());

        let sigmoid =
            KernelFunction::build(KernelType::Sigmoid, Gamma::Auto, &samples).unwrap();
        assert_eq!(sigmoid.compute(&samples[0], &samples[1]), 0.0);
    }

    #[test]
    fn test_kernel_type_serde_names() {
        let kinds: Vec<KernelType> = serde_json::from_str(r#"["sigmoid", "rbf"]"#).unwrap();
        assert_eq!(kinds, vec![KernelType::Sigmoid, KernelType::Rbf]);
        let gammas: Vec<Gamma> = serde_json::from_str(r#"["auto", "scale", {"value": 0.1}]"#)
            .unwrap();
        assert_eq!(gammas, vec![Gamma::Auto, Gamma::Scale, Gamma::Value(0.1)]);
    }
}
