//! Sigmoid (Tanh) Kernel Implementation
//!
//! K(x, y) = tanh(γ * <x, y> + r)
//!
//! The kernel is not positive semi-definite for every parameter choice, which the
//! decomposition solver tolerates by clamping the curvature of each pair update.
//! It is the default kernel of the one-class detector.

use crate::core::{HarnessError, Result};
use crate::kernel::traits::dot;
use crate::kernel::Kernel;
use serde::{Deserialize, Serialize};

/// Sigmoid (Hyperbolic Tangent) kernel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SigmoidKernel {
    /// Scaling parameter for the dot product (must be positive)
    pub gamma: f64,
    /// Bias/offset parameter (can be positive, negative, or zero)
    pub coef0: f64,
}

impl SigmoidKernel {
    /// Creates a new Sigmoid kernel, gamma must be positive and finite
    pub fn new(gamma: f64, coef0: f64) -> Result<Self> {
        if !(gamma > 0.0 && gamma.is_finite()) {
            return Err(HarnessError::InvalidParameter(format!(
                "Gamma must be positive, got: {gamma}"
            )));
        }
        Ok(Self { gamma, coef0 })
    }

    /// Creates a sigmoid kernel with zero bias
    pub fn zero_bias(gamma: f64) -> Result<Self> {
        Self::new(gamma, 0.0)
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        (self.gamma * dot(x, y) + self.coef0).tanh()
    }
}
