//! Kernel trait definition

/// Kernel function trait
///
/// Histogram vectors are dense, so kernels operate on plain slices of equal length.
pub trait Kernel {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &[f64], y: &[f64]) -> f64;

    /// Optional: compute kernel value using precomputed squared norms
    /// This can be more efficient for some kernels (e.g., RBF)
    fn compute_with_norms(&self, x: &[f64], y: &[f64], x_norm_sq: f64, y_norm_sq: f64) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }
}

/// Dot product of two dense vectors
pub(crate) fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y).map(|(a, b)| a * b).sum()
}

/// Squared L2 norm of a dense vector
pub(crate) fn norm_squared(x: &[f64]) -> f64 {
    dot(x, x)
}
