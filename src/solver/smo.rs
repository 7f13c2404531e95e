//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the SVM dual problem
//!
//! ```text
//! min  0.5 αᵀQα + pᵀα
//! s.t. yᵀα = const,  0 <= α_i <= C_i
//! ```
//!
//! with `Q_ij = y_i y_j K(x_i, x_j)`. The same solver serves the weighted C-SVC
//! (`p = -1`, per-sample upper bounds) and the ν one-class SVM (`p = 0`, `y = +1`).
//! Working pairs are chosen with second-order information (maximal violating
//! `i`, then the `j` with the largest guaranteed objective decrease).

use crate::cache::{KernelCache, KernelRow};
use crate::core::{HarnessError, OptimizationResult, Result, SolverConfig};
use crate::kernel::traits::norm_squared;
use crate::kernel::Kernel;

/// Replacement curvature for non positive definite pairs (e.g. sigmoid kernel)
const TAU: f64 = 1e-12;

/// A dual problem ready to be solved
pub struct DualProblem<'a, K: Kernel> {
    pub kernel: &'a K,
    pub samples: &'a [Vec<f64>],
    /// Signs (+1 / -1) of each variable
    pub y: Vec<f64>,
    /// Linear term of the objective
    pub p: Vec<f64>,
    /// Upper bound of each variable
    pub upper: Vec<f64>,
    /// Feasible starting point
    pub alpha: Vec<f64>,
}

impl<'a, K: Kernel> DualProblem<'a, K> {
    fn validate(&self) -> Result<()> {
        let n = self.samples.len();
        if n == 0 {
            return Err(HarnessError::EmptyDataset);
        }

        for len in [self.y.len(), self.p.len(), self.upper.len(), self.alpha.len()] {
            if len != n {
                return Err(HarnessError::DimensionMismatch {
                    expected: n,
                    actual: len,
                });
            }
        }

        if let Some(&y) = self.y.iter().find(|&&y| y != 1.0 && y != -1.0) {
            return Err(HarnessError::InvalidParameter(format!(
                "Dual variable signs must be +1 or -1, got {y}"
            )));
        }

        for (i, (&a, &c)) in self.alpha.iter().zip(&self.upper).enumerate() {
            if c <= 0.0 || a < 0.0 || a > c {
                return Err(HarnessError::InvalidParameter(format!(
                    "Infeasible starting point at variable {i}: alpha={a}, C={c}"
                )));
            }
        }

        Ok(())
    }
}

/// Signed kernel matrix with row caching
struct QMatrix<'a, K: Kernel> {
    kernel: &'a K,
    samples: &'a [Vec<f64>],
    y: &'a [f64],
    norms: Vec<f64>,
    cache: KernelCache,
}

impl<'a, K: Kernel> QMatrix<'a, K> {
    fn new(kernel: &'a K, samples: &'a [Vec<f64>], y: &'a [f64], cache_size: usize) -> Self {
        let norms = samples.iter().map(|s| norm_squared(s)).collect();
        Self {
            kernel,
            samples,
            y,
            norms,
            cache: KernelCache::with_memory_limit(cache_size, samples.len()),
        }
    }

    fn diagonal(&self) -> Vec<f64> {
        (0..self.samples.len())
            .map(|i| {
                let x = &self.samples[i];
                self.kernel
                    .compute_with_norms(x, x, self.norms[i], self.norms[i])
            })
            .collect()
    }

    fn row(&mut self, i: usize) -> KernelRow {
        let (kernel, samples, y, norms) = (self.kernel, self.samples, self.y, &self.norms);
        self.cache.get_or_compute(i, || {
            samples
                .iter()
                .enumerate()
                .map(|(j, x_j)| {
                    y[i] * y[j] * kernel.compute_with_norms(&samples[i], x_j, norms[i], norms[j])
                })
                .collect()
        })
    }
}

/// SMO solver for the SVM dual problems
pub struct SMOSolver {
    config: SolverConfig,
}

impl SMOSolver {
    /// Create a new SMO solver with the given configuration
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Solve the dual problem
    pub fn solve<K: Kernel>(&self, problem: DualProblem<'_, K>) -> Result<OptimizationResult> {
        problem.validate()?;

        let DualProblem {
            kernel,
            samples,
            y,
            p,
            upper,
            mut alpha,
        } = problem;
        let n = samples.len();

        let mut q = QMatrix::new(kernel, samples, &y, self.config.cache_size);
        let qd = q.diagonal();

        // G = Qα + p
        let mut gradient = p.clone();
        for i in 0..n {
            if alpha[i] != 0.0 {
                let q_i = q.row(i);
                for (g, &q_ij) in gradient.iter_mut().zip(q_i.iter()) {
                    *g += alpha[i] * q_ij;
                }
            }
        }

        let mut iterations = 0;
        while iterations < self.config.max_iterations {
            let Some((i, j)) = self.select_working_set(&mut q, &qd, &y, &alpha, &upper, &gradient)
            else {
                break;
            };
            iterations += 1;

            let q_i = q.row(i);
            let q_j = q.row(j);
            let (c_i, c_j) = (upper[i], upper[j]);
            let (old_alpha_i, old_alpha_j) = (alpha[i], alpha[j]);

            if y[i] != y[j] {
                let quad = positive_or_tau(qd[i] + qd[j] + 2.0 * q_i[j]);
                let delta = (-gradient[i] - gradient[j]) / quad;
                let diff = alpha[i] - alpha[j];
                alpha[i] += delta;
                alpha[j] += delta;

                if diff > 0.0 {
                    if alpha[j] < 0.0 {
                        alpha[j] = 0.0;
                        alpha[i] = diff;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = -diff;
                }
                if diff > c_i - c_j {
                    if alpha[i] > c_i {
                        alpha[i] = c_i;
                        alpha[j] = c_i - diff;
                    }
                } else if alpha[j] > c_j {
                    alpha[j] = c_j;
                    alpha[i] = c_j + diff;
                }
            } else {
                let quad = positive_or_tau(qd[i] + qd[j] - 2.0 * q_i[j]);
                let delta = (gradient[i] - gradient[j]) / quad;
                let sum = alpha[i] + alpha[j];
                alpha[i] -= delta;
                alpha[j] += delta;

                if sum > c_i {
                    if alpha[i] > c_i {
                        alpha[i] = c_i;
                        alpha[j] = sum - c_i;
                    }
                } else if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = sum;
                }
                if sum > c_j {
                    if alpha[j] > c_j {
                        alpha[j] = c_j;
                        alpha[i] = sum - c_j;
                    }
                } else if alpha[i] < 0.0 {
                    alpha[i] = 0.0;
                    alpha[j] = sum;
                }
            }

            let delta_i = alpha[i] - old_alpha_i;
            let delta_j = alpha[j] - old_alpha_j;
            for k in 0..n {
                gradient[k] += q_i[k] * delta_i + q_j[k] * delta_j;
            }
        }

        if iterations >= self.config.max_iterations {
            log::warn!(
                "Solver reached the iteration limit ({}) before converging",
                self.config.max_iterations
            );
        }

        let stats = q.cache.stats();
        log::trace!(
            "Solver finished after {} iterations (cache hits {}, misses {}, hit rate {:.2})",
            iterations,
            stats.hits,
            stats.misses,
            q.cache.hit_rate()
        );

        let rho = calculate_rho(&y, &alpha, &upper, &gradient);
        let objective_value = alpha
            .iter()
            .zip(gradient.iter().zip(&p))
            .map(|(&a, (&g, &p))| a * (g + p))
            .sum::<f64>()
            / 2.0;
        let support_vectors = alpha
            .iter()
            .enumerate()
            .filter_map(|(i, &a)| (a > 0.0).then_some(i))
            .collect();

        Ok(OptimizationResult {
            alpha,
            rho,
            support_vectors,
            iterations,
            objective_value,
        })
    }

    /// Select the working pair, or `None` once the KKT conditions hold within epsilon
    fn select_working_set<K: Kernel>(
        &self,
        q: &mut QMatrix<'_, K>,
        qd: &[f64],
        y: &[f64],
        alpha: &[f64],
        upper: &[f64],
        gradient: &[f64],
    ) -> Option<(usize, usize)> {
        let n = alpha.len();

        // i: maximal violation among the variables that may move up
        let mut g_max = f64::NEG_INFINITY;
        let mut g_max_idx = None;
        for t in 0..n {
            if y[t] > 0.0 {
                if alpha[t] < upper[t] && -gradient[t] >= g_max {
                    g_max = -gradient[t];
                    g_max_idx = Some(t);
                }
            } else if alpha[t] > 0.0 && gradient[t] >= g_max {
                g_max = gradient[t];
                g_max_idx = Some(t);
            }
        }
        let i = g_max_idx?;
        let q_i = q.row(i);

        // j: largest second-order decrease among the variables that may move down
        let mut g_max2 = f64::NEG_INFINITY;
        let mut g_min_idx = None;
        let mut obj_diff_min = f64::INFINITY;
        for j in 0..n {
            let (grad_diff, quad) = if y[j] > 0.0 {
                if alpha[j] <= 0.0 {
                    continue;
                }
                g_max2 = g_max2.max(gradient[j]);
                (g_max + gradient[j], qd[i] + qd[j] - 2.0 * y[i] * q_i[j])
            } else {
                if alpha[j] >= upper[j] {
                    continue;
                }
                g_max2 = g_max2.max(-gradient[j]);
                (g_max - gradient[j], qd[i] + qd[j] + 2.0 * y[i] * q_i[j])
            };

            if grad_diff > 0.0 {
                let obj_diff = -(grad_diff * grad_diff) / positive_or_tau(quad);
                if obj_diff <= obj_diff_min {
                    g_min_idx = Some(j);
                    obj_diff_min = obj_diff;
                }
            }
        }

        if g_max + g_max2 < self.config.epsilon {
            return None;
        }
        g_min_idx.map(|j| (i, j))
    }
}

fn positive_or_tau(quad: f64) -> f64 {
    if quad > 0.0 {
        quad
    } else {
        TAU
    }
}

/// Offset of the decision function from the final gradient
fn calculate_rho(y: &[f64], alpha: &[f64], upper: &[f64], gradient: &[f64]) -> f64 {
    let mut free_count = 0;
    let mut free_sum = 0.0;
    let mut ub = f64::INFINITY;
    let mut lb = f64::NEG_INFINITY;

    for i in 0..alpha.len() {
        let y_g = y[i] * gradient[i];
        if alpha[i] >= upper[i] {
            if y[i] < 0.0 {
                ub = ub.min(y_g);
            } else {
                lb = lb.max(y_g);
            }
        } else if alpha[i] <= 0.0 {
            if y[i] > 0.0 {
                ub = ub.min(y_g);
            } else {
                lb = lb.max(y_g);
            }
        } else {
            free_count += 1;
            free_sum += y_g;
        }
    }

    if free_count > 0 {
        free_sum / free_count as f64
    } else {
        (ub + lb) / 2.0
    }
}
