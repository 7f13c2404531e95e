//! Principal component analysis
//!
//! Fitted on the training histograms only. Keeps the fewest leading components
//! whose cumulative explained variance ratio exceeds the requested fraction.
//! When there are fewer samples than dimensions the eigenproblem is solved on
//! the n × n Gram matrix instead of the d × d covariance.

use crate::core::{FeatureTransform, HarnessError, Result};
use crate::kernel::traits::dot;

const MAX_SWEEPS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Pca {
    mean: Vec<f64>,
    /// k × d, unit length rows
    components: Vec<Vec<f64>>,
    explained_variance_ratio: Vec<f64>,
}

impl Pca {
    /// Fit on the rows of `samples`, keeping `variance` (in (0, 1]) of the total variance
    pub fn fit(samples: &[Vec<f64>], variance: f64) -> Result<Self> {
        if !(variance > 0.0 && variance <= 1.0) {
            return Err(HarnessError::InvalidParameter(format!(
                "PCA variance must be in (0, 1], got: {variance}"
            )));
        }
        if samples.is_empty() {
            return Err(HarnessError::EmptyDataset);
        }

        let n = samples.len();
        let d = samples[0].len();
        if let Some(bad) = samples.iter().find(|s| s.len() != d) {
            return Err(HarnessError::DimensionMismatch {
                expected: d,
                actual: bad.len(),
            });
        }

        let mut mean = vec![0.0; d];
        for s in samples {
            for (m, v) in mean.iter_mut().zip(s) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n as f64);

        let centered: Vec<Vec<f64>> = samples
            .iter()
            .map(|s| s.iter().zip(&mean).map(|(v, m)| v - m).collect())
            .collect();

        let (eigenvalues, directions) = if n < d {
            gram_directions(&centered)
        } else {
            covariance_directions(&centered, d)
        };

        let total: f64 = eigenvalues.iter().map(|&l| l.max(0.0)).sum();
        let ratios: Vec<f64> = eigenvalues
            .iter()
            .map(|&l| if total > 0.0 { l.max(0.0) / total } else { 0.0 })
            .collect();

        let mut cumulative = 0.0;
        let below = ratios
            .iter()
            .take_while(|&&r| {
                cumulative += r;
                cumulative <= variance
            })
            .count();
        let k = (below + 1).min(directions.len()).max(1);

        log::debug!("PCA keeps {k} of {} components ({d} dimensions)", directions.len());

        Ok(Self {
            mean,
            components: directions.into_iter().take(k).collect(),
            explained_variance_ratio: ratios.into_iter().take(k).collect(),
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    pub fn explained_variance_ratio(&self) -> &[f64] {
        &self.explained_variance_ratio
    }
}

impl FeatureTransform for Pca {
    fn output_dim(&self) -> usize {
        self.components.len()
    }

    fn transform(&self, features: &[f64]) -> Vec<f64> {
        let centered: Vec<f64> = features.iter().zip(&self.mean).map(|(v, m)| v - m).collect();
        self.components
            .iter()
            .map(|c| dot(c, &centered))
            .collect()
    }
}

/// Eigenpairs of XᵀX, sorted by decreasing eigenvalue
fn covariance_directions(centered: &[Vec<f64>], d: usize) -> (Vec<f64>, Vec<Vec<f64>>) {
    let mut cov = vec![vec![0.0; d]; d];
    for row in centered {
        for i in 0..d {
            if row[i] == 0.0 {
                continue;
            }
            for j in i..d {
                cov[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..d {
        for j in 0..i {
            cov[i][j] = cov[j][i];
        }
    }
    sorted_eigen(cov)
}

/// Eigenpairs of XXᵀ mapped back to feature space
fn gram_directions(centered: &[Vec<f64>]) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = centered.len();
    let d = centered[0].len();
    let mut gram = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in i..n {
            let value = dot(&centered[i], &centered[j]);
            gram[i][j] = value;
            gram[j][i] = value;
        }
    }

    let (eigenvalues, vectors) = sorted_eigen(gram);
    let largest = eigenvalues.first().copied().unwrap_or(0.0);
    if largest <= 0.0 {
        let mut axis = vec![0.0; d];
        axis[0] = 1.0;
        return (vec![0.0], vec![axis]);
    }

    // Null directions of the Gram matrix have no counterpart in feature space
    let kept = eigenvalues
        .iter()
        .take_while(|&&l| l > 1e-12 * largest)
        .count();
    let directions = vectors
        .iter()
        .take(kept)
        .map(|u| {
            let mut v = vec![0.0; d];
            for (row, &weight) in centered.iter().zip(u) {
                for (acc, x) in v.iter_mut().zip(row) {
                    *acc += weight * x;
                }
            }
            let norm = dot(&v, &v).sqrt();
            if norm > 0.0 {
                v.iter_mut().for_each(|x| *x /= norm);
            }
            v
        })
        .collect();
    (eigenvalues.into_iter().take(kept).collect(), directions)
}

fn sorted_eigen(matrix: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let (values, vectors) = jacobi_eigen(matrix);
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    (
        order.iter().map(|&i| values[i]).collect(),
        order.iter().map(|&i| vectors[i].clone()).collect(),
    )
}

/// Cyclic Jacobi eigendecomposition of a symmetric matrix
///
/// Returns the eigenvalues and the matching unit eigenvectors.
pub(crate) fn jacobi_eigen(mut a: Vec<Vec<f64>>) -> (Vec<f64>, Vec<Vec<f64>>) {
    let n = a.len();
    let mut v: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    let scale: f64 = a.iter().flatten().map(|x| x * x).sum::<f64>().sqrt();

    for _ in 0..MAX_SWEEPS {
        let off: f64 = (0..n)
            .flat_map(|p| ((p + 1)..n).map(move |q| (p, q)))
            .map(|(p, q)| a[p][q] * a[p][q])
            .sum::<f64>()
            .sqrt();
        if off <= 1e-12 * scale.max(f64::MIN_POSITIVE) {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                if a[p][q] == 0.0 {
                    continue;
                }
                let theta = (a[q][q] - a[p][p]) / (2.0 * a[p][q]);
                let t = theta.signum() / (theta.abs() + theta.hypot(1.0));
                let c = 1.0 / t.hypot(1.0);
                let s = t * c;

                for row in a.iter_mut() {
                    let (akp, akq) = (row[p], row[q]);
                    row[p] = c * akp - s * akq;
                    row[q] = s * akp + c * akq;
                }
                for k in 0..n {
                    let (apk, aqk) = (a[p][k], a[q][k]);
                    a[p][k] = c * apk - s * aqk;
                    a[q][k] = s * apk + c * aqk;
                }
                for row in v.iter_mut() {
                    let (vkp, vkq) = (row[p], row[q]);
                    row[p] = c * vkp - s * vkq;
                    row[q] = s * vkp + c * vkq;
                }
            }
        }
    }

    let values = (0..n).map(|i| a[i][i]).collect();
    let vectors = (0..n).map(|j| v.iter().map(|row| row[j]).collect()).collect();
    (values, vectors)
}
