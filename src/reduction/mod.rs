//! Dimensionality reduction of histogram vectors
//!
//! Applied between histogram construction and classifier training. PCA is
//! fitted on the training histograms of the trial; the encoder is pre-trained
//! and loaded from disk for each bin count.

pub mod encoder;
pub mod pca;

pub use self::encoder::*;
pub use self::pca::*;

use crate::core::{FeatureTransform, HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Reduction step of a grid point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Reduction {
    /// Raw histograms
    #[default]
    None,
    /// Principal components explaining `variance` of the training variance
    Pca { variance: f64 },
    /// Pre-trained encoder for the bin count
    Encoder,
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reduction::None => f.write_str("none"),
            Reduction::Pca { variance } => write!(f, "pca({variance})"),
            Reduction::Encoder => f.write_str("encoder"),
        }
    }
}

/// What to do when an encoder cannot be loaded or applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncoderPolicy {
    /// Warn and keep the raw histograms
    #[default]
    Fallback,
    /// Fail the experiment
    Required,
}

/// Where the encoders live and how strictly they are required
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    pub dir: PathBuf,
    #[serde(default)]
    pub policy: EncoderPolicy,
}

/// Training and test vectors after a reduction
#[derive(Debug, Clone, PartialEq)]
pub struct ReducedSets {
    pub training: Vec<Vec<f64>>,
    pub test: Vec<Vec<f64>>,
}

impl ReducedSets {
    fn raw(training: &[Vec<f64>], test: &[Vec<f64>]) -> Self {
        Self {
            training: training.to_vec(),
            test: test.to_vec(),
        }
    }

    fn transformed<T: FeatureTransform>(
        transform: &T,
        training: &[Vec<f64>],
        test: &[Vec<f64>],
    ) -> Self {
        Self {
            training: transform.transform_batch(training),
            test: transform.transform_batch(test),
        }
    }
}

impl Reduction {
    /// Reduce the histograms of one trial
    pub fn apply(
        &self,
        n_bins: usize,
        encoder: Option<&EncoderConfig>,
        training: &[Vec<f64>],
        test: &[Vec<f64>],
    ) -> Result<ReducedSets> {
        match *self {
            Reduction::None => Ok(ReducedSets::raw(training, test)),
            Reduction::Pca { variance } => {
                let pca = Pca::fit(training, variance)?;
                Ok(ReducedSets::transformed(&pca, training, test))
            }
            Reduction::Encoder => {
                let config = encoder.ok_or_else(|| {
                    HarnessError::ConfigError(
                        "Encoder reduction requested without an encoder directory".to_string(),
                    )
                })?;
                let dim = training.first().or(test.first()).map_or(0, Vec::len);

                let loaded = Encoder::from_file(Encoder::path_for(&config.dir, n_bins))
                    .and_then(|enc| enc.check_input(dim).map(|_| enc));

                match (loaded, config.policy) {
                    (Ok(enc), _) => {
                        log::debug!("Encoding {n_bins}-bin histograms to {}", enc.output_dim());
                        Ok(ReducedSets::transformed(&enc, training, test))
                    }
                    (Err(e), EncoderPolicy::Fallback) => {
                        log::warn!("Encoding failed ({e}), continuing with raw histograms");
                        Ok(ReducedSets::raw(training, test))
                    }
                    (Err(e), EncoderPolicy::Required) => Err(e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sets() -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
        (
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            vec![vec![0.5, 0.5]],
        )
    }

    #[test]
    fn test_reduction_json_forms() {
        let parsed: Vec<Reduction> = serde_json::from_str(
            r#"[{"type": "none"}, {"type": "pca", "variance": 0.95}, {"type": "encoder"}]"#,
        )
        .unwrap();
        assert_eq!(
            parsed,
            vec![
                Reduction::None,
                Reduction::Pca { variance: 0.95 },
                Reduction::Encoder
            ]
        );
        assert_eq!(parsed[1].to_string(), "pca(0.95)");
    }

    #[test]
    fn test_no_reduction_keeps_vectors() {
        let (training, test) = sets();
        let reduced = Reduction::None.apply(16, None, &training, &test).unwrap();
        assert_eq!(reduced.training, training);
        assert_eq!(reduced.test, test);
    }

    #[test]
    fn test_pca_reduction_shapes() {
        let (training, test) = sets();
        let reduced = Reduction::Pca { variance: 0.5 }
            .apply(16, None, &training, &test)
            .unwrap();
        assert_eq!(reduced.training.len(), 3);
        assert_eq!(reduced.test.len(), 1);
        assert_eq!(reduced.training[0].len(), reduced.test[0].len());
    }

    #[test]
    fn test_missing_encoder_fallback_and_required() {
        let dir = TempDir::new().unwrap();
        let (training, test) = sets();

        let fallback = EncoderConfig {
            dir: dir.path().to_path_buf(),
            policy: EncoderPolicy::Fallback,
        };
        let reduced = Reduction::Encoder
            .apply(16, Some(&fallback), &training, &test)
            .unwrap();
        assert_eq!(reduced.training, training);

        let required = EncoderConfig {
            policy: EncoderPolicy::Required,
            ..fallback
        };
        assert!(matches!(
            Reduction::Encoder.apply(16, Some(&required), &training, &test),
            Err(HarnessError::EncoderError(_))
        ));

        assert!(matches!(
            Reduction::Encoder.apply(16, None, &training, &test),
            Err(HarnessError::ConfigError(_))
        ));
    }

    #[test]
    fn test_encoder_with_wrong_input_dim_falls_back() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("encoder8.json"),
            r#"[{"weights": [[1.0, 1.0, 1.0]], "bias": [0.0]}]"#,
        )
        .unwrap();
        let (training, test) = sets();
        let config = EncoderConfig {
            dir: dir.path().to_path_buf(),
            policy: EncoderPolicy::Fallback,
        };
        let reduced = Reduction::Encoder
            .apply(8, Some(&config), &training, &test)
            .unwrap();
        assert_eq!(reduced.test, test);
    }

    #[test]
    fn test_encoder_applied() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("encoder8.json"),
            r#"[{"weights": [[1.0, 2.0]], "bias": [0.0], "activation": "identity"}]"#,
        )
        .unwrap();
        let (training, test) = sets();
        let config = EncoderConfig {
            dir: dir.path().to_path_buf(),
            policy: EncoderPolicy::Required,
        };
        let reduced = Reduction::Encoder
            .apply(8, Some(&config), &training, &test)
            .unwrap();
        assert_eq!(reduced.training, vec![vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(reduced.test, vec![vec![1.5]]);
    }
}
