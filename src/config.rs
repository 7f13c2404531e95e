//! Experiment configuration
//!
//! `ExperimentConfig` carries everything a cross-validation run needs and is
//! passed by value to the driver. Dataset-specific extraction and encoder
//! settings come from a JSON file of named blocks (`UMN1_des`, `CVD_encoder`,
//! ...) and are only consulted when the experiment leaves them unset.

use crate::core::{HarnessError, Result};
use crate::kernel::{Gamma, KernelType};
use crate::models::{Activation, ClassifierParams, MlpParams};
use crate::reduction::{EncoderConfig, Reduction};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Descriptor extraction parameters recorded with a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionParams {
    /// Trajectory length in frames
    #[serde(rename = "L")]
    pub trajectory_length: usize,
    pub t1: f64,
    pub t2: f64,
    pub min_motion: f64,
    pub fast_threshold: f64,
    #[serde(default)]
    pub others: serde_json::Map<String, serde_json::Value>,
}

/// Hyperparameter lists of one classifier family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "classifier", rename_all = "snake_case")]
pub enum ClassifierGrid {
    Svc {
        c: Vec<f64>,
    },
    OneClass {
        nu: Vec<f64>,
        kernel: Vec<KernelType>,
        gamma: Vec<Gamma>,
    },
    Mlp {
        hidden_layer_sizes: Vec<Vec<usize>>,
        #[serde(default = "default_activations")]
        activation: Vec<Activation>,
        #[serde(default = "default_alphas")]
        alpha: Vec<f64>,
        #[serde(default = "default_learning_rates")]
        learning_rate_init: Vec<f64>,
    },
}

fn default_activations() -> Vec<Activation> {
    vec![Activation::Relu]
}

fn default_alphas() -> Vec<f64> {
    vec![0.0001]
}

fn default_learning_rates() -> Vec<f64> {
    vec![0.001]
}

impl Default for ClassifierGrid {
    fn default() -> Self {
        ClassifierGrid::Svc {
            c: vec![1.0, 4.0, 8.0, 16.0, 32.0, 64.0, 128.0],
        }
    }
}

impl ClassifierGrid {
    /// Grid used for the one-class UMN experiments
    pub fn one_class_default() -> Self {
        ClassifierGrid::OneClass {
            nu: vec![0.4, 0.3, 0.2, 0.1, 0.05, 0.025, 0.01],
            kernel: vec![KernelType::Sigmoid, KernelType::Rbf],
            gamma: vec![Gamma::Auto, Gamma::Scale],
        }
    }

    pub fn is_one_class(&self) -> bool {
        matches!(self, ClassifierGrid::OneClass { .. })
    }

    /// Cartesian product of the lists, last list varying fastest
    pub fn expand(&self) -> Vec<ClassifierParams> {
        match self {
            ClassifierGrid::Svc { c } => c.iter().map(|&c| ClassifierParams::Svc { c }).collect(),
            ClassifierGrid::OneClass { nu, kernel, gamma } => {
                let mut points = Vec::with_capacity(nu.len() * kernel.len() * gamma.len());
                for &nu in nu {
                    for &kernel in kernel {
                        for &gamma in gamma {
                            points.push(ClassifierParams::OneClass { nu, kernel, gamma });
                        }
                    }
                }
                points
            }
            ClassifierGrid::Mlp {
                hidden_layer_sizes,
                activation,
                alpha,
                learning_rate_init,
            } => {
                let mut points = Vec::new();
                for sizes in hidden_layer_sizes {
                    for &activation in activation {
                        for &alpha in alpha {
                            for &learning_rate_init in learning_rate_init {
                                points.push(ClassifierParams::Mlp(MlpParams {
                                    hidden_layer_sizes: sizes.clone(),
                                    activation,
                                    alpha,
                                    learning_rate_init,
                                    batch_size: None,
                                }));
                            }
                        }
                    }
                }
                points
            }
        }
    }
}

/// Configuration of a cross-validation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub extraction: Option<ExtractionParams>,
    pub encoder: Option<EncoderConfig>,
    pub classifier: ClassifierGrid,
    pub bins: Vec<usize>,
    /// Reductions of the grid; left empty, the configured encoder is tried
    /// for every bin count and raw histograms are used without one
    pub reductions: Vec<Reduction>,
    /// Descriptor dimensions left out of the histograms
    pub excluded_features: Vec<usize>,
    pub seed: u64,
    /// Directory where every fitted model is saved, if any
    pub model_dir: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            extraction: None,
            encoder: None,
            classifier: ClassifierGrid::default(),
            bins: vec![16, 32, 64],
            reductions: Vec::new(),
            excluded_features: Vec::new(),
            seed: 5,
            model_dir: None,
        }
    }
}

impl ExperimentConfig {
    /// Load a grid file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(HarnessError::IoError)?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| HarnessError::ConfigError(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Reductions actually scored
    pub fn effective_reductions(&self) -> Vec<Reduction> {
        if !self.reductions.is_empty() {
            self.reductions.clone()
        } else if self.encoder.is_some() {
            vec![Reduction::Encoder]
        } else {
            vec![Reduction::None]
        }
    }

    /// Number of grid points evaluated per fold
    pub fn n_points(&self) -> usize {
        self.bins.len() * self.effective_reductions().len() * self.classifier.expand().len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.bins.is_empty() || self.bins.contains(&0) {
            return Err(HarnessError::ConfigError(
                "bins must be a non-empty list of positive counts".to_string(),
            ));
        }
        if self.classifier.expand().is_empty() {
            return Err(HarnessError::ConfigError(
                "classifier grid has no points".to_string(),
            ));
        }
        Ok(())
    }
}

/// JSON object of named configuration blocks
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    blocks: serde_json::Map<String, serde_json::Value>,
}

impl ConfigFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(HarnessError::IoError)?;
        let blocks = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| HarnessError::ConfigError(format!("{}: {e}", path.display())))?;
        Ok(Self { blocks })
    }

    pub fn parse(json: &str) -> Result<Self> {
        let blocks =
            serde_json::from_str(json).map_err(|e| HarnessError::ConfigError(e.to_string()))?;
        Ok(Self { blocks })
    }

    /// Deserialize a named block
    pub fn block<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let value = self
            .blocks
            .get(name)
            .ok_or_else(|| HarnessError::ConfigError(format!("Missing block {name}")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| HarnessError::ConfigError(format!("Block {name}: {e}")))
    }

    pub fn extraction(&self, name: &str) -> Result<ExtractionParams> {
        self.block(name)
    }

    pub fn encoder(&self, name: &str) -> Result<EncoderConfig> {
        self.block(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduction::EncoderPolicy;

    #[test]
    fn test_default_config() {
        let config = ExperimentConfig::default();
        assert_eq!(config.bins, vec![16, 32, 64]);
        assert_eq!(config.seed, 5);
        assert!(config.reductions.is_empty());
        assert_eq!(config.effective_reductions(), vec![Reduction::None]);
        assert_eq!(config.classifier.expand().len(), 7);
        assert_eq!(config.n_points(), 21);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_configured_encoder_is_tried_by_default() {
        let mut config = ExperimentConfig {
            encoder: Some(EncoderConfig {
                dir: PathBuf::from("Encoders/UMN"),
                policy: Default::default(),
            }),
            ..ExperimentConfig::default()
        };
        assert_eq!(config.effective_reductions(), vec![Reduction::Encoder]);
        assert_eq!(config.n_points(), 21);

        config.reductions = vec![Reduction::None, Reduction::Pca { variance: 0.9 }];
        assert_eq!(config.effective_reductions(), config.reductions);
        assert_eq!(config.n_points(), 42);
    }

    #[test]
    fn test_one_class_grid_expansion_order() {
        let points = ClassifierGrid::one_class_default().expand();
        assert_eq!(points.len(), 28);
        assert_eq!(
            points[0],
            ClassifierParams::OneClass {
                nu: 0.4,
                kernel: KernelType::Sigmoid,
                gamma: Gamma::Auto
            }
        );
        assert_eq!(
            points[1],
            ClassifierParams::OneClass {
                nu: 0.4,
                kernel: KernelType::Sigmoid,
                gamma: Gamma::Scale
            }
        );
        assert_eq!(
            points[27],
            ClassifierParams::OneClass {
                nu: 0.01,
                kernel: KernelType::Rbf,
                gamma: Gamma::Scale
            }
        );
    }

    #[test]
    fn test_grid_file_with_defaults() {
        let json = r#"{
            "classifier": {"classifier": "mlp", "hidden_layer_sizes": [[100], [50, 20]], "alpha": [0.001, 0.01]},
            "bins": [8],
            "reductions": [{"type": "pca", "variance": 0.95}],
            "seed": 11
        }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bins, vec![8]);
        assert_eq!(config.seed, 11);
        assert!(config.encoder.is_none());

        let points = config.classifier.expand();
        assert_eq!(points.len(), 4);
        match &points[3] {
            ClassifierParams::Mlp(params) => {
                assert_eq!(params.hidden_layer_sizes, vec![50, 20]);
                assert_eq!(params.alpha, 0.01);
                assert_eq!(params.activation, Activation::Relu);
            }
            other => panic!("unexpected point {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_empty_lists() {
        let config = ExperimentConfig {
            bins: vec![],
            ..ExperimentConfig::default()
        };
        assert!(matches!(config.validate(), Err(HarnessError::ConfigError(_))));

        let config = ExperimentConfig {
            classifier: ClassifierGrid::Svc { c: vec![] },
            ..ExperimentConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_blocks() {
        let file = ConfigFile::parse(
            r#"{
                "UMN1_des": {"L": 15, "t1": -5, "t2": 1, "min_motion": 0.025, "fast_threshold": 20},
                "UMN_encoder": {"dir": "Encoders/UMN/"},
                "CVD_encoder": {"dir": "Encoders/CVD/", "policy": "required"}
            }"#,
        )
        .unwrap();

        let extraction = file.extraction("UMN1_des").unwrap();
        assert_eq!(extraction.trajectory_length, 15);
        assert_eq!(extraction.t1, -5.0);
        assert!(extraction.others.is_empty());

        let encoder = file.encoder("UMN_encoder").unwrap();
        assert_eq!(encoder.dir, PathBuf::from("Encoders/UMN/"));
        assert_eq!(encoder.policy, EncoderPolicy::Fallback);
        assert_eq!(
            file.encoder("CVD_encoder").unwrap().policy,
            EncoderPolicy::Required
        );

        assert!(matches!(
            file.extraction("CVD_des"),
            Err(HarnessError::ConfigError(_))
        ));
        assert!(file.extraction("UMN_encoder").is_err());
    }
}
