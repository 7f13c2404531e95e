//! Experiment harness for video anomaly detection
//!
//! Turns per-frame trajectory descriptors into normalized histograms and
//! cross-validates SVM, one-class SVM and MLP classifiers over them.

pub mod cache;
pub mod config;
pub mod core;
pub mod data;
pub mod experiment;
pub mod kernel;
pub mod metrics;
pub mod models;
pub mod persistence;
pub mod reduction;
pub mod solver;

// Re-export main types for convenience
pub use crate::cache::{CacheStats, KernelCache};
pub use crate::config::{ClassifierGrid, ConfigFile, ExperimentConfig, ExtractionParams};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{HarnessError, Result};
pub use crate::data::{DescriptorFile, GroundTruth, Sample};
pub use crate::experiment::{
    try_cvd, try_dataset, try_umn, try_umn_oc, DatasetSpec, ExperimentOutcome, Workspace,
};
pub use crate::metrics::EvaluationMetrics;
pub use crate::models::{ClassifierParams, FittedModel};
pub use crate::persistence::SavedModel;
pub use crate::reduction::{EncoderConfig, EncoderPolicy, Reduction};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
