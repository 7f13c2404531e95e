//! Core type definitions for the harness

use serde::{Deserialize, Serialize};
use std::fmt;

/// Class of a video or frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    /// Normal behaviour (+1)
    Normal,
    /// Anomalous behaviour (-1)
    Anomalous,
}

impl Label {
    /// Numeric value used by the ground truth files and the classifiers
    pub fn as_f64(self) -> f64 {
        match self {
            Label::Normal => 1.0,
            Label::Anomalous => -1.0,
        }
    }

    /// Label from the sign of a decision value (strictly positive is normal)
    pub fn from_decision(value: f64) -> Self {
        if value > 0.0 {
            Label::Normal
        } else {
            Label::Anomalous
        }
    }

    /// Parse the `1` / `-1` notation of the ground truth files
    pub fn from_value(value: i64) -> Option<Self> {
        match value {
            1 => Some(Label::Normal),
            -1 => Some(Label::Anomalous),
            _ => None,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_f64() as i64)
    }
}

/// What a single classified sample represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    /// One histogram and one label per video
    Video,
    /// One histogram and one label per frame
    Frame,
}

impl ClassificationMode {
    pub fn is_video(self) -> bool {
        matches!(self, ClassificationMode::Video)
    }
}

/// Prediction result containing label and decision value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Predicted class
    pub label: Label,
    /// Raw decision function value (probability for networks)
    pub decision_value: f64,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: Label, decision_value: f64) -> Self {
        Self {
            label,
            decision_value,
        }
    }
}

/// Histogram vectors with their labels, in matching order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistogramSet {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<Label>,
}

impl HistogramSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, features: Vec<f64>, label: Label) {
        self.features.push(features);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Length of the vectors, 0 for an empty set
    pub fn dim(&self) -> usize {
        self.features.first().map_or(0, Vec::len)
    }

    /// Drop every sample whose vector is all zeros
    pub fn retain_non_empty(&mut self) {
        let (features, labels): (Vec<_>, Vec<_>) = self
            .features
            .drain(..)
            .zip(self.labels.drain(..))
            .filter(|(features, _)| !is_zero_vector(features))
            .unzip();
        self.features = features;
        self.labels = labels;
    }

    /// Number of (normal, anomalous) samples
    pub fn class_counts(&self) -> (usize, usize) {
        let normal = self.labels.iter().filter(|&&l| l == Label::Normal).count();
        (normal, self.labels.len() - normal)
    }
}

/// Result of the dual optimization
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Lagrange multipliers (alpha values)
    pub alpha: Vec<f64>,
    /// Offset subtracted from the decision function
    pub rho: f64,
    /// Indices of support vectors (where alpha > 0)
    pub support_vectors: Vec<usize>,
    /// Number of iterations performed
    pub iterations: usize,
    /// Final objective value
    pub objective_value: f64,
}

/// Configuration for the dual solver
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Stopping tolerance on the maximal KKT violation
    pub epsilon: f64,
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Kernel cache size in bytes
    pub cache_size: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.001,
            max_iterations: 10_000_000,
            cache_size: 100_000_000, // 100MB
        }
    }
}

/// True when no component is non-zero
pub fn is_zero_vector(values: &[f64]) -> bool {
    values.iter().all(|&v| v == 0.0)
}
