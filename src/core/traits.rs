//! Core traits for classifiers and feature transforms

use crate::core::{Label, Prediction};

/// A fitted classifier
pub trait Classifier {
    /// Predict a single histogram vector
    fn predict(&self, features: &[f64]) -> Prediction;

    /// Predict multiple vectors
    fn predict_batch(&self, samples: &[Vec<f64>]) -> Vec<Prediction> {
        samples.iter().map(|s| self.predict(s)).collect()
    }

    /// Predicted labels only
    fn predict_labels(&self, samples: &[Vec<f64>]) -> Vec<Label> {
        self.predict_batch(samples)
            .into_iter()
            .map(|p| p.label)
            .collect()
    }
}

/// Maps histogram vectors into another feature space (PCA, encoders)
pub trait FeatureTransform {
    /// Dimension of the output vectors
    fn output_dim(&self) -> usize;

    /// Transform a single vector
    fn transform(&self, features: &[f64]) -> Vec<f64>;

    /// Transform multiple vectors
    fn transform_batch(&self, samples: &[Vec<f64>]) -> Vec<Vec<f64>> {
        samples.iter().map(|s| self.transform(s)).collect()
    }
}
