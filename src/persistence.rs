//! Model serialization and persistence
//!
//! Fitted models can be written next to an experiment run and loaded back for
//! inspection or reuse. Files are pretty-printed JSON.

use crate::core::{Classifier, HarnessError, Prediction, Result};
use crate::models::FittedModel;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A fitted model together with its metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedModel {
    /// Model metadata
    pub metadata: ModelMetadata,
    /// The fitted classifier
    pub model: FittedModel,
}

/// Model metadata for tracking and validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Creation timestamp
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Classifier family
    pub model_type: String,
    /// Hyperparameters used for training
    pub description: String,
}

impl SavedModel {
    pub fn new(model: FittedModel, description: &str) -> Self {
        Self {
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                created_at: chrono::Utc::now(),
                model_type: model.model_type().to_string(),
                description: description.to_string(),
            },
            model,
        }
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(HarnessError::IoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| HarnessError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(HarnessError::IoError)?;
        let reader = BufReader::new(file);
        let model = serde_json::from_reader(reader)
            .map_err(|e| HarnessError::SerializationError(e.to_string()))?;
        Ok(model)
    }

    /// Print model summary
    pub fn print_summary(&self) {
        println!("=== Model Summary ===");
        println!("Model Type: {}", self.metadata.model_type);
        println!("Parameters: {}", self.metadata.description);
        match &self.model {
            FittedModel::Svc(m) => {
                println!("Kernel: {}", m.kernel().kind());
                println!("Support Vectors: {}", m.n_support_vectors());
                let weights = m.class_weights();
                println!(
                    "Class Weights: normal={:.4}, anomalous={:.4}",
                    weights.normal, weights.anomalous
                );
            }
            FittedModel::OneClass(m) => {
                println!("Kernel: {}", m.kernel().kind());
                println!("Support Vectors: {}", m.n_support_vectors());
            }
            FittedModel::Mlp(m) => {
                println!("Hidden Layers: {:?}", m.params().hidden_layer_sizes);
                println!("Epochs: {}", m.epochs());
                println!("Final Loss: {:.6}", m.loss());
            }
        }
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at.to_rfc3339());
    }
}

impl Classifier for SavedModel {
    fn predict(&self, features: &[f64]) -> Prediction {
        self.model.predict(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Label;
    use crate::models::train_svc;
    use tempfile::NamedTempFile;

    #[test]
    fn test_model_serialization() -> Result<()> {
        let samples = vec![vec![2.0, 0.0], vec![1.5, 0.2], vec![-2.0, 0.1], vec![-1.0, 0.0]];
        let labels = vec![Label::Normal, Label::Normal, Label::Anomalous, Label::Anomalous];

        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        let model = train_svc(&samples, &labels, 4.0, Some(temp_file.path()))?;

        let loaded = SavedModel::load_from_file(temp_file.path())?;

        assert_eq!(loaded.metadata.model_type, "svc");
        assert_eq!(loaded.metadata.description, "svc C=4");
        assert_eq!(loaded.metadata.library_version, env!("CARGO_PKG_VERSION"));
        match &loaded.model {
            FittedModel::Svc(m) => assert_eq!(m.n_support_vectors(), model.n_support_vectors()),
            other => panic!("unexpected model type: {}", other.model_type()),
        }
        assert_eq!(loaded.predict_labels(&samples), model.predict_labels(&samples));

        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let result = SavedModel::load_from_file("/nonexistent/model.json");
        assert!(matches!(result, Err(HarnessError::IoError(_))));
    }

    #[test]
    fn test_load_malformed_file() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        std::fs::write(temp_file.path(), "{ not json").unwrap();
        let result = SavedModel::load_from_file(temp_file.path());
        assert!(matches!(result, Err(HarnessError::SerializationError(_))));
    }
}
