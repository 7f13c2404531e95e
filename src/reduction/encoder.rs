//! Pre-trained dense encoder
//!
//! The encoder half of an autoencoder trained outside the harness, exported as
//! a JSON list of dense layers:
//!
//! [{"weights": [[...], ...], "bias": [...], "activation": "relu"}, ...]
//!
//! `weights` is out × in. One file per bin count, `encoder<n_bins>.json`.

use crate::core::{FeatureTransform, HarnessError, Result};
use crate::models::Activation;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl EncoderLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| {
                let z = row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>() + b;
                self.activation.apply(z)
            })
            .collect()
    }

    fn input_dim(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Encoder {
    layers: Vec<EncoderLayer>,
}

impl Encoder {
    /// Build from layers, checking that consecutive shapes agree
    pub fn new(layers: Vec<EncoderLayer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(HarnessError::EncoderError("Encoder has no layers".to_string()));
        }

        let mut expected = layers[0].input_dim();
        for (i, layer) in layers.iter().enumerate() {
            if layer.weights.is_empty() || layer.weights.len() != layer.bias.len() {
                return Err(HarnessError::EncoderError(format!(
                    "Layer {i}: {} weight rows for {} biases",
                    layer.weights.len(),
                    layer.bias.len()
                )));
            }
            if let Some(row) = layer.weights.iter().find(|r| r.len() != expected) {
                return Err(HarnessError::EncoderError(format!(
                    "Layer {i}: expected {expected} inputs, got {}",
                    row.len()
                )));
            }
            expected = layer.bias.len();
        }

        Ok(Self { layers })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            HarnessError::EncoderError(format!("Cannot open {}: {e}", path.display()))
        })?;
        let layers: Vec<EncoderLayer> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| HarnessError::EncoderError(format!("{}: {e}", path.display())))?;
        Self::new(layers)
    }

    /// Encoder file for a bin count
    pub fn path_for(dir: &Path, n_bins: usize) -> PathBuf {
        dir.join(format!("encoder{n_bins}.json"))
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].input_dim()
    }

    /// Fail unless the encoder accepts vectors of length `dim`
    pub fn check_input(&self, dim: usize) -> Result<()> {
        if self.input_dim() != dim {
            return Err(HarnessError::EncoderError(format!(
                "Encoder expects {} inputs, histograms have {dim}",
                self.input_dim()
            )));
        }
        Ok(())
    }
}

impl FeatureTransform for Encoder {
    fn output_dim(&self) -> usize {
        self.layers.last().map_or(0, |l| l.bias.len())
    }

    fn transform(&self, features: &[f64]) -> Vec<f64> {
        self.layers
            .iter()
            .fold(features.to_vec(), |x, layer| layer.forward(&x))
    }
}
