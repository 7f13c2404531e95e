//! Error types for the experiment harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Training set contains a single class: {0}")]
    SingleClass(String),

    #[error("Sample {0} has no ground truth entry")]
    MissingGroundTruth(String),

    #[error("Invalid ground truth: {0}")]
    InvalidGroundTruth(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Encoder error: {0}")]
    EncoderError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, HarnessError>;
