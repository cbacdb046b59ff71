use thiserror::Error;

use crate::config::AlgorithmId;
use crate::graph::GraphError;

/// Errors raised while building, training or persisting classifiers.
#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("Unknown training algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Training strategy not initialized")]
    NullStrategy,

    #[error("Dataset to be trained is missing")]
    MissingDataset,

    #[error("Training strategy to be updated is missing")]
    MissingStrategy,

    #[error("Trained model to be stored is missing")]
    MissingModel,

    #[error("{0} does not support incremental training")]
    IncrementalUnsupported(AlgorithmId),

    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Inconsistent model: {0}")]
    InvalidModel(String),

    #[error("Model cannot be serialized: {0}")]
    UnserializableModel(String),

    #[error("Failed to serialize model: {0}")]
    SerializationFailed(String),

    #[error("Failed to deserialize model: {0}")]
    DeserializationFailed(String),

    #[error("Corrupt graph document: {0}")]
    CorruptDocument(#[from] GraphError),

    #[error("Document holds no model statement")]
    NoModelStatement,

    #[error("Document holds {0} model statements, expected exactly one")]
    AmbiguousModelStatement(usize),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for classification operations
pub type Result<T> = std::result::Result<T, ClassifyError>;
