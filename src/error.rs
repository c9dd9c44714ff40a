//! Error taxonomy for churn inference

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ChurnError>;

/// Top-level error returned by the reconciler, the adapter and the service.
#[derive(Debug, Error)]
pub enum ChurnError {
    #[error("invalid input: {0}")]
    Input(#[from] InputError),

    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ModelError),

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("inference failed: {0}")]
    Inference(String),
}

/// Caller-facing payload problems. Not retryable without fixing the payload.
#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error("unsupported input type: {0}")]
    UnsupportedInputType(String),

    #[error("invalid value {value:?} for {field}, expected one of {allowed:?}")]
    InvalidCategory {
        field: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("record {row} is missing field {field}")]
    MissingField { field: String, row: usize },

    #[error("record {row} has field {field} not present in the first record")]
    UnexpectedField { field: String, row: usize },

    #[error("record {row} has non-numeric value for {field}")]
    NonNumericField { field: String, row: usize },

    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("table row {row} has {found} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("batch of {size} records exceeds the limit of {max}")]
    BatchTooLarge { size: usize, max: usize },

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Model artifact could not be made available.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model {name} not found in {}", dir.display())]
    NotFound { name: String, dir: PathBuf },

    #[error("failed to load model {name}: {reason}")]
    Load { name: String, reason: String },

    #[error("no model candidates configured")]
    NoCandidates,

    #[error("no model loaded")]
    NotLoaded,
}

/// How a serving layer should surface an error to its clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fix the payload and resend.
    BadRequest,
    /// The adapter cannot serve; not a client fault.
    ServiceUnavailable,
    /// Internal inconsistency between the input, the schema and the model.
    Internal,
}

impl ChurnError {
    /// Classify the error for the serving layer.
    pub fn class(&self) -> ErrorClass {
        match self {
            ChurnError::Input(_) => ErrorClass::BadRequest,
            ChurnError::ModelUnavailable(_) => ErrorClass::ServiceUnavailable,
            ChurnError::SchemaMismatch(_) | ChurnError::Inference(_) => ErrorClass::Internal,
        }
    }

    pub(crate) fn inference(err: impl std::fmt::Display) -> Self {
        ChurnError::Inference(err.to_string())
    }
}
