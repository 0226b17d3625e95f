//! Error types for the scan pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid image: {0}")]
    Decode(String),

    #[error("{0} is not fitted")]
    NotFitted(&'static str),

    #[error("{0} is already fitted")]
    AlreadyFitted(&'static str),

    #[error("Shape mismatch: expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl ScanError {
    /// Stable machine-readable code for this error kind
    pub fn code(&self) -> &'static str {
        match self {
            ScanError::Decode(_) => "invalid_image",
            ScanError::NotFitted(_) => "not_fitted",
            ScanError::AlreadyFitted(_) => "already_fitted",
            ScanError::ShapeMismatch { .. } => "shape_mismatch",
            ScanError::InvalidParameter(_) => "invalid_parameter",
            ScanError::InvalidDataset(_) => "invalid_dataset",
            ScanError::EmptyDataset => "empty_dataset",
            ScanError::IoError(_) => "io_error",
            ScanError::ImageError(_) => "image_error",
            ScanError::SerializationError(_) => "serialization_error",
            ScanError::ParseError(_) => "parse_error",
        }
    }

    /// Convert into the report shape returned across the inference boundary
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Error as seen by callers of the inference boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
}

impl From<&ScanError> for ErrorReport {
    fn from(err: &ScanError) -> Self {
        err.report()
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
