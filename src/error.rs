//! Error Handling Module
//!
//! Defines custom error types for the pacemaker identification pipeline.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for pacemaker-id operations
///
/// Every failure is fatal to the current run; there are no retries.
#[derive(Error, Debug)]
pub enum PacemakerError {
    /// Configuration error (bad file, bad value, unknown device string)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Kaggle credentials are missing or unreadable
    #[error("Credential error: {0}")]
    Credential(String),

    /// A required dataset directory does not exist
    #[error("Directory not found: '{path}'. {hint}")]
    DirectoryMissing { path: PathBuf, hint: String },

    /// Architecture name not in the supported set
    #[error("Unsupported architecture: '{0}' (expected densenet121, resnet50 or mobilenet_v3_small)")]
    UnsupportedArchitecture(String),

    /// Input tensor shape does not match what the model expects
    #[error("Shape mismatch: model expects {expected}-channel images at least 16x16, batch has shape {found:?}")]
    ShapeMismatch { expected: usize, found: Vec<usize> },

    /// Error loading or processing an image
    #[error("Failed to load image at '{path}': {reason}")]
    Image { path: PathBuf, reason: String },

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Dataset download failed (kaggle CLI)
    #[error("Download error: {0}")]
    Download(String),

    /// Checkpoint file does not exist
    #[error("Checkpoint not found: '{0}'")]
    CheckpointNotFound(PathBuf),

    /// Checkpoint file exists but cannot be decoded
    #[error("Checkpoint at '{path}' is corrupt: {reason}")]
    CheckpointCorrupt { path: PathBuf, reason: String },

    /// Model/optimizer state (de)serialization failure
    #[error("Record error: {0}")]
    Record(String),

    /// Export bundle error (bad flags, label mismatch)
    #[error("Export error: {0}")]
    Export(String),

    /// Engine used outside its state machine (e.g. re-running a finished run)
    #[error("Invalid engine state: {0}")]
    InvalidState(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Convenience Result type for pacemaker-id operations
pub type Result<T> = std::result::Result<T, PacemakerError>;

impl From<serde_json::Error> for PacemakerError {
    fn from(err: serde_json::Error) -> Self {
        PacemakerError::Serialization(err.to_string())
    }
}

impl From<burn::record::RecorderError> for PacemakerError {
    fn from(err: burn::record::RecorderError) -> Self {
        PacemakerError::Record(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PacemakerError::Dataset("test error".to_string());
        assert_eq!(format!("{}", err), "Dataset error: test error");
    }

    #[test]
    fn test_unsupported_architecture_names_offender() {
        let err = PacemakerError::UnsupportedArchitecture("vgg16".to_string());
        assert!(format!("{}", err).contains("vgg16"));
    }

    #[test]
    fn test_directory_missing_carries_hint() {
        let err = PacemakerError::DirectoryMissing {
            path: PathBuf::from("data/train"),
            hint: "Run the download-data command first".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("data/train"));
        assert!(msg.contains("download-data"));
    }

    #[test]
    fn test_shape_mismatch_display() {
        let err = PacemakerError::ShapeMismatch {
            expected: 3,
            found: vec![4, 1, 224, 224],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("3-channel"));
        assert!(msg.contains("[4, 1, 224, 224]"));
    }
}
