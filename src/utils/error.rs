//! Error Handling Module
//!
//! Defines custom error types for the AI4EO CNN library.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for AI4EO CNN operations
#[derive(Error, Debug)]
pub enum Ai4EoError {
    /// Configuration error (fatal at startup)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error loading or interpreting an EO patch layer
    #[error("Failed to load layer '{1}' from patch '{0}': {2}")]
    PatchLayer(PathBuf, String, String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error reading or writing an HDF5 container
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Error with model operations
    #[error("Model error: {0}")]
    Model(String),

    /// Error with training
    #[error("Training error: {0}")]
    Training(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

/// Convenience Result type for AI4EO CNN operations
pub type Result<T> = std::result::Result<T, Ai4EoError>;
