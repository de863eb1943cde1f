//! Error types for the exporter.
//!
//! Only conditions that stop an export are errors. Graph resolution misses,
//! schema misses and invalid geometry are reported through `tracing` and
//! degrade locally instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for export operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Input file does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Plugin schema table is malformed
    #[error("Invalid plugin schema: {0}")]
    Schema(String),

    /// Scene description is malformed or references missing entities
    #[error("Invalid scene: {0}")]
    InvalidScene(String),

    /// Export settings are inconsistent
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// Buffer could not be encoded or decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an encoding error.
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Create an invalid scene error.
    pub fn scene(msg: impl Into<String>) -> Self {
        Self::InvalidScene(msg.into())
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::Schema("duplicate plugin GeomStaticMesh".into());
        assert!(e.to_string().contains("GeomStaticMesh"));

        let e = Error::encoding("odd hex length");
        assert!(e.to_string().starts_with("Encoding error"));

        let e = Error::scene("duplicate object Cube");
        assert_eq!(e.to_string(), "Invalid scene: duplicate object Cube");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
