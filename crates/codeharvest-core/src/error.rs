//! Error types for codeharvest.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for codeharvest operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid extraction configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Extractor resolution or parsing failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// Checkpoint storage failed
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Worker pool failed
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Raised while constructing a configuration, before any work begins.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("worker count must be a positive integer, got {0}")]
    InvalidWorkers(usize),

    #[error("paths cannot be both excluded and exclusive: {0:?}")]
    OverlappingSubpaths(Vec<PathBuf>),

    #[error("checkpoint interval must be non-negative, got {0}")]
    NegativeCheckpoint(i64),

    #[error("subpath {subpath:?} is not beneath {root:?}")]
    SubpathOutsideRoot { subpath: PathBuf, root: PathBuf },

    #[error("\"{0}\" is not a known extractor")]
    UnknownExtractor(String),
}

/// Extractor resolution and per-file extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported language: {0}")]
    NotFound(String),

    #[error("parse error in {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("cannot read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("grammar error: {0}")]
    Grammar(String),

    #[error("invalid arguments for {language} extractor: {message}")]
    InvalidArguments { language: String, message: String },

    #[error("invalid byte range: start {start} is after end {end}")]
    InvalidRange { start: usize, end: usize },
}

impl ExtractError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ExtractError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Checkpoint storage errors.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("checkpoint io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt checkpoint {path:?}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A user transform rejected a unit. Logged and swallowed by the aggregator.
#[derive(Error, Debug)]
#[error("transform failed for {uid}: {message}")]
pub struct TransformError {
    pub uid: String,
    pub message: String,
}

/// Worker pool errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("work item failed: {0}")]
    Failed(String),

    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// Result type alias for codeharvest operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NegativeCheckpoint(-3);
        assert_eq!(
            err.to_string(),
            "checkpoint interval must be non-negative, got -3"
        );

        let err = ConfigError::UnknownExtractor("Cobol".to_string());
        assert_eq!(err.to_string(), "\"Cobol\" is not a known extractor");
    }

    #[test]
    fn test_extract_error_not_found_display() {
        let err = ExtractError::NotFound("Fortran".to_string());
        assert_eq!(err.to_string(), "unsupported language: Fortran");
    }

    #[test]
    fn test_extract_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ExtractError::io("main.c", io_err);
        assert!(err.to_string().contains("main.c"));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_error_from_config_error() {
        let err: Error = ConfigError::InvalidWorkers(0).into();
        assert!(matches!(err, Error::Config(ConfigError::InvalidWorkers(0))));
        assert!(err.to_string().starts_with("configuration error"));
    }

    #[test]
    fn test_error_chain_extract_to_main() {
        let err: Error = ExtractError::parse("a.c", "missing name").into();
        assert!(matches!(err, Error::Extraction(ExtractError::Parse { .. })));
        assert!(err.to_string().contains("missing name"));
    }

    #[test]
    fn test_transform_error_display() {
        let err = TransformError {
            uid: "main.c::add".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "transform failed for main.c::add: boom");
    }
}
