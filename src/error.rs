//! Library error types. The binaries wrap these in `anyhow`.

use std::path::PathBuf;
use thiserror::Error;

/// A source-parsing backend could not produce entities for a file.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("{backend} backend unavailable: {message}")]
    Unavailable {
        backend: &'static str,
        message: String,
    },

    #[error("syntax error in {path} ({errors} error nodes)")]
    Syntax { path: PathBuf, errors: usize },

    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration file could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Batch conversion failure.
#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("{0} not found")]
    NotFound(PathBuf),

    #[error("failed to access {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
