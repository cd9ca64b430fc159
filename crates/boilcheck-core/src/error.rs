//! Fatal (non-diagnostic) error type.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures that abort the run, as opposed to per-call diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid package pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown driver {0:?}")]
    UnknownDriver(String),

    #[error(transparent)]
    Postgres(#[from] postgres::Error),
}
