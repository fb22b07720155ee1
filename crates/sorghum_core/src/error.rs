//! Error taxonomy shared by every crate in the workspace.
//!
//! Numerical degeneracy is never reported here; it is guarded inline where
//! it can occur.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Invalid descriptor or settings (non-monotonic curve, zero leaf count, ...)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A referenced entity, renderer or asset is missing
    #[error("collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// An export or import path could not be opened, read or written
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted document could not be encoded or decoded
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Error::CollaboratorUnavailable(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
