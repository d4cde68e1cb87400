use std::path::PathBuf;

use rl_core::{FormatError, Identifier};

/// Errors from a rule list store. The manager treats every one as a miss.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stored list for '{identifier}' is corrupt: {source}")]
    Corrupt {
        identifier: Identifier,
        #[source]
        source: FormatError,
    },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised while setting up the resolver. Resolution itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("No tokio runtime available to run the compile worker")]
    NoRuntime,

    #[error("Failed to read config {path}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
