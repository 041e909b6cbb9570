use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors returned by [`crate::store::LinkStore`] operations.
///
/// `Io`, `Parse` and `Serialize` all happen at the filesystem boundary;
/// `Watch` is only ever logged by the watcher task.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("link not found: {0}")]
    NotFound(String),

    #[error("link alias already exists: {0}")]
    AlreadyExists(String),

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize links: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
