//! Error type for the storage core.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    /// The remote object has never been written.
    #[error("Object not found")]
    ObjectNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStore(object_store::Error),

    #[error("{path}: unknown type flag: {type_flag:?}")]
    UnknownEntryType { path: String, type_flag: char },

    #[error("Unsupported file type: {}", .0.display())]
    UnsupportedFileType(PathBuf),

    #[error("Invalid archive path: {0}")]
    InvalidPath(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bucket error: {0}")]
    Bucket(String),

    #[cfg(feature = "gcs")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    /// True for the distinguished "nothing stored yet" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::ObjectNotFound)
    }
}

impl From<object_store::Error> for StorageError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => StorageError::ObjectNotFound,
            other => StorageError::ObjectStore(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
