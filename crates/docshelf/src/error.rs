//! Document lifecycle errors.

use std::path::PathBuf;

use thiserror::Error;

use crate::document::DocumentId;
use crate::record::RecordError;

/// Errors surfaced by [`crate::DocumentManager`].
///
/// None of these are retried internally.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// Create was called without any bytes. No record is written.
    #[error("uploaded file is empty")]
    EmptyUpload,

    /// No record for the id, or its blob is missing or unreadable.
    #[error("document not found: {0}")]
    NotFound(DocumentId),

    /// Writing or deleting a blob failed.
    #[error("failed to write {}: {source}", path.display())]
    StorageWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The upload directory could not be created.
    #[error("storage directory unavailable {}: {source}", path.display())]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record store itself failed.
    #[error("record store error: {0}")]
    Record(#[from] RecordError),
}

impl DocumentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DocumentError::NotFound(_))
    }
}
