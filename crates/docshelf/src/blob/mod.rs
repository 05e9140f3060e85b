//! Blob storage: the raw bytes of each document, one file per document.
//!
//! The lifecycle only talks to the [`BlobStore`] trait; [`FsBlobStore`] is the
//! filesystem implementation rooted at the configured upload directory.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

mod fs;

pub use fs::FsBlobStore;

/// Errors from blob operations. Each carries the path it was about.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("cannot create storage directory {}: {source}", path.display())]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("blob not found or unreadable: {}", path.display())]
    NotFound { path: PathBuf },
}

/// A blob opened for reading.
#[derive(Debug)]
pub struct OpenedBlob {
    pub file: File,
    pub len: u64,
}

/// Storage for document content.
pub trait BlobStore: Send + Sync {
    /// Create the base directory (and parents) if absent and return it.
    fn ensure_root(&self) -> Result<PathBuf, BlobError>;

    /// Join the base directory and a stored file name. No existence check.
    fn resolve(&self, stored_file_name: &str) -> PathBuf;

    /// Copy all of `source` to `target`, replacing any existing file.
    ///
    /// Readers never observe a partially written file. Returns the number of
    /// bytes written.
    fn write(&self, source: &mut dyn Read, target: &Path) -> Result<u64, BlobError>;

    /// Remove the file if present. Returns whether a file was removed.
    fn delete_if_exists(&self, path: &Path) -> Result<bool, BlobError>;

    /// Open a regular, readable file.
    fn open_for_read(&self, path: &Path) -> Result<OpenedBlob, BlobError>;
}
