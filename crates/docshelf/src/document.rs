//! The document entity and the values that flow in and out of the lifecycle.

use std::fs::File;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the record store on first save.
pub type DocumentId = u64;

/// Metadata describing one uploaded file.
///
/// The file fields stay `None` until content has been written at least once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    #[serde(default)]
    pub stored_file_name: Option<String>,
    #[serde(default)]
    pub stored_path: Option<PathBuf>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    pub created_at: DateTime<Utc>,
}

/// A document that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl NewDocument {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

/// Uploaded content together with the file name the client sent.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Original file name; only its extension is kept.
    pub file_name: String,
    pub content: Bytes,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// An opened blob ready to be streamed back to a client.
#[derive(Debug)]
pub struct Download {
    /// Positioned at the start of the file.
    pub file: File,
    pub file_name: String,
    pub len: u64,
}
