//! Document lifecycle: keeps each record consistent with its blob on disk.
//!
//! ```text
//! UNBORN ──create──▶ RECORDED_NO_BLOB ──write blob──▶ COMPLETE
//! COMPLETE ──update (name only)──▶ COMPLETE          stored name/path/size unchanged
//! COMPLETE ──update (content)──▶ BLOB_REPLACING ──▶ COMPLETE
//! COMPLETE ──delete──▶ BLOB_REMOVED ──▶ GONE
//! ```
//!
//! The stored file name embeds the generated id, so create is two-phase:
//! insert the record, then write the blob and save the record again.
//!
//! Known limitations:
//! - If the blob write fails during create, the freshly inserted record is
//!   left behind without file fields. The error is surfaced, not healed.
//! - Concurrent update/delete on the same id are not coordinated beyond what
//!   the record store gives a single save.
//!
//! All calls block. Async callers dispatch them with `spawn_blocking`.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::blob::{BlobError, BlobStore};
use crate::document::{Document, DocumentId, Download, NewDocument, Upload};
use crate::error::DocumentError;
use crate::naming;
use crate::record::RecordStore;

/// Orchestrates record and blob mutations for documents.
#[derive(Clone)]
pub struct DocumentManager {
    records: Arc<dyn RecordStore>,
    blobs: Arc<dyn BlobStore>,
}

impl DocumentManager {
    pub fn new(records: Arc<dyn RecordStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { records, blobs }
    }

    /// Create a document from a non-empty upload.
    pub fn create(&self, name: &str, upload: Upload) -> Result<Document, DocumentError> {
        info!(name, "Creating document");
        if upload.is_empty() {
            error!(name, "Rejected create with empty upload");
            return Err(DocumentError::EmptyUpload);
        }

        let mut document = self.records.create(NewDocument::new(name))?;
        debug!(id = document.id, "Record saved, id generated");

        self.write_content(&mut document, &upload)?;
        let document = self.records.save(&document)?;

        info!(
            id = document.id,
            file_name = document.stored_file_name.as_deref().unwrap_or_default(),
            "Document created"
        );
        Ok(document)
    }

    /// Open the current blob of a document for streaming.
    pub fn fetch_for_download(&self, id: DocumentId) -> Result<Download, DocumentError> {
        info!(id, "Preparing download");
        let document = self.find(id)?;

        let (Some(path), Some(stored_file_name)) =
            (&document.stored_path, &document.stored_file_name)
        else {
            error!(id, "Document has no content");
            return Err(DocumentError::NotFound(id));
        };

        let opened = self.blobs.open_for_read(path).map_err(|e| {
            error!(id, error = %e, "Blob missing or unreadable");
            DocumentError::NotFound(id)
        })?;

        let file_name = naming::download_file_name(stored_file_name);
        info!(id, file_name, "Download prepared");
        Ok(Download {
            file: opened.file,
            file_name,
            len: opened.len,
        })
    }

    /// Rename and/or replace the content of a document.
    ///
    /// A rename alone keeps the stored file name; only new content
    /// regenerates it. Empty names and empty uploads count as absent.
    pub fn update(
        &self,
        id: DocumentId,
        name: Option<&str>,
        upload: Option<Upload>,
    ) -> Result<Document, DocumentError> {
        info!(id, "Updating document");
        let mut document = self.find(id)?;

        if let Some(name) = name.filter(|n| !n.is_empty()) {
            document.name = name.to_string();
            debug!(id, name, "Name updated");
        }

        if let Some(upload) = upload.filter(|u| !u.is_empty()) {
            if let Some(old_path) = document.stored_path.clone() {
                self.delete_blob(id, &old_path)?;
            }
            self.write_content(&mut document, &upload)?;
            info!(
                id,
                file_name = document.stored_file_name.as_deref().unwrap_or_default(),
                "Content replaced"
            );
        }

        let document = self.records.save(&document)?;
        info!(id, "Document updated");
        Ok(document)
    }

    /// Delete the blob (if any), then the record.
    ///
    /// If the blob cannot be removed the record is kept.
    pub fn delete(&self, id: DocumentId) -> Result<(), DocumentError> {
        info!(id, "Deleting document");
        let document = self.find(id)?;

        if let Some(path) = &document.stored_path {
            self.delete_blob(id, path)?;
        }
        self.records.delete(&document)?;

        info!(id, "Document deleted");
        Ok(())
    }

    /// Probe the record store and make sure the upload directory exists.
    pub fn check_ready(&self) -> Result<(), DocumentError> {
        self.records.count()?;
        self.blobs.ensure_root().map_err(storage_error)?;
        Ok(())
    }

    fn find(&self, id: DocumentId) -> Result<Document, DocumentError> {
        self.records.find_by_id(id)?.ok_or_else(|| {
            error!(id, "Document not found");
            DocumentError::NotFound(id)
        })
    }

    /// Write upload content under a freshly generated stored name and record
    /// the file fields on `document`. Does not save the record.
    fn write_content(&self, document: &mut Document, upload: &Upload) -> Result<(), DocumentError> {
        let stored_file_name =
            naming::generate_stored_name(&document.name, document.id, &upload.file_name);

        self.blobs.ensure_root().map_err(storage_error)?;
        let path = self.blobs.resolve(&stored_file_name);

        let written = self
            .blobs
            .write(&mut upload.content.as_ref(), &path)
            .map_err(|e| {
                error!(id = document.id, error = %e, "Blob write failed");
                storage_error(e)
            })?;

        document.stored_file_name = Some(stored_file_name);
        document.stored_path = Some(path);
        document.size_bytes = Some(written);
        Ok(())
    }

    fn delete_blob(&self, id: DocumentId, path: &Path) -> Result<(), DocumentError> {
        let removed = self.blobs.delete_if_exists(path).map_err(|e| {
            error!(id, error = %e, "Blob delete failed");
            storage_error(e)
        })?;
        if removed {
            debug!(id, path = %path.display(), "Old blob deleted");
        }
        Ok(())
    }
}

fn storage_error(err: BlobError) -> DocumentError {
    match err {
        BlobError::Unavailable { path, source } => {
            DocumentError::StorageUnavailable { path, source }
        }
        BlobError::Write { path, source } => DocumentError::StorageWriteFailed { path, source },
        BlobError::NotFound { path } => DocumentError::StorageWriteFailed {
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "blob not found"),
            path,
        },
    }
}
