//! Document record storage.
//!
//! Three backends implement [`RecordStore`]:
//! - [`SqliteRecordStore`]: relational, one row per document (default)
//! - [`FileRecordStore`]: embedded, one YAML file per document
//! - [`MemoryRecordStore`]: process-local, for tests and throwaway instances
//!
//! Every call is synchronous and durable on return. A single record's
//! read-modify-write is not locked across calls.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{RecordBackend, RecordsConfig};
use crate::document::{Document, DocumentId, NewDocument};

mod file;
mod memory;
mod sqlite;

pub use file::FileRecordStore;
pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

pub type RecordResult<T> = Result<T, RecordError>;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("failed to encode record {id}: {message}")]
    Encode { id: DocumentId, message: String },

    #[error("failed to decode record {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    #[error("unknown record id: {0}")]
    UnknownId(DocumentId),

    #[error("record store lock poisoned")]
    Poisoned,
}

impl RecordError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Durable mapping from id to document metadata.
pub trait RecordStore: Send + Sync {
    /// Persist a new record and return it with its generated id.
    fn create(&self, new: NewDocument) -> RecordResult<Document>;

    fn find_by_id(&self, id: DocumentId) -> RecordResult<Option<Document>>;

    /// Overwrite an existing record. Fails with `UnknownId` if it is absent.
    fn save(&self, document: &Document) -> RecordResult<Document>;

    fn delete(&self, document: &Document) -> RecordResult<()>;

    fn count(&self) -> RecordResult<u64>;

    fn list_all(&self) -> RecordResult<Vec<Document>>;
}

/// Open the backend selected in configuration.
pub fn open(config: &RecordsConfig) -> RecordResult<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match config.backend {
        RecordBackend::Sqlite => Arc::new(SqliteRecordStore::open(&config.path)?),
        RecordBackend::File => Arc::new(FileRecordStore::open(&config.path)?),
        RecordBackend::Memory => Arc::new(MemoryRecordStore::new()),
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    //! Contract checks run against every backend.

    use super::*;
    use tempfile::TempDir;

    fn backends(tmp: &TempDir) -> Vec<(&'static str, Arc<dyn RecordStore>)> {
        let memory: Arc<dyn RecordStore> = Arc::new(MemoryRecordStore::new());
        let file: Arc<dyn RecordStore> =
            Arc::new(FileRecordStore::open(tmp.path().join("records")).unwrap());
        let sqlite: Arc<dyn RecordStore> =
            Arc::new(SqliteRecordStore::open(tmp.path().join("docs.db")).unwrap());
        vec![("memory", memory), ("file", file), ("sqlite", sqlite)]
    }

    #[test]
    fn create_assigns_distinct_increasing_ids() {
        let tmp = TempDir::new().unwrap();
        for (backend, store) in backends(&tmp) {
            let a = store.create(NewDocument::new("a")).unwrap();
            let b = store.create(NewDocument::new("b")).unwrap();
            assert!(b.id > a.id, "{backend}");
            assert!(a.stored_path.is_none(), "{backend}");
            assert_eq!(store.count().unwrap(), 2, "{backend}");
        }
    }

    #[test]
    fn save_then_find_returns_updated_fields() {
        let tmp = TempDir::new().unwrap();
        for (backend, store) in backends(&tmp) {
            let mut doc = store.create(NewDocument::new("Contrato")).unwrap();
            doc.stored_file_name = Some(format!("Contrato_{:02}.txt", doc.id));
            doc.stored_path = Some(PathBuf::from("/srv/uploads/Contrato_01.txt"));
            doc.size_bytes = Some(5);
            store.save(&doc).unwrap();

            let found = store.find_by_id(doc.id).unwrap().unwrap();
            assert_eq!(found, doc, "{backend}");
        }
    }

    #[test]
    fn created_at_survives_round_trip() {
        let tmp = TempDir::new().unwrap();
        for (backend, store) in backends(&tmp) {
            let new = NewDocument::new("x");
            let created_at = new.created_at;
            let doc = store.create(new).unwrap();
            let found = store.find_by_id(doc.id).unwrap().unwrap();
            assert_eq!(found.created_at, created_at, "{backend}");
        }
    }

    #[test]
    fn save_unknown_id_fails() {
        let tmp = TempDir::new().unwrap();
        for (backend, store) in backends(&tmp) {
            let mut doc = store.create(NewDocument::new("x")).unwrap();
            doc.id += 100;
            let err = store.save(&doc).unwrap_err();
            assert!(matches!(err, RecordError::UnknownId(_)), "{backend}: {err}");
        }
    }

    #[test]
    fn delete_removes_record() {
        let tmp = TempDir::new().unwrap();
        for (backend, store) in backends(&tmp) {
            let keep = store.create(NewDocument::new("keep")).unwrap();
            let gone = store.create(NewDocument::new("gone")).unwrap();
            store.delete(&gone).unwrap();

            assert!(store.find_by_id(gone.id).unwrap().is_none(), "{backend}");
            assert!(store.find_by_id(keep.id).unwrap().is_some(), "{backend}");
            assert_eq!(store.count().unwrap(), 1, "{backend}");
        }
    }

    #[test]
    fn list_all_is_ordered_by_id() {
        let tmp = TempDir::new().unwrap();
        for (backend, store) in backends(&tmp) {
            for name in ["a", "b", "c"] {
                store.create(NewDocument::new(name)).unwrap();
            }
            let names: Vec<_> = store
                .list_all()
                .unwrap()
                .into_iter()
                .map(|d| d.name)
                .collect();
            assert_eq!(names, vec!["a", "b", "c"], "{backend}");
        }
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let tmp = TempDir::new().unwrap();
        for (backend, store) in backends(&tmp) {
            store.create(NewDocument::new("a")).unwrap();
            let last = store.create(NewDocument::new("b")).unwrap();
            store.delete(&last).unwrap();
            let next = store.create(NewDocument::new("c")).unwrap();
            assert!(next.id > last.id, "{backend}");
        }
    }

    #[test]
    fn out_of_range_id_is_absent() {
        let tmp = TempDir::new().unwrap();
        for (backend, store) in backends(&tmp) {
            store.create(NewDocument::new("a")).unwrap();
            assert!(store.find_by_id(u64::MAX).unwrap().is_none(), "{backend}");

            let mut ghost = store.create(NewDocument::new("ghost")).unwrap();
            store.delete(&ghost).unwrap();
            ghost.id = u64::MAX;
            store.delete(&ghost).unwrap();
            assert_eq!(store.count().unwrap(), 1, "{backend}");

            let err = store.save(&ghost).unwrap_err();
            assert!(matches!(err, RecordError::UnknownId(_)), "{backend}: {err}");
        }
    }

    #[test]
    fn open_memory_backend_from_config() {
        let config = RecordsConfig {
            backend: RecordBackend::Memory,
            path: PathBuf::from("unused"),
        };
        let store = open(&config).unwrap();
        assert_eq!(store.count().unwrap(), 0);
    }
}
