//! In-memory record store.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use super::{RecordError, RecordResult, RecordStore};
use crate::document::{Document, DocumentId, NewDocument};

#[derive(Debug, Default)]
struct Inner {
    next_id: DocumentId,
    documents: BTreeMap<DocumentId, Document>,
}

/// Record store backed by a `BTreeMap`. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    inner: Mutex<Inner>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> RecordResult<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| RecordError::Poisoned)
    }
}

impl RecordStore for MemoryRecordStore {
    fn create(&self, new: NewDocument) -> RecordResult<Document> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let document = Document {
            id: inner.next_id,
            name: new.name,
            stored_file_name: None,
            stored_path: None,
            size_bytes: None,
            created_at: new.created_at,
        };
        inner.documents.insert(document.id, document.clone());
        Ok(document)
    }

    fn find_by_id(&self, id: DocumentId) -> RecordResult<Option<Document>> {
        Ok(self.lock()?.documents.get(&id).cloned())
    }

    fn save(&self, document: &Document) -> RecordResult<Document> {
        let mut inner = self.lock()?;
        let Some(slot) = inner.documents.get_mut(&document.id) else {
            return Err(RecordError::UnknownId(document.id));
        };
        *slot = document.clone();
        Ok(document.clone())
    }

    fn delete(&self, document: &Document) -> RecordResult<()> {
        self.lock()?.documents.remove(&document.id);
        Ok(())
    }

    fn count(&self) -> RecordResult<u64> {
        Ok(self.lock()?.documents.len() as u64)
    }

    fn list_all(&self) -> RecordResult<Vec<Document>> {
        Ok(self.lock()?.documents.values().cloned().collect())
    }
}
