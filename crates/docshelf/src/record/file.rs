//! Embedded record store: one YAML file per document.
//!
//! Layout under the configured directory:
//!
//! ```text
//! <dir>/
//! ├── sequence          # last id handed out
//! └── documents/
//!     ├── 1.yaml
//!     └── 2.yaml
//! ```
//!
//! All writes go through a temp file + rename so a crash never leaves a
//! half-written record behind.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use super::{RecordError, RecordResult, RecordStore};
use crate::document::{Document, DocumentId, NewDocument};

const DOCUMENTS_DIR: &str = "documents";
const SEQUENCE_FILE: &str = "sequence";

#[derive(Debug)]
pub struct FileRecordStore {
    dir: PathBuf,
    /// Last id handed out. Also serialises writers.
    sequence: Mutex<DocumentId>,
}

impl FileRecordStore {
    /// Open (or initialise) a store rooted at `dir`.
    ///
    /// The id sequence resumes from the `sequence` file, or from the largest
    /// record on disk if that is higher.
    pub fn open(dir: impl AsRef<Path>) -> RecordResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        let documents_dir = dir.join(DOCUMENTS_DIR);
        fs::create_dir_all(&documents_dir).map_err(|e| RecordError::io(&documents_dir, e))?;

        let stored_sequence = read_sequence(&dir.join(SEQUENCE_FILE))?;
        let max_on_disk = record_ids(&documents_dir)?.into_iter().max().unwrap_or(0);

        Ok(Self {
            dir,
            sequence: Mutex::new(stored_sequence.max(max_on_disk)),
        })
    }

    fn record_path(&self, id: DocumentId) -> PathBuf {
        self.dir.join(DOCUMENTS_DIR).join(format!("{id}.yaml"))
    }

    fn write_record(&self, document: &Document) -> RecordResult<()> {
        let yaml = serde_saphyr::to_string(document).map_err(|e| RecordError::Encode {
            id: document.id,
            message: e.to_string(),
        })?;
        atomic_write_file(&self.record_path(document.id), yaml.as_bytes())
    }

    fn read_record(&self, path: &Path) -> RecordResult<Option<Document>> {
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(RecordError::io(path, e)),
        };
        serde_saphyr::from_str(&contents)
            .map(Some)
            .map_err(|e| RecordError::Decode {
                path: path.to_path_buf(),
                message: e.to_string(),
            })
    }
}

impl RecordStore for FileRecordStore {
    fn create(&self, new: NewDocument) -> RecordResult<Document> {
        let mut sequence = self.sequence.lock().map_err(|_| RecordError::Poisoned)?;
        let id = *sequence + 1;
        atomic_write_file(&self.dir.join(SEQUENCE_FILE), id.to_string().as_bytes())?;
        *sequence = id;

        let document = Document {
            id,
            name: new.name,
            stored_file_name: None,
            stored_path: None,
            size_bytes: None,
            created_at: new.created_at,
        };
        self.write_record(&document)?;
        Ok(document)
    }

    fn find_by_id(&self, id: DocumentId) -> RecordResult<Option<Document>> {
        self.read_record(&self.record_path(id))
    }

    fn save(&self, document: &Document) -> RecordResult<Document> {
        let _guard = self.sequence.lock().map_err(|_| RecordError::Poisoned)?;
        if !self.record_path(document.id).exists() {
            return Err(RecordError::UnknownId(document.id));
        }
        self.write_record(document)?;
        Ok(document.clone())
    }

    fn delete(&self, document: &Document) -> RecordResult<()> {
        let _guard = self.sequence.lock().map_err(|_| RecordError::Poisoned)?;
        let path = self.record_path(document.id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RecordError::io(&path, e)),
        }
    }

    fn count(&self) -> RecordResult<u64> {
        Ok(record_ids(&self.dir.join(DOCUMENTS_DIR))?.len() as u64)
    }

    fn list_all(&self) -> RecordResult<Vec<Document>> {
        let mut ids = record_ids(&self.dir.join(DOCUMENTS_DIR))?;
        ids.sort_unstable();

        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            // A record deleted between listing and reading is simply skipped.
            if let Some(document) = self.find_by_id(id)? {
                documents.push(document);
            }
        }
        Ok(documents)
    }
}

fn read_sequence(path: &Path) -> RecordResult<DocumentId> {
    match fs::read_to_string(path) {
        Ok(s) => s.trim().parse().map_err(|_| RecordError::Decode {
            path: path.to_path_buf(),
            message: format!("invalid sequence value: {:?}", s.trim()),
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(RecordError::io(path, e)),
    }
}

/// Ids of every `<id>.yaml` file in the directory. Other entries are ignored.
fn record_ids(documents_dir: &Path) -> RecordResult<Vec<DocumentId>> {
    let entries = fs::read_dir(documents_dir).map_err(|e| RecordError::io(documents_dir, e))?;
    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| RecordError::io(documents_dir, e))?;
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "yaml") {
            continue;
        }
        match path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<DocumentId>().ok())
        {
            Some(id) => ids.push(id),
            None => warn!(path = %path.display(), "Ignoring unexpected file in record directory"),
        }
    }
    Ok(ids)
}

/// Write data to a temp file, fsync it, then atomically rename to the final path.
fn atomic_write_file(final_path: &Path, data: &[u8]) -> RecordResult<()> {
    let file_name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("record");
    let temp_path = final_path.with_file_name(format!("{}.{}.tmp", file_name, ulid::Ulid::new()));

    let mut file = fs::File::create(&temp_path).map_err(|e| RecordError::io(&temp_path, e))?;
    file.write_all(data)
        .map_err(|e| RecordError::io(&temp_path, e))?;
    file.sync_all()
        .map_err(|e| RecordError::io(&temp_path, e))?;
    fs::rename(&temp_path, final_path).map_err(|e| RecordError::io(final_path, e))?;
    Ok(())
}
