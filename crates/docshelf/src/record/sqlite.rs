//! Relational record store on SQLite.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use super::{RecordError, RecordResult, RecordStore};
use crate::document::{Document, DocumentId, NewDocument};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL,
    stored_file_name TEXT,
    stored_path      TEXT,
    size_bytes       INTEGER,
    created_at       TEXT NOT NULL
);
";

const SELECT_COLUMNS: &str =
    "SELECT id, name, stored_file_name, stored_path, size_bytes, created_at FROM documents";

#[derive(Debug)]
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Open the database file, creating it and its parent directory if needed.
    pub fn open(db_path: impl AsRef<Path>) -> RecordResult<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RecordError::io(parent, e))?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        debug!(path = %db_path.display(), "Opened SQLite record store");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> RecordResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| RecordError::Poisoned)
    }
}

impl RecordStore for SqliteRecordStore {
    fn create(&self, new: NewDocument) -> RecordResult<Document> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (name, created_at) VALUES (?1, ?2)",
            params![new.name, new.created_at.to_rfc3339()],
        )?;
        let id = from_sql_id(conn.last_insert_rowid())?;

        Ok(Document {
            id,
            name: new.name,
            stored_file_name: None,
            stored_path: None,
            size_bytes: None,
            created_at: new.created_at,
        })
    }

    fn find_by_id(&self, id: DocumentId) -> RecordResult<Option<Document>> {
        // Ids past i64::MAX can never have been assigned by SQLite.
        let Ok(sql_id) = i64::try_from(id) else {
            return Ok(None);
        };
        let conn = self.conn()?;
        let document = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![sql_id],
                row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    fn save(&self, document: &Document) -> RecordResult<Document> {
        let size_bytes = document
            .size_bytes
            .map(i64::try_from)
            .transpose()
            .map_err(|_| RecordError::Encode {
                id: document.id,
                message: "size_bytes exceeds i64".to_string(),
            })?;
        let stored_path = document
            .stored_path
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());

        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE documents \
             SET name = ?2, stored_file_name = ?3, stored_path = ?4, size_bytes = ?5, created_at = ?6 \
             WHERE id = ?1",
            params![
                to_sql_id(document.id)?,
                document.name,
                document.stored_file_name,
                stored_path,
                size_bytes,
                document.created_at.to_rfc3339(),
            ],
        )?;
        if changed == 0 {
            return Err(RecordError::UnknownId(document.id));
        }
        Ok(document.clone())
    }

    fn delete(&self, document: &Document) -> RecordResult<()> {
        let Ok(sql_id) = i64::try_from(document.id) else {
            return Ok(());
        };
        let conn = self.conn()?;
        conn.execute("DELETE FROM documents WHERE id = ?1", params![sql_id])?;
        Ok(())
    }

    fn count(&self) -> RecordResult<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn list_all(&self) -> RecordResult<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
        let documents = stmt
            .query_map([], row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let id: i64 = row.get(0)?;
    let size_bytes: Option<i64> = row.get(4)?;
    let created_at: String = row.get(5)?;

    Ok(Document {
        id: u64::try_from(id)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(e)))?,
        name: row.get(1)?,
        stored_file_name: row.get(2)?,
        stored_path: row.get::<_, Option<String>>(3)?.map(PathBuf::from),
        size_bytes: size_bytes
            .map(u64::try_from)
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Integer, Box::new(e)))?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?,
    })
}

fn to_sql_id(id: DocumentId) -> RecordResult<i64> {
    i64::try_from(id).map_err(|_| RecordError::UnknownId(id))
}

fn from_sql_id(rowid: i64) -> RecordResult<DocumentId> {
    u64::try_from(rowid).map_err(|e| {
        RecordError::Sql(rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Integer,
            Box::new(e),
        ))
    })
}
