//! Filesystem blob store.

use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{BlobError, BlobStore, OpenedBlob};

/// Blob store rooted at one upload directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl BlobStore for FsBlobStore {
    fn ensure_root(&self) -> Result<PathBuf, BlobError> {
        fs::create_dir_all(&self.root).map_err(|source| BlobError::Unavailable {
            path: self.root.clone(),
            source,
        })?;
        Ok(self.root.clone())
    }

    fn resolve(&self, stored_file_name: &str) -> PathBuf {
        self.root.join(stored_file_name)
    }

    fn write(&self, source: &mut dyn Read, target: &Path) -> Result<u64, BlobError> {
        atomic_copy(source, target).map_err(|source| BlobError::Write {
            path: target.to_path_buf(),
            source,
        })
    }

    fn delete_if_exists(&self, path: &Path) -> Result<bool, BlobError> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Blob deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(BlobError::Write {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn open_for_read(&self, path: &Path) -> Result<OpenedBlob, BlobError> {
        let not_found = || BlobError::NotFound {
            path: path.to_path_buf(),
        };
        let file = File::open(path).map_err(|_| not_found())?;
        // Length comes from the opened handle so it matches what gets streamed.
        let meta = file.metadata().map_err(|_| not_found())?;
        if !meta.is_file() {
            return Err(not_found());
        }
        Ok(OpenedBlob {
            file,
            len: meta.len(),
        })
    }
}

/// Copy into a temp file next to the target, fsync it, then rename over the target.
///
/// The temp name is a bare ULID so it stays short whatever the target is called.
fn atomic_copy(source: &mut dyn Read, final_path: &Path) -> io::Result<u64> {
    let temp_path = final_path.with_file_name(format!(".{}.tmp", ulid::Ulid::new()));

    let result = copy_then_rename(source, &temp_path, final_path);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn copy_then_rename(source: &mut dyn Read, temp_path: &Path, final_path: &Path) -> io::Result<u64> {
    let mut file = File::create(temp_path)?;
    let written = io::copy(source, &mut file)?;
    file.flush()?;
    file.sync_all()?;
    fs::rename(temp_path, final_path)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ensure_root_creates_nested_directories() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path().join("a/b/uploads"));
        let root = store.ensure_root().unwrap();
        assert!(root.is_dir());
        // idempotent
        store.ensure_root().unwrap();
    }

    #[test]
    fn ensure_root_fails_when_path_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let occupied = tmp.path().join("uploads");
        fs::write(&occupied, b"not a dir").unwrap();

        let store = FsBlobStore::new(&occupied);
        let err = store.ensure_root().unwrap_err();
        assert!(matches!(err, BlobError::Unavailable { .. }));
    }

    #[test]
    fn resolve_joins_without_touching_disk() {
        let store = FsBlobStore::new("/nonexistent/uploads");
        assert_eq!(
            store.resolve("Contrato_07.txt"),
            PathBuf::from("/nonexistent/uploads/Contrato_07.txt")
        );
    }

    #[test]
    fn write_replaces_existing_content() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path());
        let target = store.resolve("doc_01.txt");

        let written = store.write(&mut &b"first version"[..], &target).unwrap();
        assert_eq!(written, 13);
        let written = store.write(&mut &b"second"[..], &target).unwrap();
        assert_eq!(written, 6);

        assert_eq!(fs::read(&target).unwrap(), b"second");
    }

    #[test]
    fn write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path());
        store
            .write(&mut &b"data"[..], &store.resolve("a_01.bin"))
            .unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["a_01.bin".to_string()]);
    }

    #[test]
    fn write_accepts_names_near_the_filesystem_limit() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path());
        let target = store.resolve(&format!("{}.txt", "a".repeat(240)));

        assert_eq!(store.write(&mut &b"hello"[..], &target).unwrap(), 5);
        assert_eq!(fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn open_for_read_length_matches_handle_after_replace() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path());
        let target = store.resolve("r_01.txt");
        store.write(&mut &b"first version"[..], &target).unwrap();

        let mut opened = store.open_for_read(&target).unwrap();
        store.write(&mut &b"v2"[..], &target).unwrap();

        let mut buf = Vec::new();
        opened.file.read_to_end(&mut buf).unwrap();
        assert_eq!(opened.len, buf.len() as u64);
        assert_eq!(buf, b"first version");
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path().join("missing"));
        let err = store
            .write(&mut &b"data"[..], &store.resolve("a_01.bin"))
            .unwrap_err();
        assert!(matches!(err, BlobError::Write { .. }));
    }

    #[test]
    fn delete_if_exists_tolerates_absence() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path());
        let target = store.resolve("gone_01.txt");

        assert!(!store.delete_if_exists(&target).unwrap());

        fs::write(&target, b"x").unwrap();
        assert!(store.delete_if_exists(&target).unwrap());
        assert!(!target.exists());
    }

    #[test]
    fn delete_of_directory_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path());
        let dir = store.resolve("subdir");
        fs::create_dir(&dir).unwrap();

        let err = store.delete_if_exists(&dir).unwrap_err();
        assert!(matches!(err, BlobError::Write { .. }));
    }

    #[test]
    fn open_for_read_returns_length() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path());
        let target = store.resolve("r_01.txt");
        fs::write(&target, b"hello").unwrap();

        let mut opened = store.open_for_read(&target).unwrap();
        assert_eq!(opened.len, 5);
        let mut buf = String::new();
        opened.file.read_to_string(&mut buf).unwrap();
        assert_eq!(buf, "hello");
    }

    #[test]
    fn open_for_read_rejects_missing_and_directories() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path());

        let missing = store.open_for_read(&store.resolve("missing.txt"));
        assert!(matches!(missing, Err(BlobError::NotFound { .. })));

        let dir = store.open_for_read(tmp.path());
        assert!(matches!(dir, Err(BlobError::NotFound { .. })));
    }
}
