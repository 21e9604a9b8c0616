//! A filesystem storage backend.
//!
//! Each array uri maps to a directory under the backend root holding a
//! `__schema.json` metadata blob and a `__fragments/` directory with one JSON
//! file per written fragment, named by zero-padded fragment id so lexicographic
//! order is write order.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use walkdir::WalkDir;

use crate::array::{CellBuffers, Mode};

use super::{Fragment, HandleId, OpenHandle, StorageBackend, StorageError};

const SCHEMA_FILE: &str = "__schema.json";
const FRAGMENTS_DIR: &str = "__fragments";

/// A filesystem storage backend rooted at a base directory.
///
/// Directories are created lazily on the first write.
#[derive(Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
    handles: Mutex<BTreeMap<HandleId, OpenHandle>>,
    fragment_lock: Mutex<()>,
    next_handle: AtomicU64,
}

impl FilesystemBackend {
    /// Create a backend rooted at `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            handles: Mutex::default(),
            fragment_lock: Mutex::default(),
            next_handle: AtomicU64::new(0),
        }
    }

    /// The base directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a uri to a directory under the root, rejecting empty, absolute, and
    /// escaping (`..`) uris.
    fn array_dir(&self, uri: &str) -> Result<PathBuf, StorageError> {
        let path = Path::new(uri);
        if uri.is_empty()
            || path.is_absolute()
            || path
                .components()
                .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(StorageError::InvalidUri(uri.to_string()));
        }
        Ok(self.root.join(path))
    }

    fn handle_entry(&self, handle: HandleId) -> Result<OpenHandle, StorageError> {
        self.handles
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(StorageError::InvalidHandle(handle))
    }

    fn fragment_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| StorageError::Other(err.to_string()))?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    }
}

impl StorageBackend for FilesystemBackend {
    fn persist_schema(&self, uri: &str, blob: &[u8]) -> Result<(), StorageError> {
        let dir = self.array_dir(uri)?;
        let schema_path = dir.join(SCHEMA_FILE);
        if schema_path.exists() {
            return Err(StorageError::AlreadyExists(uri.to_string()));
        }
        std::fs::create_dir_all(dir.join(FRAGMENTS_DIR))?;
        std::fs::write(&schema_path, blob)?;
        Ok(())
    }

    fn load_schema(&self, uri: &str) -> Result<Vec<u8>, StorageError> {
        let schema_path = self.array_dir(uri)?.join(SCHEMA_FILE);
        match std::fs::read(&schema_path) {
            Ok(blob) => Ok(blob),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(uri.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn open_handle(
        &self,
        uri: &str,
        _mode: Mode,
        timestamp: Option<u64>,
    ) -> Result<HandleId, StorageError> {
        if !self.array_dir(uri)?.join(SCHEMA_FILE).exists() {
            return Err(StorageError::NotFound(uri.to_string()));
        }
        let handle = HandleId::from(self.next_handle.fetch_add(1, Ordering::Relaxed));
        self.handles.lock().insert(
            handle,
            OpenHandle {
                uri: uri.to_string(),
                timestamp,
            },
        );
        Ok(handle)
    }

    fn close_handle(&self, handle: HandleId) -> Result<(), StorageError> {
        self.handles
            .lock()
            .remove(&handle)
            .map(|_| ())
            .ok_or(StorageError::InvalidHandle(handle))
    }

    fn write_cells(&self, handle: HandleId, cells: &CellBuffers) -> Result<u64, StorageError> {
        let entry = self.handle_entry(handle)?;
        let fragments_dir = self.array_dir(&entry.uri)?.join(FRAGMENTS_DIR);
        // The id scan and the file write must not interleave between writers,
        // or two handles allocate the same id and one fragment vanishes.
        let _guard = self.fragment_lock.lock();
        std::fs::create_dir_all(&fragments_dir)?;
        // Fragment ids restart from the highest persisted id; files are the
        // source of truth, not in-process state.
        let id = Self::fragment_files(&fragments_dir)?
            .iter()
            .filter_map(|path| path.file_stem()?.to_str()?.parse::<u64>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let fragment = Fragment {
            id,
            cells: cells.clone(),
        };
        let blob = serde_json::to_vec(&fragment)?;
        std::fs::write(fragments_dir.join(format!("{id:010}.json")), blob)?;
        Ok(id)
    }

    fn read_cells(&self, handle: HandleId) -> Result<Vec<Fragment>, StorageError> {
        let entry = self.handle_entry(handle)?;
        let fragments_dir = self.array_dir(&entry.uri)?.join(FRAGMENTS_DIR);
        if !fragments_dir.exists() {
            return Ok(Vec::new());
        }
        let mut fragments = Vec::new();
        for path in Self::fragment_files(&fragments_dir)? {
            let blob = std::fs::read(&path)?;
            let fragment: Fragment = serde_json::from_slice(&blob)?;
            if entry.timestamp.map_or(true, |ts| fragment.id <= ts) {
                fragments.push(fragment);
            }
        }
        Ok(fragments)
    }

    fn delete_array(&self, uri: &str) -> Result<(), StorageError> {
        let dir = self.array_dir(uri)?;
        if !dir.join(SCHEMA_FILE).exists() {
            return Err(StorageError::NotFound(uri.to_string()));
        }
        std::fs::remove_dir_all(dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::FieldBuffer;

    fn backend() -> (tempfile::TempDir, FilesystemBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = FilesystemBackend::new(dir.path());
        (dir, backend)
    }

    #[test]
    fn schema_round_trip() {
        let (_dir, backend) = backend();
        backend.persist_schema("group/array", b"blob").unwrap();
        assert_eq!(backend.load_schema("group/array").unwrap(), b"blob");
        assert!(matches!(
            backend.persist_schema("group/array", b"other"),
            Err(StorageError::AlreadyExists(_))
        ));
        assert!(matches!(
            backend.load_schema("group/missing"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn invalid_uris_rejected() {
        let (_dir, backend) = backend();
        assert!(matches!(
            backend.persist_schema("", b""),
            Err(StorageError::InvalidUri(_))
        ));
        assert!(matches!(
            backend.persist_schema("../escape", b""),
            Err(StorageError::InvalidUri(_))
        ));
        assert!(matches!(
            backend.persist_schema("/absolute", b""),
            Err(StorageError::InvalidUri(_))
        ));
    }

    #[test]
    fn fragments_persist_across_handles() {
        let (_dir, backend) = backend();
        backend.persist_schema("a", b"blob").unwrap();
        let writer = backend.open_handle("a", Mode::Write, None).unwrap();
        let cells = CellBuffers::new().field("x", FieldBuffer::from_slice::<i32>(&[7]));
        assert_eq!(backend.write_cells(writer, &cells).unwrap(), 1);
        assert_eq!(backend.write_cells(writer, &cells).unwrap(), 2);
        backend.close_handle(writer).unwrap();

        let reader = backend.open_handle("a", Mode::Read, None).unwrap();
        let fragments = backend.read_cells(reader).unwrap();
        assert_eq!(
            fragments.iter().map(|f| f.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(fragments[0].cells, cells);
        backend.close_handle(reader).unwrap();
    }

    #[test]
    fn concurrent_writers_never_lose_fragments() {
        let (_dir, backend) = backend();
        backend.persist_schema("a", b"blob").unwrap();
        let backend = std::sync::Arc::new(backend);
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let backend = std::sync::Arc::clone(&backend);
                std::thread::spawn(move || {
                    let writer = backend.open_handle("a", Mode::Write, None).unwrap();
                    let cells =
                        CellBuffers::new().field("x", FieldBuffer::from_slice::<i32>(&[7]));
                    for _ in 0..25 {
                        backend.write_cells(writer, &cells).unwrap();
                    }
                    backend.close_handle(writer).unwrap();
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let reader = backend.open_handle("a", Mode::Read, None).unwrap();
        let fragments = backend.read_cells(reader).unwrap();
        assert_eq!(fragments.len(), 200);
        let ids: std::collections::BTreeSet<u64> = fragments.iter().map(|f| f.id).collect();
        assert_eq!(ids.len(), 200);
        backend.close_handle(reader).unwrap();
    }

    #[test]
    fn delete_array_removes_everything() {
        let (_dir, backend) = backend();
        backend.persist_schema("a", b"blob").unwrap();
        backend.delete_array("a").unwrap();
        assert!(matches!(
            backend.load_schema("a"),
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            backend.delete_array("a"),
            Err(StorageError::NotFound(_))
        ));
    }
}
