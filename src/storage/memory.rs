//! An in-memory storage backend.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::array::{CellBuffers, Mode};

use super::{Fragment, HandleId, OpenHandle, StorageBackend, StorageError};

#[derive(Debug, Default)]
struct StoredArray {
    blob: Vec<u8>,
    fragments: Vec<Fragment>,
    next_fragment: u64,
}

/// An in-memory storage backend. Arrays live for the lifetime of the backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    arrays: Mutex<BTreeMap<String, StoredArray>>,
    handles: Mutex<BTreeMap<HandleId, OpenHandle>>,
    next_handle: AtomicU64,
}

impl MemoryBackend {
    /// Create an empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handle_entry(&self, handle: HandleId) -> Result<OpenHandle, StorageError> {
        self.handles
            .lock()
            .get(&handle)
            .cloned()
            .ok_or(StorageError::InvalidHandle(handle))
    }
}

impl StorageBackend for MemoryBackend {
    fn persist_schema(&self, uri: &str, blob: &[u8]) -> Result<(), StorageError> {
        if uri.is_empty() {
            return Err(StorageError::InvalidUri(uri.to_string()));
        }
        let mut arrays = self.arrays.lock();
        if arrays.contains_key(uri) {
            return Err(StorageError::AlreadyExists(uri.to_string()));
        }
        arrays.insert(
            uri.to_string(),
            StoredArray {
                blob: blob.to_vec(),
                fragments: Vec::new(),
                next_fragment: 1,
            },
        );
        Ok(())
    }

    fn load_schema(&self, uri: &str) -> Result<Vec<u8>, StorageError> {
        self.arrays
            .lock()
            .get(uri)
            .map(|array| array.blob.clone())
            .ok_or_else(|| StorageError::NotFound(uri.to_string()))
    }

    fn open_handle(
        &self,
        uri: &str,
        _mode: Mode,
        timestamp: Option<u64>,
    ) -> Result<HandleId, StorageError> {
        if !self.arrays.lock().contains_key(uri) {
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
        let mut arrays = self.arrays.lock();
        let array = arrays
            .get_mut(&entry.uri)
            .ok_or_else(|| StorageError::NotFound(entry.uri.clone()))?;
        let id = array.next_fragment;
        array.next_fragment += 1;
        array.fragments.push(Fragment {
            id,
            cells: cells.clone(),
        });
        Ok(id)
    }

    fn read_cells(&self, handle: HandleId) -> Result<Vec<Fragment>, StorageError> {
        let entry = self.handle_entry(handle)?;
        let arrays = self.arrays.lock();
        let array = arrays
            .get(&entry.uri)
            .ok_or_else(|| StorageError::NotFound(entry.uri.clone()))?;
        Ok(array
            .fragments
            .iter()
            .filter(|fragment| entry.timestamp.map_or(true, |ts| fragment.id <= ts))
            .cloned()
            .collect())
    }

    fn delete_array(&self, uri: &str) -> Result<(), StorageError> {
        self.arrays
            .lock()
            .remove(uri)
            .map(|_| ())
            .ok_or_else(|| StorageError::NotFound(uri.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::FieldBuffer;

    #[test]
    fn persist_twice_fails() {
        let backend = MemoryBackend::new();
        backend.persist_schema("a", b"one").unwrap();
        assert!(matches!(
            backend.persist_schema("a", b"two"),
            Err(StorageError::AlreadyExists(uri)) if uri == "a"
        ));
        // The first blob is untouched.
        assert_eq!(backend.load_schema("a").unwrap(), b"one");
    }

    #[test]
    fn load_missing_fails() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.load_schema("missing"),
            Err(StorageError::NotFound(uri)) if uri == "missing"
        ));
        assert!(matches!(
            backend.open_handle("missing", Mode::Read, None),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn handles_close_exactly_once() {
        let backend = MemoryBackend::new();
        backend.persist_schema("a", b"blob").unwrap();
        let handle = backend.open_handle("a", Mode::Read, None).unwrap();
        backend.close_handle(handle).unwrap();
        assert!(matches!(
            backend.close_handle(handle),
            Err(StorageError::InvalidHandle(_))
        ));
    }

    #[test]
    fn fragments_are_ordered_and_timestamp_filtered() {
        let backend = MemoryBackend::new();
        backend.persist_schema("a", b"blob").unwrap();
        let writer = backend.open_handle("a", Mode::Write, None).unwrap();
        let cells = CellBuffers::new().field("x", FieldBuffer::from_slice::<i32>(&[1]));
        assert_eq!(backend.write_cells(writer, &cells).unwrap(), 1);
        assert_eq!(backend.write_cells(writer, &cells).unwrap(), 2);
        backend.close_handle(writer).unwrap();

        let reader = backend.open_handle("a", Mode::Read, None).unwrap();
        let fragments = backend.read_cells(reader).unwrap();
        assert_eq!(
            fragments.iter().map(|f| f.id).collect::<Vec<_>>(),
            vec![1, 2]
        );
        backend.close_handle(reader).unwrap();

        let pinned = backend.open_handle("a", Mode::Read, Some(1)).unwrap();
        let fragments = backend.read_cells(pinned).unwrap();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].id, 1);
        backend.close_handle(pinned).unwrap();
    }
}
