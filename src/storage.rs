//! Storage backends.
//!
//! The core reaches the excluded storage subsystem through the narrow
//! [`StorageBackend`] trait: persist/load schema blobs, open/close handles, and
//! exchange cell buffers as write-ordered [`Fragment`]s. Two reference backends
//! are provided: [`MemoryBackend`] and [`FilesystemBackend`].

mod filesystem;
mod memory;

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::array::{CellBuffers, Mode};

pub use self::{filesystem::FilesystemBackend, memory::MemoryBackend};

/// A storage backend error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The uri already names a persisted array.
    #[error("an array already exists at {0:?}")]
    AlreadyExists(String),
    /// The uri does not name a persisted array.
    #[error("no array found at {0:?}")]
    NotFound(String),
    /// The uri is empty or escapes the backend root.
    #[error("invalid array uri {0:?}")]
    InvalidUri(String),
    /// The handle is unknown to the backend (never opened, or already closed).
    #[error("unknown storage handle {0}")]
    InvalidHandle(HandleId),
    /// A backend allocation failed; surfaced to the caller, never retried.
    #[error("backend allocation of {0} bytes failed")]
    OutOfMemory(usize),
    /// An I/O error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// A (de)serialization error.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    /// Any other backend error.
    #[error("{0}")]
    Other(String),
}

/// An opaque identifier for an open backend handle.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    derive_more::Display,
    derive_more::From,
)]
pub struct HandleId(u64);

/// A unit of persisted write.
///
/// Fragment ids are monotonic per array and double as the logical timestamp axis:
/// a handle opened at timestamp `t` sees fragments with `id <= t`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    /// The monotonic fragment id.
    pub id: u64,
    /// The cell buffers written in this fragment.
    pub cells: CellBuffers,
}

/// The core-facing interface to the storage engine.
///
/// Backends are internally synchronized; the core adds no locking of its own.
pub trait StorageBackend: Send + Sync + Debug {
    /// Persist a schema blob at `uri`.
    ///
    /// # Errors
    /// Returns [`StorageError::AlreadyExists`] if `uri` already holds an array;
    /// the existing blob is left untouched.
    fn persist_schema(&self, uri: &str, blob: &[u8]) -> Result<(), StorageError>;

    /// Load the schema blob at `uri`.
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`] if `uri` holds no array.
    fn load_schema(&self, uri: &str) -> Result<Vec<u8>, StorageError>;

    /// Open a handle on the array at `uri`.
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`] if `uri` holds no array.
    fn open_handle(
        &self,
        uri: &str,
        mode: Mode,
        timestamp: Option<u64>,
    ) -> Result<HandleId, StorageError>;

    /// Close an open handle. Handles close exactly once.
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidHandle`] for an unknown or closed handle.
    fn close_handle(&self, handle: HandleId) -> Result<(), StorageError>;

    /// Write a fragment of cells through an open handle, returning the fragment id.
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidHandle`] for an unknown handle.
    fn write_cells(&self, handle: HandleId, cells: &CellBuffers) -> Result<u64, StorageError>;

    /// Read the array's fragments in write order, filtered by the handle's open
    /// timestamp.
    ///
    /// # Errors
    /// Returns [`StorageError::InvalidHandle`] for an unknown handle.
    fn read_cells(&self, handle: HandleId) -> Result<Vec<Fragment>, StorageError>;

    /// Delete the array at `uri`, including its schema and fragments.
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`] if `uri` holds no array.
    fn delete_array(&self, uri: &str) -> Result<(), StorageError>;
}

/// An open handle's bookkeeping entry, shared by the reference backends.
#[derive(Debug, Clone)]
struct OpenHandle {
    uri: String,
    timestamp: Option<u64>,
}
