//! The buffer-exchange contract between the core and the storage engine.
//!
//! Cell data crosses the backend boundary as [`CellBuffers`]: one [`FieldBuffer`]
//! per attribute (and, for sparse arrays, per dimension). Fixed-size fields are a
//! flat native-endian byte buffer with a declared element size; variable-sized
//! fields additionally carry byte start offsets, one per cell. Dense buffers are
//! always row-major over the target subarray, regardless of the schema's physical
//! cell order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Subarray;

/// The values of one field (attribute or dimension) for a run of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldBuffer {
    bytes: Vec<u8>,
    elem_size: Option<u64>,
    offsets: Option<Vec<u64>>,
}

impl FieldBuffer {
    /// A fixed-size field from raw bytes and an element size in bytes.
    #[must_use]
    pub fn fixed(bytes: Vec<u8>, elem_size: u64) -> Self {
        Self {
            bytes,
            elem_size: Some(elem_size),
            offsets: None,
        }
    }

    /// A fixed-size field from a typed slice.
    #[must_use]
    pub fn from_slice<T: bytemuck::NoUninit>(values: &[T]) -> Self {
        Self::fixed(
            bytemuck::cast_slice(values).to_vec(),
            std::mem::size_of::<T>() as u64,
        )
    }

    /// A variable-sized field from concatenated bytes and per-cell byte start
    /// offsets.
    #[must_use]
    pub fn variable(bytes: Vec<u8>, offsets: Vec<u64>) -> Self {
        Self {
            bytes,
            elem_size: None,
            offsets: Some(offsets),
        }
    }

    /// A variable-sized field from strings.
    #[must_use]
    pub fn from_strings<S: AsRef<str>>(values: &[S]) -> Self {
        let mut bytes = Vec::new();
        let mut offsets = Vec::with_capacity(values.len());
        for value in values {
            offsets.push(bytes.len() as u64);
            bytes.extend_from_slice(value.as_ref().as_bytes());
        }
        Self::variable(bytes, offsets)
    }

    /// The raw bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The element size in bytes, or [`None`] for variable-sized fields.
    #[must_use]
    pub fn elem_size(&self) -> Option<u64> {
        self.elem_size
    }

    /// The per-cell byte start offsets, or [`None`] for fixed-size fields.
    #[must_use]
    pub fn offsets(&self) -> Option<&[u64]> {
        self.offsets.as_deref()
    }

    /// The number of cells held, or [`None`] if the buffer is inconsistent
    /// (fixed-size bytes not a multiple of the element size).
    #[must_use]
    pub fn cell_count(&self) -> Option<u64> {
        if let Some(offsets) = &self.offsets {
            Some(offsets.len() as u64)
        } else {
            let elem_size = self.elem_size?;
            if elem_size == 0 || self.bytes.len() as u64 % elem_size != 0 {
                None
            } else {
                Some(self.bytes.len() as u64 / elem_size)
            }
        }
    }

    /// View the bytes as a typed slice, if the element size and alignment match.
    #[must_use]
    pub fn as_slice<T: bytemuck::AnyBitPattern>(&self) -> Option<&[T]> {
        if self.elem_size != Some(std::mem::size_of::<T>() as u64) {
            return None;
        }
        bytemuck::try_cast_slice(&self.bytes).ok()
    }
}

/// A set of field buffers exchanged with the storage engine in one operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellBuffers {
    subarray: Option<Subarray>,
    fields: BTreeMap<String, FieldBuffer>,
}

impl CellBuffers {
    /// Create an empty buffer set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Target a subarray (dense writes; defaults to the full domain).
    #[must_use]
    pub fn with_subarray(mut self, subarray: Subarray) -> Self {
        self.subarray = Some(subarray);
        self
    }

    /// Add a field buffer.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, buffer: FieldBuffer) -> Self {
        self.fields.insert(name.into(), buffer);
        self
    }

    /// The targeted subarray, if any.
    #[must_use]
    pub fn subarray(&self) -> Option<&Subarray> {
        self.subarray.as_ref()
    }

    /// The field buffer for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldBuffer> {
        self.fields.get(name)
    }

    /// The field buffers by name.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, FieldBuffer> {
        &self.fields
    }
}
