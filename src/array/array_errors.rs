//! Array lifecycle errors.

use thiserror::Error;

use crate::{context::ContextError, storage::StorageError};

use super::{Mode, SchemaError};

/// An array lifecycle, state machine, or data shape error.
#[derive(Debug, Error)]
pub enum ArrayError {
    /// A storage backend error (including `AlreadyExists` on create and
    /// `NotFound` on open).
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A schema error (including attribute projection lookup failures).
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A context resolution error.
    #[error(transparent)]
    Context(#[from] ContextError),
    /// The persisted metadata envelope does not parse.
    #[error(transparent)]
    Metadata(#[from] serde_json::Error),
    /// The open mode is not supported.
    #[error("unsupported open mode {0:?}")]
    UnsupportedMode(String),
    /// The array requires an encryption key that was not supplied.
    #[error("array {0:?} requires an encryption key")]
    EncryptionKeyRequired(String),
    /// The supplied encryption key does not match the array's key.
    #[error("encryption key mismatch for array {0:?}")]
    EncryptionKeyMismatch(String),
    /// A key was supplied for an unencrypted array.
    #[error("array {0:?} is not encrypted, but a key was supplied")]
    EncryptionKeyNotNeeded(String),
    /// The handle is already closed.
    #[error("array handle is already closed")]
    AlreadyClosed,
    /// The operation is not legal in the handle's open mode.
    #[error("cannot {op} an array opened in {mode} mode")]
    InvalidMode {
        /// The attempted operation.
        op: &'static str,
        /// The handle's open mode.
        mode: Mode,
    },
    /// The subarray dimensionality does not match the domain.
    #[error("subarray has {got} dimensions, domain has {expected}")]
    SubarrayDimensionality {
        /// The domain dimensionality.
        expected: usize,
        /// The subarray dimensionality.
        got: usize,
    },
    /// A subarray range is inverted or outside the dimension bounds.
    #[error("subarray range [{lo}, {hi}] is invalid for dimension {dimension:?}")]
    SubarrayOutOfBounds {
        /// The dimension name.
        dimension: String,
        /// The range lower bound.
        lo: i64,
        /// The range upper bound.
        hi: i64,
    },
    /// The operation requires integer dimensions.
    #[error("dimension {dimension:?} is not integer-typed")]
    NonIntegerDimension {
        /// The dimension name.
        dimension: String,
    },
    /// The subarray cell count does not fit in a `u64`.
    #[error("subarray cell count overflows")]
    SubarrayTooLarge,
    /// A subarray was supplied for a sparse array operation.
    #[error("sparse array operations do not take a subarray")]
    SubarrayOnSparseArray,
    /// A buffer was supplied for a name that is neither an attribute nor a
    /// dimension of the array.
    #[error("unknown field {0:?}")]
    UnknownField(String),
    /// A required field buffer is missing.
    #[error("missing buffer for field {0:?}")]
    MissingField(String),
    /// Coordinate buffers are not accepted by dense writes.
    #[error("coordinate buffer {0:?} supplied to a dense array write")]
    CoordinatesOnDenseArray(String),
    /// A fixed-size buffer declares the wrong element size for its field.
    #[error("field {field:?} element size is {got}, expected {expected}")]
    ElementSizeMismatch {
        /// The field name.
        field: String,
        /// The required element size in bytes.
        expected: u64,
        /// The declared element size in bytes.
        got: u64,
    },
    /// A fixed-size buffer length is not a multiple of its element size.
    #[error("field {field:?} buffer of {len} bytes is not a multiple of element size {elem_size}")]
    UnalignedBuffer {
        /// The field name.
        field: String,
        /// The buffer length in bytes.
        len: usize,
        /// The element size in bytes.
        elem_size: u64,
    },
    /// A variable-sized buffer has missing or malformed offsets.
    #[error("field {field:?} has invalid variable-length offsets")]
    InvalidOffsets {
        /// The field name.
        field: String,
    },
    /// The data shape does not match the domain: a buffer holds the wrong number
    /// of cells for the target region, or fields disagree on cell count.
    #[error("field {field:?} holds {got} cells, expected {expected}")]
    DimensionMismatch {
        /// The field name.
        field: String,
        /// The required cell count.
        expected: u64,
        /// The supplied cell count.
        got: u64,
    },
    /// Dense reads of variable-sized attributes are not supported by the core;
    /// they require the external query engine.
    #[error("dense read of variable-sized attribute {attribute:?} is not supported")]
    VariableSizedDenseRead {
        /// The attribute name.
        attribute: String,
    },
}
