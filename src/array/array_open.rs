//! The array lifecycle state machine.
//!
//! An array is created on disk once from a schema, then opened zero or more times
//! producing independent handles. Each handle has a mode and must be closed
//! exactly once; [`Array::with_open`] provides scoped acquisition that closes on
//! every exit path.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::storage::{Fragment, HandleId};

use super::{
    ArrayError, ArrayKind, ArraySchema, Attribute, CellBuffers, FieldBuffer, Mode, Subarray,
};

/// The persisted metadata envelope of an array: the schema plus a fingerprint of
/// the encryption key (if any) used to create it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayMetadata {
    /// The array schema.
    pub schema: ArraySchema,
    /// CRC32C fingerprint of the encryption key, if the array is encrypted.
    pub key_fingerprint: Option<u32>,
}

/// Options for [`Array::create_opt`], each with a stated default.
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Encryption key; default none (unencrypted).
    pub key: Option<Vec<u8>>,
    /// Explicit context; default: the schema's bound context, then the
    /// process-wide default.
    pub context: Option<Context>,
}

/// Options for [`Array::open_opt`], each with a stated default.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Open mode; default [`Mode::Read`].
    pub mode: Mode,
    /// Encryption key; required iff the array was created with one.
    pub key: Option<Vec<u8>>,
    /// Fixed logical timestamp for reads: only fragments with `id <= timestamp`
    /// are visible. Default: all fragments.
    pub timestamp: Option<u64>,
    /// Restrict the handle to a single attribute. Default: all attributes.
    pub attribute: Option<String>,
    /// Explicit context; default: the process-wide default context.
    pub context: Option<Context>,
}

impl OpenOptions {
    /// Options opening in `mode` with all other defaults.
    #[must_use]
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

/// A live handle to a persisted array, bound to a context, schema, and mode.
///
/// Obtained with [`Array::open`]; must be closed exactly once with
/// [`Array::close`]. A handle is not internally synchronized: concurrent data
/// operations on one handle require external synchronization, and close must not
/// race a data operation. Dropping a still-open handle closes it best-effort.
#[derive(Debug)]
pub struct Array {
    uri: String,
    schema: Arc<ArraySchema>,
    mode: Mode,
    timestamp: Option<u64>,
    attribute: Option<String>,
    context: Context,
    handle: Option<HandleId>,
}

impl Array {
    /// Persist `schema` at `uri`, creating the array.
    ///
    /// # Errors
    /// Returns [`StorageError::AlreadyExists`](crate::storage::StorageError::AlreadyExists)
    /// (wrapped in [`ArrayError::Storage`]) if `uri` already names an array; the
    /// existing array is untouched.
    pub fn create(uri: &str, schema: &ArraySchema) -> Result<(), ArrayError> {
        Self::create_opt(uri, schema, &CreateOptions::default())
    }

    /// Persist `schema` at `uri` with explicit [`CreateOptions`].
    ///
    /// The context resolves from the options, else the schema's bound context,
    /// else the process-wide default.
    ///
    /// # Errors
    /// See [`Array::create`]; additionally any backend or serialization error.
    pub fn create_opt(
        uri: &str,
        schema: &ArraySchema,
        options: &CreateOptions,
    ) -> Result<(), ArrayError> {
        let context = options
            .context
            .clone()
            .or_else(|| schema.context().cloned())
            .unwrap_or_else(Context::default_ctx);
        let metadata = ArrayMetadata {
            schema: schema.clone(),
            key_fingerprint: options.key.as_deref().map(crc32c::crc32c),
        };
        let blob = serde_json::to_vec(&metadata)?;
        context.backend().persist_schema(uri, &blob)?;
        Ok(())
    }

    /// Open the array at `uri` in `mode` with default options.
    ///
    /// # Errors
    /// See [`Array::open_opt`].
    pub fn open(uri: &str, mode: Mode) -> Result<Self, ArrayError> {
        Self::open_opt(uri, &OpenOptions::new(mode))
    }

    /// Open the array at `uri` with explicit [`OpenOptions`].
    ///
    /// # Errors
    /// Returns [`StorageError::NotFound`](crate::storage::StorageError::NotFound)
    /// (wrapped) if `uri` holds no array, an encryption error if the key is
    /// missing, mismatched, or superfluous, or
    /// [`SchemaError::AttributeNotFound`](super::SchemaError::AttributeNotFound)
    /// (wrapped) if the projected attribute does not exist.
    pub fn open_opt(uri: &str, options: &OpenOptions) -> Result<Self, ArrayError> {
        let context = options
            .context
            .clone()
            .unwrap_or_else(Context::default_ctx);
        let blob = context.backend().load_schema(uri)?;
        let metadata: ArrayMetadata = serde_json::from_slice(&blob)?;
        match (metadata.key_fingerprint, options.key.as_deref()) {
            (Some(expected), Some(key)) if crc32c::crc32c(key) == expected => {}
            (Some(_), Some(_)) => return Err(ArrayError::EncryptionKeyMismatch(uri.to_string())),
            (Some(_), None) => return Err(ArrayError::EncryptionKeyRequired(uri.to_string())),
            (None, Some(_)) => return Err(ArrayError::EncryptionKeyNotNeeded(uri.to_string())),
            (None, None) => {}
        }
        if let Some(attribute) = &options.attribute {
            metadata.schema.attribute(attribute)?;
        }
        let handle = context
            .backend()
            .open_handle(uri, options.mode, options.timestamp)?;
        Ok(Self {
            uri: uri.to_string(),
            schema: Arc::new(metadata.schema),
            mode: options.mode,
            timestamp: options.timestamp,
            attribute: options.attribute.clone(),
            context,
            handle: Some(handle),
        })
    }

    /// Open the array, run `f` on the handle, and close it on every exit path.
    ///
    /// If `f` fails its error is returned and the close error (if any) is
    /// discarded; if `f` succeeds a close failure is reported.
    ///
    /// # Errors
    /// Any error from opening, from `f`, or from closing.
    pub fn with_open<T, E, F>(uri: &str, options: &OpenOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<ArrayError>,
    {
        let mut array = Self::open_opt(uri, options).map_err(E::from)?;
        let result = f(&mut array);
        let closed = array.close();
        match result {
            Ok(value) => {
                closed.map_err(E::from)?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }

    /// The array uri.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The array schema.
    #[must_use]
    pub fn schema(&self) -> &ArraySchema {
        &self.schema
    }

    /// The open mode.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The fixed read timestamp, if any.
    #[must_use]
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// The single-attribute projection, if any.
    #[must_use]
    pub fn attribute_projection(&self) -> Option<&str> {
        self.attribute.as_deref()
    }

    /// The context the handle is bound to.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Whether the handle is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Close the handle. Handles close exactly once.
    ///
    /// # Errors
    /// Returns [`ArrayError::AlreadyClosed`] if the handle was already closed.
    pub fn close(&mut self) -> Result<(), ArrayError> {
        let handle = self.handle.take().ok_or(ArrayError::AlreadyClosed)?;
        self.context.backend().close_handle(handle)?;
        Ok(())
    }

    /// Write a fragment of cells.
    ///
    /// Dense arrays: `cells` must hold exactly one buffer per attribute, each
    /// fully and exactly covering the target subarray (default: the full domain),
    /// with no coordinate buffers. Sparse arrays: `cells` must hold one
    /// coordinate buffer per dimension and one buffer per attribute, all agreeing
    /// on cell count, and no subarray.
    ///
    /// # Errors
    /// Returns [`ArrayError::AlreadyClosed`] on a closed handle,
    /// [`ArrayError::InvalidMode`] unless the mode is write-capable, or a shape
    /// error ([`ArrayError::DimensionMismatch`] and friends) if the buffers do
    /// not match the schema.
    pub fn store(&mut self, cells: &CellBuffers) -> Result<(), ArrayError> {
        let handle = self.require_open()?;
        if !self.mode.is_write() {
            return Err(ArrayError::InvalidMode {
                op: "store",
                mode: self.mode,
            });
        }
        self.validate_write(cells)?;
        self.context.backend().write_cells(handle, cells)?;
        Ok(())
    }

    /// Read cells.
    ///
    /// Dense arrays: replays fragments over `subarray` (default: the full
    /// domain) in write order onto fill-value-initialized row-major buffers, one
    /// per attribute (or only the projected attribute). Sparse arrays take no
    /// subarray and return the concatenation of fragment coordinates and values
    /// in write order; slicing belongs to the external query engine.
    ///
    /// # Errors
    /// Returns [`ArrayError::AlreadyClosed`] on a closed handle or
    /// [`ArrayError::InvalidMode`] unless the handle is in read mode.
    pub fn read(&self, subarray: Option<&Subarray>) -> Result<CellBuffers, ArrayError> {
        let handle = self.require_open()?;
        if self.mode != Mode::Read {
            return Err(ArrayError::InvalidMode {
                op: "read",
                mode: self.mode,
            });
        }
        let fragments = self.context.backend().read_cells(handle)?;
        match self.schema.kind() {
            ArrayKind::Dense => self.read_dense(subarray, &fragments),
            ArrayKind::Sparse => {
                if subarray.is_some() {
                    return Err(ArrayError::SubarrayOnSparseArray);
                }
                self.read_sparse(&fragments)
            }
        }
    }

    /// Delete the persisted array, consuming the handle.
    ///
    /// # Errors
    /// Returns [`ArrayError::AlreadyClosed`] on a closed handle or
    /// [`ArrayError::InvalidMode`] unless the handle was opened in
    /// [`Mode::Delete`].
    pub fn delete(mut self) -> Result<(), ArrayError> {
        let handle = self.handle.take().ok_or(ArrayError::AlreadyClosed)?;
        if self.mode != Mode::Delete {
            // Leave the handle open; drop will release it.
            self.handle = Some(handle);
            return Err(ArrayError::InvalidMode {
                op: "delete",
                mode: self.mode,
            });
        }
        self.context.backend().close_handle(handle)?;
        self.context.backend().delete_array(&self.uri)?;
        Ok(())
    }

    fn require_open(&self) -> Result<HandleId, ArrayError> {
        self.handle.ok_or(ArrayError::AlreadyClosed)
    }

    /// The attributes an operation applies to: the projection if one was set at
    /// open, otherwise all schema attributes.
    fn required_attributes(&self) -> Result<Vec<&Attribute>, ArrayError> {
        if let Some(name) = &self.attribute {
            Ok(vec![self.schema.attribute(name)?])
        } else {
            Ok(self.schema.attributes().iter().collect())
        }
    }

    fn validate_write(&self, cells: &CellBuffers) -> Result<(), ArrayError> {
        let domain = self.schema.domain();
        match self.schema.kind() {
            ArrayKind::Dense => {
                let subarray = match cells.subarray() {
                    Some(subarray) => {
                        subarray.validate(domain)?;
                        subarray.clone()
                    }
                    None => Subarray::from_domain(domain)?,
                };
                let expected = subarray
                    .cell_count()
                    .ok_or(ArrayError::SubarrayTooLarge)?;
                // Every supplied buffer is validated, projected or not; a
                // malformed buffer never reaches the backend.
                for (name, buffer) in cells.fields() {
                    if domain.contains(name) {
                        return Err(ArrayError::CoordinatesOnDenseArray(name.clone()));
                    }
                    let Ok(attribute) = self.schema.attribute(name) else {
                        return Err(ArrayError::UnknownField(name.clone()));
                    };
                    let got = field_cell_count(name, attribute.cell_size(), buffer)?;
                    if got != expected {
                        return Err(ArrayError::DimensionMismatch {
                            field: name.clone(),
                            expected,
                            got,
                        });
                    }
                }
                for attribute in self.required_attributes()? {
                    if cells.get(attribute.name()).is_none() {
                        return Err(ArrayError::MissingField(attribute.name().to_string()));
                    }
                }
            }
            ArrayKind::Sparse => {
                if cells.subarray().is_some() {
                    return Err(ArrayError::SubarrayOnSparseArray);
                }
                let mut expected: Option<u64> = None;
                for (name, buffer) in cells.fields() {
                    let cell_size = if let Ok(dimension) = domain.dimension_by_name(name) {
                        dimension.data_type().fixed_size().map(|size| size as u64)
                    } else if let Ok(attribute) = self.schema.attribute(name) {
                        attribute.cell_size()
                    } else {
                        return Err(ArrayError::UnknownField(name.clone()));
                    };
                    let got = field_cell_count(name, cell_size, buffer)?;
                    match expected {
                        None => expected = Some(got),
                        Some(expected) if expected == got => {}
                        Some(expected) => {
                            return Err(ArrayError::DimensionMismatch {
                                field: name.clone(),
                                expected,
                                got,
                            })
                        }
                    }
                }
                for dimension in domain.dimensions() {
                    if cells.get(dimension.name()).is_none() {
                        return Err(ArrayError::MissingField(dimension.name().to_string()));
                    }
                }
                for attribute in self.required_attributes()? {
                    if cells.get(attribute.name()).is_none() {
                        return Err(ArrayError::MissingField(attribute.name().to_string()));
                    }
                }
            }
        }
        Ok(())
    }

    fn read_dense(
        &self,
        subarray: Option<&Subarray>,
        fragments: &[Fragment],
    ) -> Result<CellBuffers, ArrayError> {
        let domain = self.schema.domain();
        let selection = match subarray {
            Some(subarray) => {
                subarray.validate(domain)?;
                subarray.clone()
            }
            None => Subarray::from_domain(domain)?,
        };
        let cell_count = selection
            .cell_count()
            .ok_or(ArrayError::SubarrayTooLarge)?;
        let mut out = CellBuffers::new().with_subarray(selection.clone());
        for attribute in self.required_attributes()? {
            if attribute.is_var_sized() {
                return Err(ArrayError::VariableSizedDenseRead {
                    attribute: attribute.name().to_string(),
                });
            }
            let Some(elem) = attribute.data_type().fixed_size() else {
                return Err(ArrayError::VariableSizedDenseRead {
                    attribute: attribute.name().to_string(),
                });
            };
            let total = usize::try_from(cell_count)
                .ok()
                .and_then(|cells| cells.checked_mul(elem))
                .ok_or(crate::storage::StorageError::OutOfMemory(usize::MAX))?;
            let mut buffer: Vec<u8> = Vec::new();
            buffer
                .try_reserve_exact(total)
                .map_err(|_| crate::storage::StorageError::OutOfMemory(total))?;
            let fill = attribute.fill_value().as_ne_bytes();
            for _ in 0..cell_count {
                buffer.extend_from_slice(fill);
            }
            for fragment in fragments {
                let fragment_subarray = match fragment.cells.subarray() {
                    Some(subarray) => subarray.clone(),
                    None => Subarray::from_domain(domain)?,
                };
                let Some(intersection) = selection.intersect(&fragment_subarray) else {
                    continue;
                };
                let Some(field) = fragment.cells.get(attribute.name()) else {
                    continue;
                };
                copy_region(
                    field.bytes(),
                    &fragment_subarray,
                    &mut buffer,
                    &selection,
                    &intersection,
                    elem,
                );
            }
            out = out.field(attribute.name(), FieldBuffer::fixed(buffer, elem as u64));
        }
        Ok(out)
    }

    fn read_sparse(&self, fragments: &[Fragment]) -> Result<CellBuffers, ArrayError> {
        let domain = self.schema.domain();
        let mut fields: Vec<(&str, Option<u64>)> = domain
            .dimensions()
            .iter()
            .map(|dimension| {
                (
                    dimension.name(),
                    dimension.data_type().fixed_size().map(|size| size as u64),
                )
            })
            .collect();
        for attribute in self.required_attributes()? {
            fields.push((attribute.name(), attribute.cell_size()));
        }
        let mut out = CellBuffers::new();
        for (name, cell_size) in fields {
            let mut bytes: Vec<u8> = Vec::new();
            let mut offsets: Vec<u64> = Vec::new();
            for fragment in fragments {
                let Some(field) = fragment.cells.get(name) else {
                    continue;
                };
                if let Some(fragment_offsets) = field.offsets() {
                    let base = bytes.len() as u64;
                    offsets.extend(fragment_offsets.iter().map(|offset| base + offset));
                }
                bytes.extend_from_slice(field.bytes());
            }
            let buffer = match cell_size {
                Some(elem) => FieldBuffer::fixed(bytes, elem),
                None => FieldBuffer::variable(bytes, offsets),
            };
            out = out.field(name, buffer);
        }
        Ok(out)
    }
}

impl Drop for Array {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.context.backend().close_handle(handle);
        }
    }
}

/// Validate a field buffer against its declared cell size and return its cell
/// count. `cell_size` is [`None`] for variable-sized fields.
fn field_cell_count(
    name: &str,
    cell_size: Option<u64>,
    buffer: &FieldBuffer,
) -> Result<u64, ArrayError> {
    if let Some(expected) = cell_size {
        let got = buffer.elem_size().unwrap_or(0);
        if got != expected {
            return Err(ArrayError::ElementSizeMismatch {
                field: name.to_string(),
                expected,
                got,
            });
        }
        buffer
            .cell_count()
            .ok_or_else(|| ArrayError::UnalignedBuffer {
                field: name.to_string(),
                len: buffer.bytes().len(),
                elem_size: expected,
            })
    } else {
        let Some(offsets) = buffer.offsets() else {
            return Err(ArrayError::InvalidOffsets {
                field: name.to_string(),
            });
        };
        let bytes_len = buffer.bytes().len() as u64;
        let well_formed = offsets.first().map_or(true, |first| *first == 0)
            && offsets.windows(2).all(|pair| pair[0] <= pair[1])
            && offsets.last().map_or(true, |last| *last <= bytes_len);
        if !well_formed {
            return Err(ArrayError::InvalidOffsets {
                field: name.to_string(),
            });
        }
        Ok(offsets.len() as u64)
    }
}

/// Copy the cells of `intersection` from a row-major `src` buffer laid out over
/// `src_subarray` into a row-major `dst` buffer laid out over `dst_subarray`.
fn copy_region(
    src: &[u8],
    src_subarray: &Subarray,
    dst: &mut [u8],
    dst_subarray: &Subarray,
    intersection: &Subarray,
    elem: usize,
) {
    let ndim = intersection.num_dimensions();
    if ndim == 0 {
        return;
    }
    let run = usize::try_from(intersection.extents()[ndim - 1]).unwrap_or(0) * elem;
    let mut coord: Vec<i64> = intersection.ranges().iter().map(|range| range[0]).collect();
    loop {
        let src_index = usize::try_from(src_subarray.linear_index(&coord)).unwrap_or(usize::MAX);
        let dst_index = usize::try_from(dst_subarray.linear_index(&coord)).unwrap_or(usize::MAX);
        // Fragments are validated on write; guard against corrupt storage
        // rather than panic.
        if let (Some(src_end), Some(dst_end)) = (
            src_index.checked_mul(elem).and_then(|i| i.checked_add(run)),
            dst_index.checked_mul(elem).and_then(|i| i.checked_add(run)),
        ) {
            if src_end <= src.len() && dst_end <= dst.len() {
                dst[dst_index * elem..dst_end].copy_from_slice(&src[src_index * elem..src_end]);
            }
        }
        if ndim == 1 {
            return;
        }
        let mut d = ndim - 2;
        loop {
            coord[d] += 1;
            if coord[d] <= intersection.range(d)[1] {
                break;
            }
            coord[d] = intersection.range(d)[0];
            if d == 0 {
                return;
            }
            d -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{
        ArraySchemaBuilder, DataType, Dimension, DimensionConstraints, Domain, SchemaError,
    };
    use crate::config::{Config, KEY_BACKEND};
    use crate::storage::StorageError;

    fn memory_ctx() -> Context {
        let mut config = Config::new();
        config.set(KEY_BACKEND, "memory").unwrap();
        Context::create(config).unwrap()
    }

    fn dense_schema(ctx: &Context) -> ArraySchema {
        let dim = |name| {
            Dimension::new(name, DataType::Int32, DimensionConstraints::int([1, 4], 4)).unwrap()
        };
        let domain = Domain::new(vec![dim("rows"), dim("cols")]).unwrap();
        ArraySchemaBuilder::new(ArrayKind::Dense, domain)
            .attribute(Attribute::new("a", DataType::Int32).unwrap())
            .context(ctx.clone())
            .build()
            .unwrap()
    }

    fn sparse_schema(ctx: &Context) -> ArraySchema {
        let dim = |name| {
            Dimension::new(name, DataType::Int32, DimensionConstraints::int([1, 100], 10)).unwrap()
        };
        let domain = Domain::new(vec![dim("x"), dim("y")]).unwrap();
        ArraySchemaBuilder::new(ArrayKind::Sparse, domain)
            .attribute(Attribute::new("a", DataType::Int32).unwrap())
            .attribute(Attribute::new("label", DataType::StringUtf8).unwrap())
            .context(ctx.clone())
            .build()
            .unwrap()
    }

    fn open_in(ctx: &Context, uri: &str, mode: Mode) -> Result<Array, ArrayError> {
        Array::open_opt(
            uri,
            &OpenOptions {
                mode,
                context: Some(ctx.clone()),
                ..OpenOptions::default()
            },
        )
    }

    fn grid_4x4() -> CellBuffers {
        let values: Vec<i32> = (1..=16).collect();
        CellBuffers::new().field("a", FieldBuffer::from_slice(&values))
    }

    #[test]
    fn create_twice_fails_and_preserves_first() {
        let ctx = memory_ctx();
        let schema = dense_schema(&ctx);
        Array::create("quickstart_dense", &schema).unwrap();
        assert!(matches!(
            Array::create("quickstart_dense", &schema),
            Err(ArrayError::Storage(StorageError::AlreadyExists(uri))) if uri == "quickstart_dense"
        ));
        let array = open_in(&ctx, "quickstart_dense", Mode::Read).unwrap();
        assert_eq!(array.schema().attributes().len(), 1);
        assert_eq!(array.schema().attribute("a").unwrap().name(), "a");
    }

    #[test]
    fn open_missing_fails() {
        let ctx = memory_ctx();
        assert!(matches!(
            open_in(&ctx, "missing", Mode::Read),
            Err(ArrayError::Storage(StorageError::NotFound(_)))
        ));
    }

    #[test]
    fn store_requires_write_mode() {
        let ctx = memory_ctx();
        Array::create("arr", &dense_schema(&ctx)).unwrap();
        let mut array = open_in(&ctx, "arr", Mode::Read).unwrap();
        assert!(matches!(
            array.store(&grid_4x4()),
            Err(ArrayError::InvalidMode {
                op: "store",
                mode: Mode::Read,
            })
        ));
        // Nothing was persisted: a full read still returns fill values.
        let cells = array.read(None).unwrap();
        let values = cells.get("a").unwrap().as_slice::<i32>().unwrap();
        assert!(values.iter().all(|value| *value == i32::MIN));
        array.close().unwrap();
    }

    #[test]
    fn read_requires_read_mode() {
        let ctx = memory_ctx();
        Array::create("arr", &dense_schema(&ctx)).unwrap();
        let array = open_in(&ctx, "arr", Mode::Write).unwrap();
        assert!(matches!(
            array.read(None),
            Err(ArrayError::InvalidMode { op: "read", .. })
        ));
    }

    #[test]
    fn close_twice_fails() {
        let ctx = memory_ctx();
        Array::create("arr", &dense_schema(&ctx)).unwrap();
        let mut array = open_in(&ctx, "arr", Mode::Write).unwrap();
        assert!(array.is_open());
        array.close().unwrap();
        assert!(!array.is_open());
        assert!(matches!(array.close(), Err(ArrayError::AlreadyClosed)));
        assert!(matches!(
            array.store(&grid_4x4()),
            Err(ArrayError::AlreadyClosed)
        ));
    }

    #[test]
    fn with_open_closes_on_every_path() {
        let ctx = memory_ctx();
        Array::create("arr", &dense_schema(&ctx)).unwrap();
        let options = OpenOptions {
            mode: Mode::Write,
            context: Some(ctx.clone()),
            ..OpenOptions::default()
        };
        Array::with_open("arr", &options, |array| array.store(&grid_4x4())).unwrap();
        // The failing path also closes the handle.
        let result: Result<(), ArrayError> = Array::with_open("arr", &options, |array| {
            array.store(&CellBuffers::new().field("a", FieldBuffer::from_slice(&[1i32])))
        });
        assert!(matches!(
            result,
            Err(ArrayError::DimensionMismatch { expected: 16, got: 1, .. })
        ));
    }

    #[test]
    fn dense_store_and_read_round_trip() {
        let ctx = memory_ctx();
        Array::create("arr", &dense_schema(&ctx)).unwrap();
        let mut array = open_in(&ctx, "arr", Mode::Write).unwrap();
        array.store(&grid_4x4()).unwrap();
        array.close().unwrap();

        let mut array = open_in(&ctx, "arr", Mode::Read).unwrap();
        let cells = array.read(None).unwrap();
        let values = cells.get("a").unwrap().as_slice::<i32>().unwrap();
        assert_eq!(values, (1..=16).collect::<Vec<i32>>());
        // Interior 2x2 slice, row-major.
        let cells = array.read(Some(&Subarray::new(vec![[2, 3], [2, 3]]))).unwrap();
        let values = cells.get("a").unwrap().as_slice::<i32>().unwrap();
        assert_eq!(values, [6, 7, 10, 11]);
        array.close().unwrap();
    }

    #[test]
    fn dense_partial_write_fills_the_rest() {
        let ctx = memory_ctx();
        Array::create("arr", &dense_schema(&ctx)).unwrap();
        let mut array = open_in(&ctx, "arr", Mode::Write).unwrap();
        let cells = CellBuffers::new()
            .with_subarray(Subarray::new(vec![[1, 2], [1, 4]]))
            .field("a", FieldBuffer::from_slice(&(1i32..=8).collect::<Vec<_>>()));
        array.store(&cells).unwrap();
        array.close().unwrap();

        let mut array = open_in(&ctx, "arr", Mode::Read).unwrap();
        let cells = array.read(None).unwrap();
        let buffer = cells.get("a").unwrap();
        let values = buffer.as_slice::<i32>().unwrap();
        assert_eq!(&values[..8], (1..=8).collect::<Vec<i32>>().as_slice());
        // Rows 3 and 4 were never written and hold the fill value.
        let fill = array.schema().attribute("a").unwrap().fill_value();
        assert!(fill.equals_all(&buffer.bytes()[32..]));
        array.close().unwrap();
    }

    #[test]
    fn dense_store_shape_errors() {
        let ctx = memory_ctx();
        Array::create("arr", &dense_schema(&ctx)).unwrap();
        let mut array = open_in(&ctx, "arr", Mode::Write).unwrap();
        assert!(matches!(
            array.store(&CellBuffers::new()),
            Err(ArrayError::MissingField(field)) if field == "a"
        ));
        assert!(matches!(
            array.store(
                &CellBuffers::new().field("bogus", FieldBuffer::from_slice(&[1i32]))
            ),
            Err(ArrayError::UnknownField(field)) if field == "bogus"
        ));
        assert!(matches!(
            array.store(
                &CellBuffers::new().field("rows", FieldBuffer::from_slice(&[1i32]))
            ),
            Err(ArrayError::CoordinatesOnDenseArray(field)) if field == "rows"
        ));
        assert!(matches!(
            array.store(
                &grid_4x4().with_subarray(Subarray::new(vec![[1, 5], [1, 4]]))
            ),
            Err(ArrayError::SubarrayOutOfBounds { .. })
        ));
        assert!(matches!(
            array.store(
                &CellBuffers::new().field("a", FieldBuffer::from_slice(&[1i16; 16]))
            ),
            Err(ArrayError::ElementSizeMismatch { expected: 4, got: 2, .. })
        ));
        array.close().unwrap();
    }

    #[test]
    fn projected_write_validates_every_supplied_field() {
        let ctx = memory_ctx();
        let dim = |name| {
            Dimension::new(name, DataType::Int32, DimensionConstraints::int([1, 4], 4)).unwrap()
        };
        let domain = Domain::new(vec![dim("rows"), dim("cols")]).unwrap();
        let schema = ArraySchemaBuilder::new(ArrayKind::Dense, domain)
            .attribute(Attribute::new("a", DataType::Int32).unwrap())
            .attribute(Attribute::new("b", DataType::Int32).unwrap())
            .context(ctx.clone())
            .build()
            .unwrap();
        Array::create("arr", &schema).unwrap();
        let mut array = Array::open_opt(
            "arr",
            &OpenOptions {
                mode: Mode::Write,
                attribute: Some("a".to_string()),
                context: Some(ctx.clone()),
                ..OpenOptions::default()
            },
        )
        .unwrap();
        // A buffer for a non-projected attribute is still validated.
        let cells = CellBuffers::new()
            .field("a", FieldBuffer::from_slice(&(1i32..=16).collect::<Vec<_>>()))
            .field("b", FieldBuffer::from_slice(&[1i16; 16]));
        assert!(matches!(
            array.store(&cells),
            Err(ArrayError::ElementSizeMismatch { expected: 4, got: 2, .. })
        ));
        array.close().unwrap();
    }

    #[test]
    fn dense_cell_count_overflow_rejected() {
        let ctx = memory_ctx();
        let dim = |name| {
            Dimension::new(
                name,
                DataType::Int64,
                DimensionConstraints::int([1, i64::MAX], i64::MAX),
            )
            .unwrap()
        };
        let domain = Domain::new(vec![dim("x"), dim("y")]).unwrap();
        let schema = ArraySchemaBuilder::new(ArrayKind::Dense, domain)
            .attribute(Attribute::new("a", DataType::Int64).unwrap())
            .context(ctx.clone())
            .build()
            .unwrap();
        Array::create("arr", &schema).unwrap();
        let mut array = open_in(&ctx, "arr", Mode::Write).unwrap();
        assert!(matches!(
            array.store(&CellBuffers::new().field("a", FieldBuffer::from_slice(&[1i64]))),
            Err(ArrayError::SubarrayTooLarge)
        ));
        array.close().unwrap();
    }

    #[test]
    fn sparse_store_and_read() {
        let ctx = memory_ctx();
        Array::create("arr", &sparse_schema(&ctx)).unwrap();
        let mut array = open_in(&ctx, "arr", Mode::Write).unwrap();
        let cells = CellBuffers::new()
            .field("x", FieldBuffer::from_slice(&[1i32, 2, 3]))
            .field("y", FieldBuffer::from_slice(&[10i32, 20, 30]))
            .field("a", FieldBuffer::from_slice(&[7i32, 8, 9]))
            .field("label", FieldBuffer::from_strings(&["p", "qq", "rrr"]));
        array.store(&cells).unwrap();
        array.store(&cells).unwrap();
        array.close().unwrap();

        let mut array = open_in(&ctx, "arr", Mode::Read).unwrap();
        let result = array.read(None).unwrap();
        assert_eq!(
            result.get("x").unwrap().as_slice::<i32>().unwrap(),
            [1, 2, 3, 1, 2, 3]
        );
        assert_eq!(
            result.get("a").unwrap().as_slice::<i32>().unwrap(),
            [7, 8, 9, 7, 8, 9]
        );
        let label = result.get("label").unwrap();
        assert_eq!(label.bytes(), b"pqqrrrpqqrrr");
        assert_eq!(label.offsets(), Some([0, 1, 3, 6, 7, 9].as_slice()));
        array.close().unwrap();
    }

    #[test]
    fn sparse_store_shape_errors() {
        let ctx = memory_ctx();
        Array::create("arr", &sparse_schema(&ctx)).unwrap();
        let mut array = open_in(&ctx, "arr", Mode::Write).unwrap();
        // Missing coordinates.
        assert!(matches!(
            array.store(
                &CellBuffers::new()
                    .field("a", FieldBuffer::from_slice(&[1i32]))
                    .field("label", FieldBuffer::from_strings(&["l"]))
            ),
            Err(ArrayError::MissingField(field)) if field == "x"
        ));
        // Disagreeing cell counts.
        assert!(matches!(
            array.store(
                &CellBuffers::new()
                    .field("x", FieldBuffer::from_slice(&[1i32, 2]))
                    .field("y", FieldBuffer::from_slice(&[1i32]))
                    .field("a", FieldBuffer::from_slice(&[1i32, 2]))
                    .field("label", FieldBuffer::from_strings(&["l", "m"]))
            ),
            Err(ArrayError::DimensionMismatch { .. })
        ));
        // Sparse writes take no subarray.
        assert!(matches!(
            array.store(&CellBuffers::new().with_subarray(Subarray::new(vec![[1, 1], [1, 1]]))),
            Err(ArrayError::SubarrayOnSparseArray)
        ));
        array.close().unwrap();
    }

    #[test]
    fn encryption_key_checked_on_open() {
        let ctx = memory_ctx();
        let schema = dense_schema(&ctx);
        Array::create_opt(
            "secret",
            &schema,
            &CreateOptions {
                key: Some(b"key-material".to_vec()),
                context: None,
            },
        )
        .unwrap();
        assert!(matches!(
            open_in(&ctx, "secret", Mode::Read),
            Err(ArrayError::EncryptionKeyRequired(_))
        ));
        assert!(matches!(
            Array::open_opt(
                "secret",
                &OpenOptions {
                    key: Some(b"wrong".to_vec()),
                    context: Some(ctx.clone()),
                    ..OpenOptions::default()
                },
            ),
            Err(ArrayError::EncryptionKeyMismatch(_))
        ));
        let mut array = Array::open_opt(
            "secret",
            &OpenOptions {
                key: Some(b"key-material".to_vec()),
                context: Some(ctx.clone()),
                ..OpenOptions::default()
            },
        )
        .unwrap();
        array.close().unwrap();

        Array::create("plain", &schema).unwrap();
        assert!(matches!(
            Array::open_opt(
                "plain",
                &OpenOptions {
                    key: Some(b"key".to_vec()),
                    context: Some(ctx.clone()),
                    ..OpenOptions::default()
                },
            ),
            Err(ArrayError::EncryptionKeyNotNeeded(_))
        ));
    }

    #[test]
    fn timestamp_pins_the_view() {
        let ctx = memory_ctx();
        Array::create("arr", &dense_schema(&ctx)).unwrap();
        let mut array = open_in(&ctx, "arr", Mode::Write).unwrap();
        array.store(&grid_4x4()).unwrap();
        let second: Vec<i32> = (101..=116).collect();
        array
            .store(&CellBuffers::new().field("a", FieldBuffer::from_slice(&second)))
            .unwrap();
        array.close().unwrap();

        let mut array = Array::open_opt(
            "arr",
            &OpenOptions {
                timestamp: Some(1),
                context: Some(ctx.clone()),
                ..OpenOptions::default()
            },
        )
        .unwrap();
        assert_eq!(array.timestamp(), Some(1));
        let cells = array.read(None).unwrap();
        assert_eq!(
            cells.get("a").unwrap().as_slice::<i32>().unwrap(),
            (1..=16).collect::<Vec<i32>>()
        );
        array.close().unwrap();
    }

    #[test]
    fn attribute_projection() {
        let ctx = memory_ctx();
        Array::create("arr", &sparse_schema(&ctx)).unwrap();
        assert!(matches!(
            Array::open_opt(
                "arr",
                &OpenOptions {
                    attribute: Some("missing".to_string()),
                    context: Some(ctx.clone()),
                    ..OpenOptions::default()
                },
            ),
            Err(ArrayError::Schema(SchemaError::AttributeNotFound(_)))
        ));

        let mut writer = open_in(&ctx, "arr", Mode::Write).unwrap();
        writer
            .store(
                &CellBuffers::new()
                    .field("x", FieldBuffer::from_slice(&[1i32]))
                    .field("y", FieldBuffer::from_slice(&[2i32]))
                    .field("a", FieldBuffer::from_slice(&[3i32]))
                    .field("label", FieldBuffer::from_strings(&["z"])),
            )
            .unwrap();
        writer.close().unwrap();

        let mut reader = Array::open_opt(
            "arr",
            &OpenOptions {
                attribute: Some("a".to_string()),
                context: Some(ctx.clone()),
                ..OpenOptions::default()
            },
        )
        .unwrap();
        assert_eq!(reader.attribute_projection(), Some("a"));
        let cells = reader.read(None).unwrap();
        assert!(cells.get("a").is_some());
        assert!(cells.get("label").is_none());
        // Coordinates always accompany sparse reads.
        assert!(cells.get("x").is_some());
        reader.close().unwrap();
    }

    #[test]
    fn delete_requires_delete_mode() {
        let ctx = memory_ctx();
        Array::create("arr", &dense_schema(&ctx)).unwrap();
        let array = open_in(&ctx, "arr", Mode::Read).unwrap();
        assert!(matches!(
            array.delete(),
            Err(ArrayError::InvalidMode { op: "delete", .. })
        ));
        let array = open_in(&ctx, "arr", Mode::Delete).unwrap();
        array.delete().unwrap();
        assert!(matches!(
            open_in(&ctx, "arr", Mode::Read),
            Err(ArrayError::Storage(StorageError::NotFound(_)))
        ));
    }
}
