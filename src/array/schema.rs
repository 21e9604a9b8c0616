//! Array schemas.

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::Context;

use super::{ArrayKind, Attribute, DataType, Domain, FilterError, FilterPipeline};

/// The default tile capacity in cells, used when a schema's capacity is 0.
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// A schema invariant violation.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A schema requires at least one attribute.
    #[error("an array schema requires at least one attribute")]
    NoAttributes,
    /// Attribute names must be non-empty.
    #[error("attribute name must be non-empty")]
    EmptyAttributeName,
    /// Attribute names are unique within a schema.
    #[error("duplicate attribute name {0:?} in schema")]
    DuplicateAttributeName(String),
    /// No attribute may share a name with a dimension.
    #[error("attribute name {0:?} collides with a dimension name")]
    AttributeCollidesWithDimension(String),
    /// Duplicate coordinates are only meaningful for sparse arrays.
    #[error("allow_duplicates requires a sparse array")]
    DuplicatesOnDenseArray,
    /// Hilbert cell order is only defined for sparse arrays.
    #[error("hilbert cell order is not supported for dense arrays")]
    HilbertOrderOnDenseArray,
    /// Dense arrays require integer-typed dimensions.
    #[error("dense arrays require integer dimensions, {dimension:?} is {data_type}")]
    NonIntegerDenseDimension {
        /// The offending dimension name.
        dimension: String,
        /// Its data type.
        data_type: DataType,
    },
    /// Dense arrays require all dimensions to share one data type.
    #[error("dense arrays require a homogeneous domain data type")]
    HeterogeneousDenseDomain,
    /// An explicit fill value does not match the attribute cell size.
    #[error("fill value for attribute {attribute:?} has {got} bytes, expected {expected}")]
    FillValueSize {
        /// The attribute name.
        attribute: String,
        /// The required size in bytes.
        expected: u64,
        /// The provided size in bytes.
        got: u64,
    },
    /// Attribute lookup failed.
    #[error("schema has no attribute named {0:?}")]
    AttributeNotFound(String),
    /// A filter pipeline is invalid.
    #[error(transparent)]
    Filter(#[from] FilterError),
}

/// The order cells are laid out within a tile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum CellOrder {
    /// Row-major (last dimension varies fastest).
    #[default]
    #[display("row_major")]
    RowMajor,
    /// Column-major (first dimension varies fastest).
    #[display("column_major")]
    ColumnMajor,
    /// Hilbert space-filling curve. Sparse arrays only.
    #[display("hilbert")]
    Hilbert,
}

/// The order tiles are laid out within the array.
///
/// There is no Hilbert tile order; that restriction is enforced by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum TileOrder {
    /// Row-major.
    #[default]
    #[display("row_major")]
    RowMajor,
    /// Column-major.
    #[display("column_major")]
    ColumnMajor,
}

/// A validated, immutable array blueprint.
///
/// Combines a [`Domain`], a non-empty set of [`Attribute`]s, layout orders, a tile
/// capacity, filter pipelines for coordinate and offset data, and the dense/sparse
/// tag. Built with [`ArraySchemaBuilder`]; there are no mutator operations. Once
/// an [`Array`](super::Array) has been created from a schema it may still be read
/// but can never change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArraySchema {
    kind: ArrayKind,
    domain: Domain,
    attributes: Vec<Attribute>,
    cell_order: CellOrder,
    tile_order: TileOrder,
    capacity: u64,
    coords_filters: FilterPipeline,
    offsets_filters: FilterPipeline,
    allow_duplicates: bool,
    #[serde(skip)]
    context: Option<Context>,
}

impl ArraySchema {
    /// Whether the array is dense or sparse.
    #[must_use]
    pub fn kind(&self) -> ArrayKind {
        self.kind
    }

    /// Whether the array is sparse.
    #[must_use]
    pub fn is_sparse(&self) -> bool {
        self.kind == ArrayKind::Sparse
    }

    /// The domain.
    #[must_use]
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// The attributes.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// The attribute named `name`.
    ///
    /// # Errors
    /// Returns [`SchemaError::AttributeNotFound`] if no attribute has that name.
    pub fn attribute(&self, name: &str) -> Result<&Attribute, SchemaError> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name() == name)
            .ok_or_else(|| SchemaError::AttributeNotFound(name.to_string()))
    }

    /// The cell order.
    #[must_use]
    pub fn cell_order(&self) -> CellOrder {
        self.cell_order
    }

    /// The tile order.
    #[must_use]
    pub fn tile_order(&self) -> TileOrder {
        self.tile_order
    }

    /// The raw capacity; 0 means the engine default.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// The effective tile capacity in cells, resolving 0 to [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn tile_capacity(&self) -> u64 {
        if self.capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            self.capacity
        }
    }

    /// The filter pipeline applied to coordinate data.
    #[must_use]
    pub fn coords_filters(&self) -> &FilterPipeline {
        &self.coords_filters
    }

    /// The filter pipeline applied to variable-length offset data.
    #[must_use]
    pub fn offsets_filters(&self) -> &FilterPipeline {
        &self.offsets_filters
    }

    /// Whether duplicate coordinates are allowed (sparse arrays only).
    #[must_use]
    pub fn allow_duplicates(&self) -> bool {
        self.allow_duplicates
    }

    /// The context the schema was built with, if any.
    #[must_use]
    pub fn context(&self) -> Option<&Context> {
        self.context.as_ref()
    }
}

/// Builder for [`ArraySchema`].
///
/// Enumerates every recognized schema option with its default: row-major cell and
/// tile order, capacity 0 (engine default), empty coordinate and offset filter
/// pipelines, duplicates disallowed, no bound context. The schema is validated as
/// a unit by [`build`](Self::build).
#[derive(Debug)]
pub struct ArraySchemaBuilder {
    kind: ArrayKind,
    domain: Domain,
    attributes: Vec<Attribute>,
    cell_order: CellOrder,
    tile_order: TileOrder,
    capacity: u64,
    coords_filters: FilterPipeline,
    offsets_filters: FilterPipeline,
    allow_duplicates: bool,
    context: Option<Context>,
}

impl ArraySchemaBuilder {
    /// Create a builder for an array of `kind` over `domain`.
    #[must_use]
    pub fn new(kind: ArrayKind, domain: Domain) -> Self {
        Self {
            kind,
            domain,
            attributes: Vec::new(),
            cell_order: CellOrder::default(),
            tile_order: TileOrder::default(),
            capacity: 0,
            coords_filters: FilterPipeline::new(),
            offsets_filters: FilterPipeline::new(),
            allow_duplicates: false,
            context: None,
        }
    }

    /// Add an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add attributes.
    #[must_use]
    pub fn attributes(mut self, attributes: impl IntoIterator<Item = Attribute>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Set the cell order (default row-major).
    #[must_use]
    pub fn cell_order(mut self, cell_order: CellOrder) -> Self {
        self.cell_order = cell_order;
        self
    }

    /// Set the tile order (default row-major).
    #[must_use]
    pub fn tile_order(mut self, tile_order: TileOrder) -> Self {
        self.tile_order = tile_order;
        self
    }

    /// Set the tile capacity in cells; 0 selects the engine default.
    #[must_use]
    pub fn capacity(mut self, capacity: u64) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the coordinate filter pipeline.
    #[must_use]
    pub fn coords_filters(mut self, filters: FilterPipeline) -> Self {
        self.coords_filters = filters;
        self
    }

    /// Set the variable-length offsets filter pipeline.
    #[must_use]
    pub fn offsets_filters(mut self, filters: FilterPipeline) -> Self {
        self.offsets_filters = filters;
        self
    }

    /// Allow duplicate coordinates (sparse arrays only).
    #[must_use]
    pub fn allow_duplicates(mut self, allow_duplicates: bool) -> Self {
        self.allow_duplicates = allow_duplicates;
        self
    }

    /// Bind the schema to a context, used to resolve array creation when no
    /// explicit context is passed.
    #[must_use]
    pub fn context(mut self, context: Context) -> Self {
        self.context = Some(context);
        self
    }

    /// Validate and build the schema.
    ///
    /// # Errors
    /// Returns the first [`SchemaError`] detected, in the order: attribute
    /// presence and uniqueness, attribute/dimension name collisions, the
    /// duplicates flag, layout orders, dense domain rules, filter pipelines.
    pub fn build(self) -> Result<ArraySchema, SchemaError> {
        if self.attributes.is_empty() {
            return Err(SchemaError::NoAttributes);
        }
        if let Some(name) = self
            .attributes
            .iter()
            .map(Attribute::name)
            .duplicates()
            .next()
        {
            return Err(SchemaError::DuplicateAttributeName(name.to_string()));
        }
        if let Some(attribute) = self
            .attributes
            .iter()
            .find(|attribute| self.domain.contains(attribute.name()))
        {
            return Err(SchemaError::AttributeCollidesWithDimension(
                attribute.name().to_string(),
            ));
        }
        if self.allow_duplicates && self.kind == ArrayKind::Dense {
            return Err(SchemaError::DuplicatesOnDenseArray);
        }
        if self.cell_order == CellOrder::Hilbert && self.kind == ArrayKind::Dense {
            return Err(SchemaError::HilbertOrderOnDenseArray);
        }
        if self.kind == ArrayKind::Dense {
            for dimension in self.domain.dimensions() {
                if !dimension.data_type().is_integer() {
                    return Err(SchemaError::NonIntegerDenseDimension {
                        dimension: dimension.name().to_string(),
                        data_type: dimension.data_type(),
                    });
                }
            }
            if !self
                .domain
                .dimensions()
                .iter()
                .map(|dimension| dimension.data_type())
                .all_equal()
            {
                return Err(SchemaError::HeterogeneousDenseDomain);
            }
        }
        for dimension in self.domain.dimensions() {
            self.coords_filters.validate(dimension.data_type())?;
        }
        self.offsets_filters.validate(DataType::UInt64)?;
        Ok(ArraySchema {
            kind: self.kind,
            domain: self.domain,
            attributes: self.attributes,
            cell_order: self.cell_order,
            tile_order: self.tile_order,
            capacity: self.capacity,
            coords_filters: self.coords_filters,
            offsets_filters: self.offsets_filters,
            allow_duplicates: self.allow_duplicates,
            context: self.context,
        })
    }
}
