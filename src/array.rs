//! Array schemas and arrays.
//!
//! An array is described by an [`ArraySchema`]: a [`Domain`] of [`Dimension`]s, a
//! set of [`Attribute`]s, layout orders, a capacity, and a dense/sparse tag. A
//! schema is validated as a unit by [`ArraySchemaBuilder::build`] and is immutable
//! afterwards. [`Array::create`] persists a schema at a uri; [`Array::open`]
//! produces a live handle in a [`Mode`] that must be closed exactly once.

mod array_errors;
mod array_open;
mod attribute;
mod cell_buffers;
pub mod data_type;
mod dimension;
mod domain;
mod fill_value;
pub mod filter;
mod schema;
mod subarray;

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use self::{
    array_errors::ArrayError,
    array_open::{Array, ArrayMetadata, CreateOptions, OpenOptions},
    attribute::Attribute,
    cell_buffers::{CellBuffers, FieldBuffer},
    data_type::{DataType, DataTypeSize},
    dimension::{Dimension, DimensionConstraints, DomainError},
    domain::Domain,
    fill_value::FillValue,
    filter::{Filter, FilterError, FilterPipeline},
    schema::{ArraySchema, ArraySchemaBuilder, CellOrder, SchemaError, TileOrder},
    subarray::Subarray,
};

/// Whether an array is dense or sparse.
///
/// Dense arrays hold a value for every coordinate of the domain; sparse arrays
/// hold values only at explicitly written coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum ArrayKind {
    /// Every coordinate in the domain holds a value for every attribute.
    #[display("dense")]
    Dense,
    /// Only an explicit subset of coordinates hold values.
    #[display("sparse")]
    Sparse,
}

/// The mode an array is opened in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Read array data at a point in time.
    #[default]
    #[display("read")]
    Read,
    /// Write new fragments.
    #[display("write")]
    Write,
    /// Delete the array.
    #[display("delete")]
    Delete,
    /// Write with exclusive access to the array.
    #[display("modify_exclusive")]
    ModifyExclusive,
}

impl Mode {
    /// Whether the mode permits writing cells.
    #[must_use]
    pub fn is_write(self) -> bool {
        matches!(self, Self::Write | Self::ModifyExclusive)
    }
}

impl FromStr for Mode {
    type Err = ArrayError;

    /// Parse a mode from its name or its single-letter binding form
    /// (`"r"`, `"w"`, `"d"`, `"m"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" | "read" => Ok(Self::Read),
            "w" | "write" => Ok(Self::Write),
            "d" | "delete" => Ok(Self::Delete),
            "m" | "modify_exclusive" => Ok(Self::ModifyExclusive),
            _ => Err(ArrayError::UnsupportedMode(s.to_string())),
        }
    }
}
