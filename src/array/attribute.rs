//! Array attributes.

use serde::{Deserialize, Serialize};

use super::{DataType, DataTypeSize, FillValue, FilterPipeline, SchemaError};

/// A named, typed value stored per cell, optionally variable-length, optionally
/// filtered.
///
/// Attributes are immutable after construction; the `with_*` methods consume and
/// return the attribute during setup. Whether an attribute name collides with a
/// dimension name is checked by
/// [`ArraySchemaBuilder::build`](super::ArraySchemaBuilder::build), since the
/// domain may not exist when the attribute is constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    name: String,
    data_type: DataType,
    var_sized: bool,
    filters: FilterPipeline,
    fill_value: FillValue,
}

impl Attribute {
    /// Create an attribute with an empty filter pipeline and the data type's
    /// default fill value.
    ///
    /// # Errors
    /// Returns [`SchemaError::EmptyAttributeName`] if `name` is empty.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Result<Self, SchemaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::EmptyAttributeName);
        }
        Ok(Self {
            name,
            data_type,
            var_sized: false,
            filters: FilterPipeline::new(),
            fill_value: data_type.default_fill_value(),
        })
    }

    /// Mark the attribute as holding a variable number of values per cell.
    #[must_use]
    pub fn with_var_sized(mut self, var_sized: bool) -> Self {
        self.var_sized = var_sized;
        self
    }

    /// Set the filter pipeline, validating it against the attribute data type.
    ///
    /// # Errors
    /// Returns [`SchemaError::Filter`] if a filter is unsupported for the data
    /// type or carries invalid parameters.
    pub fn with_filters(mut self, filters: FilterPipeline) -> Result<Self, SchemaError> {
        filters.validate(self.data_type)?;
        self.filters = filters;
        Ok(self)
    }

    /// Set an explicit fill value.
    ///
    /// # Errors
    /// Returns [`SchemaError::FillValueSize`] if the value size does not match the
    /// fixed cell size of the attribute.
    pub fn with_fill_value(mut self, fill_value: FillValue) -> Result<Self, SchemaError> {
        if let Some(expected) = self.cell_size() {
            if fill_value.size() as u64 != expected {
                return Err(SchemaError::FillValueSize {
                    attribute: self.name,
                    expected,
                    got: fill_value.size() as u64,
                });
            }
        }
        self.fill_value = fill_value;
        Ok(self)
    }

    /// The attribute name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The attribute value type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Whether cells hold a variable number of values.
    #[must_use]
    pub fn is_var_sized(&self) -> bool {
        self.var_sized || matches!(self.data_type.size(), DataTypeSize::Variable)
    }

    /// The filter pipeline.
    #[must_use]
    pub fn filters(&self) -> &FilterPipeline {
        &self.filters
    }

    /// The fill value.
    #[must_use]
    pub fn fill_value(&self) -> &FillValue {
        &self.fill_value
    }

    /// The fixed size in bytes of one cell, or [`None`] for var-sized attributes.
    #[must_use]
    pub fn cell_size(&self) -> Option<u64> {
        if self.var_sized {
            None
        } else {
            self.data_type.fixed_size().map(|size| size as u64)
        }
    }
}
