//! Array dimensions.
//!
//! A dimension is one axis of a [`Domain`](super::Domain): a name, a value type,
//! an inclusive range, and a tile extent that sets the tiling granularity along
//! the axis. Dimensions are immutable once constructed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DataType;

/// A dimension or domain construction error.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Dimension names must be non-empty.
    #[error("dimension name must be non-empty")]
    EmptyDimensionName,
    /// The constraints value-type family does not match the dimension data type.
    #[error("dimension {dimension:?} constraints do not match data type {data_type}")]
    DataTypeMismatch {
        /// The dimension name.
        dimension: String,
        /// The dimension data type.
        data_type: DataType,
    },
    /// The domain range is inverted or not comparable.
    #[error("dimension {dimension:?} range [{lo}, {hi}] is invalid, expected lo <= hi")]
    InvalidRange {
        /// The dimension name.
        dimension: String,
        /// The range lower bound.
        lo: String,
        /// The range upper bound.
        hi: String,
    },
    /// The tile extent is non-positive or exceeds the range span.
    #[error("dimension {dimension:?} tile extent {extent} is invalid for span {span}")]
    InvalidTileExtent {
        /// The dimension name.
        dimension: String,
        /// The rejected tile extent.
        extent: String,
        /// The span of the dimension range.
        span: String,
    },
    /// A domain must have at least one dimension.
    #[error("a domain requires at least one dimension")]
    EmptyDomain,
    /// Dimension names are unique within a domain (case-sensitive).
    #[error("duplicate dimension name {0:?} in domain")]
    DuplicateDimensionName(String),
    /// Name lookup failed.
    #[error("domain has no dimension named {0:?}")]
    DimensionNotFound(String),
}

/// The typed range and tile extent of a dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionConstraints {
    /// An integer axis with an inclusive `[lo, hi]` range and tile extent.
    Int {
        /// Inclusive range.
        range: [i64; 2],
        /// Tile extent in cells.
        extent: i64,
    },
    /// A floating point axis with an inclusive `[lo, hi]` range and tile extent.
    Float {
        /// Inclusive range.
        range: [f64; 2],
        /// Tile extent.
        extent: f64,
    },
    /// A string axis. Unbounded; valid only for sparse arrays.
    String,
}

impl DimensionConstraints {
    /// Integer constraints from an inclusive `[lo, hi]` range and tile extent.
    #[must_use]
    pub fn int(range: [i64; 2], extent: i64) -> Self {
        Self::Int { range, extent }
    }

    /// Floating point constraints from an inclusive `[lo, hi]` range and tile extent.
    #[must_use]
    pub fn float(range: [f64; 2], extent: f64) -> Self {
        Self::Float { range, extent }
    }
}

/// One axis of a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    name: String,
    data_type: DataType,
    constraints: DimensionConstraints,
}

impl Dimension {
    /// Create a dimension.
    ///
    /// # Errors
    /// Returns a [`DomainError`] if the name is empty, the constraints family does
    /// not match `data_type`, the range is inverted, or the tile extent is
    /// non-positive or larger than the range span. A zero-span float range
    /// accepts any positive extent.
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        constraints: DimensionConstraints,
    ) -> Result<Self, DomainError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::EmptyDimensionName);
        }
        match constraints {
            DimensionConstraints::Int {
                range: [lo, hi],
                extent,
            } => {
                if !data_type.is_integer() {
                    return Err(DomainError::DataTypeMismatch {
                        dimension: name,
                        data_type,
                    });
                }
                if lo > hi {
                    return Err(DomainError::InvalidRange {
                        dimension: name,
                        lo: lo.to_string(),
                        hi: hi.to_string(),
                    });
                }
                let span = i128::from(hi) - i128::from(lo) + 1;
                if extent <= 0 || i128::from(extent) > span {
                    return Err(DomainError::InvalidTileExtent {
                        dimension: name,
                        extent: extent.to_string(),
                        span: span.to_string(),
                    });
                }
            }
            DimensionConstraints::Float {
                range: [lo, hi],
                extent,
            } => {
                if !data_type.is_float() {
                    return Err(DomainError::DataTypeMismatch {
                        dimension: name,
                        data_type,
                    });
                }
                // NaN bounds fail the comparison and are rejected here.
                if !(lo <= hi) {
                    return Err(DomainError::InvalidRange {
                        dimension: name,
                        lo: lo.to_string(),
                        hi: hi.to_string(),
                    });
                }
                let span = hi - lo;
                // A zero-span float range (lo == hi) has no tiling granularity
                // to bound; any positive extent is accepted.
                if !(extent > 0.0) || (span > 0.0 && extent > span) {
                    return Err(DomainError::InvalidTileExtent {
                        dimension: name,
                        extent: extent.to_string(),
                        span: span.to_string(),
                    });
                }
            }
            DimensionConstraints::String => {
                if !data_type.is_string() {
                    return Err(DomainError::DataTypeMismatch {
                        dimension: name,
                        data_type,
                    });
                }
            }
        }
        Ok(Self {
            name,
            data_type,
            constraints,
        })
    }

    /// The dimension name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The dimension value type.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// The dimension constraints (range and tile extent).
    #[must_use]
    pub fn constraints(&self) -> &DimensionConstraints {
        &self.constraints
    }

    /// The inclusive integer range, if this is an integer dimension.
    #[must_use]
    pub fn int_range(&self) -> Option<[i64; 2]> {
        match self.constraints {
            DimensionConstraints::Int { range, .. } => Some(range),
            _ => None,
        }
    }

    /// The integer tile extent, if this is an integer dimension.
    #[must_use]
    pub fn int_tile_extent(&self) -> Option<i64> {
        match self.constraints {
            DimensionConstraints::Int { extent, .. } => Some(extent),
            _ => None,
        }
    }

    /// The number of cells along this axis, if this is an integer dimension.
    #[must_use]
    pub fn span(&self) -> Option<u64> {
        let [lo, hi] = self.int_range()?;
        Some(u64::try_from(i128::from(hi) - i128::from(lo) + 1).unwrap_or(u64::MAX))
    }
}
