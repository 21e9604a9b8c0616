//! Array domains.

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use super::{Dimension, DomainError};

/// The multidimensional coordinate space of an array: an ordered collection of
/// [`Dimension`]s.
///
/// Dimension order is semantically meaningful; it defines the coordinate tuple
/// order for every coordinate-producing operation. A domain is immutable once
/// constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    dimensions: Vec<Dimension>,
}

impl Domain {
    /// Create a domain from an ordered, non-empty sequence of dimensions.
    ///
    /// # Errors
    /// Returns [`DomainError::EmptyDomain`] if `dimensions` is empty, or
    /// [`DomainError::DuplicateDimensionName`] if two dimensions share a name
    /// (case-sensitive).
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self, DomainError> {
        if dimensions.is_empty() {
            return Err(DomainError::EmptyDomain);
        }
        if let Some(name) = dimensions
            .iter()
            .map(Dimension::name)
            .duplicates()
            .next()
        {
            return Err(DomainError::DuplicateDimensionName(name.to_string()));
        }
        Ok(Self { dimensions })
    }

    /// The number of dimensions.
    #[must_use]
    pub fn num_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    /// The dimensions, in coordinate tuple order.
    #[must_use]
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// The dimension at `index`.
    #[must_use]
    pub fn dimension(&self, index: usize) -> Option<&Dimension> {
        self.dimensions.get(index)
    }

    /// The dimension named `name`.
    ///
    /// # Errors
    /// Returns [`DomainError::DimensionNotFound`] if no dimension has that name.
    pub fn dimension_by_name(&self, name: &str) -> Result<&Dimension, DomainError> {
        self.dimensions
            .iter()
            .find(|dimension| dimension.name() == name)
            .ok_or_else(|| DomainError::DimensionNotFound(name.to_string()))
    }

    /// Whether the domain contains a dimension named `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.dimensions
            .iter()
            .any(|dimension| dimension.name() == name)
    }

    /// The dimension names, in coordinate tuple order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dimensions.iter().map(Dimension::name)
    }

    /// The cell counts along each axis, if every dimension is integer-typed.
    #[must_use]
    pub fn shape(&self) -> Option<Vec<u64>> {
        self.dimensions.iter().map(Dimension::span).collect()
    }
}
