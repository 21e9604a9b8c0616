//! Subarrays: inclusive per-dimension coordinate ranges.

use serde::{Deserialize, Serialize};

use super::{ArrayError, DimensionConstraints, Domain};

/// An inclusive `[lo, hi]` range per dimension, selecting a rectangular region of
/// an integer-dimensioned domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subarray {
    ranges: Vec<[i64; 2]>,
}

impl Subarray {
    /// Create a subarray from inclusive per-dimension ranges.
    #[must_use]
    pub fn new(ranges: Vec<[i64; 2]>) -> Self {
        Self { ranges }
    }

    /// The subarray covering the full extent of `domain`.
    ///
    /// # Errors
    /// Returns [`ArrayError::NonIntegerDimension`] if a dimension is not
    /// integer-typed.
    pub fn from_domain(domain: &Domain) -> Result<Self, ArrayError> {
        let ranges = domain
            .dimensions()
            .iter()
            .map(|dimension| {
                dimension
                    .int_range()
                    .ok_or_else(|| ArrayError::NonIntegerDimension {
                        dimension: dimension.name().to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ranges })
    }

    /// The number of dimensions.
    #[must_use]
    pub fn num_dimensions(&self) -> usize {
        self.ranges.len()
    }

    /// The per-dimension ranges.
    #[must_use]
    pub fn ranges(&self) -> &[[i64; 2]] {
        &self.ranges
    }

    /// The range along dimension `index`.
    #[must_use]
    pub fn range(&self, index: usize) -> [i64; 2] {
        self.ranges[index]
    }

    /// The number of cells along each dimension.
    #[must_use]
    pub fn extents(&self) -> Vec<u64> {
        self.ranges
            .iter()
            .map(|[lo, hi]| u64::try_from(i128::from(*hi) - i128::from(*lo) + 1).unwrap_or(0))
            .collect()
    }

    /// The total number of cells selected, or [`None`] if the product overflows
    /// a `u64`.
    #[must_use]
    pub fn cell_count(&self) -> Option<u64> {
        self.extents()
            .iter()
            .try_fold(1u64, |count, extent| count.checked_mul(*extent))
    }

    /// Validate the subarray against `domain`: matching dimensionality, ordered
    /// ranges, and in-bounds endpoints.
    ///
    /// # Errors
    /// Returns an [`ArrayError`] describing the offending dimension.
    pub fn validate(&self, domain: &Domain) -> Result<(), ArrayError> {
        if self.ranges.len() != domain.num_dimensions() {
            return Err(ArrayError::SubarrayDimensionality {
                expected: domain.num_dimensions(),
                got: self.ranges.len(),
            });
        }
        for (range, dimension) in self.ranges.iter().zip(domain.dimensions()) {
            let [lo, hi] = *range;
            let bounds = match dimension.constraints() {
                DimensionConstraints::Int { range, .. } => *range,
                DimensionConstraints::Float { .. } | DimensionConstraints::String => {
                    return Err(ArrayError::NonIntegerDimension {
                        dimension: dimension.name().to_string(),
                    })
                }
            };
            if lo > hi || lo < bounds[0] || hi > bounds[1] {
                return Err(ArrayError::SubarrayOutOfBounds {
                    dimension: dimension.name().to_string(),
                    lo,
                    hi,
                });
            }
        }
        Ok(())
    }

    /// The intersection with `other`, or [`None`] if they are disjoint or differ
    /// in dimensionality.
    #[must_use]
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        if self.ranges.len() != other.ranges.len() {
            return None;
        }
        let ranges = self
            .ranges
            .iter()
            .zip(&other.ranges)
            .map(|(a, b)| {
                let lo = a[0].max(b[0]);
                let hi = a[1].min(b[1]);
                (lo <= hi).then_some([lo, hi])
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { ranges })
    }

    /// The row-major linear index of `coord` within this subarray.
    ///
    /// `coord` must lie inside the subarray and match its dimensionality.
    pub(crate) fn linear_index(&self, coord: &[i64]) -> u64 {
        let extents = self.extents();
        let mut index = 0u64;
        for (d, range) in self.ranges.iter().enumerate() {
            let offset = u64::try_from(i128::from(coord[d]) - i128::from(range[0])).unwrap_or(0);
            index = index * extents[d] + offset;
        }
        index
    }
}
