//! Filter pipelines.
//!
//! A filter is a reversible data transform (compression, bit-width reduction,
//! delta encoding, checksumming) applied to attribute, coordinate, or offset data
//! before it is persisted. Only the stable identifier list and filter parameters
//! are part of this core; the transforms themselves are executed by the storage
//! engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DataType;

/// A filter specification error.
#[derive(Debug, Error)]
pub enum FilterError {
    /// The compression level is outside the supported range.
    #[error("{filter} level {level} is outside [{min}, {max}]")]
    InvalidLevel {
        /// The filter name.
        filter: &'static str,
        /// The rejected level.
        level: i64,
        /// Minimum supported level.
        min: i64,
        /// Maximum supported level.
        max: i64,
    },
    /// The filter does not support the data type it is applied to.
    #[error("{filter} does not support data type {data_type}")]
    UnsupportedDataType {
        /// The filter name.
        filter: &'static str,
        /// The rejected data type.
        data_type: DataType,
    },
    /// The filter window must be non-zero.
    #[error("{filter} requires a non-zero window")]
    InvalidWindow {
        /// The filter name.
        filter: &'static str,
    },
}

/// A data transform applied to stored values, identified by a stable enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Filter {
    /// DEFLATE compression.
    Gzip {
        /// Compression level in `[0, 9]`.
        level: u32,
    },
    /// Zstandard compression.
    Zstd {
        /// Compression level in `[-7, 22]`.
        level: i32,
    },
    /// LZ4 compression.
    Lz4,
    /// Bzip2 compression.
    Bzip2 {
        /// Compression level in `[1, 9]`.
        level: u32,
    },
    /// Run-length encoding.
    Rle,
    /// Double-delta encoding of integer values.
    DoubleDelta,
    /// Positive-delta encoding of integer values.
    PositiveDelta {
        /// Maximum encoding window in values.
        max_window: u32,
    },
    /// Bit-width reduction of integer values.
    BitWidthReduction {
        /// Maximum encoding window in values.
        max_window: u32,
    },
    /// Byte-level shuffle.
    ByteShuffle,
    /// Bit-level shuffle.
    BitShuffle,
    /// CRC32C checksum.
    ChecksumCrc32c,
}

impl Filter {
    /// The stable name of the filter.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gzip { .. } => "gzip",
            Self::Zstd { .. } => "zstd",
            Self::Lz4 => "lz4",
            Self::Bzip2 { .. } => "bzip2",
            Self::Rle => "rle",
            Self::DoubleDelta => "double_delta",
            Self::PositiveDelta { .. } => "positive_delta",
            Self::BitWidthReduction { .. } => "bit_width_reduction",
            Self::ByteShuffle => "byte_shuffle",
            Self::BitShuffle => "bit_shuffle",
            Self::ChecksumCrc32c => "checksum_crc32c",
        }
    }

    /// Validate the filter parameters against the data type the filter applies to.
    ///
    /// # Errors
    /// Returns a [`FilterError`] for an out-of-range level, a zero window, or a
    /// filter applied to an unsupported data type.
    pub fn validate(&self, data_type: DataType) -> Result<(), FilterError> {
        match *self {
            Self::Gzip { level } => check_level("gzip", i64::from(level), 0, 9),
            Self::Zstd { level } => check_level("zstd", i64::from(level), -7, 22),
            Self::Bzip2 { level } => check_level("bzip2", i64::from(level), 1, 9),
            Self::DoubleDelta => check_integer("double_delta", data_type),
            Self::PositiveDelta { max_window } => {
                check_integer("positive_delta", data_type)?;
                check_window("positive_delta", max_window)
            }
            Self::BitWidthReduction { max_window } => {
                check_integer("bit_width_reduction", data_type)?;
                check_window("bit_width_reduction", max_window)
            }
            Self::Lz4 | Self::Rle | Self::ByteShuffle | Self::BitShuffle | Self::ChecksumCrc32c => {
                Ok(())
            }
        }
    }
}

fn check_level(filter: &'static str, level: i64, min: i64, max: i64) -> Result<(), FilterError> {
    if (min..=max).contains(&level) {
        Ok(())
    } else {
        Err(FilterError::InvalidLevel {
            filter,
            level,
            min,
            max,
        })
    }
}

fn check_integer(filter: &'static str, data_type: DataType) -> Result<(), FilterError> {
    if data_type.is_integer() {
        Ok(())
    } else {
        Err(FilterError::UnsupportedDataType { filter, data_type })
    }
}

fn check_window(filter: &'static str, max_window: u32) -> Result<(), FilterError> {
    if max_window == 0 {
        Err(FilterError::InvalidWindow { filter })
    } else {
        Ok(())
    }
}

/// An ordered list of filters applied in sequence to stored data.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Deref,
    derive_more::From,
)]
pub struct FilterPipeline(Vec<Filter>);

impl FilterPipeline {
    /// Create an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every filter in the pipeline against `data_type`.
    ///
    /// # Errors
    /// Returns the first [`FilterError`] encountered, in pipeline order.
    pub fn validate(&self, data_type: DataType) -> Result<(), FilterError> {
        self.0
            .iter()
            .try_for_each(|filter| filter.validate(data_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_level_ranges() {
        assert!(Filter::Gzip { level: 9 }.validate(DataType::Int32).is_ok());
        assert!(matches!(
            Filter::Gzip { level: 10 }.validate(DataType::Int32),
            Err(FilterError::InvalidLevel { filter: "gzip", level: 10, .. })
        ));
        assert!(Filter::Zstd { level: -7 }.validate(DataType::Float64).is_ok());
        assert!(matches!(
            Filter::Bzip2 { level: 0 }.validate(DataType::UInt8),
            Err(FilterError::InvalidLevel { filter: "bzip2", .. })
        ));
    }

    #[test]
    fn integer_only_filters() {
        assert!(Filter::DoubleDelta.validate(DataType::Int16).is_ok());
        assert!(matches!(
            Filter::DoubleDelta.validate(DataType::Float32),
            Err(FilterError::UnsupportedDataType { .. })
        ));
        assert!(matches!(
            Filter::PositiveDelta { max_window: 1024 }.validate(DataType::StringUtf8),
            Err(FilterError::UnsupportedDataType { .. })
        ));
    }

    #[test]
    fn zero_window_rejected() {
        assert!(matches!(
            Filter::BitWidthReduction { max_window: 0 }.validate(DataType::UInt32),
            Err(FilterError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn pipeline_validates_in_order() {
        let pipeline = FilterPipeline::from(vec![
            Filter::ByteShuffle,
            Filter::Gzip { level: 6 },
            Filter::ChecksumCrc32c,
        ]);
        assert!(pipeline.validate(DataType::Float32).is_ok());

        let pipeline = FilterPipeline::from(vec![Filter::Lz4, Filter::DoubleDelta]);
        assert!(pipeline.validate(DataType::Float32).is_err());
    }

    #[test]
    fn filter_serde_round_trip() {
        let pipeline = FilterPipeline::from(vec![
            Filter::Zstd { level: 3 },
            Filter::PositiveDelta { max_window: 256 },
        ]);
        let json = serde_json::to_string(&pipeline).unwrap();
        let back: FilterPipeline = serde_json::from_str(&json).unwrap();
        assert_eq!(pipeline, back);
    }
}
