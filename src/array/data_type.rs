//! Value types for dimensions and attributes.

use serde::{Deserialize, Serialize};

use super::FillValue;

/// The value type of an attribute or dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// `int8` Integer in `[-2^7, 2^7-1]`.
    #[display("int8")]
    Int8,
    /// `int16` Integer in `[-2^15, 2^15-1]`.
    #[display("int16")]
    Int16,
    /// `int32` Integer in `[-2^31, 2^31-1]`.
    #[display("int32")]
    Int32,
    /// `int64` Integer in `[-2^63, 2^63-1]`.
    #[display("int64")]
    Int64,
    /// `uint8` Integer in `[0, 2^8-1]`.
    #[display("uint8")]
    UInt8,
    /// `uint16` Integer in `[0, 2^16-1]`.
    #[display("uint16")]
    UInt16,
    /// `uint32` Integer in `[0, 2^32-1]`.
    #[display("uint32")]
    UInt32,
    /// `uint64` Integer in `[0, 2^64-1]`.
    #[display("uint64")]
    UInt64,
    /// `float32` IEEE 754 single-precision floating point.
    #[display("float32")]
    Float32,
    /// `float64` IEEE 754 double-precision floating point.
    #[display("float64")]
    Float64,
    /// An ASCII string.
    #[display("string_ascii")]
    StringAscii,
    /// A UTF-8 encoded string.
    #[display("string_utf8")]
    StringUtf8,
}

/// The size of a data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataTypeSize {
    /// Fixed size (in bytes).
    Fixed(usize),
    /// Variable sized.
    Variable,
}

impl DataType {
    /// The size of one value of this data type.
    #[must_use]
    pub fn size(self) -> DataTypeSize {
        match self {
            Self::Int8 | Self::UInt8 => DataTypeSize::Fixed(1),
            Self::Int16 | Self::UInt16 => DataTypeSize::Fixed(2),
            Self::Int32 | Self::UInt32 | Self::Float32 => DataTypeSize::Fixed(4),
            Self::Int64 | Self::UInt64 | Self::Float64 => DataTypeSize::Fixed(8),
            Self::StringAscii | Self::StringUtf8 => DataTypeSize::Variable,
        }
    }

    /// The fixed size of one value of this data type, if it has one.
    #[must_use]
    pub fn fixed_size(self) -> Option<usize> {
        match self.size() {
            DataTypeSize::Fixed(size) => Some(size),
            DataTypeSize::Variable => None,
        }
    }

    /// Whether this is an integer type (signed or unsigned).
    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// Whether this is a floating point type.
    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Whether this is a string type.
    #[must_use]
    pub fn is_string(self) -> bool {
        matches!(self, Self::StringAscii | Self::StringUtf8)
    }

    /// The default fill value for this data type.
    ///
    /// Signed integers fill with their minimum, unsigned integers with their
    /// maximum, floats with NaN, and strings with the empty string.
    #[must_use]
    pub fn default_fill_value(self) -> FillValue {
        match self {
            Self::Int8 => FillValue::from(i8::MIN),
            Self::Int16 => FillValue::from(i16::MIN),
            Self::Int32 => FillValue::from(i32::MIN),
            Self::Int64 => FillValue::from(i64::MIN),
            Self::UInt8 => FillValue::from(u8::MAX),
            Self::UInt16 => FillValue::from(u16::MAX),
            Self::UInt32 => FillValue::from(u32::MAX),
            Self::UInt64 => FillValue::from(u64::MAX),
            Self::Float32 => FillValue::from(f32::NAN),
            Self::Float64 => FillValue::from(f64::NAN),
            Self::StringAscii | Self::StringUtf8 => FillValue::new(vec![]),
        }
    }
}
