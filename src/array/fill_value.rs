//! Attribute fill values.

use serde::{Deserialize, Serialize};

/// The fill value of an attribute.
///
/// Provides an element value for cells of a dense array that have not been
/// explicitly written. Held as native-endian bytes.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct FillValue(Vec<u8>);

impl core::fmt::Display for FillValue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl From<Vec<u8>> for FillValue {
    fn from(value: Vec<u8>) -> Self {
        FillValue(value)
    }
}

impl From<bool> for FillValue {
    fn from(value: bool) -> Self {
        FillValue(vec![u8::from(value)])
    }
}

impl From<u8> for FillValue {
    fn from(value: u8) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<u16> for FillValue {
    fn from(value: u16) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<u32> for FillValue {
    fn from(value: u32) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<u64> for FillValue {
    fn from(value: u64) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<i8> for FillValue {
    fn from(value: i8) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<i16> for FillValue {
    fn from(value: i16) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<i32> for FillValue {
    fn from(value: i32) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<i64> for FillValue {
    fn from(value: i64) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<f32> for FillValue {
    fn from(value: f32) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<f64> for FillValue {
    fn from(value: f64) -> Self {
        FillValue(value.to_ne_bytes().to_vec())
    }
}

impl From<&str> for FillValue {
    fn from(value: &str) -> Self {
        FillValue(value.as_bytes().to_vec())
    }
}

impl FillValue {
    /// Create a new fill value composed of `bytes`.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> FillValue {
        FillValue(bytes)
    }

    /// Returns the size in bytes of the fill value.
    #[must_use]
    pub fn size(&self) -> usize {
        self.0.len()
    }

    /// Return the byte representation of the fill value.
    #[must_use]
    pub fn as_ne_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Check if the bytes are entirely composed of repetitions of the fill value.
    #[must_use]
    pub fn equals_all(&self, bytes: &[u8]) -> bool {
        if self.0.is_empty() {
            return bytes.is_empty();
        }
        bytes.len() % self.0.len() == 0
            && bytes
                .chunks_exact(self.0.len())
                .all(|chunk| chunk == self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_value_round_trip() {
        assert_eq!(FillValue::from(42i32).as_ne_bytes(), 42i32.to_ne_bytes());
        assert_eq!(FillValue::from(-1i64).as_ne_bytes(), (-1i64).to_ne_bytes());
        assert_eq!(FillValue::from(1.5f64).as_ne_bytes(), 1.5f64.to_ne_bytes());
        assert_eq!(FillValue::from("ab").as_ne_bytes(), b"ab");
        assert_eq!(FillValue::from(7u16).size(), 2);
    }

    #[test]
    fn fill_value_equals_all() {
        let fill = FillValue::from(i32::MIN);
        let repeated: Vec<u8> = i32::MIN.to_ne_bytes().repeat(3);
        assert!(fill.equals_all(&repeated));
        assert!(!fill.equals_all(&0i32.to_ne_bytes()));
        assert!(!fill.equals_all(&repeated[1..]));
        assert!(FillValue::new(vec![]).equals_all(&[]));
    }
}
