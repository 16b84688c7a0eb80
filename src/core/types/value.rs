//! Decoded values read from or written to the inferior

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A typed value, as produced by decoding raw bytes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum MemoryValue {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    String(String),
}

impl MemoryValue {
    /// Integer view of the value, for integer variants only
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            MemoryValue::I8(v) => Some(v as i128),
            MemoryValue::I16(v) => Some(v as i128),
            MemoryValue::I32(v) => Some(v as i128),
            MemoryValue::I64(v) => Some(v as i128),
            MemoryValue::U8(v) => Some(v as i128),
            MemoryValue::U16(v) => Some(v as i128),
            MemoryValue::U32(v) => Some(v as i128),
            MemoryValue::U64(v) => Some(v as i128),
            _ => None,
        }
    }

    /// Floating point view of any numeric variant
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            MemoryValue::F32(v) => Some(v as f64),
            MemoryValue::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, MemoryValue::Bytes(_) | MemoryValue::String(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, MemoryValue::F32(_) | MemoryValue::F64(_))
    }

    /// Orders two numeric values; integers compare exactly, anything involving a
    /// float compares as `f64`. Text and byte arrays are not ordered.
    pub fn numeric_cmp(&self, other: &MemoryValue) -> Option<Ordering> {
        match (self.as_i128(), other.as_i128()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    /// Difference `self - other` for numeric values, as `f64`
    pub fn numeric_delta(&self, other: &MemoryValue) -> Option<f64> {
        match (self.as_i128(), other.as_i128()) {
            (Some(a), Some(b)) => Some((a - b) as f64),
            _ => Some(self.as_f64()? - other.as_f64()?),
        }
    }

    /// Equality that treats integers of different widths as equal when they
    /// hold the same number
    pub fn loosely_equals(&self, other: &MemoryValue) -> bool {
        if self.is_numeric() && other.is_numeric() {
            return self.numeric_cmp(other) == Some(Ordering::Equal);
        }
        self == other
    }
}

impl fmt::Display for MemoryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryValue::I8(v) => write!(f, "{}", v),
            MemoryValue::I16(v) => write!(f, "{}", v),
            MemoryValue::I32(v) => write!(f, "{}", v),
            MemoryValue::I64(v) => write!(f, "{}", v),
            MemoryValue::U8(v) => write!(f, "{}", v),
            MemoryValue::U16(v) => write!(f, "{}", v),
            MemoryValue::U32(v) => write!(f, "{}", v),
            MemoryValue::U64(v) => write!(f, "{}", v),
            MemoryValue::F32(v) => write!(f, "{}", v),
            MemoryValue::F64(v) => write!(f, "{}", v),
            MemoryValue::Bytes(b) => {
                let text: Vec<String> = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                write!(f, "{}", text.join(" "))
            }
            MemoryValue::String(s) => write!(f, "\"{}\"", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_views() {
        assert_eq!(MemoryValue::I8(-3).as_i128(), Some(-3));
        assert_eq!(MemoryValue::U64(u64::MAX).as_i128(), Some(u64::MAX as i128));
        assert_eq!(MemoryValue::F32(1.5).as_i128(), None);
        assert_eq!(MemoryValue::U16(7).as_f64(), Some(7.0));
        assert_eq!(MemoryValue::String("x".into()).as_f64(), None);
    }

    #[test]
    fn test_numeric_cmp() {
        assert_eq!(
            MemoryValue::U8(200).numeric_cmp(&MemoryValue::I8(-1)),
            Some(Ordering::Greater)
        );
        assert_eq!(
            MemoryValue::F64(2.5).numeric_cmp(&MemoryValue::I32(3)),
            Some(Ordering::Less)
        );
        assert_eq!(
            MemoryValue::Bytes(vec![1]).numeric_cmp(&MemoryValue::U8(1)),
            None
        );
        assert_eq!(MemoryValue::F64(f64::NAN).numeric_cmp(&MemoryValue::F64(1.0)), None);
    }

    #[test]
    fn test_delta_and_loose_equality() {
        assert_eq!(MemoryValue::U32(10).numeric_delta(&MemoryValue::U32(15)), Some(-5.0));
        assert!(MemoryValue::U32(5).loosely_equals(&MemoryValue::I64(5)));
        assert!(!MemoryValue::U32(5).loosely_equals(&MemoryValue::String("5".into())));
        assert!(MemoryValue::String("a".into()).loosely_equals(&MemoryValue::String("a".into())));
    }

    #[test]
    fn test_display() {
        assert_eq!(MemoryValue::I32(-42).to_string(), "-42");
        assert_eq!(MemoryValue::Bytes(vec![0xDE, 0xAD, 0x01]).to_string(), "DE AD 01");
        assert_eq!(MemoryValue::String("hp".into()).to_string(), "\"hp\"");
    }
}
