//! The closed catalog of value kinds and the `ValueType` built on it

use crate::core::types::{MemoryError, MemoryResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Text encodings available to string value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StringEncoding {
    Utf8,
    Utf16,
    Utf32,
}

impl StringEncoding {
    /// Size of one code unit in bytes
    pub const fn unit_size(&self) -> usize {
        match self {
            StringEncoding::Utf8 => 1,
            StringEncoding::Utf16 => 2,
            StringEncoding::Utf32 => 4,
        }
    }
}

/// Every kind of value the codec understands, in catalog order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    String(StringEncoding),
    Bytes,
}

impl ValueKind {
    /// Catalog order; the position of a kind here is its index
    pub const ALL: [ValueKind; 14] = [
        ValueKind::U8,
        ValueKind::U16,
        ValueKind::U32,
        ValueKind::U64,
        ValueKind::I8,
        ValueKind::I16,
        ValueKind::I32,
        ValueKind::I64,
        ValueKind::F32,
        ValueKind::F64,
        ValueKind::String(StringEncoding::Utf8),
        ValueKind::String(StringEncoding::Utf16),
        ValueKind::String(StringEncoding::Utf32),
        ValueKind::Bytes,
    ];

    /// Kind preselected in value-type pickers
    pub const DEFAULT: ValueKind = ValueKind::U32;

    /// Name used by the descriptor grammar
    pub const fn name(&self) -> &'static str {
        match self {
            ValueKind::U8 => "Byte",
            ValueKind::U16 => "2 Bytes",
            ValueKind::U32 => "4 Bytes",
            ValueKind::U64 => "8 Bytes",
            ValueKind::I8 => "Byte Signed",
            ValueKind::I16 => "2 Bytes Signed",
            ValueKind::I32 => "4 Bytes Signed",
            ValueKind::I64 => "8 Bytes Signed",
            ValueKind::F32 => "Float",
            ValueKind::F64 => "Double",
            ValueKind::String(StringEncoding::Utf8) => "String_UTF8",
            ValueKind::String(StringEncoding::Utf16) => "String_UTF16",
            ValueKind::String(StringEncoding::Utf32) => "String_UTF32",
            ValueKind::Bytes => "AoB",
        }
    }

    /// Human-facing label for selection lists
    pub const fn label(&self) -> &'static str {
        match self {
            ValueKind::Bytes => "Array of Bytes",
            other => other.name(),
        }
    }

    pub fn index(&self) -> usize {
        Self::ALL
            .iter()
            .position(|kind| kind == self)
            .unwrap_or(Self::ALL.len())
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Byte span of `count` elements of a counted kind; fails when the span
    /// does not fit in the address space
    pub fn checked_span(&self, count: usize) -> MemoryResult<usize> {
        let unit = match self {
            ValueKind::String(enc) => enc.unit_size(),
            _ => 1,
        };
        count.checked_mul(unit).ok_or_else(|| {
            MemoryError::InvalidDescriptor(format!(
                "{} elements of {} overflow the address space",
                count, self
            ))
        })
    }

    /// Byte width of fixed-size kinds
    pub const fn fixed_width(&self) -> Option<usize> {
        match self {
            ValueKind::U8 | ValueKind::I8 => Some(1),
            ValueKind::U16 | ValueKind::I16 => Some(2),
            ValueKind::U32 | ValueKind::I32 | ValueKind::F32 => Some(4),
            ValueKind::U64 | ValueKind::I64 | ValueKind::F64 => Some(8),
            ValueKind::String(_) | ValueKind::Bytes => None,
        }
    }

    /// Kinds whose descriptor carries a `[count]`
    pub const fn has_count(&self) -> bool {
        matches!(self, ValueKind::String(_) | ValueKind::Bytes)
    }

    pub const fn is_string(&self) -> bool {
        matches!(self, ValueKind::String(_))
    }

    pub const fn is_integer(&self) -> bool {
        matches!(
            self,
            ValueKind::U8
                | ValueKind::U16
                | ValueKind::U32
                | ValueKind::U64
                | ValueKind::I8
                | ValueKind::I16
                | ValueKind::I32
                | ValueKind::I64
        )
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, ValueKind::F32 | ValueKind::F64)
    }

    /// Stride used when enumerating candidate addresses
    pub const fn natural_alignment(&self) -> usize {
        match self {
            ValueKind::String(enc) => enc.unit_size(),
            ValueKind::Bytes => 1,
            _ => match self.fixed_width() {
                Some(width) => width,
                None => 1,
            },
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A concrete value type: a kind plus the element count and termination
/// flag that string and byte-array kinds carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueType {
    kind: ValueKind,
    count: usize,
    zero_terminated: bool,
}

impl ValueType {
    /// A fixed-width scalar type. Counted kinds get a count of zero.
    pub const fn scalar(kind: ValueKind) -> Self {
        ValueType {
            kind,
            count: 0,
            zero_terminated: true,
        }
    }

    /// A string of `count` code units
    pub const fn string(encoding: StringEncoding, count: usize, zero_terminated: bool) -> Self {
        ValueType {
            kind: ValueKind::String(encoding),
            count,
            zero_terminated,
        }
    }

    /// An array of `count` raw bytes
    pub const fn bytes(count: usize) -> Self {
        ValueType {
            kind: ValueKind::Bytes,
            count,
            zero_terminated: true,
        }
    }

    /// Builds a type from its parts; `count` and `zero_terminated` are ignored
    /// where the kind does not carry them
    pub const fn with_parts(kind: ValueKind, count: usize, zero_terminated: bool) -> Self {
        match kind {
            ValueKind::String(enc) => Self::string(enc, count, zero_terminated),
            ValueKind::Bytes => Self::bytes(count),
            _ => Self::scalar(kind),
        }
    }

    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    /// Element count for strings (code units) and byte arrays
    pub const fn element_count(&self) -> Option<usize> {
        if self.kind.has_count() {
            Some(self.count)
        } else {
            None
        }
    }

    /// Termination flag, meaningful for strings only
    pub const fn zero_terminated(&self) -> Option<bool> {
        if self.kind.is_string() {
            Some(self.zero_terminated)
        } else {
            None
        }
    }

    /// Number of bytes this type spans in memory. Saturates at `usize::MAX`,
    /// which no read or decode can satisfy.
    pub const fn width(&self) -> usize {
        match self.kind {
            ValueKind::String(enc) => self.count.saturating_mul(enc.unit_size()),
            ValueKind::Bytes => self.count,
            _ => match self.kind.fixed_width() {
                Some(width) => width,
                None => 0,
            },
        }
    }

    /// Returns the same type with a different element count
    pub fn set_count(self, count: usize) -> MemoryResult<Self> {
        if !self.kind.has_count() {
            return Err(MemoryError::InvalidDescriptor(format!(
                "{} has no element count",
                self.kind
            )));
        }
        self.kind.checked_span(count)?;
        Ok(ValueType { count, ..self })
    }

    /// Canonical descriptor text
    pub fn descriptor(&self) -> String {
        super::descriptor::to_descriptor(self)
    }
}

impl Default for ValueType {
    fn default() -> Self {
        ValueType::scalar(ValueKind::DEFAULT)
    }
}

impl From<ValueKind> for ValueType {
    fn from(kind: ValueKind) -> Self {
        ValueType::scalar(kind)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.descriptor())
    }
}

impl FromStr for ValueType {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        super::descriptor::from_descriptor(s).map(ValueType::from)
    }
}

impl Serialize for ValueType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.descriptor())
    }
}

impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
