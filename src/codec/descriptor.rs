//! Descriptor grammar: `Name`, `Name[count]` or `Name[count],NZT`
//!
//! Descriptors are persisted in saved scans and configuration files, so the
//! text produced here must stay byte-for-byte stable.

use super::kind::{ValueKind, ValueType};
use crate::core::types::{MemoryError, MemoryResult};
use lazy_static::lazy_static;
use regex::Regex;

/// Marker for strings that are not zero-terminated
pub const NZT_MARKER: &str = ",NZT";

/// Text returned for a catalog index that does not exist
pub const OUT_OF_BOUNDS: &str = "out of bounds";

lazy_static! {
    static ref COUNT_PATTERN: Regex = Regex::new(r"\[(\d+)\]").unwrap();
}

/// Everything a descriptor encodes; fields a kind does not carry are `None`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDescriptor {
    pub kind: ValueKind,
    /// Element count, for strings and byte arrays
    pub count: Option<usize>,
    /// Termination flag, for strings
    pub zero_terminated: Option<bool>,
    /// Bytes spanned; unknown for strings since it depends on the encoding
    pub byte_length: Option<usize>,
}

impl From<ParsedDescriptor> for ValueType {
    fn from(parsed: ParsedDescriptor) -> Self {
        ValueType::with_parts(
            parsed.kind,
            parsed.count.unwrap_or(0),
            parsed.zero_terminated.unwrap_or(true),
        )
    }
}

/// Renders a value type as descriptor text
pub fn to_descriptor(ty: &ValueType) -> String {
    let kind = ty.kind();
    let mut text = kind.name().to_string();
    if let Some(count) = ty.element_count() {
        text.push('[');
        text.push_str(&count.to_string());
        text.push(']');
    }
    if ty.zero_terminated() == Some(false) {
        text.push_str(NZT_MARKER);
    }
    text
}

/// Renders the descriptor for a catalog index, as used by index-based pickers.
/// Unknown indices render as "out of bounds".
pub fn descriptor_for_index(index: usize, length: usize, zero_terminated: bool) -> String {
    match ValueKind::from_index(index) {
        Some(kind) => to_descriptor(&ValueType::with_parts(kind, length, zero_terminated)),
        None => OUT_OF_BOUNDS.to_string(),
    }
}

/// Finds the catalog kind whose name is the longest prefix of `text`
fn match_kind(text: &str) -> Option<ValueKind> {
    ValueKind::ALL
        .iter()
        .filter(|kind| text.starts_with(kind.name()))
        .max_by_key(|kind| kind.name().len())
        .copied()
}

/// Parses descriptor text
pub fn from_descriptor(text: &str) -> MemoryResult<ParsedDescriptor> {
    let kind = match_kind(text)
        .ok_or_else(|| MemoryError::InvalidDescriptor(format!("unknown value type '{}'", text)))?;

    if !kind.has_count() {
        return Ok(ParsedDescriptor {
            kind,
            count: None,
            zero_terminated: None,
            byte_length: kind.fixed_width(),
        });
    }

    let count = COUNT_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| {
            MemoryError::InvalidDescriptor(format!("'{}' is missing its [count]", text))
        })?
        .as_str()
        .parse::<usize>()
        .map_err(|e| MemoryError::InvalidDescriptor(format!("bad count in '{}': {}", text, e)))?;
    kind.checked_span(count)?;

    if kind.is_string() {
        Ok(ParsedDescriptor {
            kind,
            count: Some(count),
            zero_terminated: Some(!text.contains(NZT_MARKER)),
            byte_length: None,
        })
    } else {
        Ok(ParsedDescriptor {
            kind,
            count: Some(count),
            zero_terminated: None,
            byte_length: Some(count),
        })
    }
}

/// Replaces the bracketed count of a descriptor, keeping everything else.
/// Returns `None` when the described kind carries no count.
pub fn with_count(text: &str, count: usize) -> Option<String> {
    let kind = match_kind(text)?;
    if !kind.has_count() {
        return None;
    }
    let replacement = format!("[{}]", count);
    Some(
        COUNT_PATTERN
            .replace_all(text, regex::NoExpand(&replacement))
            .into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::kind::StringEncoding;

    #[test]
    fn test_examples() {
        let utf16 = ValueType::string(StringEncoding::Utf16, 15, false);
        assert_eq!(to_descriptor(&utf16), "String_UTF16[15],NZT");
        assert_eq!(
            from_descriptor("String_UTF16[15],NZT").unwrap(),
            ParsedDescriptor {
                kind: ValueKind::String(StringEncoding::Utf16),
                count: Some(15),
                zero_terminated: Some(false),
                byte_length: None,
            }
        );

        assert_eq!(to_descriptor(&ValueType::bytes(42)), "AoB[42]");
        assert_eq!(
            from_descriptor("AoB[42]").unwrap(),
            ParsedDescriptor {
                kind: ValueKind::Bytes,
                count: Some(42),
                zero_terminated: None,
                byte_length: Some(42),
            }
        );

        assert_eq!(to_descriptor(&ValueType::scalar(ValueKind::F64)), "Double");
        assert_eq!(
            from_descriptor("Double").unwrap(),
            ParsedDescriptor {
                kind: ValueKind::F64,
                count: None,
                zero_terminated: None,
                byte_length: Some(8),
            }
        );
    }

    #[test]
    fn test_longest_match_wins() {
        assert_eq!(from_descriptor("2 Bytes").unwrap().kind, ValueKind::U16);
        assert_eq!(from_descriptor("2 Bytes Signed").unwrap().kind, ValueKind::I16);
        assert_eq!(from_descriptor("Byte Signed").unwrap().kind, ValueKind::I8);
        assert_eq!(from_descriptor("Byte").unwrap().kind, ValueKind::U8);
    }

    #[test]
    fn test_zero_terminated_strings_have_no_marker() {
        let ty = ValueType::string(StringEncoding::Utf8, 10, true);
        assert_eq!(to_descriptor(&ty), "String_UTF8[10]");
        assert_eq!(from_descriptor("String_UTF8[10]").unwrap().zero_terminated, Some(true));
    }

    #[test]
    fn test_invalid_descriptors() {
        assert!(matches!(
            from_descriptor("Quadword"),
            Err(MemoryError::InvalidDescriptor(_))
        ));
        assert!(matches!(
            from_descriptor("AoB"),
            Err(MemoryError::InvalidDescriptor(_))
        ));
        assert!(from_descriptor("String_UTF8[99999999999999999999999]").is_err());
        assert!(from_descriptor("").is_err());
        assert!(matches!(
            from_descriptor("String_UTF32[4611686018427387904]"),
            Err(MemoryError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_descriptor_for_index() {
        assert_eq!(descriptor_for_index(2, 0, true), "4 Bytes");
        assert_eq!(descriptor_for_index(13, 8, true), "AoB[8]");
        assert_eq!(descriptor_for_index(11, 4, false), "String_UTF16[4],NZT");
        assert_eq!(descriptor_for_index(99, 4, false), OUT_OF_BOUNDS);
    }

    #[test]
    fn test_with_count() {
        assert_eq!(with_count("AoB[42]", 7).as_deref(), Some("AoB[7]"));
        assert_eq!(
            with_count("String_UTF32[3],NZT", 12).as_deref(),
            Some("String_UTF32[12],NZT")
        );
        assert_eq!(with_count("4 Bytes", 3), None);
        assert_eq!(with_count("nonsense[3]", 3), None);
    }
}
