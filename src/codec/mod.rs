//! Typed value codec
//!
//! Converts between [`MemoryValue`]s and the raw little-endian bytes found in
//! the inferior, and between [`ValueType`]s and their descriptor text.
//!
//! - [`kind`]: the closed catalog of value kinds
//! - [`descriptor`]: the `Name[count],NZT` grammar
//! - [`ValueCodec`]: encode, decode and user-text parsing

pub mod descriptor;
pub mod kind;

pub use descriptor::{
    descriptor_for_index, from_descriptor, to_descriptor, with_count, ParsedDescriptor,
};
pub use kind::{StringEncoding, ValueKind, ValueType};

use crate::config::CodecConfig;
use crate::core::types::{MemoryError, MemoryResult, MemoryValue};
use widestring::{U16Str, U16String, U32Str, U32String};

/// Encodes and decodes typed values.
///
/// Decoding strings is permissive by default: invalid sequences are replaced
/// rather than rejected, so previously saved scans over garbage memory still
/// load. A strict codec rejects them with [`MemoryError::DecodingFailed`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueCodec {
    strict_strings: bool,
}

impl ValueCodec {
    pub fn new() -> Self {
        ValueCodec::default()
    }

    pub fn strict() -> Self {
        ValueCodec {
            strict_strings: true,
        }
    }

    pub fn from_config(config: &CodecConfig) -> Self {
        ValueCodec {
            strict_strings: config.strict_strings,
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict_strings
    }

    /// Encodes `value` as the bytes `ty` occupies in memory
    pub fn encode(&self, value: &MemoryValue, ty: &ValueType) -> MemoryResult<Vec<u8>> {
        match ty.kind() {
            ValueKind::U8 => Ok(vec![integer_in_range::<u8>(value, ty)?]),
            ValueKind::U16 => Ok(integer_in_range::<u16>(value, ty)?.to_le_bytes().to_vec()),
            ValueKind::U32 => Ok(integer_in_range::<u32>(value, ty)?.to_le_bytes().to_vec()),
            ValueKind::U64 => Ok(integer_in_range::<u64>(value, ty)?.to_le_bytes().to_vec()),
            ValueKind::I8 => Ok(integer_in_range::<i8>(value, ty)?.to_le_bytes().to_vec()),
            ValueKind::I16 => Ok(integer_in_range::<i16>(value, ty)?.to_le_bytes().to_vec()),
            ValueKind::I32 => Ok(integer_in_range::<i32>(value, ty)?.to_le_bytes().to_vec()),
            ValueKind::I64 => Ok(integer_in_range::<i64>(value, ty)?.to_le_bytes().to_vec()),
            ValueKind::F32 => {
                let v = float_value(value, ty)?;
                if v.is_finite() && v.abs() > f32::MAX as f64 {
                    return Err(MemoryError::EncodingFailed(format!(
                        "{} is out of range for {}",
                        v, ty
                    )));
                }
                Ok((v as f32).to_le_bytes().to_vec())
            }
            ValueKind::F64 => Ok(float_value(value, ty)?.to_le_bytes().to_vec()),
            ValueKind::String(encoding) => match value {
                MemoryValue::String(text) => encode_string(text, encoding, ty),
                other => Err(mismatch(other, ty)),
            },
            ValueKind::Bytes => match value {
                MemoryValue::Bytes(bytes) if bytes.len() == ty.width() => Ok(bytes.clone()),
                MemoryValue::Bytes(bytes) => Err(MemoryError::EncodingFailed(format!(
                    "{} bytes given for {}",
                    bytes.len(),
                    ty
                ))),
                other => Err(mismatch(other, ty)),
            },
        }
    }

    /// Decodes the leading bytes of `bytes` as a value of type `ty`
    pub fn decode(&self, bytes: &[u8], ty: &ValueType) -> MemoryResult<MemoryValue> {
        let width = ty.width();
        if bytes.len() < width {
            return Err(MemoryError::DecodingFailed(format!(
                "{} needs {} bytes, got {}",
                ty,
                width,
                bytes.len()
            )));
        }
        let raw = &bytes[..width];

        let value = match ty.kind() {
            ValueKind::U8 => MemoryValue::U8(raw[0]),
            ValueKind::U16 => MemoryValue::U16(u16::from_le_bytes(fixed(raw)?)),
            ValueKind::U32 => MemoryValue::U32(u32::from_le_bytes(fixed(raw)?)),
            ValueKind::U64 => MemoryValue::U64(u64::from_le_bytes(fixed(raw)?)),
            ValueKind::I8 => MemoryValue::I8(raw[0] as i8),
            ValueKind::I16 => MemoryValue::I16(i16::from_le_bytes(fixed(raw)?)),
            ValueKind::I32 => MemoryValue::I32(i32::from_le_bytes(fixed(raw)?)),
            ValueKind::I64 => MemoryValue::I64(i64::from_le_bytes(fixed(raw)?)),
            ValueKind::F32 => MemoryValue::F32(f32::from_le_bytes(fixed(raw)?)),
            ValueKind::F64 => MemoryValue::F64(f64::from_le_bytes(fixed(raw)?)),
            ValueKind::String(encoding) => {
                MemoryValue::String(self.decode_string(raw, encoding, ty)?)
            }
            ValueKind::Bytes => MemoryValue::Bytes(raw.to_vec()),
        };
        Ok(value)
    }

    /// Parses user-entered text into a value of type `ty`
    pub fn parse_value(&self, text: &str, ty: &ValueType) -> MemoryResult<MemoryValue> {
        let kind = ty.kind();
        let value = if kind.is_integer() {
            let number = parse_integer(text.trim()).ok_or_else(|| {
                MemoryError::EncodingFailed(format!("'{}' is not an integer", text.trim()))
            })?;
            integer_value(number, ty)?
        } else if kind.is_float() {
            let number: f64 = text.trim().parse().map_err(|_| {
                MemoryError::EncodingFailed(format!("'{}' is not a number", text.trim()))
            })?;
            if kind == ValueKind::F32 {
                MemoryValue::F32(number as f32)
            } else {
                MemoryValue::F64(number)
            }
        } else if kind.is_string() {
            MemoryValue::String(text.to_string())
        } else {
            let compact: String = text.split_whitespace().collect();
            let bytes = hex::decode(&compact).map_err(|e| {
                MemoryError::EncodingFailed(format!("'{}' is not a byte array: {}", text, e))
            })?;
            MemoryValue::Bytes(bytes)
        };

        // Surface overflow and length errors at input time
        self.encode(&value, ty)?;
        Ok(value)
    }

    fn decode_string(
        &self,
        raw: &[u8],
        encoding: StringEncoding,
        ty: &ValueType,
    ) -> MemoryResult<String> {
        let terminated = ty.zero_terminated().unwrap_or(true);
        match encoding {
            StringEncoding::Utf8 => {
                let units = truncate_at_nul(raw, terminated);
                if self.strict_strings {
                    String::from_utf8(units.to_vec())
                        .map_err(|e| MemoryError::DecodingFailed(format!("{}: {}", ty, e)))
                } else {
                    Ok(String::from_utf8_lossy(units).into_owned())
                }
            }
            StringEncoding::Utf16 => {
                let units: Vec<u16> = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let units = truncate_at_nul(&units, terminated);
                let text = U16Str::from_slice(units);
                if self.strict_strings {
                    text.to_string()
                        .map_err(|e| MemoryError::DecodingFailed(format!("{}: {}", ty, e)))
                } else {
                    Ok(text.to_string_lossy())
                }
            }
            StringEncoding::Utf32 => {
                let units: Vec<u32> = raw
                    .chunks_exact(4)
                    .map(|quad| u32::from_le_bytes([quad[0], quad[1], quad[2], quad[3]]))
                    .collect();
                let units = truncate_at_nul(&units, terminated);
                let text = U32Str::from_slice(units);
                if self.strict_strings {
                    text.to_string()
                        .map_err(|e| MemoryError::DecodingFailed(format!("{}: {}", ty, e)))
                } else {
                    Ok(text.to_string_lossy())
                }
            }
        }
    }
}

fn truncate_at_nul<T: Default + PartialEq>(units: &[T], terminated: bool) -> &[T] {
    if !terminated {
        return units;
    }
    let nul = T::default();
    match units.iter().position(|unit| *unit == nul) {
        Some(end) => &units[..end],
        None => units,
    }
}

fn encode_string(text: &str, encoding: StringEncoding, ty: &ValueType) -> MemoryResult<Vec<u8>> {
    let terminated = ty.zero_terminated().unwrap_or(true);
    if terminated && text.contains('\0') {
        return Err(MemoryError::EncodingFailed(format!(
            "embedded NUL in zero-terminated {}",
            ty
        )));
    }

    let (mut bytes, units) = match encoding {
        StringEncoding::Utf8 => (text.as_bytes().to_vec(), text.len()),
        StringEncoding::Utf16 => {
            let wide = U16String::from_str(text).into_vec();
            let units = wide.len();
            (wide.iter().flat_map(|u| u.to_le_bytes()).collect(), units)
        }
        StringEncoding::Utf32 => {
            let wide = U32String::from_str(text).into_vec();
            let units = wide.len();
            (wide.iter().flat_map(|u| u.to_le_bytes()).collect(), units)
        }
    };

    let capacity = ty.element_count().unwrap_or(units);
    if units > capacity {
        return Err(MemoryError::EncodingFailed(format!(
            "{} code units do not fit in {}",
            units, ty
        )));
    }
    // The terminator is written only when the field has room for it
    if terminated && units < capacity {
        bytes.extend(std::iter::repeat(0u8).take(encoding.unit_size()));
    }
    Ok(bytes)
}

fn fixed<const N: usize>(raw: &[u8]) -> MemoryResult<[u8; N]> {
    raw.try_into().map_err(|_| {
        MemoryError::DecodingFailed(format!("expected {} bytes, got {}", N, raw.len()))
    })
}

fn mismatch(value: &MemoryValue, ty: &ValueType) -> MemoryError {
    MemoryError::EncodingFailed(format!("{} cannot be stored as {}", value, ty))
}

/// Integer held by `value`; floats qualify only when they are whole numbers
fn integer_of(value: &MemoryValue, ty: &ValueType) -> MemoryResult<i128> {
    if let Some(number) = value.as_i128() {
        return Ok(number);
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e38 => Ok(f as i128),
        _ => Err(mismatch(value, ty)),
    }
}

fn integer_in_range<T: TryFrom<i128>>(value: &MemoryValue, ty: &ValueType) -> MemoryResult<T> {
    let number = integer_of(value, ty)?;
    T::try_from(number).map_err(|_| {
        MemoryError::EncodingFailed(format!("{} does not fit in {}", number, ty))
    })
}

fn float_value(value: &MemoryValue, ty: &ValueType) -> MemoryResult<f64> {
    value.as_f64().ok_or_else(|| mismatch(value, ty))
}

/// Builds the typed variant matching an integer kind, checking range
fn integer_value(number: i128, ty: &ValueType) -> MemoryResult<MemoryValue> {
    let overflow = || MemoryError::EncodingFailed(format!("{} does not fit in {}", number, ty));
    let value = match ty.kind() {
        ValueKind::U8 => MemoryValue::U8(u8::try_from(number).map_err(|_| overflow())?),
        ValueKind::U16 => MemoryValue::U16(u16::try_from(number).map_err(|_| overflow())?),
        ValueKind::U32 => MemoryValue::U32(u32::try_from(number).map_err(|_| overflow())?),
        ValueKind::U64 => MemoryValue::U64(u64::try_from(number).map_err(|_| overflow())?),
        ValueKind::I8 => MemoryValue::I8(i8::try_from(number).map_err(|_| overflow())?),
        ValueKind::I16 => MemoryValue::I16(i16::try_from(number).map_err(|_| overflow())?),
        ValueKind::I32 => MemoryValue::I32(i32::try_from(number).map_err(|_| overflow())?),
        ValueKind::I64 => MemoryValue::I64(i64::try_from(number).map_err(|_| overflow())?),
        _ => return Err(MemoryError::EncodingFailed(format!("{} is not an integer type", ty))),
    };
    Ok(value)
}

/// Decimal or `0x` hex, with an optional leading minus
fn parse_integer(text: &str) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i128>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(kind: ValueKind) -> ValueType {
        ValueType::scalar(kind)
    }

    #[test]
    fn test_encode_integers() {
        let codec = ValueCodec::new();
        assert_eq!(
            codec.encode(&MemoryValue::U32(0x12345678), &ty(ValueKind::U32)).unwrap(),
            vec![0x78, 0x56, 0x34, 0x12]
        );
        assert_eq!(
            codec.encode(&MemoryValue::I64(-1), &ty(ValueKind::I8)).unwrap(),
            vec![0xFF]
        );
        assert_eq!(
            codec.encode(&MemoryValue::F64(7.0), &ty(ValueKind::U16)).unwrap(),
            vec![7, 0]
        );
    }

    #[test]
    fn test_encode_overflow() {
        let codec = ValueCodec::new();
        assert!(matches!(
            codec.encode(&MemoryValue::U32(300), &ty(ValueKind::U8)),
            Err(MemoryError::EncodingFailed(_))
        ));
        assert!(codec.encode(&MemoryValue::I32(-1), &ty(ValueKind::U64)).is_err());
        assert!(codec.encode(&MemoryValue::F64(1.5), &ty(ValueKind::I32)).is_err());
        assert!(codec.encode(&MemoryValue::F64(1e300), &ty(ValueKind::F32)).is_err());
        assert!(codec
            .encode(&MemoryValue::String("1".into()), &ty(ValueKind::U32))
            .is_err());
    }

    #[test]
    fn test_decode_scalars() {
        let codec = ValueCodec::new();
        let bytes = 1.5f32.to_le_bytes();
        assert_eq!(
            codec.decode(&bytes, &ty(ValueKind::F32)).unwrap(),
            MemoryValue::F32(1.5)
        );
        assert_eq!(
            codec.decode(&[0xFE, 0xFF, 0xAA], &ty(ValueKind::I16)).unwrap(),
            MemoryValue::I16(-2)
        );
    }

    #[test]
    fn test_decode_truncated() {
        let codec = ValueCodec::new();
        assert!(matches!(
            codec.decode(&[1, 2], &ty(ValueKind::U32)),
            Err(MemoryError::DecodingFailed(_))
        ));
        assert!(codec.decode(&[1, 2], &ValueType::bytes(3)).is_err());
    }

    #[test]
    fn test_string_round_trip() {
        let codec = ValueCodec::new();
        for encoding in [StringEncoding::Utf8, StringEncoding::Utf16, StringEncoding::Utf32] {
            let field = ValueType::string(encoding, 8, true);
            let mut bytes = codec
                .encode(&MemoryValue::String("héllo".into()), &field)
                .unwrap();
            bytes.resize(field.width(), 0xCC);
            assert_eq!(
                codec.decode(&bytes, &field).unwrap(),
                MemoryValue::String("héllo".into())
            );
        }
    }

    #[test]
    fn test_string_capacity() {
        let codec = ValueCodec::new();
        let field = ValueType::string(StringEncoding::Utf16, 3, true);
        assert!(codec.encode(&MemoryValue::String("abcd".into()), &field).is_err());
        // Exactly full: no room for the terminator
        assert_eq!(
            codec.encode(&MemoryValue::String("abc".into()), &field).unwrap().len(),
            6
        );
        assert_eq!(
            codec.encode(&MemoryValue::String("ab".into()), &field).unwrap().len(),
            6
        );
        assert!(codec.encode(&MemoryValue::String("a\0b".into()), &field).is_err());
    }

    #[test]
    fn test_not_zero_terminated_keeps_nuls() {
        let codec = ValueCodec::new();
        let field = ValueType::string(StringEncoding::Utf8, 4, false);
        assert_eq!(
            codec.decode(b"a\0bc", &field).unwrap(),
            MemoryValue::String("a\0bc".into())
        );
        let terminated = ValueType::string(StringEncoding::Utf8, 4, true);
        assert_eq!(
            codec.decode(b"a\0bc", &terminated).unwrap(),
            MemoryValue::String("a".into())
        );
    }

    #[test]
    fn test_invalid_sequences_strict_and_lossy() {
        let field = ValueType::string(StringEncoding::Utf16, 2, false);
        // Lone high surrogate
        let bytes = [0x00, 0xD8, 0x41, 0x00];
        assert!(matches!(
            ValueCodec::strict().decode(&bytes, &field),
            Err(MemoryError::DecodingFailed(_))
        ));
        assert_eq!(
            ValueCodec::new().decode(&bytes, &field).unwrap(),
            MemoryValue::String("\u{FFFD}A".into())
        );

        let utf8 = ValueType::string(StringEncoding::Utf8, 2, false);
        assert!(ValueCodec::strict().decode(&[0xFF, 0x41], &utf8).is_err());
        assert!(ValueCodec::new().decode(&[0xFF, 0x41], &utf8).is_ok());
    }

    #[test]
    fn test_bytes() {
        let codec = ValueCodec::new();
        let aob = ValueType::bytes(3);
        assert_eq!(
            codec.encode(&MemoryValue::Bytes(vec![1, 2, 3]), &aob).unwrap(),
            vec![1, 2, 3]
        );
        assert!(codec.encode(&MemoryValue::Bytes(vec![1, 2]), &aob).is_err());
        assert_eq!(
            codec.decode(&[9, 8, 7, 6], &aob).unwrap(),
            MemoryValue::Bytes(vec![9, 8, 7])
        );
    }

    #[test]
    fn test_parse_value() {
        let codec = ValueCodec::new();
        assert_eq!(
            codec.parse_value("0x10", &ty(ValueKind::U8)).unwrap(),
            MemoryValue::U8(16)
        );
        assert_eq!(
            codec.parse_value("-5", &ty(ValueKind::I32)).unwrap(),
            MemoryValue::I32(-5)
        );
        assert!(codec.parse_value("256", &ty(ValueKind::U8)).is_err());
        assert!(codec.parse_value("-1", &ty(ValueKind::U32)).is_err());
        assert!(codec.parse_value("ten", &ty(ValueKind::U32)).is_err());
        assert_eq!(
            codec.parse_value("2.5", &ty(ValueKind::F32)).unwrap(),
            MemoryValue::F32(2.5)
        );
        assert_eq!(
            codec.parse_value("DE AD be ef", &ValueType::bytes(4)).unwrap(),
            MemoryValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF])
        );
        assert!(codec.parse_value("DE AD", &ValueType::bytes(4)).is_err());
        assert!(codec.parse_value("ZZ", &ValueType::bytes(1)).is_err());
    }
}
