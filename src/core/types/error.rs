//! Custom error types for memscope

use std::fmt;
use thiserror::Error;

/// Main error type for codec, memory, scan and bridge operations
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Invalid memory address: {0}")]
    InvalidAddress(String),

    #[error("Cannot encode value: {0}")]
    EncodingFailed(String),

    #[error("Cannot decode value: {0}")]
    DecodingFailed(String),

    #[error("Invalid value descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("Access denied at {address}: {reason}")]
    AccessDenied { address: String, reason: String },

    #[error("Process {0} no longer exists")]
    ProcessGone(u32),

    #[error("Partial read at {address}: got {} of {requested} bytes", data.len())]
    PartialRead {
        address: String,
        requested: usize,
        data: Vec<u8>,
    },

    #[error("Partial write at {address}: wrote {written} of {requested} bytes")]
    PartialWrite {
        address: String,
        requested: usize,
        written: usize,
    },

    #[error("No scan in progress")]
    NotScanning,

    #[error("Invalid scan criteria: {0}")]
    InvalidScanCriteria(String),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Cannot resolve expression '{expression}': {message}")]
    UnresolvableExpression { expression: String, message: String },

    #[error("Malformed debugger response: {0}")]
    ProtocolError(String),

    #[error("Evaluation service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type alias for memory operations
pub type MemoryResult<T> = Result<T, MemoryError>;

impl MemoryError {
    /// Creates an access denied error
    pub fn access_denied(address: impl fmt::Display, reason: impl Into<String>) -> Self {
        MemoryError::AccessDenied {
            address: address.to_string(),
            reason: reason.into(),
        }
    }

    /// Creates a partial read error carrying the bytes that were obtained
    pub fn partial_read(address: impl fmt::Display, requested: usize, data: Vec<u8>) -> Self {
        MemoryError::PartialRead {
            address: address.to_string(),
            requested,
            data,
        }
    }

    /// Creates a partial write error
    pub fn partial_write(address: impl fmt::Display, requested: usize, written: usize) -> Self {
        MemoryError::PartialWrite {
            address: address.to_string(),
            requested,
            written,
        }
    }

    /// Creates an unresolvable expression error, keeping the service text as is
    pub fn unresolvable(expression: impl Into<String>, message: impl Into<String>) -> Self {
        MemoryError::UnresolvableExpression {
            expression: expression.into(),
            message: message.into(),
        }
    }

    /// True for failures that concern the whole target rather than one address
    pub fn is_fatal_for_scan(&self) -> bool {
        matches!(
            self,
            MemoryError::ProcessGone(_) | MemoryError::Cancelled | MemoryError::IoError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoryError::InvalidAddress("0xDEADBEEF".to_string());
        assert_eq!(err.to_string(), "Invalid memory address: 0xDEADBEEF");

        let err = MemoryError::access_denied("0x1000", "Input/output error");
        assert_eq!(err.to_string(), "Access denied at 0x1000: Input/output error");
    }

    #[test]
    fn test_all_error_variants() {
        let errors: Vec<(MemoryError, &str)> = vec![
            (
                MemoryError::EncodingFailed("300 does not fit in Byte".to_string()),
                "Cannot encode value: 300 does not fit in Byte",
            ),
            (
                MemoryError::DecodingFailed("need 4 bytes, got 2".to_string()),
                "Cannot decode value: need 4 bytes, got 2",
            ),
            (
                MemoryError::InvalidDescriptor("Quad".to_string()),
                "Invalid value descriptor: Quad",
            ),
            (MemoryError::ProcessGone(4242), "Process 4242 no longer exists"),
            (
                MemoryError::partial_read("0x2000", 8, vec![1, 2, 3]),
                "Partial read at 0x2000: got 3 of 8 bytes",
            ),
            (
                MemoryError::partial_write("0x3000", 4, 1),
                "Partial write at 0x3000: wrote 1 of 4 bytes",
            ),
            (MemoryError::NotScanning, "No scan in progress"),
            (MemoryError::Cancelled, "Scan cancelled"),
            (
                MemoryError::InvalidScanCriteria("between needs two values".to_string()),
                "Invalid scan criteria: between needs two values",
            ),
            (
                MemoryError::unresolvable("$foo", "No symbol \"foo\" in current context."),
                "Cannot resolve expression '$foo': No symbol \"foo\" in current context.",
            ),
            (
                MemoryError::ProtocolError("garbage".to_string()),
                "Malformed debugger response: garbage",
            ),
            (
                MemoryError::ServiceUnavailable("gdb not found".to_string()),
                "Evaluation service unavailable: gdb not found",
            ),
        ];

        for (error, expected) in errors {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_partial_read_keeps_data() {
        match MemoryError::partial_read("0x10", 4, vec![0xAA, 0xBB]) {
            MemoryError::PartialRead {
                requested, data, ..
            } => {
                assert_eq!(requested, 4);
                assert_eq!(data, vec![0xAA, 0xBB]);
            }
            other => panic!("Wrong error type: {other:?}"),
        }
    }

    #[test]
    fn test_fatal_classification() {
        assert!(MemoryError::ProcessGone(1).is_fatal_for_scan());
        assert!(MemoryError::Cancelled.is_fatal_for_scan());
        assert!(!MemoryError::access_denied("0x0", "EIO").is_fatal_for_scan());
        assert!(!MemoryError::partial_read("0x0", 4, vec![]).is_fatal_for_scan());
    }

    #[test]
    fn test_from_implementations() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "test");
        let mem_err: MemoryError = io_err.into();
        assert!(matches!(mem_err, MemoryError::IoError(_)));

        let json_err = serde_json::from_str::<String>("invalid json").unwrap_err();
        let mem_err: MemoryError = json_err.into();
        assert!(matches!(mem_err, MemoryError::JsonError(_)));
    }
}
