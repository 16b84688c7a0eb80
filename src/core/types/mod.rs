//! Core type definitions for memscope
//!
//! Address wrappers, decoded values, scan results and the error type shared by
//! every other module.

mod address;
mod error;
mod scan_result;
mod value;

pub use address::{parse_address, Address};
pub use error::{MemoryError, MemoryResult};
pub use scan_result::{ScanResult, ScanType};
pub use value::MemoryValue;

// Common type aliases
pub type ProcessId = u32;
