//! memscope: typed value codec and generational memory scanner for Linux
//! processes
//!
//! - [`codec`]: value kinds, the `Name[count],NZT` descriptor grammar and
//!   byte encoding
//! - [`memory`]: retrying foreign-memory access and region enumeration
//! - [`scan`]: candidate narrowing across scan generations
//! - [`bridge`]: expression and register evaluation through gdb

pub mod bridge;
pub mod codec;
pub mod config;
pub mod core;
pub mod memory;
pub mod process;
pub mod scan;

// Re-export main types from core module
pub use crate::core::types::{
    parse_address, Address, MemoryError, MemoryResult, MemoryValue, ProcessId, ScanResult,
    ScanType,
};
pub use crate::core::{AUTHORS, VERSION};

pub use codec::{ValueCodec, ValueKind, ValueType};
pub use memory::{MemoryAccessor, ProcessMemory};
pub use process::ProcessHandle;
pub use scan::{ScanControl, ScanCriteria, ScanRegion, ScanSession};
