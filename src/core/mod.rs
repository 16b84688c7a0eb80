//! Core module containing fundamental types for memscope
//!
//! This module provides the foundational building blocks used throughout
//! the crate: address handling, decoded values, scan results and errors.

pub mod types;

pub use types::{Address, MemoryError, MemoryResult, MemoryValue, ScanResult, ScanType};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");

// /proc/<pid>/mem and /proc/<pid>/maps are the only transport
#[cfg(not(target_os = "linux"))]
compile_error!("memscope only supports Linux targets");
