//! Memory operations on a foreign process
//!
//! This module provides:
//! - The [`ProcessMemory`] transport trait (live `/proc` handle or snapshot)
//! - [`MemoryAccessor`], the retrying, classifying read/write layer
//! - Region enumeration and filtering

pub mod access;
pub mod regions;
pub mod snapshot;

pub use access::{MemoryAccessor, RetryPolicy};
pub use regions::{
    enumerate_regions, get_filtered_regions, parse_maps, FilterCriteria, RegionFilter, RegionInfo,
};
pub use snapshot::MemorySnapshot;

use crate::core::types::{Address, ProcessId};
use std::io;

/// Byte-addressable view of a target process's memory.
///
/// Implementations must be usable from several threads through a shared
/// reference; reads never move a shared cursor.
pub trait ProcessMemory: Send + Sync {
    /// Process the memory belongs to
    fn pid(&self) -> ProcessId;

    /// Reads up to `buf.len()` bytes at `address`, returning how many were read
    fn read_at(&self, address: Address, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes up to `data.len()` bytes at `address`, returning how many were written
    fn write_at(&self, address: Address, data: &[u8]) -> io::Result<usize>;

    /// Whether the target still exists
    fn is_alive(&self) -> bool;
}

impl<M: ProcessMemory + ?Sized> ProcessMemory for &M {
    fn pid(&self) -> ProcessId {
        (**self).pid()
    }

    fn read_at(&self, address: Address, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(address, buf)
    }

    fn write_at(&self, address: Address, data: &[u8]) -> io::Result<usize> {
        (**self).write_at(address, data)
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}

impl<M: ProcessMemory + ?Sized> ProcessMemory for std::sync::Arc<M> {
    fn pid(&self) -> ProcessId {
        (**self).pid()
    }

    fn read_at(&self, address: Address, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(address, buf)
    }

    fn write_at(&self, address: Address, data: &[u8]) -> io::Result<usize> {
        (**self).write_at(address, data)
    }

    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}
