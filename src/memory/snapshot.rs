//! In-memory stand-in for a live process
//!
//! A [`MemorySnapshot`] holds copies of mapped segments, for example regions
//! dumped from a process earlier, and serves them through the same
//! [`ProcessMemory`] interface as a live handle. Segments can be changed,
//! unmapped or made to fail, which makes it the transport of choice for
//! offline analysis and for exercising the scan engine.

use super::regions::RegionInfo;
use super::ProcessMemory;
use crate::core::types::{Address, ProcessId};
use nix::errno::Errno;
use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct MemorySnapshot {
    pid: ProcessId,
    segments: RwLock<BTreeMap<usize, Vec<u8>>>,
    alive: AtomicBool,
    failures: AtomicU32,
}

impl MemorySnapshot {
    pub fn new(pid: ProcessId) -> Self {
        MemorySnapshot {
            pid,
            segments: RwLock::new(BTreeMap::new()),
            alive: AtomicBool::new(true),
            failures: AtomicU32::new(0),
        }
    }

    /// Adds (or replaces) a segment starting at `base`
    pub fn map(&self, base: Address, bytes: Vec<u8>) {
        self.write_segments().insert(base.as_usize(), bytes);
    }

    /// Removes the segment starting at `base`; returns whether one existed
    pub fn unmap(&self, base: Address) -> bool {
        self.write_segments().remove(&base.as_usize()).is_some()
    }

    /// Overwrites bytes inside a mapped segment. Returns false if the span is
    /// not fully mapped.
    pub fn poke(&self, address: Address, data: &[u8]) -> bool {
        let mut segments = self.write_segments();
        match locate_mut(&mut segments, address.as_usize()) {
            Some(slice) if slice.len() >= data.len() => {
                slice[..data.len()].copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    /// Makes the next `count` accesses fail with `EAGAIN`
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn pending_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// Mapped segments as readable, writable regions
    pub fn regions(&self) -> Vec<RegionInfo> {
        self.read_segments()
            .iter()
            .map(|(base, bytes)| RegionInfo::anonymous(Address::new(*base), bytes.len()))
            .collect()
    }

    fn read_segments(&self) -> RwLockReadGuard<'_, BTreeMap<usize, Vec<u8>>> {
        self.segments.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_segments(&self) -> RwLockWriteGuard<'_, BTreeMap<usize, Vec<u8>>> {
        self.segments.write().unwrap_or_else(|e| e.into_inner())
    }

    fn check_access(&self) -> io::Result<()> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(io::Error::from_raw_os_error(Errno::ESRCH as i32));
        }
        let consumed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if consumed.is_ok() {
            return Err(io::Error::from_raw_os_error(Errno::EAGAIN as i32));
        }
        Ok(())
    }
}

fn locate(segments: &BTreeMap<usize, Vec<u8>>, address: usize) -> Option<&[u8]> {
    let (base, bytes) = segments.range(..=address).next_back()?;
    let offset = address - base;
    (offset < bytes.len()).then(|| &bytes[offset..])
}

fn locate_mut(segments: &mut BTreeMap<usize, Vec<u8>>, address: usize) -> Option<&mut [u8]> {
    let (base, bytes) = segments.range_mut(..=address).next_back()?;
    let offset = address - *base;
    if offset < bytes.len() {
        Some(&mut bytes[offset..])
    } else {
        None
    }
}

impl ProcessMemory for MemorySnapshot {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn read_at(&self, address: Address, buf: &mut [u8]) -> io::Result<usize> {
        self.check_access()?;
        let segments = self.read_segments();
        let available = locate(&segments, address.as_usize())
            .ok_or_else(|| io::Error::from_raw_os_error(Errno::EIO as i32))?;
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }

    fn write_at(&self, address: Address, data: &[u8]) -> io::Result<usize> {
        self.check_access()?;
        let mut segments = self.write_segments();
        let target = locate_mut(&mut segments, address.as_usize())
            .ok_or_else(|| io::Error::from_raw_os_error(Errno::EIO as i32))?;
        let n = target.len().min(data.len());
        target[..n].copy_from_slice(&data[..n]);
        Ok(n)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}
