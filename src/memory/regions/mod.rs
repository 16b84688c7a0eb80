//! Memory regions of a Linux process
//!
//! Regions come from `/proc/<pid>/maps`. Each line has the form
//! `start-end perms offset dev inode [path]`.

pub mod filter;

pub use filter::{FilterCriteria, RegionFilter};

use crate::core::types::{Address, MemoryError, MemoryResult, ProcessId};
use crate::process::proc_path;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use tracing::trace;

/// One mapping of the target's address space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub base_address: Address,
    pub size: usize,
    pub readable: bool,
    pub writable: bool,
    pub executable: bool,
    /// `s` in the permission column; `p` (copy-on-write) otherwise
    pub shared: bool,
    pub offset: u64,
    pub path: Option<String>,
}

impl RegionInfo {
    /// A private read/write region with no backing file
    pub fn anonymous(base_address: Address, size: usize) -> Self {
        RegionInfo {
            base_address,
            size,
            readable: true,
            writable: true,
            executable: false,
            shared: false,
            offset: 0,
            path: None,
        }
    }

    /// Get the end address of the region (exclusive)
    pub fn end_address(&self) -> Address {
        Address::new(self.base_address.as_usize().saturating_add(self.size))
    }

    /// Check if an address is within this region
    pub fn contains(&self, address: Address) -> bool {
        address >= self.base_address && address < self.end_address()
    }

    /// Kernel pseudo-mappings such as `[vvar]` or `[vsyscall]`
    pub fn is_pseudo(&self) -> bool {
        matches!(
            self.path.as_deref(),
            Some("[vvar]") | Some("[vsyscall]") | Some("[vdso]") | Some("[vvar_vclock]")
        )
    }

    /// Parses one line of a maps file
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let range = fields.next()?;
        let perms = fields.next()?.as_bytes();
        let offset = u64::from_str_radix(fields.next()?, 16).ok()?;
        let _device = fields.next()?;
        let _inode = fields.next()?;
        let path: Vec<&str> = fields.collect();

        let (start, end) = range.split_once('-')?;
        let start = usize::from_str_radix(start, 16).ok()?;
        let end = usize::from_str_radix(end, 16).ok()?;
        if end < start || perms.len() < 4 {
            return None;
        }

        Some(RegionInfo {
            base_address: Address::new(start),
            size: end - start,
            readable: perms[0] == b'r',
            writable: perms[1] == b'w',
            executable: perms[2] == b'x',
            shared: perms[3] == b's',
            offset,
            path: if path.is_empty() {
                None
            } else {
                Some(path.join(" "))
            },
        })
    }
}

/// Parses the text of a maps file; malformed lines are skipped
pub fn parse_maps(text: &str) -> Vec<RegionInfo> {
    text.lines()
        .filter_map(|line| {
            let region = RegionInfo::parse_line(line);
            if region.is_none() && !line.trim().is_empty() {
                trace!(line, "skipping malformed maps line");
            }
            region
        })
        .collect()
}

/// Enumerates all mappings of a process
pub fn enumerate_regions(pid: ProcessId) -> MemoryResult<Vec<RegionInfo>> {
    let path = proc_path(pid).join("maps");
    let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => MemoryError::ProcessGone(pid),
        io::ErrorKind::PermissionDenied => MemoryError::access_denied(path.display(), e.to_string()),
        _ => MemoryError::IoError(e),
    })?;
    Ok(parse_maps(&text))
}

/// Mappings of a process that match the given criteria
pub fn get_filtered_regions(
    pid: ProcessId,
    criteria: FilterCriteria,
) -> MemoryResult<Vec<RegionInfo>> {
    let regions = enumerate_regions(pid)?;
    Ok(RegionFilter::new(criteria).apply(&regions))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPS: &str = "\
55d0c0a00000-55d0c0a02000 r--p 00000000 08:01 1311 /usr/bin/cat
55d0c0a02000-55d0c0a07000 r-xp 00002000 08:01 1311 /usr/bin/cat
55d0c1f4e000-55d0c1f6f000 rw-p 00000000 00:00 0    [heap]
7f3a2c000000-7f3a2c021000 rw-s 00000000 00:05 42   /dev/shm/my segment
7ffc8a5f0000-7ffc8a5f4000 r--p 00000000 00:00 0    [vvar]
not a maps line
";

    #[test]
    fn test_parse_maps() {
        let regions = parse_maps(MAPS);
        assert_eq!(regions.len(), 5);

        let code = &regions[1];
        assert_eq!(code.base_address, Address::new(0x55d0c0a02000));
        assert_eq!(code.size, 0x5000);
        assert!(code.readable && code.executable && !code.writable);
        assert_eq!(code.offset, 0x2000);
        assert_eq!(code.path.as_deref(), Some("/usr/bin/cat"));

        let heap = &regions[2];
        assert!(heap.writable);
        assert_eq!(heap.path.as_deref(), Some("[heap]"));

        let shm = &regions[3];
        assert!(shm.shared);
        assert_eq!(shm.path.as_deref(), Some("/dev/shm/my segment"));

        assert!(regions[4].is_pseudo());
    }

    #[test]
    fn test_anonymous_line() {
        let region = RegionInfo::parse_line("7f00-8000 rw-p 00000000 00:00 0").unwrap();
        assert_eq!(region.path, None);
        assert_eq!(region.end_address(), Address::new(0x8000));
        assert!(region.contains(Address::new(0x7f00)));
        assert!(!region.contains(Address::new(0x8000)));
    }

    #[test]
    fn test_enumerate_self() {
        let regions = enumerate_regions(std::process::id()).unwrap();
        assert!(!regions.is_empty());
        let marker = 0u8;
        let address = Address::new(&marker as *const u8 as usize);
        assert!(regions.iter().any(|r| r.contains(address) && r.writable));
    }

    #[test]
    fn test_enumerate_missing_process() {
        assert!(matches!(
            enumerate_regions(u32::MAX - 1),
            Err(MemoryError::ProcessGone(_))
        ));
    }
}
