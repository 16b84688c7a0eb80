//! Address ranges a scan covers

use crate::core::types::Address;
use crate::memory::RegionInfo;
use serde::{Deserialize, Serialize};

/// Half-open range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AddressRange {
    pub start: Address,
    pub end: Address,
}

impl AddressRange {
    pub fn new(start: Address, len: usize) -> Self {
        AddressRange {
            start,
            end: Address::new(start.as_usize().saturating_add(len)),
        }
    }

    pub fn len(&self) -> usize {
        self.end.as_usize() - self.start.as_usize()
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, address: Address) -> bool {
        address >= self.start && address < self.end
    }
}

/// The set of address ranges a first scan enumerates.
///
/// Ranges are kept sorted and merged, so iteration yields ascending,
/// non-overlapping spans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRegion {
    ranges: Vec<AddressRange>,
}

impl ScanRegion {
    pub fn new() -> Self {
        ScanRegion::default()
    }

    /// A region made of one range
    pub fn from_range(start: Address, len: usize) -> Self {
        let mut region = ScanRegion::new();
        region.add(start, len);
        region
    }

    /// Covers every given mapping, typically the output of a region filter
    pub fn from_regions(regions: &[RegionInfo]) -> Self {
        let mut region = ScanRegion::new();
        for info in regions {
            region.add(info.base_address, info.size);
        }
        region
    }

    /// Adds a range, merging it with any range it touches
    pub fn add(&mut self, start: Address, len: usize) {
        let range = AddressRange::new(start, len);
        if range.is_empty() {
            return;
        }

        let at = self.ranges.partition_point(|r| r.start < range.start);
        self.ranges.insert(at, range);

        let mut merged: Vec<AddressRange> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if range.start <= last.end => {
                    if range.end > last.end {
                        last.end = range.end;
                    }
                }
                _ => merged.push(range),
            }
        }
        self.ranges = merged;
    }

    pub fn ranges(&self) -> &[AddressRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of bytes covered
    pub fn total_size(&self) -> usize {
        self.ranges.iter().map(AddressRange::len).sum()
    }

    pub fn contains(&self, address: Address) -> bool {
        self.ranges.iter().any(|r| r.contains(address))
    }
}
