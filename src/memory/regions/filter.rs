//! Memory region filtering functionality

use crate::core::types::Address;
use crate::memory::regions::RegionInfo;

/// Criteria for filtering memory regions
#[derive(Debug, Clone, Default)]
pub struct FilterCriteria {
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub readable_only: bool,
    pub writable_only: bool,
    pub executable_only: bool,
    /// Regions must lie fully inside `[start, end)`
    pub address_range: Option<(Address, Address)>,
    /// Substring the backing path must contain
    pub path_contains: Option<String>,
    /// Skip `[vvar]`, `[vsyscall]` and friends, which refuse reads
    pub exclude_pseudo: bool,
}

impl FilterCriteria {
    pub fn new() -> Self {
        FilterCriteria::default()
    }

    pub fn with_min_size(mut self, size: usize) -> Self {
        self.min_size = Some(size);
        self
    }

    pub fn with_max_size(mut self, size: usize) -> Self {
        self.max_size = Some(size);
        self
    }

    pub fn readable(mut self) -> Self {
        self.readable_only = true;
        self
    }

    pub fn writable(mut self) -> Self {
        self.writable_only = true;
        self
    }

    pub fn executable(mut self) -> Self {
        self.executable_only = true;
        self
    }

    pub fn with_address_range(mut self, start: Address, end: Address) -> Self {
        self.address_range = Some((start, end));
        self
    }

    pub fn with_path(mut self, fragment: impl Into<String>) -> Self {
        self.path_contains = Some(fragment.into());
        self
    }

    pub fn exclude_pseudo_regions(mut self) -> Self {
        self.exclude_pseudo = true;
        self
    }
}

/// Filter for memory regions
pub struct RegionFilter {
    criteria: FilterCriteria,
}

impl RegionFilter {
    pub fn new(criteria: FilterCriteria) -> Self {
        RegionFilter { criteria }
    }

    /// Apply the filter to a list of regions
    pub fn apply(&self, regions: &[RegionInfo]) -> Vec<RegionInfo> {
        regions
            .iter()
            .filter(|region| self.matches(region))
            .cloned()
            .collect()
    }

    /// Check if a region matches the filter criteria
    pub fn matches(&self, region: &RegionInfo) -> bool {
        if let Some(min) = self.criteria.min_size {
            if region.size < min {
                return false;
            }
        }

        if let Some(max) = self.criteria.max_size {
            if region.size > max {
                return false;
            }
        }

        if self.criteria.readable_only && !region.readable {
            return false;
        }

        if self.criteria.writable_only && !region.writable {
            return false;
        }

        if self.criteria.executable_only && !region.executable {
            return false;
        }

        if let Some((start, end)) = self.criteria.address_range {
            if region.base_address < start || region.end_address() > end {
                return false;
            }
        }

        if let Some(fragment) = &self.criteria.path_contains {
            match &region.path {
                Some(path) if path.contains(fragment.as_str()) => {}
                _ => return false,
            }
        }

        if self.criteria.exclude_pseudo && region.is_pseudo() {
            return false;
        }

        true
    }

    /// Get total size of regions matching the filter
    pub fn total_size(&self, regions: &[RegionInfo]) -> usize {
        regions
            .iter()
            .filter(|region| self.matches(region))
            .map(|region| region.size)
            .sum()
    }
}

/// Common filter presets
pub mod presets {
    use super::*;

    /// Where game state usually lives: writable data, heap and stack
    pub fn scannable_data() -> FilterCriteria {
        FilterCriteria::new()
            .readable()
            .writable()
            .exclude_pseudo_regions()
    }

    /// Everything that can be read
    pub fn all_readable() -> FilterCriteria {
        FilterCriteria::new().readable().exclude_pseudo_regions()
    }
}
