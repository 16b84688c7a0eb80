//! Scan result and comparison types

use super::{Address, MemoryValue};
use serde::{Deserialize, Serialize};

/// One surviving candidate as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub address: Address,
    pub value: MemoryValue,
}

impl ScanResult {
    pub fn new(address: Address, value: MemoryValue) -> Self {
        ScanResult { address, value }
    }
}

/// Built-in comparisons a narrowing pass can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    Exact,
    Unknown,
    Increased,
    IncreasedBy,
    Decreased,
    DecreasedBy,
    Changed,
    Unchanged,
    Between,
    BiggerThan,
    SmallerThan,
}

impl ScanType {
    /// Checks if this scan type compares against the previous generation
    pub fn requires_previous(&self) -> bool {
        matches!(
            self,
            ScanType::Increased
                | ScanType::IncreasedBy
                | ScanType::Decreased
                | ScanType::DecreasedBy
                | ScanType::Changed
                | ScanType::Unchanged
        )
    }

    /// Checks if this scan type requires a value parameter
    pub fn requires_value(&self) -> bool {
        matches!(
            self,
            ScanType::Exact
                | ScanType::IncreasedBy
                | ScanType::DecreasedBy
                | ScanType::Between
                | ScanType::BiggerThan
                | ScanType::SmallerThan
        )
    }

    /// Checks if this scan type needs a second value (upper bound)
    pub fn requires_second_value(&self) -> bool {
        matches!(self, ScanType::Between)
    }
}
