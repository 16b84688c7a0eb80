//! Built-in comparisons for first and narrowing scans

use crate::core::types::{MemoryError, MemoryResult, MemoryValue, ScanType};
use std::cmp::Ordering;

/// A [`ScanType`] together with the values it compares against.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanCriteria {
    scan_type: ScanType,
    value: Option<MemoryValue>,
    upper: Option<MemoryValue>,
}

impl ScanCriteria {
    /// Criteria without operands (`Unknown`, `Changed`, ...)
    pub fn new(scan_type: ScanType) -> MemoryResult<Self> {
        Self::build(scan_type, None, None)
    }

    /// Criteria with one operand (`Exact`, `IncreasedBy`, `BiggerThan`, ...)
    pub fn with_value(scan_type: ScanType, value: MemoryValue) -> MemoryResult<Self> {
        Self::build(scan_type, Some(value), None)
    }

    /// Inclusive range; the bounds may be given in either order
    pub fn between(low: MemoryValue, high: MemoryValue) -> MemoryResult<Self> {
        let (low, high) = match low.numeric_cmp(&high) {
            Some(Ordering::Greater) => (high, low),
            Some(_) => (low, high),
            None => {
                return Err(MemoryError::InvalidScanCriteria(format!(
                    "between needs two numbers, got {} and {}",
                    low, high
                )))
            }
        };
        Self::build(ScanType::Between, Some(low), Some(high))
    }

    fn build(
        scan_type: ScanType,
        value: Option<MemoryValue>,
        upper: Option<MemoryValue>,
    ) -> MemoryResult<Self> {
        if scan_type.requires_value() && value.is_none() {
            return Err(MemoryError::InvalidScanCriteria(format!(
                "{:?} needs a value",
                scan_type
            )));
        }
        if scan_type.requires_second_value() && upper.is_none() {
            return Err(MemoryError::InvalidScanCriteria(format!(
                "{:?} needs two values",
                scan_type
            )));
        }
        Ok(ScanCriteria {
            scan_type,
            value,
            upper,
        })
    }

    pub fn scan_type(&self) -> ScanType {
        self.scan_type
    }

    pub fn value(&self) -> Option<&MemoryValue> {
        self.value.as_ref()
    }

    /// Whether this criteria can filter a first scan, where no previous
    /// value exists
    pub fn usable_without_previous(&self) -> bool {
        !self.scan_type.requires_previous()
    }

    /// Evaluates the criteria. `old` is the value seen by the previous
    /// generation; comparisons that need it fail when it is absent.
    pub fn matches(&self, old: Option<&MemoryValue>, new: &MemoryValue) -> bool {
        match self.scan_type {
            ScanType::Unknown => true,
            ScanType::Exact => self.operand().is_some_and(|v| new.loosely_equals(v)),
            ScanType::BiggerThan => self.compare_operand(new) == Some(Ordering::Greater),
            ScanType::SmallerThan => self.compare_operand(new) == Some(Ordering::Less),
            ScanType::Between => match (&self.value, &self.upper) {
                (Some(low), Some(high)) => {
                    matches!(
                        new.numeric_cmp(low),
                        Some(Ordering::Greater | Ordering::Equal)
                    ) && matches!(new.numeric_cmp(high), Some(Ordering::Less | Ordering::Equal))
                }
                _ => false,
            },
            ScanType::Changed => old.is_some_and(|old| !new.loosely_equals(old)),
            ScanType::Unchanged => old.is_some_and(|old| new.loosely_equals(old)),
            ScanType::Increased => {
                old.and_then(|old| new.numeric_cmp(old)) == Some(Ordering::Greater)
            }
            ScanType::Decreased => old.and_then(|old| new.numeric_cmp(old)) == Some(Ordering::Less),
            ScanType::IncreasedBy => self.delta_matches(old.and_then(|old| new.numeric_delta(old))),
            ScanType::DecreasedBy => self.delta_matches(old.and_then(|old| old.numeric_delta(new))),
        }
    }

    fn operand(&self) -> Option<&MemoryValue> {
        self.value.as_ref()
    }

    fn compare_operand(&self, new: &MemoryValue) -> Option<Ordering> {
        new.numeric_cmp(self.operand()?)
    }

    fn delta_matches(&self, delta: Option<f64>) -> bool {
        match (delta, self.operand().and_then(MemoryValue::as_f64)) {
            (Some(delta), Some(expected)) => delta == expected,
            _ => false,
        }
    }
}
