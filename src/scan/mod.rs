//! Generational value scanning
//!
//! A [`ScanSession`] enumerates every aligned address of a [`ScanRegion`] as
//! a candidate, then narrows the set pass by pass with a comparison between
//! the previously seen value and the current one.

mod block;
mod control;
mod criteria;
mod region;
mod session;

pub use control::ScanControl;
pub use criteria::ScanCriteria;
pub use region::{AddressRange, ScanRegion};
pub use session::{SavedCandidate, ScanSession, ScanSnapshot, ScanState};
