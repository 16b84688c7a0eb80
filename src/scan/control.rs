//! Cancellation and progress shared with other threads

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct ControlState {
    cancelled: AtomicBool,
    // f32 bits of the completed fraction
    progress: AtomicU32,
}

/// Handle used to cancel or observe a running scan pass.
///
/// Clones share state. Every pass clears the cancel flag when it begins,
/// so a cancel only affects a pass that is already running. A cancel made
/// while no pass runs is discarded.
#[derive(Debug, Clone, Default)]
pub struct ScanControl {
    state: Arc<ControlState>,
}

impl ScanControl {
    pub fn new() -> Self {
        ScanControl::default()
    }

    /// Requests cancellation of the running pass
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Relaxed)
    }

    /// Fraction of the current pass completed, in `0.0..=1.0`
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.state.progress.load(Ordering::Relaxed))
    }

    pub(crate) fn set_progress(&self, fraction: f32) {
        let fraction = fraction.clamp(0.0, 1.0);
        self.state.progress.store(fraction.to_bits(), Ordering::Relaxed);
    }

    pub(crate) fn report(&self, done: usize, total: usize) {
        if total > 0 {
            self.set_progress(done as f32 / total as f32);
        }
    }

    /// Starts a pass: clears any earlier cancel and resets progress
    pub(crate) fn begin(&self) {
        self.state.cancelled.store(false, Ordering::SeqCst);
        self.set_progress(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared() {
        let control = ScanControl::new();
        let other = control.clone();
        other.cancel();
        assert!(control.is_cancelled());

        control.begin();
        assert!(!other.is_cancelled());
    }

    #[test]
    fn test_idle_cancel_is_discarded() {
        let control = ScanControl::new();
        control.report(1, 2);
        control.cancel();
        control.begin();
        assert!(!control.is_cancelled());
        assert_eq!(control.progress(), 0.0);
    }

    #[test]
    fn test_progress() {
        let control = ScanControl::new();
        assert_eq!(control.progress(), 0.0);
        control.report(1, 4);
        assert_eq!(control.progress(), 0.25);
        control.set_progress(3.0);
        assert_eq!(control.progress(), 1.0);
        control.report(5, 0);
        assert_eq!(control.progress(), 1.0);
    }

    #[test]
    fn test_cancel_from_thread() {
        let control = ScanControl::new();
        let remote = control.clone();
        std::thread::spawn(move || remote.cancel()).join().unwrap();
        assert!(control.is_cancelled());
    }
}
