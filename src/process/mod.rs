//! Process access for Linux targets
//!
//! A [`ProcessHandle`] wraps `/proc/<pid>/mem`; liveness is probed with a
//! null signal.

pub mod handle;

pub use handle::{proc_path, process_exists, ProcessAccess, ProcessHandle};
