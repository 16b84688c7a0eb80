//! Process handle over `/proc/<pid>/mem` with RAII semantics

use crate::core::types::{Address, MemoryError, MemoryResult, ProcessId};
use crate::memory::ProcessMemory;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Access mode the memory file was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessAccess {
    Read,
    ReadWrite,
}

/// Open handle to a target process's memory.
///
/// Reads and writes are positional (`pread`/`pwrite`), so a shared reference
/// can be used from several threads at once.
pub struct ProcessHandle {
    pid: ProcessId,
    mem: Option<File>,
    access: ProcessAccess,
}

impl ProcessHandle {
    /// Opens `/proc/<pid>/mem` with the requested access
    pub fn open(pid: ProcessId, access: ProcessAccess) -> MemoryResult<Self> {
        let proc_dir = proc_path(pid);
        if !proc_dir.exists() {
            return Err(MemoryError::ProcessGone(pid));
        }

        let mem_path = proc_dir.join("mem");
        let mem = OpenOptions::new()
            .read(true)
            .write(access == ProcessAccess::ReadWrite)
            .open(&mem_path)
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => MemoryError::ProcessGone(pid),
                io::ErrorKind::PermissionDenied => {
                    MemoryError::access_denied(mem_path.display(), e.to_string())
                }
                _ => MemoryError::IoError(e),
            })?;

        debug!(pid, ?access, "opened process memory");
        Ok(ProcessHandle {
            pid,
            mem: Some(mem),
            access,
        })
    }

    /// Open a process for reading memory
    pub fn open_for_read(pid: ProcessId) -> MemoryResult<Self> {
        Self::open(pid, ProcessAccess::Read)
    }

    /// Open a process for reading and writing memory
    pub fn open_for_read_write(pid: ProcessId) -> MemoryResult<Self> {
        Self::open(pid, ProcessAccess::ReadWrite)
    }

    pub fn pid(&self) -> ProcessId {
        self.pid
    }

    pub fn access(&self) -> ProcessAccess {
        self.access
    }

    pub fn is_open(&self) -> bool {
        self.mem.is_some()
    }

    /// Releases the memory file; later reads fail with `EBADF`
    pub fn close(&mut self) {
        if self.mem.take().is_some() {
            debug!(pid = self.pid, "closed process memory");
        }
    }

    fn file(&self) -> io::Result<&File> {
        self.mem
            .as_ref()
            .ok_or_else(|| io::Error::from_raw_os_error(Errno::EBADF as i32))
    }
}

/// `/proc/<pid>` directory of a process
pub fn proc_path(pid: ProcessId) -> PathBuf {
    Path::new("/proc").join(pid.to_string())
}

/// Probes a pid with the null signal. `EPERM` still means the process exists.
pub fn process_exists(pid: ProcessId) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    match kill(Pid::from_raw(raw), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

impl ProcessMemory for ProcessHandle {
    fn pid(&self) -> ProcessId {
        self.pid
    }

    fn read_at(&self, address: Address, buf: &mut [u8]) -> io::Result<usize> {
        self.file()?.read_at(buf, address.as_u64())
    }

    fn write_at(&self, address: Address, data: &[u8]) -> io::Result<usize> {
        self.file()?.write_at(data, address.as_u64())
    }

    fn is_alive(&self) -> bool {
        process_exists(self.pid)
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("access", &self.access)
            .field("open", &self.is_open())
            .finish()
    }
}
