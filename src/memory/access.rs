//! Retrying, classifying access to foreign memory
//!
//! [`MemoryAccessor`] keeps no state between calls: every call names the
//! target it works on. All transport failures are turned into
//! [`MemoryError`] values here; nothing below this layer can take the
//! calling process down.

use super::ProcessMemory;
use crate::codec::{ValueCodec, ValueType};
use crate::config::MemoryConfig;
use crate::core::types::{Address, MemoryError, MemoryResult, MemoryValue};
use nix::errno::Errno;
use std::io;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

/// How often a transiently failing access is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_retries: u32, delay: Duration) -> Self {
        RetryPolicy { max_retries, delay }
    }

    /// Single attempt, no waiting
    pub const fn none() -> Self {
        RetryPolicy {
            max_retries: 0,
            delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(3, Duration::from_millis(5))
    }
}

/// Outcome of one failed attempt
enum Failure {
    /// The process is gone; never retried
    Gone,
    /// Will not change by retrying (permissions, closed handle)
    Denied(String),
    /// Momentary inaccessibility, worth another attempt
    Transient(String),
}

/// Stateless reader/writer of foreign memory
#[derive(Debug, Clone, Copy)]
pub struct MemoryAccessor {
    retry: RetryPolicy,
    max_read_size: usize,
}

impl MemoryAccessor {
    pub fn new(retry: RetryPolicy) -> Self {
        MemoryAccessor {
            retry,
            max_read_size: usize::MAX,
        }
    }

    pub fn from_config(config: &MemoryConfig) -> Self {
        MemoryAccessor {
            retry: RetryPolicy::new(
                config.max_retries,
                Duration::from_millis(config.retry_delay_ms),
            ),
            max_read_size: config.max_read_size,
        }
    }

    pub fn with_max_read_size(mut self, max_read_size: usize) -> Self {
        self.max_read_size = max_read_size;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Reads exactly `length` bytes at `address`.
    ///
    /// Fails with `PartialRead` (carrying what was obtained) when only a
    /// prefix is readable, `AccessDenied` once retries are exhausted, and
    /// `ProcessGone` without retrying when the target has exited.
    pub fn read<M>(&self, target: &M, address: Address, length: usize) -> MemoryResult<Vec<u8>>
    where
        M: ProcessMemory + ?Sized,
    {
        if length == 0 {
            return Ok(Vec::new());
        }
        self.check_span(address, length)?;
        if length > self.max_read_size {
            return Err(MemoryError::InvalidAddress(format!(
                "read of {} bytes at {} exceeds the {} byte limit",
                length, address, self.max_read_size
            )));
        }

        let mut buf = Vec::new();
        buf.try_reserve_exact(length).map_err(|e| {
            MemoryError::InvalidAddress(format!("read of {} bytes at {}: {}", length, address, e))
        })?;
        buf.resize(length, 0);
        let mut attempt = 0;
        loop {
            let error = match read_fully(target, address, &mut buf) {
                Ok(n) if n == length => return Ok(buf),
                Ok(n) if n > 0 => {
                    buf.truncate(n);
                    trace!(%address, requested = length, got = n, "partial read");
                    return Err(MemoryError::partial_read(address, length, buf));
                }
                Ok(_) => io::Error::from_raw_os_error(Errno::EIO as i32),
                Err(e) => e,
            };

            match classify(target, &error) {
                Failure::Gone => return Err(MemoryError::ProcessGone(target.pid())),
                Failure::Denied(reason) => return Err(MemoryError::access_denied(address, reason)),
                Failure::Transient(reason) => {
                    if attempt >= self.retry.max_retries {
                        return Err(MemoryError::access_denied(address, reason));
                    }
                    attempt += 1;
                    debug!(%address, attempt, %reason, "retrying read");
                    self.pause();
                }
            }
        }
    }

    /// Writes `data` at `address`, returning the number of bytes written.
    /// A short write is reported as `PartialWrite` with the actual count.
    pub fn write<M>(&self, target: &M, address: Address, data: &[u8]) -> MemoryResult<usize>
    where
        M: ProcessMemory + ?Sized,
    {
        if data.is_empty() {
            return Ok(0);
        }
        self.check_span(address, data.len())?;

        let mut attempt = 0;
        loop {
            let error = match write_fully(target, address, data) {
                Ok(n) if n == data.len() => return Ok(n),
                Ok(n) if n > 0 => {
                    return Err(MemoryError::partial_write(address, data.len(), n));
                }
                Ok(_) => io::Error::from_raw_os_error(Errno::EIO as i32),
                Err(e) => e,
            };

            match classify(target, &error) {
                Failure::Gone => return Err(MemoryError::ProcessGone(target.pid())),
                Failure::Denied(reason) => return Err(MemoryError::access_denied(address, reason)),
                Failure::Transient(reason) => {
                    if attempt >= self.retry.max_retries {
                        return Err(MemoryError::access_denied(address, reason));
                    }
                    attempt += 1;
                    debug!(%address, attempt, %reason, "retrying write");
                    self.pause();
                }
            }
        }
    }

    /// Reads and decodes one value
    pub fn read_value<M>(
        &self,
        target: &M,
        address: Address,
        ty: &ValueType,
        codec: &ValueCodec,
    ) -> MemoryResult<MemoryValue>
    where
        M: ProcessMemory + ?Sized,
    {
        let bytes = self.read(target, address, ty.width())?;
        codec.decode(&bytes, ty)
    }

    /// Encodes and writes one value
    pub fn write_value<M>(
        &self,
        target: &M,
        address: Address,
        value: &MemoryValue,
        ty: &ValueType,
        codec: &ValueCodec,
    ) -> MemoryResult<usize>
    where
        M: ProcessMemory + ?Sized,
    {
        let bytes = codec.encode(value, ty)?;
        self.write(target, address, &bytes)
    }

    fn check_span(&self, address: Address, length: usize) -> MemoryResult<()> {
        if address.checked_add(length).is_none() {
            return Err(MemoryError::InvalidAddress(format!(
                "{} + {} bytes wraps the address space",
                address, length
            )));
        }
        Ok(())
    }

    fn pause(&self) {
        if !self.retry.delay.is_zero() {
            thread::sleep(self.retry.delay);
        }
    }
}

impl Default for MemoryAccessor {
    fn default() -> Self {
        MemoryAccessor::new(RetryPolicy::default())
    }
}

/// Keeps calling `read_at` until the buffer is full, the transport returns
/// zero, or an error follows some progress
fn read_fully<M>(target: &M, address: Address, buf: &mut [u8]) -> io::Result<usize>
where
    M: ProcessMemory + ?Sized,
{
    let mut total = 0;
    while total < buf.len() {
        let at = Address::new(address.as_usize() + total);
        match target.read_at(at, &mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if total == 0 => return Err(e),
            Err(_) => break,
        }
    }
    Ok(total)
}

fn write_fully<M>(target: &M, address: Address, data: &[u8]) -> io::Result<usize>
where
    M: ProcessMemory + ?Sized,
{
    let mut total = 0;
    while total < data.len() {
        let at = Address::new(address.as_usize() + total);
        match target.write_at(at, &data[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if total == 0 => return Err(e),
            Err(_) => break,
        }
    }
    Ok(total)
}

fn classify<M>(target: &M, error: &io::Error) -> Failure
where
    M: ProcessMemory + ?Sized,
{
    let reason = error.to_string();
    match error.raw_os_error().map(Errno::from_raw) {
        Some(Errno::ESRCH) => return Failure::Gone,
        Some(Errno::EPERM) | Some(Errno::EACCES) | Some(Errno::EBADF) => {
            return Failure::Denied(reason)
        }
        // Unmapped or guard pages: the answer is the same on every attempt
        Some(Errno::EIO) | Some(Errno::EFAULT) => {
            return if target.is_alive() {
                Failure::Denied(reason)
            } else {
                Failure::Gone
            };
        }
        _ => {}
    }
    if error.kind() == io::ErrorKind::PermissionDenied {
        return Failure::Denied(reason);
    }
    if !target.is_alive() {
        return Failure::Gone;
    }
    Failure::Transient(reason)
}
