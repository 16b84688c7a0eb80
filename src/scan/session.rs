//! Generational scan over a target's address space

use super::block::CandidateBlock;
use super::control::ScanControl;
use super::criteria::ScanCriteria;
use super::region::{AddressRange, ScanRegion};
use crate::codec::{ValueCodec, ValueType};
use crate::config::{Config, ScannerConfig};
use crate::core::types::{Address, MemoryError, MemoryResult, MemoryValue, ScanResult};
use crate::memory::{MemoryAccessor, ProcessMemory};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, trace, warn};

/// Lifecycle of a [`ScanSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanState {
    Idle,
    /// A first scan completed; no narrowing pass yet
    FirstScan,
    /// At least one narrowing pass completed
    Scanned,
}

/// Serializable record of a session's candidates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub value_type: ValueType,
    pub generation: u64,
    pub candidates: Vec<SavedCandidate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedCandidate {
    pub address: Address,
    /// Last observed bytes, hex encoded
    pub bytes: String,
}

impl ScanSnapshot {
    pub fn to_json(&self) -> MemoryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> MemoryResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// One scan over one target.
///
/// The session owns its candidate set: every address still in the running
/// together with the bytes last seen there. Candidates live in packed blocks,
/// one per first-scan window, kept ordered by address, so
/// [`results`](Self::results) is ascending and stable within a generation.
///
/// ```text
/// Idle --start_scan--> FirstScan --next_scan--> Scanned --next_scan--> Scanned
///   ^                                                                   |
///   +------------------------------ reset ------------------------------+
/// ```
pub struct ScanSession {
    accessor: MemoryAccessor,
    codec: ValueCodec,
    config: ScannerConfig,
    pool: Option<ThreadPool>,
    control: ScanControl,
    state: ScanState,
    value_type: Option<ValueType>,
    blocks: Vec<CandidateBlock>,
    generation: u64,
}

impl ScanSession {
    pub fn new(accessor: MemoryAccessor, codec: ValueCodec, config: ScannerConfig) -> Self {
        let pool = if config.parallel {
            match ThreadPoolBuilder::new()
                .num_threads(config.max_threads)
                .thread_name(|i| format!("memscope-scan-{}", i))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(error = %e, "cannot build scan thread pool, scanning sequentially");
                    None
                }
            }
        } else {
            None
        };

        ScanSession {
            accessor,
            codec,
            config,
            pool,
            control: ScanControl::new(),
            state: ScanState::Idle,
            value_type: None,
            blocks: Vec::new(),
            generation: 0,
        }
    }

    /// Session wired from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        ScanSession::new(
            MemoryAccessor::from_config(&config.memory),
            ValueCodec::from_config(&config.codec),
            config.scanner.clone(),
        )
    }

    /// Shared handle for cancelling or observing a pass from another thread
    pub fn control(&self) -> ScanControl {
        self.control.clone()
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Type being scanned for; `None` while idle
    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    pub fn match_count(&self) -> usize {
        self.blocks.iter().map(CandidateBlock::len).sum()
    }

    /// Heap bytes spent on the candidate set
    pub fn storage_bytes(&self) -> usize {
        self.blocks.iter().map(CandidateBlock::storage_bytes).sum()
    }

    /// Number of completed passes since the last start, first scan included
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn codec(&self) -> &ValueCodec {
        &self.codec
    }

    /// Starts a new scan keeping every aligned address of `region`.
    ///
    /// Any previous candidates are discarded first. On cancellation or a
    /// fatal error the session is left idle.
    pub fn start_scan<M>(
        &mut self,
        target: &M,
        region: &ScanRegion,
        ty: ValueType,
    ) -> MemoryResult<usize>
    where
        M: ProcessMemory + ?Sized,
    {
        self.first_scan(target, region, ty, None)
    }

    /// Starts a new scan keeping only addresses whose value matches
    /// `criteria`. Criteria that compare against a previous value are
    /// rejected.
    pub fn start_scan_filtered<M>(
        &mut self,
        target: &M,
        region: &ScanRegion,
        ty: ValueType,
        criteria: &ScanCriteria,
    ) -> MemoryResult<usize>
    where
        M: ProcessMemory + ?Sized,
    {
        if !criteria.usable_without_previous() {
            return Err(MemoryError::InvalidScanCriteria(format!(
                "{:?} needs a previous scan",
                criteria.scan_type()
            )));
        }
        self.first_scan(target, region, ty, Some(criteria))
    }

    fn first_scan<M>(
        &mut self,
        target: &M,
        region: &ScanRegion,
        ty: ValueType,
        criteria: Option<&ScanCriteria>,
    ) -> MemoryResult<usize>
    where
        M: ProcessMemory + ?Sized,
    {
        let width = ty.width();
        if width == 0 {
            return Err(MemoryError::InvalidDescriptor(format!(
                "{} spans zero bytes and cannot be scanned",
                ty
            )));
        }

        self.reset();
        self.control.begin();
        let stride = self.stride(&ty);
        let total = region.total_size();
        info!(
            pid = target.pid(),
            value_type = %ty,
            bytes = total,
            stride,
            "starting first scan"
        );

        let mut found = Vec::new();
        let mut done = 0usize;
        for range in region.ranges() {
            let outcome = self.scan_range(
                target, range, &ty, stride, criteria, &mut found, &mut done, total,
            );
            if let Err(e) = outcome {
                debug!(error = %e, "first scan aborted");
                self.control.set_progress(0.0);
                return Err(e);
            }
        }

        self.blocks = found;
        self.value_type = Some(ty);
        self.state = ScanState::FirstScan;
        self.generation = 1;
        self.control.set_progress(1.0);
        let matches = self.match_count();
        info!(matches, storage = self.storage_bytes(), "first scan complete");
        Ok(matches)
    }

    /// Reads one range window by window. Candidate starts within a window
    /// span at most `chunk_size` bytes; the read extends `width - 1` bytes
    /// further so values straddling the window edge are seen whole. Each
    /// window with a match becomes one block.
    #[allow(clippy::too_many_arguments)]
    fn scan_range<M>(
        &self,
        target: &M,
        range: &AddressRange,
        ty: &ValueType,
        stride: usize,
        criteria: Option<&ScanCriteria>,
        found: &mut Vec<CandidateBlock>,
        done: &mut usize,
        total: usize,
    ) -> MemoryResult<()>
    where
        M: ProcessMemory + ?Sized,
    {
        let width = ty.width();
        let end = range.end.as_usize();
        let Some(first) = range.start.align_up(stride) else {
            return Ok(());
        };
        let mut addr = first.as_usize();

        while addr < end && end - addr >= width {
            if self.control.is_cancelled() {
                return Err(MemoryError::Cancelled);
            }

            // Exclusive bound on candidate starts in this window
            let starts_end = addr
                .saturating_add(self.config.chunk_size)
                .min(end - width + 1);
            let read_len = starts_end - addr - 1 + width;

            let data = match self.accessor.read(target, Address::new(addr), read_len) {
                Ok(data) => data,
                Err(MemoryError::PartialRead { data, .. }) => data,
                Err(e) if e.is_fatal_for_scan() => return Err(e),
                Err(e) => {
                    trace!(address = %Address::new(addr), error = %e, "skipping unreadable window");
                    Vec::new()
                }
            };

            let block = CandidateBlock::from_window(addr, stride, width, data, |bytes| {
                self.keeps(bytes, ty, criteria)
            });
            if !block.is_empty() {
                found.push(block);
            }

            // Skip to the first candidate start past this window
            let span = starts_end - addr;
            let advance = span.div_ceil(stride) * stride;
            *done += advance.min(end - addr);
            self.control.report(*done, total);
            match addr.checked_add(advance) {
                Some(next) => addr = next,
                None => break,
            }
        }
        Ok(())
    }

    fn keeps(&self, bytes: &[u8], ty: &ValueType, criteria: Option<&ScanCriteria>) -> bool {
        match criteria {
            None => true,
            Some(criteria) => match self.codec.decode(bytes, ty) {
                Ok(value) => criteria.matches(None, &value),
                Err(_) => false,
            },
        }
    }

    fn stride(&self, ty: &ValueType) -> usize {
        if self.config.alignment == 0 {
            ty.kind().natural_alignment()
        } else {
            self.config.alignment
        }
    }

    /// Narrows the candidate set.
    ///
    /// Each candidate is re-read and decoded; `predicate(old, new)` decides
    /// whether it stays. Candidates that can no longer be read or decoded
    /// are dropped. If the pass is cancelled or the target exits, the
    /// candidate set from before the call is kept and the error returned.
    pub fn next_scan<M, F>(&mut self, target: &M, predicate: F) -> MemoryResult<usize>
    where
        M: ProcessMemory + ?Sized,
        F: Fn(&MemoryValue, &MemoryValue) -> bool + Sync,
    {
        let ty = match (self.state, self.value_type) {
            (ScanState::Idle, _) | (_, None) => return Err(MemoryError::NotScanning),
            (_, Some(ty)) => ty,
        };

        self.control.begin();
        let before = self.match_count();
        debug!(pid = target.pid(), candidates = before, generation = self.generation, "narrowing");

        let done = AtomicUsize::new(0);
        let narrowed = match &self.pool {
            Some(pool) => pool.install(|| {
                self.blocks
                    .par_iter()
                    .map(|block| self.narrow_block(target, block, &ty, &predicate, &done, before))
                    .collect::<MemoryResult<Vec<CandidateBlock>>>()
            })?,
            None => self
                .blocks
                .iter()
                .map(|block| self.narrow_block(target, block, &ty, &predicate, &done, before))
                .collect::<MemoryResult<Vec<CandidateBlock>>>()?,
        };

        self.blocks = narrowed.into_iter().filter(|b| !b.is_empty()).collect();
        self.state = ScanState::Scanned;
        self.generation += 1;
        self.control.set_progress(1.0);
        let after = self.match_count();
        info!(
            before,
            after,
            storage = self.storage_bytes(),
            generation = self.generation,
            "narrowing pass complete"
        );
        Ok(after)
    }

    /// Narrows with one of the built-in comparisons
    pub fn next_scan_with<M>(&mut self, target: &M, criteria: &ScanCriteria) -> MemoryResult<usize>
    where
        M: ProcessMemory + ?Sized,
    {
        self.next_scan(target, |old, new| criteria.matches(Some(old), new))
    }

    /// Re-reads one block and keeps the candidates `predicate` accepts.
    ///
    /// The block's span is read in one go; candidates the read did not
    /// cover are read on their own.
    fn narrow_block<M, F>(
        &self,
        target: &M,
        block: &CandidateBlock,
        ty: &ValueType,
        predicate: &F,
        done: &AtomicUsize,
        total: usize,
    ) -> MemoryResult<CandidateBlock>
    where
        M: ProcessMemory + ?Sized,
        F: Fn(&MemoryValue, &MemoryValue) -> bool + Sync,
    {
        if self.control.is_cancelled() {
            return Err(MemoryError::Cancelled);
        }
        let Some((start, end)) = block.span() else {
            return Ok(block.clone());
        };
        let width = block.width();
        let interval = self.config.progress_interval.max(1);

        let window = if end - start <= self.config.chunk_size.saturating_add(width) {
            match self.accessor.read(target, Address::new(start), end - start) {
                Ok(data) => data,
                Err(MemoryError::PartialRead { data, .. }) => data,
                Err(e) if e.is_fatal_for_scan() => return Err(e),
                Err(e) => {
                    trace!(address = %Address::new(start), error = %e, "block window unreadable");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let mut survivors = Vec::new();
        for (address, old) in block.iter() {
            let n = done.fetch_add(1, Ordering::Relaxed);
            if n % interval == 0 {
                if self.control.is_cancelled() {
                    return Err(MemoryError::Cancelled);
                }
                self.control.report(n, total);
            }

            let offset = address.as_usize() - start;
            let own = if offset + width <= window.len() {
                None
            } else {
                match self.accessor.read(target, address, width) {
                    Ok(bytes) => Some(bytes),
                    Err(e) if e.is_fatal_for_scan() => return Err(e),
                    Err(e) => {
                        trace!(%address, error = %e, "dropping unreadable candidate");
                        continue;
                    }
                }
            };
            let fresh = match &own {
                Some(bytes) => bytes.as_slice(),
                None => &window[offset..offset + width],
            };
            if self.survives(address, old, fresh, ty, predicate) {
                survivors.push((address, own));
            }
        }
        Ok(block.narrowed(start, window, survivors))
    }

    fn survives<F>(
        &self,
        address: Address,
        old: &[u8],
        fresh: &[u8],
        ty: &ValueType,
        predicate: &F,
    ) -> bool
    where
        F: Fn(&MemoryValue, &MemoryValue) -> bool + Sync,
    {
        match (self.codec.decode(old, ty), self.codec.decode(fresh, ty)) {
            (Ok(old_value), Ok(new_value)) => predicate(&old_value, &new_value),
            _ => {
                trace!(%address, "dropping undecodable candidate");
                false
            }
        }
    }

    /// Surviving candidates with the value seen by the last pass, in
    /// ascending address order. Does not touch the target.
    pub fn results(&self) -> impl Iterator<Item = ScanResult> + '_ {
        let ty = self.value_type;
        self.blocks
            .iter()
            .flat_map(CandidateBlock::iter)
            .filter_map(move |(address, bytes)| {
                let value = self.codec.decode(bytes, ty.as_ref()?).ok()?;
                Some(ScanResult::new(address, value))
            })
    }

    /// Discards all candidates and returns to idle
    pub fn reset(&mut self) {
        if self.state != ScanState::Idle {
            debug!(generation = self.generation, "scan session reset");
        }
        self.blocks.clear();
        self.value_type = None;
        self.state = ScanState::Idle;
        self.generation = 0;
    }

    /// Records the session for later [`restore`](Self::restore)
    pub fn snapshot(&self) -> MemoryResult<ScanSnapshot> {
        let value_type = match (self.state, self.value_type) {
            (ScanState::Idle, _) | (_, None) => return Err(MemoryError::NotScanning),
            (_, Some(ty)) => ty,
        };
        Ok(ScanSnapshot {
            value_type,
            generation: self.generation,
            candidates: self
                .blocks
                .iter()
                .flat_map(CandidateBlock::iter)
                .map(|(address, bytes)| SavedCandidate {
                    address,
                    bytes: hex::encode(bytes),
                })
                .collect(),
        })
    }

    /// Replaces the session's state with a recorded one. Candidates are
    /// regrouped into blocks spanning at most one scan window each.
    pub fn restore(&mut self, mut snapshot: ScanSnapshot) -> MemoryResult<()> {
        let width = snapshot.value_type.width();
        snapshot.candidates.sort_by_key(|saved| saved.address);
        snapshot.candidates.dedup_by_key(|saved| saved.address);

        let mut entries: Vec<(Address, Vec<u8>)> = Vec::new();
        let mut blocks = Vec::new();
        for saved in &snapshot.candidates {
            let bytes = hex::decode(&saved.bytes).map_err(|e| {
                MemoryError::DecodingFailed(format!("candidate {}: {}", saved.address, e))
            })?;
            if bytes.len() != width {
                return Err(MemoryError::DecodingFailed(format!(
                    "candidate {} holds {} bytes, {} needs {}",
                    saved.address,
                    bytes.len(),
                    snapshot.value_type,
                    width
                )));
            }
            let opens_block = entries.first().is_some_and(|(first, _)| {
                saved.address.as_usize() - first.as_usize() > self.config.chunk_size
            });
            if opens_block {
                blocks.push(pack(width, &entries));
                entries.clear();
            }
            entries.push((saved.address, bytes));
        }
        if !entries.is_empty() {
            blocks.push(pack(width, &entries));
        }

        self.blocks = blocks;
        self.value_type = Some(snapshot.value_type);
        self.generation = snapshot.generation.max(1);
        self.state = if self.generation > 1 {
            ScanState::Scanned
        } else {
            ScanState::FirstScan
        };
        info!(
            matches = self.match_count(),
            generation = self.generation,
            "scan session restored"
        );
        Ok(())
    }
}

fn pack(width: usize, entries: &[(Address, Vec<u8>)]) -> CandidateBlock {
    CandidateBlock::from_entries(width, entries.iter().map(|(a, b)| (*a, b.as_slice())))
}

impl Default for ScanSession {
    fn default() -> Self {
        ScanSession::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{StringEncoding, ValueKind};
    use crate::core::types::ScanType;
    use crate::memory::{MemorySnapshot, RetryPolicy};
    use pretty_assertions::assert_eq;

    fn scanner_config() -> ScannerConfig {
        ScannerConfig {
            chunk_size: 16,
            alignment: 0,
            parallel: false,
            max_threads: 1,
            progress_interval: 1,
        }
    }

    fn session() -> ScanSession {
        ScanSession::new(
            MemoryAccessor::new(RetryPolicy::none()),
            ValueCodec::new(),
            scanner_config(),
        )
    }

    fn u32_memory(base: usize, values: &[u32]) -> MemorySnapshot {
        let memory = MemorySnapshot::new(42);
        let bytes = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        memory.map(Address::new(base), bytes);
        memory
    }

    fn addresses(session: &ScanSession) -> Vec<usize> {
        session.results().map(|r| r.address.as_usize()).collect()
    }

    #[test]
    fn test_first_scan_enumerates_aligned_addresses() {
        let memory = u32_memory(0x1000, &[0; 10]);
        let mut session = session();
        let ty = ValueType::scalar(ValueKind::U32);

        let count = session
            .start_scan(&memory, &ScanRegion::from_range(Address::new(0x1000), 40), ty)
            .unwrap();

        // 40 bytes span windows of 16; every 4-aligned start counts once
        assert_eq!(count, 10);
        assert_eq!(session.state(), ScanState::FirstScan);
        assert_eq!(session.generation(), 1);
        assert_eq!(
            addresses(&session),
            (0..10).map(|i| 0x1000 + i * 4).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_values_straddling_windows_are_found() {
        let memory = MemorySnapshot::new(1);
        let mut bytes = vec![0u8; 32];
        bytes[14..18].copy_from_slice(&0xCAFEBABEu32.to_le_bytes());
        memory.map(Address::new(0x2000), bytes);

        let mut config = scanner_config();
        config.alignment = 1;
        let mut session = ScanSession::new(MemoryAccessor::default(), ValueCodec::new(), config);
        let criteria =
            ScanCriteria::with_value(ScanType::Exact, MemoryValue::U32(0xCAFEBABE)).unwrap();
        session
            .start_scan_filtered(
                &memory,
                &ScanRegion::from_range(Address::new(0x2000), 32),
                ValueType::scalar(ValueKind::U32),
                &criteria,
            )
            .unwrap();

        assert_eq!(addresses(&session), vec![0x200E]);
    }

    #[test]
    fn test_unaligned_region_start() {
        let memory = u32_memory(0x1000, &[7; 4]);
        let mut session = session();
        session
            .start_scan(
                &memory,
                &ScanRegion::from_range(Address::new(0x1001), 15),
                ValueType::scalar(ValueKind::U32),
            )
            .unwrap();
        assert_eq!(addresses(&session), vec![0x1004, 0x1008, 0x100C]);
    }

    #[test]
    fn test_unreadable_ranges_are_skipped() {
        let memory = u32_memory(0x1000, &[1, 2]);
        let mut region = ScanRegion::from_range(Address::new(0x1000), 8);
        region.add(Address::new(0x9000), 64);

        let mut session = session();
        let count = session
            .start_scan(&memory, &region, ValueType::scalar(ValueKind::U32))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_next_scan_narrows() {
        let memory = u32_memory(0x1000, &[10, 20, 30, 40]);
        let mut session = session();
        let region = ScanRegion::from_range(Address::new(0x1000), 16);
        session
            .start_scan(&memory, &region, ValueType::scalar(ValueKind::U32))
            .unwrap();

        memory.poke(Address::new(0x1004), &25u32.to_le_bytes());
        memory.poke(Address::new(0x100C), &41u32.to_le_bytes());

        let increased = ScanCriteria::new(ScanType::Increased).unwrap();
        assert_eq!(session.next_scan_with(&memory, &increased).unwrap(), 2);
        assert_eq!(session.state(), ScanState::Scanned);
        assert_eq!(session.generation(), 2);

        let values: Vec<MemoryValue> = session.results().map(|r| r.value).collect();
        assert_eq!(values, vec![MemoryValue::U32(25), MemoryValue::U32(41)]);
    }

    #[test]
    fn test_unreadable_candidate_is_dropped() {
        let memory = MemorySnapshot::new(3);
        memory.map(Address::new(0x1000), 1u32.to_le_bytes().to_vec());
        memory.map(Address::new(0x2000), 2u32.to_le_bytes().to_vec());
        memory.map(Address::new(0x3000), 3u32.to_le_bytes().to_vec());

        let mut session = session();
        let mut region = ScanRegion::new();
        for base in [0x1000, 0x2000, 0x3000] {
            region.add(Address::new(base), 4);
        }
        session
            .start_scan(&memory, &region, ValueType::scalar(ValueKind::U32))
            .unwrap();
        assert_eq!(session.match_count(), 3);

        memory.unmap(Address::new(0x2000));
        session.next_scan(&memory, |_, _| true).unwrap();
        assert_eq!(addresses(&session), vec![0x1000, 0x3000]);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let memory = u32_memory(0x1000, &[1]);
        let mut session = session();
        session
            .start_scan(
                &memory,
                &ScanRegion::from_range(Address::new(0x1000), 4),
                ValueType::scalar(ValueKind::U32),
            )
            .unwrap();
        session.reset();

        assert_eq!(session.results().count(), 0);
        assert_eq!(session.state(), ScanState::Idle);
        assert!(matches!(
            session.next_scan(&memory, |_, _| true),
            Err(MemoryError::NotScanning)
        ));
    }

    #[test]
    fn test_next_scan_without_start() {
        let memory = MemorySnapshot::new(1);
        let mut session = session();
        assert!(matches!(
            session.next_scan(&memory, |_, _| true),
            Err(MemoryError::NotScanning)
        ));
        assert!(matches!(session.snapshot(), Err(MemoryError::NotScanning)));
    }

    #[test]
    fn test_process_exit_keeps_previous_candidates() {
        let memory = u32_memory(0x1000, &[1, 2, 3]);
        let mut session = session();
        session
            .start_scan(
                &memory,
                &ScanRegion::from_range(Address::new(0x1000), 12),
                ValueType::scalar(ValueKind::U32),
            )
            .unwrap();

        memory.set_alive(false);
        assert!(matches!(
            session.next_scan(&memory, |_, _| false),
            Err(MemoryError::ProcessGone(42))
        ));
        assert_eq!(session.match_count(), 3);
        assert_eq!(session.generation(), 1);
    }

    #[test]
    fn test_first_scan_rejects_previous_criteria() {
        let memory = u32_memory(0x1000, &[1]);
        let mut session = session();
        let criteria = ScanCriteria::new(ScanType::Changed).unwrap();
        let result = session.start_scan_filtered(
            &memory,
            &ScanRegion::from_range(Address::new(0x1000), 4),
            ValueType::scalar(ValueKind::U32),
            &criteria,
        );
        assert!(matches!(result, Err(MemoryError::InvalidScanCriteria(_))));
    }

    #[test]
    fn test_zero_width_type_is_rejected() {
        let memory = u32_memory(0x1000, &[1]);
        let mut session = session();
        let result = session.start_scan(
            &memory,
            &ScanRegion::from_range(Address::new(0x1000), 4),
            ValueType::bytes(0),
        );
        assert!(matches!(result, Err(MemoryError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_string_scan() {
        let memory = MemorySnapshot::new(1);
        let mut bytes = vec![0u8; 32];
        bytes[8..13].copy_from_slice(b"hello");
        memory.map(Address::new(0x4000), bytes);

        let ty = ValueType::string(StringEncoding::Utf8, 5, false);
        let criteria =
            ScanCriteria::with_value(ScanType::Exact, MemoryValue::String("hello".into())).unwrap();
        let mut session = session();
        session
            .start_scan_filtered(
                &memory,
                &ScanRegion::from_range(Address::new(0x4000), 32),
                ty,
                &criteria,
            )
            .unwrap();
        assert_eq!(addresses(&session), vec![0x4008]);
    }

    #[test]
    fn test_snapshot_restore() {
        let memory = u32_memory(0x1000, &[5, 6]);
        let mut session = session();
        session
            .start_scan(
                &memory,
                &ScanRegion::from_range(Address::new(0x1000), 8),
                ValueType::scalar(ValueKind::U32),
            )
            .unwrap();

        let json = session.snapshot().unwrap().to_json().unwrap();
        assert!(json.contains("\"4 Bytes\""));

        let mut restored = ScanSession::default();
        restored.restore(ScanSnapshot::from_json(&json).unwrap()).unwrap();
        assert_eq!(restored.state(), ScanState::FirstScan);
        assert_eq!(
            restored.results().collect::<Vec<_>>(),
            session.results().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_restore_rejects_wrong_width() {
        let snapshot = ScanSnapshot {
            value_type: ValueType::scalar(ValueKind::U16),
            generation: 3,
            candidates: vec![SavedCandidate {
                address: Address::new(0x10),
                bytes: "aabbcc".into(),
            }],
        };
        let mut session = session();
        assert!(matches!(
            session.restore(snapshot),
            Err(MemoryError::DecodingFailed(_))
        ));
        assert_eq!(session.state(), ScanState::Idle);
    }
}
