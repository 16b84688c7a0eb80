//! Packed storage for scan candidates
//!
//! A first scan produces one block per read window. The block keeps the
//! window's bytes as read plus one bit per aligned start, so a candidate
//! costs a bit on top of the memory it mirrors. Once few candidates are
//! left in a window the block is repacked as a sorted address list with
//! the candidates' bytes laid back to back.

use crate::core::types::Address;
use std::mem;

const WORD_BITS: usize = u64::BITS as usize;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Layout {
    /// Slot `i` starts at `base + i * stride` and its bytes are
    /// `bytes[i * stride..][..width]`
    Dense {
        base: usize,
        stride: usize,
        bytes: Vec<u8>,
        live: Vec<u64>,
    },
    /// Ascending addresses; entry `i` owns `bytes[i * width..][..width]`
    Sparse {
        addresses: Vec<usize>,
        bytes: Vec<u8>,
    },
}

/// Candidates of one address window, with the bytes last seen at each
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CandidateBlock {
    width: usize,
    count: usize,
    layout: Layout,
}

impl CandidateBlock {
    /// Block over the window read at `base`. Every `stride`-th start whose
    /// `width` bytes are all present in `bytes` is offered to `keep`.
    pub fn from_window<F>(
        base: usize,
        stride: usize,
        width: usize,
        mut bytes: Vec<u8>,
        mut keep: F,
    ) -> Self
    where
        F: FnMut(&[u8]) -> bool,
    {
        let slots = if bytes.len() >= width {
            (bytes.len() - width) / stride + 1
        } else {
            0
        };
        let mut live = vec![0u64; slots.div_ceil(WORD_BITS)];
        let mut count = 0;
        for slot in 0..slots {
            let offset = slot * stride;
            if keep(&bytes[offset..offset + width]) {
                set_bit(&mut live, slot);
                count += 1;
            }
        }
        if slots > 0 {
            bytes.truncate((slots - 1) * stride + width);
        } else {
            bytes.clear();
        }
        bytes.shrink_to_fit();

        CandidateBlock {
            width,
            count,
            layout: Layout::Dense {
                base,
                stride,
                bytes,
                live,
            },
        }
        .compact()
    }

    /// Block over addresses with their bytes. Entries must be ascending
    /// and each must hold exactly `width` bytes.
    pub fn from_entries<'a, I>(width: usize, entries: I) -> Self
    where
        I: IntoIterator<Item = (Address, &'a [u8])>,
    {
        let mut addresses = Vec::new();
        let mut bytes = Vec::new();
        for (address, data) in entries {
            addresses.push(address.as_usize());
            bytes.extend_from_slice(data);
        }
        CandidateBlock {
            width,
            count: addresses.len(),
            layout: Layout::Sparse { addresses, bytes },
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Heap bytes held by this block
    pub fn storage_bytes(&self) -> usize {
        match &self.layout {
            Layout::Dense { bytes, live, .. } => {
                bytes.capacity() + live.capacity() * mem::size_of::<u64>()
            }
            Layout::Sparse { addresses, bytes } => {
                addresses.capacity() * mem::size_of::<usize>() + bytes.capacity()
            }
        }
    }

    /// First live address and the end of the last live value
    pub fn span(&self) -> Option<(usize, usize)> {
        let first = self.iter().next()?.0.as_usize();
        let last = match &self.layout {
            Layout::Dense {
                base, stride, live, ..
            } => base + last_bit(live)? * stride,
            Layout::Sparse { addresses, .. } => *addresses.last()?,
        };
        Some((first, last + self.width))
    }

    /// Live candidates in ascending address order
    pub fn iter(&self) -> Box<dyn Iterator<Item = (Address, &[u8])> + Send + '_> {
        let width = self.width;
        match &self.layout {
            Layout::Dense {
                base,
                stride,
                bytes,
                live,
            } => Box::new(live_slots(live).map(move |slot| {
                let offset = slot * stride;
                (Address::new(base + offset), &bytes[offset..offset + width])
            })),
            Layout::Sparse { addresses, bytes } => Box::new(
                addresses
                    .iter()
                    .zip(bytes.chunks_exact(width.max(1)))
                    .map(|(&address, data)| (Address::new(address), data)),
            ),
        }
    }

    /// Successor block after a narrowing pass.
    ///
    /// `window` holds fresh bytes from `start` on (possibly fewer than the
    /// block spans); `survivors` lists the kept addresses in ascending
    /// order, each with its own bytes when the window did not cover it.
    pub fn narrowed(
        &self,
        start: usize,
        mut window: Vec<u8>,
        survivors: Vec<(Address, Option<Vec<u8>>)>,
    ) -> Self {
        let width = self.width;
        let count = survivors.len();
        let layout = match &self.layout {
            Layout::Dense { stride, .. } => {
                let stride = *stride;
                let slots = survivors
                    .last()
                    .map(|(address, _)| (address.as_usize() - start) / stride + 1)
                    .unwrap_or(0);
                let end = slots.saturating_sub(1) * stride + width;
                window.resize(if slots > 0 { end } else { 0 }, 0);
                let mut live = vec![0u64; slots.div_ceil(WORD_BITS)];
                for (address, own) in survivors {
                    let offset = address.as_usize() - start;
                    if let Some(own) = own {
                        window[offset..offset + width].copy_from_slice(&own);
                    }
                    set_bit(&mut live, offset / stride);
                }
                window.shrink_to_fit();
                Layout::Dense {
                    base: start,
                    stride,
                    bytes: window,
                    live,
                }
            }
            Layout::Sparse { .. } => {
                let mut addresses = Vec::with_capacity(count);
                let mut bytes = Vec::with_capacity(count * width);
                for (address, own) in survivors {
                    let offset = address.as_usize() - start;
                    match own {
                        Some(own) => bytes.extend_from_slice(&own),
                        None => bytes.extend_from_slice(&window[offset..offset + width]),
                    }
                    addresses.push(address.as_usize());
                }
                Layout::Sparse { addresses, bytes }
            }
        };
        CandidateBlock {
            width,
            count,
            layout,
        }
        .compact()
    }

    /// Repacks a dense block as an address list once that is smaller
    fn compact(self) -> Self {
        let dense_len = match &self.layout {
            Layout::Dense { bytes, .. } => bytes.len(),
            Layout::Sparse { .. } => 0,
        };
        let packed = self.count * (mem::size_of::<usize>() + self.width);
        if packed >= dense_len {
            return self;
        }
        let mut addresses = Vec::with_capacity(self.count);
        let mut packed_bytes = Vec::with_capacity(self.count * self.width);
        for (address, data) in self.iter() {
            addresses.push(address.as_usize());
            packed_bytes.extend_from_slice(data);
        }
        CandidateBlock {
            width: self.width,
            count: self.count,
            layout: Layout::Sparse {
                addresses,
                bytes: packed_bytes,
            },
        }
    }

    #[cfg(test)]
    fn is_dense(&self) -> bool {
        matches!(self.layout, Layout::Dense { .. })
    }
}

fn set_bit(words: &mut [u64], index: usize) {
    words[index / WORD_BITS] |= 1u64 << (index % WORD_BITS);
}

fn last_bit(words: &[u64]) -> Option<usize> {
    let (index, word) = words.iter().enumerate().rev().find(|(_, w)| **w != 0)?;
    Some(index * WORD_BITS + (WORD_BITS - 1 - word.leading_zeros() as usize))
}

fn live_slots(words: &[u64]) -> impl Iterator<Item = usize> + Send + '_ {
    words.iter().enumerate().flat_map(|(index, &word)| {
        let mut bits = word;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let slot = index * WORD_BITS + bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(slot)
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn addresses(block: &CandidateBlock) -> Vec<usize> {
        block.iter().map(|(a, _)| a.as_usize()).collect()
    }

    #[test]
    fn test_window_keeps_every_slot() {
        let bytes: Vec<u8> = (0..18).collect();
        let block = CandidateBlock::from_window(0x100, 4, 4, bytes, |_| true);
        assert!(block.is_dense());
        assert_eq!(block.len(), 4);
        assert_eq!(addresses(&block), vec![0x100, 0x104, 0x108, 0x10C]);
        let last = block.iter().last().unwrap();
        assert_eq!(last.1, &[12, 13, 14, 15]);
        assert_eq!(block.span(), Some((0x100, 0x110)));
    }

    #[test]
    fn test_short_window() {
        let block = CandidateBlock::from_window(0, 4, 4, vec![1, 2, 3], |_| true);
        assert!(block.is_empty());
        assert_eq!(block.span(), None);
    }

    #[test]
    fn test_few_matches_are_repacked() {
        let mut bytes = vec![0u8; 4096];
        bytes[400] = 9;
        let block = CandidateBlock::from_window(0x1000, 1, 1, bytes, |b| b[0] == 9);
        assert!(!block.is_dense());
        assert_eq!(addresses(&block), vec![0x1000 + 400]);
        assert!(block.storage_bytes() < 64);
    }

    #[test]
    fn test_slots_past_word_boundaries() {
        let bytes = vec![0u8; 200];
        let block = CandidateBlock::from_window(0, 1, 1, bytes, |_| true);
        assert_eq!(block.len(), 200);
        assert_eq!(addresses(&block), (0..200).collect::<Vec<_>>());
        assert_eq!(block.span(), Some((0, 200)));
    }

    #[test]
    fn test_narrowed_patches_uncovered_candidates() {
        let bytes: Vec<u8> = vec![0; 16];
        let block = CandidateBlock::from_window(0x40, 4, 4, bytes, |_| true);

        // Window covers the first eight bytes only
        let survivors = vec![
            (Address::new(0x44), None),
            (Address::new(0x4C), Some(vec![7, 7, 7, 7])),
        ];
        let next = block.narrowed(0x40, vec![1; 8], survivors);
        assert!(next.is_dense());
        let kept: Vec<(usize, Vec<u8>)> = next
            .iter()
            .map(|(a, b)| (a.as_usize(), b.to_vec()))
            .collect();
        assert_eq!(
            kept,
            vec![(0x44, vec![1, 1, 1, 1]), (0x4C, vec![7, 7, 7, 7])]
        );
    }

    #[test]
    fn test_sparse_entries() {
        let block = CandidateBlock::from_entries(
            2,
            vec![(Address::new(0x10), &[1u8, 2][..]), (Address::new(0x80), &[3u8, 4][..])],
        );
        assert_eq!(block.len(), 2);
        assert_eq!(block.span(), Some((0x10, 0x82)));

        let next = block.narrowed(0x10, Vec::new(), vec![(Address::new(0x80), Some(vec![5, 6]))]);
        let kept: Vec<(Address, &[u8])> = next.iter().collect();
        assert_eq!(kept, vec![(Address::new(0x80), &[5u8, 6][..])]);
    }
}
