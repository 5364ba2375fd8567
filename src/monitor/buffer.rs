//! In-memory window of recently confirmed block headers.
//!
//! The [`HeaderBuffer`] is the monitor's single source of truth for "how far
//! we have confirmed". It is an ordered, gap-free map from block number to
//! [`BlockHeader`], owned exclusively by one
//! [`ReorganizationMonitor`](crate::monitor::ReorganizationMonitor) instance.
//!
//! ## Invariants
//!
//! - **No gaps**: if blocks N and M (N < M) are both present, every block in
//!   `[N, M]` is present.
//! - **Monotonic append**: headers are added in strictly increasing order;
//!   re-adding a block number is an error.
//! - `last_block_read()` always equals the highest key present (0 if empty).

use alloy::primitives::B256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ScanResult, ScannerError};

/// Minimal per-block metadata used to detect reorgs without fetching full
/// block bodies.
///
/// Immutable once created. Hashes are compared by equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block number
    pub number: u64,

    /// Block hash
    pub hash: B256,

    /// Block timestamp (Unix epoch seconds)
    pub timestamp: u64,
}

impl BlockHeader {
    /// Create a new header record.
    #[must_use]
    pub const fn new(number: u64, hash: B256, timestamp: u64) -> Self {
        Self {
            number,
            hash,
            timestamp,
        }
    }
}

/// Gap-free window of block headers keyed by block number.
///
/// Grows via [`add_block`](Self::add_block), shrinks via
/// [`truncate`](Self::truncate) on reorg rollback and
/// [`evict_below`](Self::evict_below) once old headers fall out of the check
/// window, and is wholly replaced via [`restore`](Self::restore) when loading
/// a persisted snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBuffer {
    /// Block number -> header data
    blocks: BTreeMap<u64, BlockHeader>,

    /// Highest block number present, 0 if empty
    last_block_read: u64,
}

impl HeaderBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            blocks: BTreeMap::new(),
            last_block_read: 0,
        }
    }

    /// Whether any headers are tracked yet.
    #[must_use]
    pub fn has_data(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Number of headers in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Highest block number present (0 if empty).
    #[must_use]
    pub const fn last_block_read(&self) -> u64 {
        self.last_block_read
    }

    /// Lowest block number present, `None` if empty.
    #[must_use]
    pub fn first_block(&self) -> Option<u64> {
        self.blocks.keys().next().copied()
    }

    /// Look up a header by block number.
    #[must_use]
    pub fn get(&self, block_number: u64) -> Option<&BlockHeader> {
        self.blocks.get(&block_number)
    }

    /// Move the read cursor without backfilling headers.
    ///
    /// Used to start scanning from a known block instead of replaying the
    /// whole chain. The next [`add_block`](Self::add_block) must supply
    /// `block_number + 1`.
    pub fn skip_to_block(&mut self, block_number: u64) {
        self.last_block_read = block_number;
    }

    /// Append a header to the window.
    ///
    /// The very first block may land anywhere; afterwards blocks must arrive
    /// in strictly increasing order with no gaps.
    ///
    /// # Errors
    ///
    /// - [`ScannerError::DuplicateBlock`] if the block number is already
    ///   present
    /// - [`ScannerError::OutOfOrderBlock`] if the block number is not
    ///   `last_block_read + 1`
    pub fn add_block(&mut self, header: BlockHeader) -> ScanResult<()> {
        if self.blocks.contains_key(&header.number) {
            return Err(ScannerError::DuplicateBlock {
                block_number: header.number,
            });
        }

        let ordering_active = !self.blocks.is_empty() || self.last_block_read != 0;
        if ordering_active && header.number != self.last_block_read + 1 {
            return Err(ScannerError::OutOfOrderBlock {
                expected: self.last_block_read + 1,
                got: header.number,
            });
        }

        self.last_block_read = header.number;
        self.blocks.insert(header.number, header);
        Ok(())
    }

    /// Delete every entry above `latest_good_block` and reset the read
    /// cursor to it.
    ///
    /// Called when a reorg invalidated everything after `latest_good_block`.
    ///
    /// # Errors
    ///
    /// [`ScannerError::BlockNotAvailable`] if the buffer is empty; truncating
    /// an empty window indicates a logic bug in the caller.
    pub fn truncate(&mut self, latest_good_block: u64) -> ScanResult<()> {
        if self.blocks.is_empty() {
            return Err(ScannerError::BlockNotAvailable {
                block_number: latest_good_block,
                last_recorded: 0,
            });
        }

        self.blocks.retain(|&number, _| number <= latest_good_block);
        self.last_block_read = latest_good_block;
        Ok(())
    }

    /// Drop headers below `lowest_kept_block`, keeping the read cursor.
    ///
    /// Bounds the window's memory in long-running processes; the retained
    /// range stays contiguous. A no-op when the bound is at or below the
    /// first tracked block.
    pub fn evict_below(&mut self, lowest_kept_block: u64) {
        self.blocks.retain(|&number, _| number >= lowest_kept_block);
    }

    /// Return the UNIX timestamp of a tracked block.
    ///
    /// # Errors
    ///
    /// [`ScannerError::BlockNotAvailable`] if the buffer is empty or does not
    /// contain the block number.
    pub fn timestamp(&self, block_number: u64) -> ScanResult<u64> {
        self.blocks.get(&block_number).map_or(
            Err(ScannerError::BlockNotAvailable {
                block_number,
                last_recorded: self.last_block_read,
            }),
            |header| Ok(header.timestamp),
        )
    }

    /// Replace the whole window with previously persisted headers.
    ///
    /// Sets `last_block_read` to the highest restored block number.
    ///
    /// # Errors
    ///
    /// Returns a consistency error if `headers` is empty or the restored set
    /// is not a contiguous block range (the no-gap invariant must hold for
    /// the restored window exactly as for a freshly built one).
    pub fn restore(&mut self, headers: impl IntoIterator<Item = BlockHeader>) -> ScanResult<()> {
        let mut blocks = BTreeMap::new();
        for header in headers {
            blocks.insert(header.number, header);
        }

        let (first, last) = match (blocks.keys().next(), blocks.keys().next_back()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(ScannerError::snapshot(
                    "cannot restore an empty header set",
                    None,
                ))
            }
        };

        if blocks.len() as u64 != last - first + 1 {
            return Err(ScannerError::snapshot(
                format!(
                    "restored header set has gaps: {} headers covering blocks {first} - {last}",
                    blocks.len()
                ),
                None,
            ));
        }

        self.last_block_read = last;
        self.blocks = blocks;
        Ok(())
    }

    /// Iterate over the tracked headers in ascending block-number order.
    pub fn iter(&self) -> impl Iterator<Item = &BlockHeader> {
        self.blocks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    fn header(number: u64) -> BlockHeader {
        BlockHeader::new(number, B256::with_last_byte(number as u8), 1_700_000_000 + number)
    }

    #[test]
    fn test_add_blocks_in_order() {
        let mut buffer = HeaderBuffer::new();
        assert!(!buffer.has_data());
        assert_eq!(buffer.last_block_read(), 0);

        for n in 100..110 {
            buffer.add_block(header(n)).unwrap();
        }

        assert_eq!(buffer.last_block_read(), 109);
        assert_eq!(buffer.len(), 10);
    }

    #[test]
    fn test_no_gap_invariant() {
        let mut buffer = HeaderBuffer::new();
        for n in 50..60 {
            buffer.add_block(header(n)).unwrap();
        }

        // Key set must be the contiguous range ending at last_block_read.
        let numbers: Vec<u64> = buffer.iter().map(|h| h.number).collect();
        let expected: Vec<u64> = (50..60).collect();
        assert_eq!(numbers, expected);
        assert_eq!(buffer.last_block_read(), 59);
    }

    #[test]
    fn test_out_of_order_block_rejected() {
        let mut buffer = HeaderBuffer::new();
        buffer.add_block(header(100)).unwrap();

        let err = buffer.add_block(header(102)).unwrap_err();
        assert!(matches!(
            err,
            ScannerError::OutOfOrderBlock {
                expected: 101,
                got: 102
            }
        ));
    }

    #[test]
    fn test_duplicate_block_rejected() {
        let mut buffer = HeaderBuffer::new();
        buffer.add_block(header(100)).unwrap();
        buffer.skip_to_block(99);

        let err = buffer.add_block(header(100)).unwrap_err();
        assert!(matches!(
            err,
            ScannerError::DuplicateBlock { block_number: 100 }
        ));
    }

    #[test]
    fn test_ordering_enforced_from_block_zero() {
        let mut buffer = HeaderBuffer::new();
        buffer.add_block(header(0)).unwrap();

        // Genesis leaves the cursor at 0; ordering must still hold.
        let err = buffer.add_block(header(5)).unwrap_err();
        assert!(matches!(
            err,
            ScannerError::OutOfOrderBlock {
                expected: 1,
                got: 5
            }
        ));

        buffer.add_block(header(1)).unwrap();
        assert_eq!(buffer.last_block_read(), 1);
    }

    #[test]
    fn test_first_block_can_land_anywhere() {
        let mut buffer = HeaderBuffer::new();
        buffer.add_block(header(19_000_000)).unwrap();
        assert_eq!(buffer.last_block_read(), 19_000_000);
    }

    #[test]
    fn test_truncate_removes_tail() {
        let mut buffer = HeaderBuffer::new();
        for n in 1..=10 {
            buffer.add_block(header(n)).unwrap();
        }

        buffer.truncate(6).unwrap();
        assert_eq!(buffer.last_block_read(), 6);
        assert_eq!(buffer.len(), 6);
        assert!(buffer.get(7).is_none());
        assert!(buffer.get(6).is_some());
    }

    #[test]
    fn test_truncate_is_idempotent_on_boundary() {
        let mut buffer = HeaderBuffer::new();
        for n in 1..=10 {
            buffer.add_block(header(n)).unwrap();
        }

        buffer.truncate(6).unwrap();
        let after_first: Vec<u64> = buffer.iter().map(|h| h.number).collect();

        buffer.truncate(6).unwrap();
        let after_second: Vec<u64> = buffer.iter().map(|h| h.number).collect();

        assert_eq!(after_first, after_second);
        assert_eq!(buffer.last_block_read(), 6);
    }

    #[test]
    fn test_evict_below_drops_the_head() {
        let mut buffer = HeaderBuffer::new();
        for n in 1..=10 {
            buffer.add_block(header(n)).unwrap();
        }

        buffer.evict_below(6);
        assert_eq!(buffer.first_block(), Some(6));
        assert_eq!(buffer.len(), 5);
        assert_eq!(buffer.last_block_read(), 10);

        // Appends continue above the cursor as usual.
        buffer.add_block(header(11)).unwrap();
        assert_eq!(buffer.last_block_read(), 11);
    }

    #[test]
    fn test_evict_below_first_block_is_a_noop() {
        let mut buffer = HeaderBuffer::new();
        for n in 5..=10 {
            buffer.add_block(header(n)).unwrap();
        }

        buffer.evict_below(0);
        buffer.evict_below(5);
        assert_eq!(buffer.len(), 6);
        assert_eq!(buffer.first_block(), Some(5));
    }

    #[test]
    fn test_truncate_empty_buffer_fails() {
        let mut buffer = HeaderBuffer::new();
        assert!(buffer.truncate(5).is_err());
    }

    #[test]
    fn test_timestamp_lookup() {
        let mut buffer = HeaderBuffer::new();
        buffer.add_block(header(42)).unwrap();

        assert_eq!(buffer.timestamp(42).unwrap(), 1_700_000_042);

        let err = buffer.timestamp(43).unwrap_err();
        assert!(matches!(
            err,
            ScannerError::BlockNotAvailable {
                block_number: 43,
                last_recorded: 42
            }
        ));
    }

    #[test]
    fn test_timestamp_on_empty_buffer_fails() {
        let buffer = HeaderBuffer::new();
        assert!(matches!(
            buffer.timestamp(1),
            Err(ScannerError::BlockNotAvailable {
                last_recorded: 0,
                ..
            })
        ));
    }

    #[test]
    fn test_restore_replaces_window() {
        let mut buffer = HeaderBuffer::new();
        buffer.add_block(header(1)).unwrap();

        let restored: Vec<BlockHeader> = (200..210).map(header).collect();
        buffer.restore(restored).unwrap();

        assert_eq!(buffer.last_block_read(), 209);
        assert_eq!(buffer.len(), 10);
        assert!(buffer.get(1).is_none());
    }

    #[test]
    fn test_restore_rejects_gaps() {
        let mut buffer = HeaderBuffer::new();
        let with_gap = vec![header(1), header(2), header(5)];
        assert!(buffer.restore(with_gap).is_err());
    }

    #[test]
    fn test_restore_rejects_empty() {
        let mut buffer = HeaderBuffer::new();
        assert!(buffer.restore(Vec::new()).is_err());
    }

    #[test]
    fn test_skip_to_block_moves_cursor() {
        let mut buffer = HeaderBuffer::new();
        buffer.skip_to_block(500);
        assert_eq!(buffer.last_block_read(), 500);
        assert!(!buffer.has_data());

        buffer.add_block(header(501)).unwrap();
        assert_eq!(buffer.last_block_read(), 501);
    }
}
