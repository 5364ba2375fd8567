//! Chain reorganization monitoring.
//!
//! Most EVM chains go through several minor reorganizations per day as the
//! node hops between chain tips during block propagation. Any application
//! reading event data must detect those rewrites and purge the invalidated
//! data from its feeds.
//!
//! The [`ReorganizationMonitor`] keeps a locally trusted window of the most
//! recent block headers (number, hash, timestamp) and surfaces a safe block
//! range to read downstream event data from, even when the node being
//! queried has silently switched forks:
//!
//! - ingest and maintain recent headers with [`ReorganizationMonitor::update`]
//! - cross-check event logs against the window with
//!   [`ReorganizationMonitor::check_block_header`]
//! - answer block timestamp lookups from memory with
//!   [`ReorganizationMonitor::get_block_timestamp`]
//! - persist the window across restarts with
//!   [`ReorganizationMonitor::to_snapshot`] and
//!   [`ReorganizationMonitor::restore`]
//!
//! # Example
//!
//! ```rust,ignore
//! use eth_reorg_scanner::monitor::{
//!     InitialLoad, MonitorConfig, ReorganizationMonitor, RpcHeaderSource,
//! };
//! use eth_reorg_scanner::rpc::create_provider;
//!
//! # async fn example() -> eth_reorg_scanner::error::ScanResult<()> {
//! let provider = create_provider("https://eth-mainnet.g.alchemy.com/v2/KEY").await?;
//! let source = RpcHeaderSource::new(provider);
//! let mut monitor = ReorganizationMonitor::new(source, MonitorConfig::default());
//!
//! monitor.load_initial_headers(InitialLoad::BlockCount(20)).await?;
//!
//! loop {
//!     let resolution = monitor.update().await?;
//!     let (start, end) = resolution.read_range();
//!     // scan logs for [start, end]; re-delivered events must be deduplicated
//! }
//! # }
//! ```

pub mod buffer;
pub mod source;

pub use buffer::{BlockHeader, HeaderBuffer};
pub use source::{BackoffStrategy, FixedBackoff, HeaderSource, JitteredBackoff, RpcHeaderSource};

use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ScanResult, ScannerError};
use crate::snapshot::HeaderSnapshot;

/// Default number of trailing blocks re-verified on every update cycle.
pub const DEFAULT_CHECK_DEPTH: u64 = 20;

/// Default number of detection passes attempted per update cycle.
pub const DEFAULT_MAX_CYCLE_TRIES: u32 = 10;

/// Default wait between detection passes, giving the node time to settle on
/// one fork.
pub const DEFAULT_REORG_WAIT: Duration = Duration::from_secs(5);

/// Default upper bound on the detection window length.
pub const DEFAULT_MAX_SCAN_RANGE: u64 = 1_000_000;

/// Tuning knobs for the reorg monitor.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    /// How many trailing blocks to re-verify every cycle. Adjust per chain:
    /// deeper reorgs need a deeper check window.
    pub check_depth: u64,

    /// How many times to re-read chain data when a reorg is detected before
    /// giving up on a constantly changing node.
    pub max_cycle_tries: u32,

    /// Back-off between detection passes.
    pub reorg_wait: Duration,

    /// Abort detection if the window would exceed this many blocks. `None`
    /// disables the guard. Protects against accidentally replaying a huge
    /// range on nodes where that would take forever.
    pub max_scan_range: Option<u64>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_depth: DEFAULT_CHECK_DEPTH,
            max_cycle_tries: DEFAULT_MAX_CYCLE_TRIES,
            reorg_wait: DEFAULT_REORG_WAIT,
            max_scan_range: Some(DEFAULT_MAX_SCAN_RANGE),
        }
    }
}

/// How [`ReorganizationMonitor::load_initial_headers`] picks its start block.
#[derive(Debug, Clone, Copy)]
pub enum InitialLoad {
    /// Load the last N blocks before the current tip.
    BlockCount(u64),

    /// Load from an explicit start block up to the current tip.
    StartBlock(u64),
}

/// Outcome of one monitor update cycle.
///
/// Tells the consumer what block range to read on this poll cycle and
/// whether any previously delivered data must be purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainReorganizationResolution {
    /// The chain tip on our node; we can read data up to this block.
    pub last_live_block: u64,

    /// The highest block that does not need to be rolled back. Previously
    /// read events with a higher block number must be purged.
    pub latest_block_with_good_data: u64,

    /// Whether any reorg was observed during this cycle.
    pub reorg_detected: bool,
}

impl ChainReorganizationResolution {
    /// The inclusive `(start, end)` block range to read on this poll cycle.
    ///
    /// The range may overlap a previously issued one; callers must be
    /// prepared to read the same event again and deduplicate.
    #[must_use]
    pub const fn read_range(&self) -> (u64, u64) {
        (self.latest_block_with_good_data + 1, self.last_live_block)
    }
}

/// The reorg cross-check surface consumed by the log scanner.
///
/// Split out as a trait so the scanner does not need to name the monitor's
/// header source type. The check is a pure in-memory lookup.
pub trait ReorgCheck {
    /// Check a freshly read `(block number, block hash)` pair against the
    /// recorded window.
    ///
    /// Returns the stored timestamp when the block is tracked and matches,
    /// `None` when the block is outside the window (no opinion).
    ///
    /// # Errors
    ///
    /// [`ScannerError::ReorgDetected`] carrying
    /// `(block_number, stored_hash, new_hash)` on a hash mismatch.
    fn check_block_header(
        &mut self,
        block_number: u64,
        block_hash: alloy::primitives::B256,
    ) -> ScanResult<Option<u64>>;
}

/// Watches the blockchain for reorganizations.
///
/// Owns the [`HeaderBuffer`] exclusively; no other component writes it.
/// The update cycle is inherently sequential per instance: callers embedding
/// the monitor in a concurrent environment must serialize calls to it (one
/// monitor per chain-watch task, or an external actor boundary).
#[derive(Debug)]
pub struct ReorganizationMonitor<S, B = FixedBackoff> {
    source: S,
    buffer: HeaderBuffer,
    config: MonitorConfig,
    backoff: B,
}

impl<S: HeaderSource> ReorganizationMonitor<S, FixedBackoff> {
    /// Create a monitor with the fixed back-off derived from
    /// [`MonitorConfig::reorg_wait`].
    #[must_use]
    pub const fn new(source: S, config: MonitorConfig) -> Self {
        Self {
            source,
            buffer: HeaderBuffer::new(),
            config,
            backoff: FixedBackoff::new(config.reorg_wait),
        }
    }
}

impl<S: HeaderSource, B: BackoffStrategy> ReorganizationMonitor<S, B> {
    /// Create a monitor with a custom retry back-off strategy.
    #[must_use]
    pub const fn with_backoff(source: S, config: MonitorConfig, backoff: B) -> Self {
        Self {
            source,
            buffer: HeaderBuffer::new(),
            config,
            backoff,
        }
    }

    /// Whether any header data is available yet.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.buffer.has_data()
    }

    /// The number of the last block served by [`update`](Self::update).
    #[must_use]
    pub const fn last_block_read(&self) -> u64 {
        self.buffer.last_block_read()
    }

    /// Header data for a specific block from the in-memory window.
    #[must_use]
    pub fn block_by_number(&self, block_number: u64) -> Option<&BlockHeader> {
        self.buffer.get(block_number)
    }

    /// Skip scanning the initial chain and start directly from a block.
    pub fn skip_to_block(&mut self, block_number: u64) {
        info!(block_number, "Skipping monitor cursor to block");
        self.buffer.skip_to_block(block_number);
    }

    /// Fill the header window up to the current chain tip.
    ///
    /// Call during application start-up. On a resumed run (the buffer
    /// already holds data, e.g. restored from a snapshot) the requested
    /// start is ignored and loading continues strictly after the highest
    /// block already held, because gaps in the window are never permitted.
    ///
    /// Returns the `(start, end)` block range that was requested.
    ///
    /// # Errors
    ///
    /// Propagates header-source failures and buffer consistency violations.
    pub async fn load_initial_headers(&mut self, load: InitialLoad) -> ScanResult<(u64, u64)> {
        let end_block = self.source.current_tip().await?;

        let mut start_block = match load {
            InitialLoad::BlockCount(count) => end_block.saturating_sub(count).max(1),
            InitialLoad::StartBlock(start) => start,
        };

        if self.buffer.has_data() {
            // Resumed run: continue after the last saved block, no gaps.
            start_block = self.buffer.last_block_read() + 1;
        }

        info!(start_block, end_block, "Loading initial block headers");

        for header in self.source.fetch_headers(start_block, end_block).await? {
            self.buffer.add_block(header)?;
        }

        Ok((start_block, end_block))
    }

    /// Append a header to the tracked window. Blocks must be added in order.
    ///
    /// # Errors
    ///
    /// [`ScannerError::OutOfOrderBlock`] or [`ScannerError::DuplicateBlock`]
    /// on ordering violations.
    pub fn add_block(&mut self, header: BlockHeader) -> ScanResult<()> {
        self.buffer.add_block(header)
    }

    /// Delete window data above `latest_good_block` after a reorg.
    ///
    /// # Errors
    ///
    /// Fails if the buffer is empty.
    pub fn truncate(&mut self, latest_good_block: u64) -> ScanResult<()> {
        warn!(latest_good_block, "Truncating header window after reorg");
        self.buffer.truncate(latest_good_block)
    }

    /// UNIX timestamp of a tracked block.
    ///
    /// # Errors
    ///
    /// [`ScannerError::BlockNotAvailable`] if the window is empty or does
    /// not contain the block.
    pub fn get_block_timestamp(&self, block_number: u64) -> ScanResult<u64> {
        self.buffer.timestamp(block_number)
    }

    /// Compare the local header window against live chain data.
    ///
    /// Re-fetches headers for the last `check_depth` blocks up to the chain
    /// tip, clamped to the tracked window, and checks each against the
    /// window; the first mismatch wins. Blocks not yet in the window are
    /// appended.
    ///
    /// # Errors
    ///
    /// - [`ScannerError::ReorgDetected`] on the first hash mismatch
    /// - [`ScannerError::RangeTooLarge`] when the window exceeds
    ///   [`MonitorConfig::max_scan_range`]
    /// - transport errors from the header source
    pub async fn detect_reorg_and_new_blocks(&mut self) -> ScanResult<()> {
        let chain_last_block = self.source.current_tip().await?;
        let check_start_at = self
            .buffer
            .last_block_read()
            .saturating_sub(self.config.check_depth)
            .max(1);
        // Never reach below the tracked window: headers before it can
        // neither be cross-checked nor appended without breaking the no-gap
        // invariant. With an empty window the fetch starts right after the
        // read cursor.
        let check_start_at = match self.buffer.first_block() {
            Some(first) => check_start_at.max(first),
            None => check_start_at.max(self.buffer.last_block_read() + 1),
        };

        debug!(
            check_start_at,
            chain_last_block,
            last_block_read = self.buffer.last_block_read(),
            check_depth = self.config.check_depth,
            "Detecting reorg and new blocks"
        );

        if let Some(max_range) = self.config.max_scan_range {
            let range_len = chain_last_block.saturating_sub(check_start_at);
            if range_len > max_range {
                return Err(ScannerError::RangeTooLarge {
                    start_block: check_start_at,
                    end_block: chain_last_block,
                    max_range,
                });
            }
        }

        for header in self
            .source
            .fetch_headers(check_start_at, chain_last_block)
            .await?
        {
            self.check_header_internal(header.number, header.hash)?;
            if self.buffer.get(header.number).is_none() {
                self.buffer.add_block(header)?;
            }
        }

        Ok(())
    }

    /// Update the header window from the node and resolve the safe read
    /// range.
    ///
    /// Runs detection passes until one completes without a reorg, retrying
    /// up to [`MonitorConfig::max_cycle_tries`] times: a single pass can
    /// itself race with a second, cascading reorg, and bounding the retries
    /// prevents an infinite loop against a perpetually unstable node.
    /// `max_purge` tracks the deepest rollback point seen across all retries
    /// so the final resolution reflects the true worst-case invalidation
    /// boundary, not just the last one observed.
    ///
    /// Each cycle also evicts headers that have fallen out of the check
    /// window, so the tracked window stays bounded over long runs.
    ///
    /// # Errors
    ///
    /// - [`ScannerError::ReorgResolutionFailure`] when every retry hit a
    ///   reorg
    /// - any non-reorg detection error, propagated immediately
    pub async fn update(&mut self) -> ScanResult<ChainReorganizationResolution> {
        // Headers below this cycle's detection window were consumed by the
        // previous cycle's read range and are never looked at again, so a
        // long-running watch keeps the window bounded.
        self.buffer.evict_below(
            self.buffer
                .last_block_read()
                .saturating_sub(self.config.check_depth),
        );

        let mut tries_left = self.config.max_cycle_tries;
        let mut max_purge = self.buffer.last_block_read();
        let mut reorg_detected = false;
        let mut attempt: u32 = 0;

        while tries_left > 0 {
            match self.detect_reorg_and_new_blocks().await {
                Ok(()) => {
                    return Ok(ChainReorganizationResolution {
                        last_live_block: self.buffer.last_block_read(),
                        latest_block_with_good_data: max_purge,
                        reorg_detected,
                    });
                }
                Err(ScannerError::ReorgDetected {
                    block_number,
                    original_hash,
                    new_hash,
                }) => {
                    info!(
                        block_number,
                        %original_hash,
                        %new_hash,
                        "Chain reorganization detected"
                    );

                    reorg_detected = true;
                    let latest_good_block = block_number.saturating_sub(1);

                    max_purge = if max_purge == 0 {
                        block_number
                    } else {
                        max_purge.min(latest_good_block)
                    };

                    self.buffer.truncate(latest_good_block)?;
                    tries_left -= 1;
                    attempt += 1;
                    tokio::time::sleep(self.backoff.delay(attempt)).await;
                }
                Err(other) => return Err(other),
            }
        }

        Err(ScannerError::ReorgResolutionFailure {
            last_block: self.buffer.last_block_read(),
            attempts: self.config.max_cycle_tries,
            max_purge,
        })
    }

    /// Export the full header window for persistence.
    #[must_use]
    pub fn to_snapshot(&self) -> HeaderSnapshot {
        HeaderSnapshot::from_headers(self.buffer.iter().copied())
    }

    /// Replace the header window wholesale from a persisted snapshot.
    ///
    /// Sets the read cursor to the highest restored block number.
    ///
    /// # Errors
    ///
    /// Fails if the snapshot is empty or contains gaps.
    pub fn restore(&mut self, snapshot: &HeaderSnapshot) -> ScanResult<()> {
        self.buffer.restore(snapshot.headers().iter().copied())?;
        info!(
            last_block_read = self.buffer.last_block_read(),
            blocks = self.buffer.len(),
            "Restored header window from snapshot"
        );
        Ok(())
    }

    fn check_header_internal(
        &self,
        block_number: u64,
        block_hash: alloy::primitives::B256,
    ) -> ScanResult<Option<u64>> {
        match self.buffer.get(block_number) {
            Some(recorded) if recorded.hash != block_hash => Err(ScannerError::ReorgDetected {
                block_number,
                original_hash: recorded.hash,
                new_hash: block_hash,
            }),
            Some(recorded) => Ok(Some(recorded.timestamp)),
            None => Ok(None),
        }
    }

    /// Check a freshly read block against the recorded window.
    ///
    /// Called by the event reader for every log it receives. Returns the
    /// stored timestamp when the hashes match, `None` when we have no record
    /// of the block (the caller must resolve the timestamp another way).
    ///
    /// # Errors
    ///
    /// [`ScannerError::ReorgDetected`] when the stored hash differs from the
    /// supplied one.
    pub fn check_block_header(
        &self,
        block_number: u64,
        block_hash: alloy::primitives::B256,
    ) -> ScanResult<Option<u64>> {
        self.check_header_internal(block_number, block_hash)
    }
}

impl<S: HeaderSource, B: BackoffStrategy> ReorgCheck for ReorganizationMonitor<S, B> {
    fn check_block_header(
        &mut self,
        block_number: u64,
        block_hash: alloy::primitives::B256,
    ) -> ScanResult<Option<u64>> {
        self.check_header_internal(block_number, block_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::B256;

    #[test]
    fn test_read_range() {
        let resolution = ChainReorganizationResolution {
            last_live_block: 100,
            latest_block_with_good_data: 80,
            reorg_detected: true,
        };
        assert_eq!(resolution.read_range(), (81, 100));
    }

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.check_depth, 20);
        assert_eq!(config.max_cycle_tries, 10);
        assert_eq!(config.reorg_wait, Duration::from_secs(5));
        assert_eq!(config.max_scan_range, Some(1_000_000));
    }

    struct NullSource;

    impl HeaderSource for NullSource {
        async fn current_tip(&self) -> ScanResult<u64> {
            Ok(0)
        }

        async fn fetch_headers(&self, _: u64, _: u64) -> ScanResult<Vec<BlockHeader>> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_check_block_header_matches() {
        let mut monitor = ReorganizationMonitor::new(NullSource, MonitorConfig::default());
        let hash = B256::with_last_byte(0x50);
        monitor
            .add_block(BlockHeader::new(50, hash, 1_700_000_050))
            .unwrap();

        let timestamp = monitor.check_block_header(50, hash).unwrap();
        assert_eq!(timestamp, Some(1_700_000_050));
    }

    #[test]
    fn test_check_block_header_mismatch_raises_reorg() {
        let mut monitor = ReorganizationMonitor::new(NullSource, MonitorConfig::default());
        let hash_a = B256::with_last_byte(0xaa);
        let hash_b = B256::with_last_byte(0xbb);
        monitor
            .add_block(BlockHeader::new(50, hash_a, 1_700_000_050))
            .unwrap();

        let err = monitor.check_block_header(50, hash_b).unwrap_err();
        assert!(matches!(
            err,
            ScannerError::ReorgDetected {
                block_number: 50,
                original_hash,
                new_hash,
            } if original_hash == hash_a && new_hash == hash_b
        ));
    }

    #[test]
    fn test_check_block_header_outside_window() {
        let monitor = ReorganizationMonitor::new(NullSource, MonitorConfig::default());
        assert_eq!(monitor.check_block_header(7, B256::ZERO).unwrap(), None);
    }
}
