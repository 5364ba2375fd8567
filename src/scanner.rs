//! Chunked, reorg-aware event log scanning.
//!
//! The [`LogScanner`] reads logs over an inclusive block range in bounded
//! chunks, attaches a resolved timestamp to every matched log, and stops
//! immediately when the attached monitor signals a chain reorganization.
//!
//! Logs are delivered through a [`LogStream`], a pull-based lazy sequence:
//! each call to [`LogStream::next`] yields one decoded record, chunk fetches
//! happen on demand, and dropping the stream mid-scan leaks nothing. A
//! stream is finite and not restartable; callers polling an open-ended tip
//! create a fresh stream per cycle with a range computed from the monitor's
//! [`update`](crate::monitor::ReorganizationMonitor::update) resolution.
//!
//! Timestamps come from exactly one of two places, encoded in
//! [`TimestampSource`]:
//! - a monitor, whose per-log cross-check doubles as reorg detection, or
//! - a standalone resolver keyed by block hash.
//!
//! The enum makes supplying both impossible: the monitor path replaces
//! free-standing timestamp lookups, and mixing them would hide a reorg
//! signal behind a stale timestamp table.
//!
//! # Example
//!
//! ```rust,ignore
//! use eth_reorg_scanner::scanner::{LogScanner, TimestampSource};
//!
//! # async fn example(
//! #     provider: &eth_reorg_scanner::rpc::Provider,
//! #     filter: &eth_reorg_scanner::filter::EventFilter,
//! #     monitor: &mut dyn eth_reorg_scanner::monitor::ReorgCheck,
//! # ) -> eth_reorg_scanner::error::ScanResult<()> {
//! let scanner = LogScanner::new(100)?;
//! let mut stream = scanner.stream(
//!     provider,
//!     filter,
//!     19_000_000,
//!     19_000_500,
//!     TimestampSource::Monitor(monitor),
//! );
//!
//! while let Some(result) = stream.next().await {
//!     let log = result?; // a reorg aborts the stream here
//!     println!("{} at block {}", log.event, log.block_number);
//! }
//! # Ok(())
//! # }
//! ```

use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::Provider as AlloyProvider;
use alloy::rpc::types::Log;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

use crate::error::{ScanResult, ScannerError};
use crate::filter::EventFilter;
use crate::monitor::ReorgCheck;
use crate::rpc::Provider;

/// Default number of blocks covered by one `eth_getLogs` call.
pub const DEFAULT_CHUNK_SIZE: u64 = 100;

/// A raw log record normalized from the JSON-RPC wire shape.
///
/// Pending logs (no block number or hash yet) are rejected during
/// normalization; every `RawLog` is anchored to a mined block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract address
    pub address: Address,

    /// Hash of the block containing the log
    pub block_hash: B256,

    /// Number of the block containing the log
    pub block_number: u64,

    /// Transaction that emitted the log
    pub transaction_hash: B256,

    /// Position of the log inside the block
    pub log_index: u64,

    /// Log topics; `topics[0]` is the event signature hash
    pub topics: Vec<B256>,

    /// Raw event data payload
    pub data: Bytes,

    /// Whether the node flagged the log as removed by a reorg
    pub removed: bool,
}

impl TryFrom<Log> for RawLog {
    type Error = ScannerError;

    fn try_from(log: Log) -> ScanResult<Self> {
        let block_number = log
            .block_number
            .ok_or_else(|| ScannerError::decoding("Log is missing a block number", None))?;
        let block_hash = log
            .block_hash
            .ok_or_else(|| ScannerError::decoding("Log is missing a block hash", None))?;
        let transaction_hash = log
            .transaction_hash
            .ok_or_else(|| ScannerError::decoding("Log is missing a transaction hash", None))?;
        let log_index = log
            .log_index
            .ok_or_else(|| ScannerError::decoding("Log is missing a log index", None))?;

        Ok(Self {
            address: log.address(),
            block_hash,
            block_number,
            transaction_hash,
            log_index,
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            removed: log.removed,
        })
    }
}

/// One matched log with its descriptor name and resolved timestamp.
///
/// The unique identity of a log is `(block_hash, transaction_hash,
/// log_index)`; consumers polling overlapping ranges deduplicate on that
/// key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedLog {
    /// Name of the matched event descriptor
    pub event: String,

    /// Emitting contract address
    pub address: Address,

    /// Hash of the block containing the log
    pub block_hash: B256,

    /// Number of the block containing the log
    pub block_number: u64,

    /// Transaction that emitted the log
    pub transaction_hash: B256,

    /// Position of the log inside the block
    pub log_index: u64,

    /// Log topics, untouched
    pub topics: Vec<B256>,

    /// Raw event data payload, untouched
    pub data: Bytes,

    /// UNIX timestamp of the containing block
    pub timestamp: u64,
}

/// Fetches raw logs for one chunk of blocks.
///
/// Implemented by the HTTP provider in production and by scripted fakes in
/// tests.
#[allow(async_fn_in_trait)]
pub trait LogSource {
    /// Fetch logs matching `filter` in the inclusive range
    /// `[from_block, to_block]`.
    async fn fetch_logs(
        &self,
        from_block: u64,
        to_block: u64,
        filter: &EventFilter,
    ) -> ScanResult<Vec<RawLog>>;
}

impl LogSource for Provider {
    async fn fetch_logs(
        &self,
        from_block: u64,
        to_block: u64,
        filter: &EventFilter,
    ) -> ScanResult<Vec<RawLog>> {
        let rpc_filter = filter.to_rpc_filter(from_block, to_block);

        let logs = self
            .get_logs(&rpc_filter)
            .await
            .map_err(|e| ScannerError::LogFetchFailed {
                from_block,
                to_block,
                source: Box::new(e),
            })?;

        debug!(from_block, to_block, count = logs.len(), "Fetched logs");

        logs.into_iter().map(RawLog::try_from).collect()
    }
}

/// Resolves block timestamps by block hash when no monitor is attached.
pub trait TimestampResolver {
    /// The UNIX timestamp of the block with the given hash, if known.
    fn timestamp_for(&self, block_hash: &B256) -> Option<u64>;
}

impl TimestampResolver for HashMap<B256, u64> {
    fn timestamp_for(&self, block_hash: &B256) -> Option<u64> {
        self.get(block_hash).copied()
    }
}

/// Where a scan gets its per-log timestamps.
///
/// Exactly one source per stream, by construction.
pub enum TimestampSource<'a> {
    /// Cross-check every log against the monitor's header window; a hash
    /// mismatch aborts the scan with a reorg signal.
    Monitor(&'a mut dyn ReorgCheck),

    /// Look timestamps up in a standalone block-hash table. No reorg
    /// detection on this path.
    Resolver(&'a dyn TimestampResolver),
}

/// Observational snapshot handed to the progress callback after each chunk
/// that yielded at least one match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    /// First block of the chunk just completed
    pub current_block: u64,

    /// First block of the whole scan range
    pub start_block: u64,

    /// Last block of the whole scan range
    pub end_block: u64,

    /// Configured chunk size (the final chunk may be shorter)
    pub chunk_size: u64,

    /// Matched events so far across the whole scan
    pub total_events: u64,

    /// Timestamp of the last matched event, if any
    pub last_timestamp: Option<u64>,
}

/// Progress callback signature. Purely observational; no return value is
/// consumed.
pub type ProgressCallback = dyn Fn(&ScanProgress) + Send + Sync;

/// Configured entry point for reorg-aware log scans.
pub struct LogScanner {
    chunk_size: u64,
    progress: Option<Box<ProgressCallback>>,
}

impl std::fmt::Debug for LogScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogScanner")
            .field("chunk_size", &self.chunk_size)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl LogScanner {
    /// Create a scanner fetching `chunk_size` blocks per `eth_getLogs`
    /// call.
    ///
    /// # Errors
    ///
    /// [`ScannerError::ConfigError`] if `chunk_size` is zero.
    pub fn new(chunk_size: u64) -> ScanResult<Self> {
        if chunk_size == 0 {
            return Err(ScannerError::config("chunk size must be at least 1", None));
        }
        Ok(Self {
            chunk_size,
            progress: None,
        })
    }

    /// Attach a progress callback, invoked after each chunk that matched at
    /// least one log.
    #[must_use]
    pub fn with_progress(
        mut self,
        callback: impl Fn(&ScanProgress) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Open a lazy stream of matched logs over `[start_block, end_block]`.
    ///
    /// The stream is finite and not restartable; each call re-issues
    /// network requests. When `timestamps` is
    /// [`TimestampSource::Monitor`], any reorg detected mid-stream is
    /// yielded as an error and terminates the stream - logs already yielded
    /// for blocks at or after the mismatched one are suspect and must be
    /// discarded by the consumer after re-running the monitor's update.
    pub fn stream<'a, L: LogSource>(
        &'a self,
        source: &'a L,
        filter: &'a EventFilter,
        start_block: u64,
        end_block: u64,
        timestamps: TimestampSource<'a>,
    ) -> LogStream<'a, L> {
        LogStream {
            source,
            filter,
            chunk_size: self.chunk_size,
            progress: self.progress.as_deref(),
            timestamps,
            start_block,
            end_block,
            next_chunk_start: start_block,
            current_chunk: VecDeque::new(),
            current_chunk_start: start_block,
            chunk_events: 0,
            total_events: 0,
            last_timestamp: None,
            finished: false,
        }
    }
}

/// Pull-based lazy sequence of matched, timestamped logs.
///
/// Created by [`LogScanner::stream`]. Yields `Some(Ok(log))` per match,
/// `Some(Err(_))` exactly once on failure (including the reorg signal), and
/// `None` when the range is exhausted or after an error.
pub struct LogStream<'a, L: LogSource> {
    source: &'a L,
    filter: &'a EventFilter,
    chunk_size: u64,
    progress: Option<&'a ProgressCallback>,
    timestamps: TimestampSource<'a>,
    start_block: u64,
    end_block: u64,
    next_chunk_start: u64,
    current_chunk: VecDeque<RawLog>,
    current_chunk_start: u64,
    chunk_events: u64,
    total_events: u64,
    last_timestamp: Option<u64>,
    finished: bool,
}

impl<L: LogSource> LogStream<'_, L> {
    /// Pull the next matched log.
    ///
    /// Fetches chunks on demand; suspends only at chunk-fetch boundaries.
    pub async fn next(&mut self) -> Option<ScanResult<ScannedLog>> {
        if self.finished {
            return None;
        }

        loop {
            if let Some(raw) = self.current_chunk.pop_front() {
                match self.process(raw) {
                    Ok(log) => {
                        self.chunk_events += 1;
                        self.total_events += 1;
                        self.last_timestamp = Some(log.timestamp);
                        return Some(Ok(log));
                    }
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                }
            }

            // Chunk drained: report it before moving on.
            self.notify_chunk_done();

            if self.next_chunk_start > self.end_block {
                self.finished = true;
                return None;
            }

            let chunk_end = self
                .end_block
                .min(self.next_chunk_start + self.chunk_size - 1);

            debug!(
                from_block = self.next_chunk_start,
                to_block = chunk_end,
                "Scanning next chunk"
            );

            match self
                .source
                .fetch_logs(self.next_chunk_start, chunk_end, self.filter)
                .await
            {
                Ok(logs) => {
                    self.current_chunk = logs.into();
                    self.current_chunk_start = self.next_chunk_start;
                    self.next_chunk_start = chunk_end + 1;
                    self.chunk_events = 0;
                }
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Total matched events yielded so far.
    #[must_use]
    pub const fn total_events(&self) -> u64 {
        self.total_events
    }

    fn process(&mut self, raw: RawLog) -> ScanResult<ScannedLog> {
        let signature = raw.topics.first().copied().ok_or_else(|| {
            ScannerError::decoding(
                format!(
                    "Log in block {} has no topics; anonymous events are not supported",
                    raw.block_number
                ),
                None,
            )
        })?;

        let descriptor = self.filter.descriptor_for(&signature).ok_or_else(|| {
            ScannerError::decoding(
                format!(
                    "Node returned log with unrequested topic {signature} in block {}",
                    raw.block_number
                ),
                None,
            )
        })?;
        let event = descriptor.name.clone();

        let timestamp = match &mut self.timestamps {
            TimestampSource::Monitor(monitor) => monitor
                .check_block_header(raw.block_number, raw.block_hash)?
                .ok_or(ScannerError::TimestampNotFound {
                    block_number: raw.block_number,
                    block_hash: raw.block_hash,
                })?,
            TimestampSource::Resolver(resolver) => resolver
                .timestamp_for(&raw.block_hash)
                .ok_or(ScannerError::TimestampNotFound {
                    block_number: raw.block_number,
                    block_hash: raw.block_hash,
                })?,
        };

        Ok(ScannedLog {
            event,
            address: raw.address,
            block_hash: raw.block_hash,
            block_number: raw.block_number,
            transaction_hash: raw.transaction_hash,
            log_index: raw.log_index,
            topics: raw.topics,
            data: raw.data,
            timestamp,
        })
    }

    fn notify_chunk_done(&self) {
        if self.chunk_events == 0 {
            return;
        }
        if let Some(progress) = self.progress {
            progress(&ScanProgress {
                current_block: self.current_chunk_start,
                start_block: self.start_block,
                end_block: self.end_block,
                chunk_size: self.chunk_size,
                total_events: self.total_events,
                last_timestamp: self.last_timestamp,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::EventDescriptor;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    fn sync_descriptor() -> EventDescriptor {
        EventDescriptor::from_signature("Sync", "Sync(uint112,uint112)")
    }

    fn sync_filter() -> EventFilter {
        EventFilter::build(vec![sync_descriptor()], None).unwrap()
    }

    fn raw_log(block_number: u64, log_index: u64) -> RawLog {
        RawLog {
            address: Address::with_last_byte(0x11),
            block_hash: B256::with_last_byte(block_number as u8),
            block_number,
            transaction_hash: B256::with_last_byte(0xfe),
            log_index,
            topics: vec![sync_descriptor().topics[0]],
            data: Bytes::new(),
            removed: false,
        }
    }

    /// Scripted log source: a fixed set of logs served per matching chunk,
    /// plus a call counter.
    struct FakeLogSource {
        logs: Vec<RawLog>,
        calls: AtomicU64,
        fail: bool,
    }

    impl FakeLogSource {
        fn new(logs: Vec<RawLog>) -> Self {
            Self {
                logs,
                calls: AtomicU64::new(0),
                fail: false,
            }
        }
    }

    impl LogSource for FakeLogSource {
        async fn fetch_logs(
            &self,
            from_block: u64,
            to_block: u64,
            _filter: &EventFilter,
        ) -> ScanResult<Vec<RawLog>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ScannerError::LogFetchFailed {
                    from_block,
                    to_block,
                    source: Box::new(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "rpc timeout",
                    )),
                });
            }
            Ok(self
                .logs
                .iter()
                .filter(|log| log.block_number >= from_block && log.block_number <= to_block)
                .cloned()
                .collect())
        }
    }

    fn resolver_for(logs: &[RawLog]) -> HashMap<B256, u64> {
        logs.iter()
            .map(|log| (log.block_hash, 1_700_000_000 + log.block_number))
            .collect()
    }

    #[tokio::test]
    async fn test_stream_yields_matched_logs_with_timestamps() {
        let logs = vec![raw_log(10, 0), raw_log(11, 0), raw_log(12, 1)];
        let resolver = resolver_for(&logs);
        let source = FakeLogSource::new(logs);
        let filter = sync_filter();
        let scanner = LogScanner::new(100).unwrap();

        let mut stream = scanner.stream(&source, &filter, 10, 20, TimestampSource::Resolver(&resolver));

        let mut collected = Vec::new();
        while let Some(result) = stream.next().await {
            collected.push(result.unwrap());
        }

        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0].event, "Sync");
        assert_eq!(collected[0].timestamp, 1_700_000_010);
        assert_eq!(collected[2].block_number, 12);
    }

    #[tokio::test]
    async fn test_stream_chunks_requests() {
        let logs = vec![raw_log(1, 0), raw_log(25, 0), raw_log(50, 0)];
        let resolver = resolver_for(&logs);
        let source = FakeLogSource::new(logs);
        let filter = sync_filter();
        let scanner = LogScanner::new(10).unwrap();

        let mut stream =
            scanner.stream(&source, &filter, 1, 50, TimestampSource::Resolver(&resolver));
        let mut count = 0;
        while let Some(result) = stream.next().await {
            result.unwrap();
            count += 1;
        }

        assert_eq!(count, 3);
        // Blocks 1..=50 at chunk size 10 is exactly 5 eth_getLogs calls.
        assert_eq!(source.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_resolver_miss_is_hard_failure() {
        let logs = vec![raw_log(10, 0)];
        let empty_resolver: HashMap<B256, u64> = HashMap::new();
        let source = FakeLogSource::new(logs);
        let filter = sync_filter();
        let scanner = LogScanner::new(100).unwrap();

        let mut stream = scanner.stream(
            &source,
            &filter,
            10,
            10,
            TimestampSource::Resolver(&empty_resolver),
        );

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ScannerError::TimestampNotFound {
                block_number: 10,
                ..
            }
        ));
        // The stream terminates after the error.
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_failure_carries_range() {
        let mut source = FakeLogSource::new(Vec::new());
        source.fail = true;
        let filter = sync_filter();
        let resolver: HashMap<B256, u64> = HashMap::new();
        let scanner = LogScanner::new(100).unwrap();

        let mut stream =
            scanner.stream(&source, &filter, 5, 60, TimestampSource::Resolver(&resolver));

        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            ScannerError::LogFetchFailed {
                from_block: 5,
                to_block: 60,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_progress_fires_only_for_chunks_with_matches() {
        let logs = vec![raw_log(1, 0), raw_log(2, 0), raw_log(45, 0)];
        let resolver = resolver_for(&logs);
        let source = FakeLogSource::new(logs);
        let filter = sync_filter();

        let seen: Arc<Mutex<Vec<ScanProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let scanner = LogScanner::new(10)
            .unwrap()
            .with_progress(move |progress| seen_clone.lock().unwrap().push(*progress));

        let mut stream =
            scanner.stream(&source, &filter, 1, 50, TimestampSource::Resolver(&resolver));
        while let Some(result) = stream.next().await {
            result.unwrap();
        }

        let seen = seen.lock().unwrap();
        // Chunks [1,10] and [41,50] matched; the three empty chunks between
        // them stay silent.
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].current_block, 1);
        assert_eq!(seen[0].total_events, 2);
        assert_eq!(seen[1].current_block, 41);
        assert_eq!(seen[1].total_events, 3);
        assert_eq!(seen[1].last_timestamp, Some(1_700_000_045));
    }

    #[tokio::test]
    async fn test_zero_chunk_size_rejected() {
        assert!(matches!(
            LogScanner::new(0),
            Err(ScannerError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_raw_log_identity_fields() {
        let log = raw_log(42, 7);
        assert_eq!(log.block_number, 42);
        assert_eq!(log.log_index, 7);
        assert!(!log.removed);
    }
}
