//! Error types for the reorg-aware log scanner.
//!
//! This module provides a unified error type [`ScannerError`] covering every
//! failure mode of the monitor/scanner pipeline, from configuration problems
//! to the reorg signal itself.
//!
//! # Design
//!
//! The taxonomy follows how each error must be handled:
//! - [`ScannerError::ConfigError`]: bad parameters, fail fast, never retried
//! - [`ScannerError::RpcError`] / [`ScannerError::LogFetchFailed`]: transient
//!   transport failures, surfaced to the caller (retry policy lives with the
//!   transport, not here)
//! - [`ScannerError::OutOfOrderBlock`] / [`ScannerError::DuplicateBlock`]:
//!   consistency violations, programming errors, fatal
//! - [`ScannerError::ReorgDetected`]: expected, recoverable control-flow
//!   condition handled by the monitor's update loop
//! - [`ScannerError::ReorgResolutionFailure`]: the update loop gave up, fatal
//! - [`ScannerError::BlockNotAvailable`] /
//!   [`ScannerError::TimestampNotFound`]: data asked for outside the tracked
//!   window, always surfaced, never silently defaulted
//!
//! # Example
//!
//! ```
//! use eth_reorg_scanner::error::{ScannerError, ScanResult};
//!
//! fn validate_chunk_size(chunk_size: u64) -> ScanResult<()> {
//!     if chunk_size == 0 {
//!         return Err(ScannerError::config("chunk size must be at least 1", None));
//!     }
//!     Ok(())
//! }
//! ```

use alloy::primitives::B256;
use std::fmt;

/// Result type alias using [`ScannerError`].
pub type ScanResult<T> = Result<T, ScannerError>;

/// Unified error type for the reorg monitor and log scanner.
#[derive(Debug)]
pub enum ScannerError {
    /// Configuration or parameter errors.
    ///
    /// Bad parameter combinations or invalid environment values.
    /// Never retried.
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// RPC provider or network errors.
    ///
    /// Failed connections, timeouts, unreadable chain tip. The scanner does
    /// not retry raw transport errors itself.
    RpcError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Log decoding or normalization errors.
    ///
    /// Raw log records missing required fields (block number, block hash) or
    /// carrying a topic the filter never asked for.
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Snapshot persistence errors.
    ///
    /// Failures saving or loading the header buffer snapshot file.
    SnapshotError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A block was appended out of order.
    ///
    /// Headers must be added in strictly increasing order with no gaps.
    /// This is an integration error, fatal and not retried.
    OutOfOrderBlock {
        /// The block number the buffer expected next
        expected: u64,
        /// The block number that was actually supplied
        got: u64,
    },

    /// A block number was appended twice.
    DuplicateBlock {
        /// The already-present block number
        block_number: u64,
    },

    /// A chain reorganization was detected.
    ///
    /// The node reported a different hash for a block we have already
    /// recorded. Expected control-flow condition: the monitor's update loop
    /// truncates and retries, bounded by `max_cycle_tries`.
    ReorgDetected {
        /// The first block number whose hash no longer matches
        block_number: u64,
        /// The hash we recorded when the block was first seen
        original_hash: B256,
        /// The hash the node reports now
        new_hash: B256,
    },

    /// The update loop exhausted its retries without a clean detection pass.
    ///
    /// The node's chain tip was unstable across every attempt. Fatal,
    /// surfaced to the caller, not retried further by the monitor.
    ReorgResolutionFailure {
        /// Last block held by the buffer when we gave up
        last_block: u64,
        /// How many detection passes were attempted
        attempts: u32,
        /// Deepest rollback point seen across all retries
        max_purge: u64,
    },

    /// The detection window is larger than the configured maximum.
    ///
    /// Guards against unbounded re-scan cost when the buffer has fallen far
    /// behind the chain tip.
    RangeTooLarge {
        /// First block of the attempted window
        start_block: u64,
        /// Last block of the attempted window
        end_block: u64,
        /// The configured maximum window length
        max_range: u64,
    },

    /// A block timestamp was requested outside the tracked window.
    BlockNotAvailable {
        /// The block number that was asked for
        block_number: u64,
        /// The highest block the buffer currently holds (0 if empty)
        last_recorded: u64,
    },

    /// No timestamp could be resolved for a matched log.
    ///
    /// Silently supplying a wrong or missing timestamp would corrupt
    /// downstream ordering, so this is always a hard failure.
    TimestampNotFound {
        /// Block number of the log missing a timestamp
        block_number: u64,
        /// Block hash of the log missing a timestamp
        block_hash: B256,
    },

    /// An `eth_getLogs` call failed.
    ///
    /// Carries the attempted block range for diagnosability.
    LogFetchFailed {
        /// First block of the attempted range (inclusive)
        from_block: u64,
        /// Last block of the attempted range (inclusive)
        to_block: u64,
        /// The underlying transport error
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ScannerError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use eth_reorg_scanner::error::ScannerError;
    ///
    /// let err = ScannerError::config("CHECK_DEPTH must be a number", None);
    /// assert!(matches!(err, ScannerError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new RPC error.
    ///
    /// # Example
    ///
    /// ```
    /// use eth_reorg_scanner::error::ScannerError;
    ///
    /// let err = ScannerError::rpc("failed to fetch chain tip", None);
    /// assert!(matches!(err, ScannerError::RpcError { .. }));
    /// ```
    #[must_use]
    pub fn rpc(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::RpcError {
            message: message.into(),
            source,
        }
    }

    /// Create a new decoding error.
    #[must_use]
    pub fn decoding(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a new snapshot persistence error.
    #[must_use]
    pub fn snapshot(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SnapshotError {
            message: message.into(),
            source,
        }
    }
}

impl fmt::Display for ScannerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::RpcError { message, .. } => write!(f, "RPC error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::SnapshotError { message, .. } => write!(f, "Snapshot error: {message}"),
            Self::OutOfOrderBlock { expected, got } => {
                write!(
                    f,
                    "Blocks must be added in order: expected block {expected}, got {got}"
                )
            }
            Self::DuplicateBlock { block_number } => {
                write!(f, "Block {block_number} already added to the header buffer")
            }
            Self::ReorgDetected {
                block_number,
                original_hash,
                new_hash,
            } => {
                write!(
                    f,
                    "Chain reorganization detected at block {block_number}: recorded hash {original_hash}, node now reports {new_hash}"
                )
            }
            Self::ReorgResolutionFailure {
                last_block,
                attempts,
                max_purge,
            } => {
                write!(
                    f,
                    "Gave up on chain reorg resolution after {attempts} attempts; last block {last_block}, deepest rollback point {max_purge}"
                )
            }
            Self::RangeTooLarge {
                start_block,
                end_block,
                max_range,
            } => {
                write!(
                    f,
                    "Refusing to scan block range {start_block} - {end_block}: longer than the configured maximum of {max_range} blocks"
                )
            }
            Self::BlockNotAvailable {
                block_number,
                last_recorded,
            } => {
                write!(
                    f,
                    "Block {block_number} is not in the header buffer (last recorded block: {last_recorded})"
                )
            }
            Self::TimestampNotFound {
                block_number,
                block_hash,
            } => {
                write!(
                    f,
                    "No timestamp for block {block_number} (hash {block_hash})"
                )
            }
            Self::LogFetchFailed {
                from_block,
                to_block,
                source,
            } => {
                write!(
                    f,
                    "eth_getLogs failed for blocks {from_block} - {to_block}: {source}"
                )
            }
        }
    }
}

impl std::error::Error for ScannerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::RpcError { source, .. }
            | Self::DecodingError { source, .. }
            | Self::SnapshotError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::LogFetchFailed { source, .. } => {
                Some(source.as_ref() as &dyn std::error::Error)
            }
            Self::OutOfOrderBlock { .. }
            | Self::DuplicateBlock { .. }
            | Self::ReorgDetected { .. }
            | Self::ReorgResolutionFailure { .. }
            | Self::RangeTooLarge { .. }
            | Self::BlockNotAvailable { .. }
            | Self::TimestampNotFound { .. } => None,
        }
    }
}

/// Convert from `eyre::Report` to `ScannerError`.
///
/// Used for wrapping eyre errors that don't fit a specific category.
/// Categorized as an RPC error by default.
impl From<eyre::Report> for ScannerError {
    fn from(err: eyre::Report) -> Self {
        Self::RpcError {
            message: err.to_string(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;
    use std::error::Error;

    #[test]
    fn test_config_error() {
        let err = ScannerError::config("test error", None);
        assert!(matches!(err, ScannerError::ConfigError { .. }));
        assert_eq!(err.to_string(), "Configuration error: test error");
    }

    #[test]
    fn test_rpc_error() {
        let err = ScannerError::rpc("connection failed", None);
        assert!(matches!(err, ScannerError::RpcError { .. }));
        assert_eq!(err.to_string(), "RPC error: connection failed");
    }

    #[test]
    fn test_out_of_order_block_display() {
        let err = ScannerError::OutOfOrderBlock {
            expected: 101,
            got: 105,
        };
        assert_eq!(
            err.to_string(),
            "Blocks must be added in order: expected block 101, got 105"
        );
    }

    #[test]
    fn test_reorg_detected_carries_hashes() {
        let original =
            b256!("0x1111111111111111111111111111111111111111111111111111111111111111");
        let new = b256!("0x2222222222222222222222222222222222222222222222222222222222222222");
        let err = ScannerError::ReorgDetected {
            block_number: 50,
            original_hash: original,
            new_hash: new,
        };

        if let ScannerError::ReorgDetected {
            block_number,
            original_hash,
            new_hash,
        } = err
        {
            assert_eq!(block_number, 50);
            assert_eq!(original_hash, original);
            assert_eq!(new_hash, new);
        }
    }

    #[test]
    fn test_log_fetch_failed_includes_range() {
        let source = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = ScannerError::LogFetchFailed {
            from_block: 100,
            to_block: 199,
            source: Box::new(source),
        };

        assert!(err.to_string().contains("100 - 199"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_error_with_source() {
        let source = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = ScannerError::snapshot("failed to load", Some(Box::new(source)));

        assert!(err.source().is_some());
        assert_eq!(err.to_string(), "Snapshot error: failed to load");
    }

    #[test]
    fn test_error_trait() {
        let err = ScannerError::rpc("test", None);
        let _: &dyn std::error::Error = &err;
    }
}
