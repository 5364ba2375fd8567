//! Block header sources and retry back-off strategies.
//!
//! The monitor is parameterized by a [`HeaderSource`] capability object
//! instead of subclassing: the core algorithm stays fixed while the way
//! headers are obtained (JSON-RPC in production, a scripted fake in tests)
//! is injected at construction time.

use alloy::primitives::B256;
use alloy::providers::Provider as AlloyProvider;
use alloy::rpc::types::BlockTransactionsKind;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::error::{ScanResult, ScannerError};
use crate::monitor::buffer::BlockHeader;
use crate::rpc::Provider;

/// Supplies the current chain tip and header data for block ranges.
///
/// `fetch_headers` may yield fewer items than requested when the remote tip
/// is unstable; early termination is not an error, it is a signal the tip
/// moved during the fetch. A range with `start_block > end_block` yields an
/// empty sequence.
#[allow(async_fn_in_trait)]
pub trait HeaderSource {
    /// Highest block number the node currently reports as canonical.
    async fn current_tip(&self) -> ScanResult<u64>;

    /// Fetch header data for the inclusive range `[start_block, end_block]`.
    async fn fetch_headers(&self, start_block: u64, end_block: u64)
        -> ScanResult<Vec<BlockHeader>>;
}

/// Header source backed by `eth_getBlockByNumber` over JSON-RPC.
///
/// Uses the expensive per-block header call to download hash and timestamp
/// data from an Ethereum-compatible node.
#[derive(Debug, Clone)]
pub struct RpcHeaderSource {
    provider: Provider,
}

impl RpcHeaderSource {
    /// Wrap an existing HTTP provider.
    #[must_use]
    pub const fn new(provider: Provider) -> Self {
        Self { provider }
    }

    /// Access the underlying provider (for log fetching over the same
    /// connection).
    #[must_use]
    pub const fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Build a block-hash -> UNIX-timestamp table for a block range.
    ///
    /// Fallback timestamp resolution for scans that run without a monitor.
    /// Slow: one `eth_getBlockByNumber` call per block.
    ///
    /// # Errors
    ///
    /// Returns an RPC error if any header fetch fails.
    #[instrument(skip(self))]
    pub async fn timestamps_by_hash(
        &self,
        start_block: u64,
        end_block: u64,
    ) -> ScanResult<HashMap<B256, u64>> {
        let headers = self.fetch_headers(start_block, end_block).await?;
        Ok(headers
            .into_iter()
            .map(|header| (header.hash, header.timestamp))
            .collect())
    }
}

impl HeaderSource for RpcHeaderSource {
    async fn current_tip(&self) -> ScanResult<u64> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| ScannerError::rpc("Failed to fetch chain tip", Some(Box::new(e))))
    }

    async fn fetch_headers(
        &self,
        start_block: u64,
        end_block: u64,
    ) -> ScanResult<Vec<BlockHeader>> {
        if start_block > end_block {
            return Ok(Vec::new());
        }

        debug!(
            start_block,
            end_block,
            total = end_block - start_block + 1,
            "Fetching block headers"
        );

        let mut headers = Vec::with_capacity((end_block - start_block + 1) as usize);

        for block_number in start_block..=end_block {
            let block = self
                .provider
                .get_block_by_number(block_number.into(), BlockTransactionsKind::Hashes)
                .await
                .map_err(|e| {
                    ScannerError::rpc(
                        format!("Failed to fetch block {block_number}"),
                        Some(Box::new(e)),
                    )
                })?;

            // The node can answer with no block near the tip, e.g. when the
            // request was routed to a backend lagging on another fork. Stop
            // early and let the caller work with what we have.
            let Some(block) = block else {
                debug!(block_number, "Header fetch terminated early, chain tip unstable?");
                break;
            };

            headers.push(BlockHeader::new(
                block.header.number,
                block.header.hash,
                block.header.timestamp,
            ));
        }

        Ok(headers)
    }
}

/// Delay policy for the monitor's reorg retry loop.
///
/// The original fixed sleep is one strategy among several; callers under
/// heavy reorg churn can plug in jitter instead.
pub trait BackoffStrategy: Send + Sync {
    /// How long to wait before retry number `attempt` (1-based).
    fn delay(&self, attempt: u32) -> Duration;
}

/// Fixed delay between retries. The default, matching the classic
/// 5-second node-settling wait.
#[derive(Debug, Clone, Copy)]
pub struct FixedBackoff {
    wait: Duration,
}

impl FixedBackoff {
    /// Create a fixed back-off with the given delay.
    #[must_use]
    pub const fn new(wait: Duration) -> Self {
        Self { wait }
    }
}

impl BackoffStrategy for FixedBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        self.wait
    }
}

/// Fixed base delay plus uniform random jitter of up to the base again.
///
/// Spreads retries out when many monitors poll the same node.
#[derive(Debug, Clone, Copy)]
pub struct JitteredBackoff {
    base: Duration,
}

impl JitteredBackoff {
    /// Create a jittered back-off around the given base delay.
    #[must_use]
    pub const fn new(base: Duration) -> Self {
        Self { base }
    }
}

impl BackoffStrategy for JitteredBackoff {
    fn delay(&self, _attempt: u32) -> Duration {
        let base_ms = self.base.as_millis() as u64;
        let jitter_ms = if base_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=base_ms)
        };
        Duration::from_millis(base_ms + jitter_ms)
    }
}
