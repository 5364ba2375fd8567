//! # Ethereum Reorg-Aware Event Scanner
//!
//! Chain-reorganization monitor and event log scanner built on
//! [Alloy](https://github.com/alloy-rs/alloy).
//!
//! Most EVM chains rewrite their last few blocks several times a day as
//! nodes hop between chain tips. This library tracks a trusted window of
//! recent block headers, detects those rewrites, and scans event logs so
//! that invalidated data is purged and re-read instead of silently kept.
//!
//! ## Features
//!
//! - **Reorg detection** over a rolling header window (number, hash, timestamp)
//! - **Bounded resolution retries** against perpetually unstable nodes
//! - **Chunked log scanning** with lazy, pull-based delivery
//! - **In-memory timestamp lookups** with a block-hash-table fallback
//! - **Header snapshot persistence** across process restarts
//! - **Type-safe event decoding** using Alloy's `sol!` macro
//! - **Production error handling** with unified `ScannerError`
//!
//! ## Architecture
//!
//! The crate is organized into independent layers:
//!
//! 1. **Config Layer** ([`config`]) - Environment variable loading
//! 2. **RPC Layer** ([`rpc`]) - Ethereum provider management
//! 3. **Monitor Layer** ([`monitor`]) - Header window + reorg resolution
//! 4. **Filter Layer** ([`filter`]) - Topic/address event matching
//! 5. **Scanner Layer** ([`scanner`]) - Chunked, timestamped log streams
//! 6. **Snapshot Layer** ([`snapshot`]) - Header window persistence
//!
//! ## Quick Start
//!
//! ### Using the CLI
//!
//! ```bash
//! # One-time historical scan
//! cargo run --release -- scan --from-block 19000000 --to-block 19000500
//!
//! # Follow the chain tip with reorg monitoring
//! cargo run --release -- watch
//! ```
//!
//! ### Using as a Library
//!
//! ```rust,no_run
//! use eth_reorg_scanner::config::Config;
//! use eth_reorg_scanner::events::pair_event_descriptors;
//! use eth_reorg_scanner::filter::EventFilter;
//! use eth_reorg_scanner::monitor::{
//!     InitialLoad, ReorganizationMonitor, RpcHeaderSource,
//! };
//! use eth_reorg_scanner::rpc::create_provider;
//! use eth_reorg_scanner::scanner::{LogScanner, TimestampSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let provider = create_provider(config.rpc_url()).await?;
//!
//!     let source = RpcHeaderSource::new(provider.clone());
//!     let mut monitor = ReorganizationMonitor::new(source, config.monitor_config());
//!     monitor.load_initial_headers(InitialLoad::BlockCount(20)).await?;
//!
//!     let filter = EventFilter::build(pair_event_descriptors(), None)?;
//!     let scanner = LogScanner::new(config.chunk_size())?;
//!
//!     let resolution = monitor.update().await?;
//!     let (start, end) = resolution.read_range();
//!     let mut stream = scanner.stream(
//!         &provider,
//!         &filter,
//!         start,
//!         end,
//!         TimestampSource::Monitor(&mut monitor),
//!     );
//!     while let Some(log) = stream.next().await {
//!         println!("{:?}", log?);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Setup
//!
//! Create a `.env` file with your RPC endpoint:
//!
//! ```text
//! RPC_URL=https://eth-mainnet.g.alchemy.com/v2/your_key_here
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`error::ScanResult<T>`](error::ScanResult) for
//! consistent error propagation:
//!
//! ```rust
//! use eth_reorg_scanner::error::{ScanResult, ScannerError};
//!
//! fn example() -> ScanResult<()> {
//!     // Operations that can fail return ScanResult
//!     Ok(())
//! }
//! ```
//!
//! ## Testing
//!
//! Run the test suite:
//!
//! ```bash
//! # All tests
//! cargo test
//!
//! # Unit tests only
//! cargo test --lib
//!
//! # Integration tests
//! cargo test --test '*'
//! ```
//!
//! ## License
//!
//! Licensed under either of:
//!
//! - MIT license ([LICENSE-MIT](LICENSE-MIT) or <http://opensource.org/licenses/MIT>)
//! - Apache License, Version 2.0 ([LICENSE-APACHE](LICENSE-APACHE) or <http://www.apache.org/licenses/LICENSE-2.0>)
//!
//! at your option.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod filter;
pub mod monitor;
pub mod observability;
pub mod rpc;
pub mod scanner;
pub mod snapshot;
