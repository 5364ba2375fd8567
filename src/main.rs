//! CLI entry point for the reorg-aware event scanner.
//!
//! # Architecture Flow
//!
//! This binary delegates to the CLI module, which orchestrates all layers:
//!
//! ```text
//! main.rs (Runtime Initialization)
//!     ↓
//! CLI Layer (src/cli.rs)
//!     ↓
//! 1. Config Layer (src/config.rs)     → Load environment variables
//! 2. RPC Layer (src/rpc.rs)           → Create Ethereum provider
//! 3. Monitor Layer (src/monitor/)     → Track headers, resolve reorgs
//! 4. Filter Layer (src/filter.rs)     → Topic/address event matching
//! 5. Scanner Layer (src/scanner.rs)   → Chunked, timestamped log stream
//! 6. CLI Layer (output)               → Display formatted results
//! ```
//!
//! # Layer Separation
//!
//! - **main.rs**: Async runtime + tracing initialization only
//! - **CLI module**: User interface + layer orchestration
//! - **Core modules**: Independent, reusable, no upward dependencies
//!
//! All errors bubble up with context via `ScanResult<T>`.

use eth_reorg_scanner::{cli, observability};
use tracing::error;

/// Entry point for the reorg-aware event scanner.
///
/// Initializes:
/// - Tokio async runtime (via `#[tokio::main]`)
/// - Structured logging with tracing
/// - Environment-based filtering (RUST_LOG, LOG_JSON, LOG_FILE)
///
/// Then delegates to the CLI module for all business logic.
#[tokio::main]
async fn main() {
    // Initialize structured logging FIRST (before any other operations)
    // Configuration can be controlled via environment variables:
    // - RUST_LOG: Set log level (e.g., "debug", "info", "trace")
    // - LOG_JSON: Enable JSON output for production ("true" or "false")
    // - LOG_FILE: Write logs to file with daily rotation
    //
    // Examples:
    //   RUST_LOG=debug cargo run -- watch
    //   RUST_LOG=eth_reorg_scanner=trace,alloy=warn cargo run
    //   LOG_JSON=true LOG_FILE=./logs/scanner.log cargo run
    let log_level = std::env::var("RUST_LOG").ok();
    let log_file = std::env::var("LOG_FILE").ok().map(std::path::PathBuf::from);
    let json_output = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    // The guard keeps the non-blocking file writer alive until exit.
    let _guard = match observability::init_tracing(log_level, log_file, json_output) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize tracing: {e}");
            std::process::exit(1);
        }
    };

    // Run CLI - all layer orchestration happens inside cli::run()
    if let Err(e) = cli::run().await {
        error!(error = %e, "Application error");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
