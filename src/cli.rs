//! Command-line interface for the reorg-aware event scanner.
//!
//! # Commands
//!
//! - `scan`: Scan a historical block range for events (one-time)
//! - `watch`: Follow the chain tip with live reorg monitoring
//!
//! # Example
//!
//! ```bash
//! # Scan the last 100 blocks for Uniswap V2 pair events
//! eth-reorg-scanner scan
//!
//! # Follow the tip, purging and re-reading across reorgs
//! eth-reorg-scanner watch
//! ```

use crate::config::Config;
use crate::error::{ScanResult, ScannerError};
use crate::events::{pair_event_descriptors, UNISWAP_V2_WETH_USDT_PAIR};
use crate::filter::EventFilter;
use crate::monitor::{
    InitialLoad, ReorganizationMonitor, RpcHeaderSource,
};
use crate::rpc::{create_provider, get_latest_block};
use crate::scanner::{LogScanner, ScannedLog, TimestampSource};
use crate::snapshot::HeaderSnapshot;
use alloy::primitives::{Address, B256};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

/// Reorg-aware Ethereum event scanner
#[derive(Parser, Debug)]
#[command(name = "eth-reorg-scanner")]
#[command(about = "Chain-reorganization-aware Ethereum event scanner", long_about = None)]
#[command(version)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a historical block range for events (one-time)
    Scan {
        /// Starting block number (default: latest - 100)
        #[arg(short, long)]
        from_block: Option<u64>,

        /// Ending block number (default: latest)
        #[arg(short, long)]
        to_block: Option<u64>,

        /// Contract address to filter on (default: Uniswap V2 WETH/USDT pair)
        #[arg(short, long)]
        address: Option<Address>,
    },

    /// Follow the chain tip with live reorg monitoring
    Watch {
        /// Starting block number (default: latest - check depth)
        #[arg(short, long)]
        start_block: Option<u64>,

        /// Contract address to filter on (default: Uniswap V2 WETH/USDT pair)
        #[arg(short, long)]
        address: Option<Address>,
    },
}

/// Parse CLI arguments and execute the appropriate command.
///
/// # Errors
///
/// Returns an error if:
/// - Configuration loading fails
/// - RPC connection fails
/// - Command execution fails
pub async fn run() -> ScanResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            from_block,
            to_block,
            address,
        } => run_scan_command(from_block, to_block, address).await,
        Commands::Watch {
            start_block,
            address,
        } => run_watch_command(start_block, address).await,
    }
}

fn build_filter(address: Option<Address>) -> ScanResult<EventFilter> {
    let target = address.unwrap_or(UNISWAP_V2_WETH_USDT_PAIR);
    EventFilter::build(pair_event_descriptors(), Some(vec![target]))
}

/// Execute the scan command (one-time historical range).
async fn run_scan_command(
    from_block: Option<u64>,
    to_block: Option<u64>,
    address: Option<Address>,
) -> ScanResult<()> {
    info!("Scanning historical block range");

    let config = Config::from_env()?;
    let provider = create_provider(config.rpc_url()).await?;

    let latest_block = get_latest_block(&provider).await?;
    let to_block = to_block.unwrap_or(latest_block).min(latest_block);
    let from_block = from_block.unwrap_or_else(|| to_block.saturating_sub(100));

    if from_block > to_block {
        return Err(ScannerError::config(
            format!("Scan range is empty: {from_block} > {to_block}"),
            None,
        ));
    }

    info!(from_block, to_block, "Scanning blocks");
    println!(
        "{} Scanning blocks {} to {}",
        "🔍".cyan(),
        from_block.to_string().yellow(),
        to_block.to_string().yellow()
    );

    let filter = build_filter(address)?;

    // One-shot scans run without a monitor; timestamps come from a
    // block-hash table built over the same range.
    let source = RpcHeaderSource::new(provider.clone());
    let timestamps = source.timestamps_by_hash(from_block, to_block).await?;

    let scanner = LogScanner::new(config.chunk_size())?.with_progress(|progress| {
        debug!(
            current_block = progress.current_block,
            total_events = progress.total_events,
            "Scan progress"
        );
    });

    let mut stream = scanner.stream(
        &provider,
        &filter,
        from_block,
        to_block,
        TimestampSource::Resolver(&timestamps),
    );

    let mut total = 0_u64;
    while let Some(result) = stream.next().await {
        let log = result?;
        print_scanned_log(&log);
        total += 1;
    }

    if total == 0 {
        println!(
            "{}",
            "No matching events found. Try widening the block range."
                .yellow()
                .bold()
        );
    } else {
        println!(
            "{} {} events in blocks {} to {}",
            "✅".green(),
            total.to_string().green().bold(),
            from_block,
            to_block
        );
    }

    Ok(())
}

/// Execute the watch command (continuous tip-following).
async fn run_watch_command(start_block: Option<u64>, address: Option<Address>) -> ScanResult<()> {
    info!("Starting watch mode");
    println!(
        "{}",
        "🔍 Following the chain tip with reorg monitoring..."
            .cyan()
            .bold()
    );
    println!();

    let config = Config::from_env()?;
    let provider = create_provider(config.rpc_url()).await?;
    let filter = build_filter(address)?;

    let source = RpcHeaderSource::new(provider.clone());
    let mut monitor = ReorganizationMonitor::new(source, config.monitor_config());

    // Resume from a saved header window when one exists.
    match HeaderSnapshot::load(config.snapshot_file()) {
        Ok(snapshot) => {
            monitor.restore(&snapshot)?;
            info!(
                last_block = monitor.last_block_read(),
                "Resuming from saved header snapshot"
            );
        }
        Err(e) => {
            debug!(error = %e, "No usable header snapshot, starting fresh");
        }
    }

    let initial_load = start_block.map_or(
        InitialLoad::BlockCount(config.check_depth()),
        InitialLoad::StartBlock,
    );
    let (load_start, load_end) = monitor.load_initial_headers(initial_load).await?;
    info!(load_start, load_end, "Initial header window loaded");

    let scanner = LogScanner::new(config.chunk_size())?;

    // Overlapping read ranges re-deliver events; this key set filters the
    // repeats and is purged back to the good block after each reorg.
    let mut seen: HashMap<(B256, B256, u64), u64> = HashMap::new();

    // Setup graceful shutdown handler
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Handle shutdown signal
            _ = &mut shutdown => {
                info!("Shutdown signal received, cleaning up...");
                println!();
                println!("{}", "🛑 Shutting down gracefully...".yellow().bold());

                if let Err(e) = monitor.to_snapshot().save(config.snapshot_file()) {
                    error!(error = %e, "Failed to save header snapshot on shutdown");
                    println!("{} Failed to save snapshot: {}", "⚠️".red(), e);
                } else {
                    println!(
                        "{} Header snapshot saved to {}",
                        "✅".green(),
                        config.snapshot_file().display()
                    );
                    println!(
                        "{} Last processed block: {}",
                        "📍".cyan(),
                        monitor.last_block_read()
                    );
                }

                println!("{}", "👋 Shutdown complete".green().bold());
                info!("Shutdown complete");
                break;
            }

            // Run one poll cycle
            () = tokio::time::sleep(std::time::Duration::ZERO) => {
                run_watch_cycle(&provider, &scanner, &filter, &mut monitor, &mut seen).await;
                tokio::time::sleep(config.poll_interval()).await;
            }
        }
    }

    Ok(())
}

/// One update-then-scan cycle of the watch loop.
///
/// Cycle errors are reported and swallowed so a transient RPC failure does
/// not kill the loop; the next poll re-runs the cycle from the monitor's
/// current state.
async fn run_watch_cycle(
    provider: &crate::rpc::Provider,
    scanner: &LogScanner,
    filter: &EventFilter,
    monitor: &mut ReorganizationMonitor<RpcHeaderSource>,
    seen: &mut HashMap<(B256, B256, u64), u64>,
) {
    let resolution = match monitor.update().await {
        Ok(resolution) => resolution,
        Err(e) => {
            error!(error = %e, "Monitor update failed");
            println!("{} {}", "⚠️  Error:".red().bold(), e);
            return;
        }
    };

    if resolution.reorg_detected {
        let good = resolution.latest_block_with_good_data;
        warn!(
            latest_block_with_good_data = good,
            "Reorg resolved, purging events above the good block"
        );
        println!(
            "{} Reorg detected; events above block {} purged and re-read",
            "🔀".yellow(),
            good.to_string().yellow().bold()
        );
        seen.retain(|_, block_number| *block_number <= good);
    }

    let (start_block, end_block) = resolution.read_range();
    if start_block > end_block {
        debug!(start_block, end_block, "No new blocks this cycle");
        return;
    }

    let mut stream = scanner.stream(
        provider,
        filter,
        start_block,
        end_block,
        TimestampSource::Monitor(monitor),
    );

    let mut fresh = 0_u64;
    loop {
        match stream.next().await {
            Some(Ok(log)) => {
                let key = (log.block_hash, log.transaction_hash, log.log_index);
                if seen.insert(key, log.block_number).is_none() {
                    print_scanned_log(&log);
                    fresh += 1;
                }
            }
            Some(Err(ScannerError::ReorgDetected { block_number, .. })) => {
                // The chain moved under the scan. Drop the rest of this
                // cycle; the next update() truncates and re-issues the
                // overlapping range.
                warn!(block_number, "Reorg hit mid-scan, deferring to next cycle");
                println!(
                    "{} Reorg at block {} during scan, retrying next cycle",
                    "🔀".yellow(),
                    block_number.to_string().yellow()
                );
                return;
            }
            Some(Err(e)) => {
                error!(error = %e, "Scan cycle failed");
                println!("{} {}", "⚠️  Error:".red().bold(), e);
                return;
            }
            None => break,
        }
    }

    if fresh > 0 {
        info!(fresh, start_block, end_block, "Scan cycle complete");
    } else {
        debug!(start_block, end_block, "No new events this cycle");
    }
}

/// Display one scanned event with colored formatting.
#[allow(clippy::cast_possible_wrap)]
fn print_scanned_log(log: &ScannedLog) {
    let timestamp = chrono::DateTime::from_timestamp(log.timestamp as i64, 0)
        .map_or_else(|| log.timestamp.to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());

    let event = match log.event.as_str() {
        "Swap" => log.event.green().bold(),
        "Sync" => log.event.cyan().bold(),
        "Mint" => log.event.blue().bold(),
        "Burn" => log.event.red().bold(),
        _ => log.event.white().bold(),
    };

    println!(
        "{} {} Block: {} | {} | Tx: {} | Log: {}",
        "📊".cyan(),
        timestamp.dimmed(),
        log.block_number.to_string().yellow(),
        event,
        log.transaction_hash.to_string().dimmed(),
        log.log_index
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = vec!["eth-reorg-scanner", "scan"];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok());

        let args = vec!["eth-reorg-scanner", "watch"];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_scan_command_with_range() {
        let args = vec![
            "eth-reorg-scanner",
            "scan",
            "--from-block",
            "19000000",
            "--to-block",
            "19000100",
        ];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok());

        if let Ok(Cli {
            command:
                Commands::Scan {
                    from_block,
                    to_block,
                    ..
                },
        }) = cli
        {
            assert_eq!(from_block, Some(19_000_000));
            assert_eq!(to_block, Some(19_000_100));
        }
    }

    #[test]
    fn test_watch_command_with_start_block() {
        let args = vec!["eth-reorg-scanner", "watch", "--start-block", "19000000"];
        let cli = Cli::try_parse_from(args);
        assert!(cli.is_ok());

        if let Ok(Cli {
            command: Commands::Watch { start_block, .. },
        }) = cli
        {
            assert_eq!(start_block, Some(19_000_000));
        }
    }

    #[test]
    fn test_default_filter_targets_weth_usdt_pair() {
        let filter = build_filter(None).unwrap();
        assert_eq!(filter.addresses(), Some(&[UNISWAP_V2_WETH_USDT_PAIR][..]));
    }
}
