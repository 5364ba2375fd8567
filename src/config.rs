//! Configuration management for the reorg-aware event scanner.
//!
//! Loads and validates configuration from environment variables using the
//! `dotenvy` crate. All operations return [`ScanResult`] for comprehensive
//! error handling.
//!
//! ## Environment Variables
//!
//! Required (one of):
//! - `RPC_URL`: Full HTTP(S) endpoint of an Ethereum JSON-RPC node
//! - `ALCHEMY_API_KEY`: Alchemy API key (mainnet URL is derived from it)
//!
//! Optional (with defaults):
//! - `CHECK_DEPTH`: How many trailing blocks to re-verify per cycle (default: 20)
//! - `MAX_CYCLE_TRIES`: Reorg resolution retry budget (default: 10)
//! - `REORG_WAIT_SECS`: Wait between resolution retries (default: 5)
//! - `CHUNK_SIZE`: Blocks per `eth_getLogs` call (default: 100)
//! - `MAX_SCAN_RANGE`: Safety cap on one scan cycle's range (default: 1000000)
//! - `SNAPSHOT_FILE`: Path to the header snapshot file (default: "./headers.json")
//! - `POLL_INTERVAL_SECS`: Polling interval in watch mode (default: 12)
//! - `RUST_LOG`: Logging level (default: "info")
//!
//! ## Example
//!
//! ```no_run
//! use eth_reorg_scanner::config::Config;
//! use eth_reorg_scanner::error::ScanResult;
//!
//! # fn main() -> ScanResult<()> {
//! let config = Config::from_env()?;
//! println!("Check depth: {}", config.check_depth());
//! # Ok(())
//! # }
//! ```

use crate::error::{ScanResult, ScannerError};
use crate::monitor::MonitorConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration struct for the scanner.
///
/// Contains all runtime configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Ethereum RPC URL
    rpc_url: String,

    /// How many trailing blocks each cycle re-verifies against the chain
    check_depth: u64,

    /// Retry budget for reorg resolution before giving up
    max_cycle_tries: u32,

    /// Wait between reorg resolution retries
    reorg_wait: Duration,

    /// Blocks per `eth_getLogs` call
    chunk_size: u64,

    /// Safety cap on the block range of one scan cycle
    max_scan_range: u64,

    /// Path to the header snapshot file
    snapshot_file: PathBuf,

    /// Polling interval in watch mode
    poll_interval: Duration,
}

fn parse_env_u64(name: &str, default: u64) -> ScanResult<u64> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u64>()
        .map_err(|e| {
            ScannerError::config(format!("{name} must be a valid number"), Some(Box::new(e)))
        })
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Loads a `.env` file via `dotenvy` if present, reads and validates
    /// all variables, and applies defaults for the optional ones.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Neither `RPC_URL` nor `ALCHEMY_API_KEY` is set
    /// - A numeric variable fails to parse
    /// - `CHECK_DEPTH` or `CHUNK_SIZE` is zero
    ///
    /// # Example
    ///
    /// ```no_run
    /// use eth_reorg_scanner::config::Config;
    /// use eth_reorg_scanner::error::ScanResult;
    ///
    /// # fn main() -> ScanResult<()> {
    /// let config = Config::from_env()?;
    /// println!("Configuration loaded successfully");
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_env() -> ScanResult<Self> {
        // Load .env file if present (ignore error if file doesn't exist)
        dotenvy::dotenv().ok();

        // RPC_URL wins; otherwise derive the mainnet URL from the Alchemy key.
        let rpc_url = match env::var("RPC_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => {
                let alchemy_api_key = env::var("ALCHEMY_API_KEY").map_err(|e| {
                    ScannerError::config(
                        "Either RPC_URL or ALCHEMY_API_KEY environment variable is required",
                        Some(Box::new(e)),
                    )
                })?;

                if alchemy_api_key.is_empty() || alchemy_api_key == "your_alchemy_api_key_here" {
                    return Err(ScannerError::config(
                        "ALCHEMY_API_KEY must be set to a valid Alchemy API key",
                        None,
                    ));
                }

                format!("https://eth-mainnet.g.alchemy.com/v2/{alchemy_api_key}")
            }
        };

        let check_depth = parse_env_u64("CHECK_DEPTH", 20)?;
        if check_depth == 0 {
            return Err(ScannerError::config(
                "CHECK_DEPTH must be at least 1",
                None,
            ));
        }

        let max_cycle_tries = env::var("MAX_CYCLE_TRIES")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u32>()
            .map_err(|e| {
                ScannerError::config("MAX_CYCLE_TRIES must be a valid number", Some(Box::new(e)))
            })?;

        let reorg_wait = Duration::from_secs(parse_env_u64("REORG_WAIT_SECS", 5)?);

        let chunk_size = parse_env_u64("CHUNK_SIZE", 100)?;
        if chunk_size == 0 {
            return Err(ScannerError::config("CHUNK_SIZE must be at least 1", None));
        }

        let max_scan_range = parse_env_u64("MAX_SCAN_RANGE", 1_000_000)?;

        let snapshot_file = env::var("SNAPSHOT_FILE")
            .unwrap_or_else(|_| "./headers.json".to_string())
            .into();

        let poll_interval = Duration::from_secs(parse_env_u64("POLL_INTERVAL_SECS", 12)?);

        Ok(Self {
            rpc_url,
            check_depth,
            max_cycle_tries,
            reorg_wait,
            chunk_size,
            max_scan_range,
            snapshot_file,
            poll_interval,
        })
    }

    /// Get the Ethereum RPC URL.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Get the trailing re-verification depth.
    #[must_use]
    pub const fn check_depth(&self) -> u64 {
        self.check_depth
    }

    /// Get the reorg resolution retry budget.
    #[must_use]
    pub const fn max_cycle_tries(&self) -> u32 {
        self.max_cycle_tries
    }

    /// Get the wait between reorg resolution retries.
    #[must_use]
    pub const fn reorg_wait(&self) -> Duration {
        self.reorg_wait
    }

    /// Get the number of blocks per `eth_getLogs` call.
    #[must_use]
    pub const fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Get the safety cap on one scan cycle's block range.
    #[must_use]
    pub const fn max_scan_range(&self) -> u64 {
        self.max_scan_range
    }

    /// Get the header snapshot file path.
    #[must_use]
    pub const fn snapshot_file(&self) -> &PathBuf {
        &self.snapshot_file
    }

    /// Get the polling interval for watch mode.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Render the monitor-specific subset of this configuration.
    #[must_use]
    pub const fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            check_depth: self.check_depth,
            max_cycle_tries: self.max_cycle_tries,
            reorg_wait: self.reorg_wait,
            max_scan_range: Some(self.max_scan_range),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_env() {
        for name in [
            "RPC_URL",
            "ALCHEMY_API_KEY",
            "CHECK_DEPTH",
            "MAX_CYCLE_TRIES",
            "REORG_WAIT_SECS",
            "CHUNK_SIZE",
            "MAX_SCAN_RANGE",
            "SNAPSHOT_FILE",
            "POLL_INTERVAL_SECS",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn test_config_requires_rpc_url_or_api_key() {
        clear_env();

        let result = Config::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_placeholder_api_key() {
        clear_env();
        env::set_var("ALCHEMY_API_KEY", "your_alchemy_api_key_here");

        let result = Config::from_env();
        assert!(result.is_err());

        clear_env();
    }

    #[test]
    fn test_config_rpc_url_from_api_key() {
        clear_env();
        env::set_var("ALCHEMY_API_KEY", "test_api_key");

        let config = Config::from_env();
        assert!(config.is_ok());

        if let Ok(config) = config {
            assert_eq!(
                config.rpc_url(),
                "https://eth-mainnet.g.alchemy.com/v2/test_api_key"
            );
        }

        clear_env();
    }

    #[test]
    fn test_config_defaults_and_overrides() {
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var("CHECK_DEPTH", "35");
        env::set_var("REORG_WAIT_SECS", "2");

        let config = Config::from_env();
        assert!(config.is_ok());

        if let Ok(config) = config {
            assert_eq!(config.rpc_url(), "http://localhost:8545");
            assert_eq!(config.check_depth(), 35);
            assert_eq!(config.reorg_wait(), Duration::from_secs(2));
            // Untouched variables keep their defaults.
            assert_eq!(config.max_cycle_tries(), 10);
            assert_eq!(config.chunk_size(), 100);
            assert_eq!(config.max_scan_range(), 1_000_000);
            assert_eq!(config.poll_interval(), Duration::from_secs(12));

            let monitor = config.monitor_config();
            assert_eq!(monitor.check_depth, 35);
            assert_eq!(monitor.max_scan_range, Some(1_000_000));
        }

        clear_env();
    }

    #[test]
    fn test_config_rejects_zero_chunk_size() {
        clear_env();
        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var("CHUNK_SIZE", "0");

        let result = Config::from_env();
        assert!(result.is_err());

        clear_env();
    }
}
