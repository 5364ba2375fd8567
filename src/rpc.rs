//! RPC provider management for Ethereum connections.
//!
//! Connects to an Ethereum node over HTTP JSON-RPC (typically an Alchemy
//! endpoint) using Alloy's `ProviderBuilder`.
//!
//! ## Example
//!
//! ```no_run
//! use eth_reorg_scanner::rpc::{create_provider, get_latest_block};
//! use eth_reorg_scanner::error::ScanResult;
//!
//! # async fn example() -> ScanResult<()> {
//! let provider = create_provider("https://eth-mainnet.g.alchemy.com/v2/API_KEY").await?;
//! let latest_block = get_latest_block(&provider).await?;
//! println!("Latest block: {}", latest_block);
//! # Ok(())
//! # }
//! ```

use crate::error::{ScanResult, ScannerError};
use alloy::providers::{Provider as AlloyProvider, ProviderBuilder, RootProvider};
use alloy::transports::http::{Client, Http};
use tracing::{debug, info, instrument, warn};

/// Type alias for the HTTP JSON-RPC provider.
pub type Provider = RootProvider<Http<Client>>;

/// Create a new Ethereum RPC provider connected via HTTP.
///
/// # Arguments
///
/// * `rpc_url` - The HTTP(S) endpoint URL for the Ethereum RPC node
///
/// # Errors
///
/// Returns an error if the RPC URL cannot be parsed.
///
/// # Example
///
/// ```no_run
/// use eth_reorg_scanner::rpc::create_provider;
/// use eth_reorg_scanner::error::ScanResult;
///
/// # async fn example() -> ScanResult<()> {
/// let provider = create_provider("https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY").await?;
/// # Ok(())
/// # }
/// ```
#[allow(clippy::unused_async)]
#[instrument(skip(rpc_url), fields(rpc_host = tracing::field::Empty))]
pub async fn create_provider(rpc_url: &str) -> ScanResult<Provider> {
    info!("Initializing RPC provider");

    // Extract host for logging (without sensitive API key)
    let host = rpc_url.split("/v2/").next().unwrap_or("unknown");
    tracing::Span::current().record("rpc_host", host);
    debug!(rpc_host = host, "Creating HTTP provider");

    let url = rpc_url.parse().map_err(|e| {
        let msg = if rpc_url == "your_key" || !rpc_url.starts_with("http") {
            format!(
                "Invalid RPC URL: '{rpc_url}'. Expected format: 'https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY'\n\nUsage:\n  RPC_URL=\"https://...\" cargo run -- scan\n  or\n  ALCHEMY_API_KEY=\"YOUR_KEY\" cargo run -- scan"
            )
        } else {
            format!("Failed to parse RPC URL: '{rpc_url}'")
        };
        ScannerError::rpc(msg, Some(Box::new(e)))
    })?;

    let provider = ProviderBuilder::new().on_http(url);

    info!("RPC provider initialized successfully");

    Ok(provider)
}

/// Get the latest block number from the Ethereum network.
///
/// # Errors
///
/// Returns an error if the RPC request fails.
///
/// # Example
///
/// ```no_run
/// use eth_reorg_scanner::rpc::{create_provider, get_latest_block};
/// use eth_reorg_scanner::error::ScanResult;
///
/// # async fn example() -> ScanResult<()> {
/// let provider = create_provider("https://eth-mainnet.g.alchemy.com/v2/YOUR_KEY").await?;
/// let block_number = get_latest_block(&provider).await?;
/// println!("Current block: {}", block_number);
/// # Ok(())
/// # }
/// ```
#[instrument(skip(provider), fields(block = tracing::field::Empty))]
pub async fn get_latest_block(provider: &Provider) -> ScanResult<u64> {
    debug!("Fetching latest block number");

    let block_number = provider
        .get_block_number()
        .await
        .map_err(|e| ScannerError::rpc("Failed to fetch latest block number", Some(Box::new(e))))?;

    tracing::Span::current().record("block", block_number);
    debug!(block = block_number, "Latest block fetched");

    Ok(block_number)
}

/// Check if the provider connection is healthy by fetching the latest block.
///
/// # Errors
///
/// Returns an error if the RPC connection is not working.
#[instrument(skip(provider))]
pub async fn check_connection(provider: &Provider) -> ScanResult<()> {
    debug!("Checking provider connection health");

    match get_latest_block(provider).await {
        Ok(block) => {
            info!(block = block, "Connection check successful");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Connection check failed");
            Err(ScannerError::rpc(
                format!("Provider connection health check failed: {e}"),
                None,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_rpc_url() -> String {
        std::env::var("ALCHEMY_API_KEY").map_or_else(
            |_| "http://localhost:8545".to_string(),
            |key| format!("https://eth-mainnet.g.alchemy.com/v2/{key}"),
        )
    }

    #[tokio::test]
    #[ignore = "Requires valid RPC_URL environment variable"]
    async fn test_create_provider_integration() {
        let result = create_provider(&env_rpc_url()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    #[ignore = "Requires valid RPC_URL environment variable"]
    async fn test_get_latest_block_integration() {
        if let Ok(provider) = create_provider(&env_rpc_url()).await {
            let block_number = get_latest_block(&provider).await;
            assert!(block_number.is_ok());

            if let Ok(block) = block_number {
                assert!(block > 0);
            }
        }
    }

    #[tokio::test]
    async fn test_create_provider_invalid_url() {
        let result = create_provider("not-a-valid-url").await;
        assert!(result.is_err());
    }
}
