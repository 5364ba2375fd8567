//! Uniswap V2 pair events with compile-time type safety.
//!
//! Alloy's `sol!` macro generates typed event bindings straight from the
//! Solidity signatures, so topic hashes are computed at compile time and
//! decoding needs no hand-written ABI handling. These are the default
//! events the CLI scans for; library users can filter on any events by
//! building their own [`EventDescriptor`](crate::filter::EventDescriptor)
//! list.
//!
//! ## Example
//!
//! ```
//! use eth_reorg_scanner::events::{pair_event_descriptors, IUniswapV2Pair};
//! use eth_reorg_scanner::filter::EventFilter;
//! use alloy::sol_types::SolEvent;
//!
//! # fn example() -> eth_reorg_scanner::error::ScanResult<()> {
//! let filter = EventFilter::build(pair_event_descriptors(), None)?;
//! assert!(filter.matches_topic(&IUniswapV2Pair::Swap::SIGNATURE_HASH));
//! # Ok(())
//! # }
//! ```

use alloy::primitives::{address, Address};
use alloy::sol;
use alloy::sol_types::SolEvent;

use crate::filter::EventDescriptor;

// Generate Uniswap V2 Pair contract interface using the sol! macro.
// The macro creates type-safe Rust bindings with automatic ABI
// encoding/decoding.
sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        /// Emitted on every trade against the pair.
        event Swap(
            address indexed sender,
            uint256 amount0In,
            uint256 amount1In,
            uint256 amount0Out,
            uint256 amount1Out,
            address indexed to
        );

        /// Emitted after every swap, mint, or burn to keep the reserves
        /// in sync with the actual token balances.
        event Sync(uint112 reserve0, uint112 reserve1);

        /// Emitted when liquidity is added to the pair.
        event Mint(address indexed sender, uint256 amount0, uint256 amount1);

        /// Emitted when liquidity is removed from the pair.
        event Burn(
            address indexed sender,
            uint256 amount0,
            uint256 amount1,
            address indexed to
        );
    }
}

// Re-export the generated event types for easier access
pub use IUniswapV2Pair::{Burn, Mint, Swap, Sync};

/// Uniswap V2 WETH/USDT Pair contract address on Ethereum mainnet.
///
/// - Token0: WETH (Wrapped Ether)
/// - Token1: USDT (Tether USD)
pub const UNISWAP_V2_WETH_USDT_PAIR: Address = address!("0d4a11d5EEaaC28EC3F61d100daF4d40471f1852");

/// Uniswap V2 USDC/WETH Pair contract address on Ethereum mainnet.
pub const UNISWAP_V2_USDC_WETH_PAIR: Address = address!("B4e16d0168e52d35CaCD2c6185b44281Ec28C9Dc");

/// Event descriptors for the four Uniswap V2 pair events.
///
/// Topic hashes come from the `sol!`-generated `SIGNATURE_HASH` constants,
/// so they are validated against the Solidity signatures at compile time.
#[must_use]
pub fn pair_event_descriptors() -> Vec<EventDescriptor> {
    vec![
        EventDescriptor::from_topic("Swap", Swap::SIGNATURE_HASH),
        EventDescriptor::from_topic("Sync", Sync::SIGNATURE_HASH),
        EventDescriptor::from_topic("Mint", Mint::SIGNATURE_HASH),
        EventDescriptor::from_topic("Burn", Burn::SIGNATURE_HASH),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::keccak256;

    #[test]
    fn test_signature_hashes_match_canonical_signatures() {
        assert_eq!(
            Sync::SIGNATURE_HASH,
            keccak256(b"Sync(uint112,uint112)")
        );
        assert_eq!(
            Swap::SIGNATURE_HASH,
            keccak256(b"Swap(address,uint256,uint256,uint256,uint256,address)")
        );
        assert_eq!(
            Mint::SIGNATURE_HASH,
            keccak256(b"Mint(address,uint256,uint256)")
        );
        assert_eq!(
            Burn::SIGNATURE_HASH,
            keccak256(b"Burn(address,uint256,uint256,address)")
        );
    }

    #[test]
    fn test_pair_event_descriptors_cover_all_four_events() {
        let descriptors = pair_event_descriptors();
        assert_eq!(descriptors.len(), 4);

        let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Swap", "Sync", "Mint", "Burn"]);

        // Each descriptor carries exactly one distinct topic hash.
        for (i, a) in descriptors.iter().enumerate() {
            assert_eq!(a.topics.len(), 1);
            for b in &descriptors[i + 1..] {
                assert_ne!(a.topics[0], b.topics[0]);
            }
        }
    }

    #[test]
    fn test_pair_constants() {
        assert_ne!(UNISWAP_V2_WETH_USDT_PAIR, Address::ZERO);
        assert_ne!(UNISWAP_V2_USDC_WETH_PAIR, Address::ZERO);
        assert_ne!(UNISWAP_V2_WETH_USDT_PAIR, UNISWAP_V2_USDC_WETH_PAIR);
    }

    #[test]
    fn test_sync_event_decode_structure() {
        use alloy::primitives::Uint;

        // The sol! macro generates Uint<112, 2> for uint112 types.
        let _mock_sync = Sync {
            reserve0: Uint::<112, 2>::from(1_000_000),
            reserve1: Uint::<112, 2>::from(2_000_000),
        };
    }
}
