//! Event filters for `eth_getLogs` queries.
//!
//! An [`EventFilter`] maps topic hashes to the event descriptors a scan
//! session cares about, optionally restricted to one or more contract
//! addresses. Alongside the exact topic map it maintains an Ethereum bloom
//! filter, usable as a cheap membership hint before issuing RPC calls.
//!
//! Bloom false positives are acceptable (the bloom is only a pre-filter);
//! false negatives would silently drop events, so
//! [`EventFilter::matches_topic`] always confirms against the exact topic
//! map before accepting a match.
//!
//! ## Example
//!
//! ```
//! use eth_reorg_scanner::filter::{EventDescriptor, EventFilter};
//!
//! # fn example() -> eth_reorg_scanner::error::ScanResult<()> {
//! let swap = EventDescriptor::from_signature(
//!     "Swap",
//!     "Swap(address,uint256,uint256,uint256,uint256,address)",
//! );
//! let filter = EventFilter::build(vec![swap], None)?;
//! assert_eq!(filter.topic_hashes().len(), 1);
//! # Ok(())
//! # }
//! ```

use alloy::primitives::{keccak256, Address, Bloom, BloomInput, B256};
use alloy::rpc::types::Filter;
use std::collections::HashMap;

use crate::error::{ScanResult, ScannerError};

/// A named event and the topic hashes that identify it in a log entry.
///
/// Most events expose a single signature hash; a descriptor may carry
/// several when multiple signatures decode into the same record shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDescriptor {
    /// Human-readable event name, e.g. `"Swap"`
    pub name: String,

    /// The `topics[0]` hashes matching this event
    pub topics: Vec<B256>,
}

impl EventDescriptor {
    /// Build a descriptor from a canonical Solidity event signature, e.g.
    /// `"Sync(uint112,uint112)"`.
    #[must_use]
    pub fn from_signature(name: impl Into<String>, signature: &str) -> Self {
        Self {
            name: name.into(),
            topics: vec![keccak256(signature.as_bytes())],
        }
    }

    /// Build a descriptor from a precomputed topic hash (e.g. a
    /// `sol!`-generated `SIGNATURE_HASH`).
    #[must_use]
    pub fn from_topic(name: impl Into<String>, topic: B256) -> Self {
        Self {
            name: name.into(),
            topics: vec![topic],
        }
    }
}

/// Immutable topic/address filter for one scan session.
///
/// Built once via [`EventFilter::build`], read-only afterwards.
#[derive(Debug, Clone)]
pub struct EventFilter {
    /// Preconstructed topic hash -> event descriptor mapping
    topics: HashMap<B256, EventDescriptor>,

    /// Restrict matching to these contract addresses; `None` listens to
    /// events from any contract
    addresses: Option<Vec<Address>>,

    /// Bloom over the topic hashes, used as a pre-filter hint only
    bloom: Bloom,
}

impl EventFilter {
    /// Construct a filter from event descriptors and an optional address
    /// restriction.
    ///
    /// Every topic hash of every descriptor lands in both the exact topic
    /// map and the bloom.
    ///
    /// # Errors
    ///
    /// [`ScannerError::ConfigError`] when two descriptors claim the same
    /// topic hash: one topic resolving to two different event shapes means
    /// the descriptor list is wrong, and silently picking one would
    /// mis-decode events.
    pub fn build(
        descriptors: Vec<EventDescriptor>,
        addresses: Option<Vec<Address>>,
    ) -> ScanResult<Self> {
        let mut topics: HashMap<B256, EventDescriptor> = HashMap::new();
        let mut bloom = Bloom::ZERO;

        for descriptor in descriptors {
            for topic in &descriptor.topics {
                if let Some(existing) = topics.get(topic) {
                    return Err(ScannerError::config(
                        format!(
                            "topic hash {topic} is claimed by both '{}' and '{}'",
                            existing.name, descriptor.name
                        ),
                        None,
                    ));
                }
                bloom.accrue(BloomInput::Raw(topic.as_slice()));
                topics.insert(*topic, descriptor.clone());
            }
        }

        Ok(Self {
            topics,
            addresses,
            bloom,
        })
    }

    /// All topic hashes this filter matches (OR semantics).
    #[must_use]
    pub fn topic_hashes(&self) -> Vec<B256> {
        self.topics.keys().copied().collect()
    }

    /// The descriptor registered for a topic hash, if any.
    #[must_use]
    pub fn descriptor_for(&self, topic: &B256) -> Option<&EventDescriptor> {
        self.topics.get(topic)
    }

    /// The address restriction, if any.
    #[must_use]
    pub fn addresses(&self) -> Option<&[Address]> {
        self.addresses.as_deref()
    }

    /// Cheap membership test: bloom hint first, exact map second.
    ///
    /// The bloom can claim membership for topics never inserted (false
    /// positive); the exact lookup makes the final call, so a `true` here is
    /// authoritative.
    #[must_use]
    pub fn matches_topic(&self, topic: &B256) -> bool {
        if !self.bloom.contains_input(BloomInput::Raw(topic.as_slice())) {
            return false;
        }
        self.topics.contains_key(topic)
    }

    /// Render the filter as an alloy RPC [`Filter`] for one block range.
    #[must_use]
    pub fn to_rpc_filter(&self, from_block: u64, to_block: u64) -> Filter {
        let mut filter = Filter::new()
            .event_signature(self.topic_hashes())
            .from_block(from_block)
            .to_block(to_block);

        if let Some(addresses) = &self.addresses {
            filter = filter.address(addresses.clone());
        }

        filter
    }
}
