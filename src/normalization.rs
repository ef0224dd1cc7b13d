// src/normalization.rs
//
// Output-side normalization: collapse decoded events by pool address and the flat row
// shape written by the binary.

use crate::pool_event_extractor::DecodedEvent;
use ethers::types::Address;
use serde::Serialize;
use std::collections::HashSet;

/// Keeps the first record per pool address, preserving order.
pub fn dedupe_by_pool(events: Vec<DecodedEvent>) -> Vec<DecodedEvent> {
    let mut seen: HashSet<Address> = HashSet::with_capacity(events.len());
    events
        .into_iter()
        .filter(|event| seen.insert(event.pool()))
        .collect()
}

/// Number of distinct pool addresses in `events`.
pub fn unique_pools(events: &[DecodedEvent]) -> usize {
    events
        .iter()
        .map(DecodedEvent::pool)
        .collect::<HashSet<_>>()
        .len()
}

/// Event plus token metadata and display name, serialized as one flat JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedPoolRow {
    #[serde(flatten)]
    pub event: DecodedEvent,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub token0_name: Option<String>,
    pub token1_name: Option<String>,
    pub token0_decimals: Option<u8>,
    pub token1_decimals: Option<u8>,
    pub pool_name: String,
}
