use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
/// Tick spacing → fee mapping resolved through `tickSpacingToFee(int24)`.
///
/// Owned by one scan and passed explicitly to the materializer. Entries are only ever
/// added: the on-chain mapping is set once per tick spacing, and a factory supports a
/// handful of spacings, so the map stays tiny without eviction.
pub struct TickFeeCache {
    fees: BTreeMap<i32, u32>,
}

impl TickFeeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tick_spacing: i32) -> Option<u32> {
        self.fees.get(&tick_spacing).copied()
    }

    /// Memoizes a resolved fee. The first value recorded for a spacing wins.
    pub fn insert(&mut self, tick_spacing: i32, fee: u32) -> u32 {
        *self.fees.entry(tick_spacing).or_insert(fee)
    }

    pub fn len(&self) -> usize {
        self.fees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fees.is_empty()
    }

    /// Entries ordered by tick spacing.
    pub fn iter(&self) -> impl Iterator<Item = (i32, u32)> + '_ {
        self.fees.iter().map(|(t, f)| (*t, *f))
    }
}
