//! Core data types shared by the client, scanner and materializer.

pub mod conversions;

use crate::error::ExplorerError;
use crate::utils::create_block_chunks;
use conversions::{parse_h256, parse_hex_bytes, parse_quantity, string_to_address};
use ethers::types::{Address, Bytes, H256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Inclusive block range, `from <= to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlockRange {
    from: u64,
    to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Result<Self, ExplorerError> {
        if from > to {
            return Err(ExplorerError::InvalidRange { from, to });
        }
        Ok(Self { from, to })
    }

    pub fn from_block(&self) -> u64 {
        self.from
    }

    pub fn to_block(&self) -> u64 {
        self.to
    }

    /// `to - from`; a single-block range has span 0.
    pub fn span(&self) -> u64 {
        self.to - self.from
    }

    /// Number of blocks covered.
    pub fn block_count(&self) -> u64 {
        self.span() + 1
    }

    pub fn contains(&self, block: u64) -> bool {
        self.from <= block && block <= self.to
    }

    /// Bisects into `(from, mid)` and `(mid + 1, to)`. The halves are disjoint and
    /// their union is exactly `self`. Returns `None` for a single-block range.
    pub fn split(&self) -> Option<(BlockRange, BlockRange)> {
        if self.from == self.to {
            return None;
        }
        let mid = self.from + (self.to - self.from) / 2;
        Some((
            BlockRange {
                from: self.from,
                to: mid,
            },
            BlockRange {
                from: mid + 1,
                to: self.to,
            },
        ))
    }

    /// Consecutive windows of at most `size` blocks covering the range in order.
    pub fn windows(&self, size: u64) -> Vec<BlockRange> {
        create_block_chunks(self.from, self.to, size.max(1))
            .into_iter()
            .map(|(from, to)| BlockRange { from, to })
            .collect()
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// One event signature on one contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogFilter {
    pub address: Address,
    pub topic0: H256,
}

impl LogFilter {
    pub fn new(address: Address, topic0: H256) -> Self {
        Self { address, topic0 }
    }
}

/// A log row as returned by `module=logs&action=getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawLogEntry {
    pub address: Address,
    /// 1 to 4 topics, topic0 first.
    pub topics: Vec<H256>,
    pub data: Bytes,
    pub block_number: u64,
    pub transaction_hash: H256,
    pub log_index: Option<u64>,
}

impl RawLogEntry {
    pub fn topic0(&self) -> Option<&H256> {
        self.topics.first()
    }

    /// Parses one element of the explorer's `result` array.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ExplorerError> {
        let row: ExplorerLogRow = serde_json::from_value(value.clone())
            .map_err(|e| ExplorerError::MalformedResponse(format!("log row: {}", e)))?;
        row.try_into()
    }
}

#[derive(Debug, Deserialize)]
struct ExplorerLogRow {
    address: String,
    #[serde(default)]
    topics: Vec<Option<String>>,
    #[serde(default)]
    data: String,
    #[serde(rename = "blockNumber")]
    block_number: String,
    #[serde(rename = "transactionHash")]
    transaction_hash: String,
    #[serde(rename = "logIndex", default)]
    log_index: Option<String>,
}

impl TryFrom<ExplorerLogRow> for RawLogEntry {
    type Error = ExplorerError;

    fn try_from(row: ExplorerLogRow) -> Result<Self, Self::Error> {
        // Topics nulos (posiciones no indexadas) se descartan
        let topics = row
            .topics
            .iter()
            .flatten()
            .map(|t| parse_h256(t))
            .collect::<Result<Vec<_>, _>>()?;
        if topics.is_empty() || topics.len() > 4 {
            return Err(ExplorerError::MalformedResponse(format!(
                "log in tx {} has {} topics",
                row.transaction_hash,
                topics.len()
            )));
        }

        let log_index = match row.log_index.as_deref() {
            Some(raw) if !raw.trim().is_empty() => Some(parse_quantity(raw)?),
            _ => None,
        };

        Ok(RawLogEntry {
            address: string_to_address(&row.address)?,
            topics,
            data: parse_hex_bytes(&row.data)?,
            block_number: parse_quantity(&row.block_number)?,
            transaction_hash: parse_h256(&row.transaction_hash)?,
            log_index,
        })
    }
}
