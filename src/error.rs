//! Error taxonomy for explorer access.
//!
//! Every failure is reduced to one of five kinds. The kind, not the message, drives
//! control flow: network errors are retried with backoff, rate limits wait out a fixed
//! cooldown, oversized queries are bisected by the scanner, decode failures are recovered
//! with a fallback and everything else aborts.

use crate::abi_codec::AbiError;
use crate::types::conversions::ConversionError;
use crate::types::BlockRange;
use ethers::types::{Address, H256};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection/read timeout, retryable 5xx, "server busy".
    TransientNetwork,
    /// Explorer rate limit; wait a fixed cooldown, then repeat the same request.
    TransientRateLimit,
    /// The requested block range is too expensive for one call; bisect it.
    TransientRangeTooLarge,
    /// Any other explorer failure or an unexpected response shape.
    FatalApi,
    /// An ABI value could not be decoded.
    DecodeFailure,
}

impl ErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorKind::TransientNetwork
                | ErrorKind::TransientRateLimit
                | ErrorKind::TransientRangeTooLarge
        )
    }
}

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited by explorer: {0}")]
    RateLimited(String),

    #[error("Query too large for a single request: {0}")]
    QueryTooLarge(String),

    #[error("Explorer API error: {0}")]
    Api(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Malformed explorer response: {0}")]
    MalformedResponse(String),

    #[error("{action} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        action: String,
        attempts: u32,
        #[source]
        last: Box<ExplorerError>,
    },

    #[error(
        "Range {range} on {address:?} (topic0 {topic0:?}) still too large at span {span} <= min span {min_span}: {last}"
    )]
    RangeUnsplittable {
        address: Address,
        topic0: H256,
        range: BlockRange,
        span: u64,
        min_span: u64,
        #[source]
        last: Box<ExplorerError>,
    },

    #[error("Scan of {address:?} (topic0 {topic0:?}) aborted at range {range} page {page}: {source}")]
    ScanAborted {
        address: Address,
        topic0: H256,
        range: BlockRange,
        page: u32,
        #[source]
        source: Box<ExplorerError>,
    },

    #[error("Scan already failed; re-invoke with the remaining range")]
    ScanPoisoned,

    #[error("Invalid block range {from}..{to}")]
    InvalidRange { from: u64, to: u64 },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error(transparent)]
    Abi(#[from] AbiError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Client initialization failed: {0}")]
    Init(String),
}

impl ExplorerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExplorerError::Network(_) => ErrorKind::TransientNetwork,
            ExplorerError::RateLimited(_) => ErrorKind::TransientRateLimit,
            ExplorerError::QueryTooLarge(_) => ErrorKind::TransientRangeTooLarge,
            ExplorerError::Decode(_) | ExplorerError::Abi(_) => ErrorKind::DecodeFailure,
            ExplorerError::Api(_)
            | ExplorerError::HttpStatus { .. }
            | ExplorerError::MalformedResponse(_)
            | ExplorerError::RetriesExhausted { .. }
            | ExplorerError::RangeUnsplittable { .. }
            | ExplorerError::ScanAborted { .. }
            | ExplorerError::ScanPoisoned
            | ExplorerError::InvalidRange { .. }
            | ExplorerError::Conversion(_)
            | ExplorerError::Init(_) => ErrorKind::FatalApi,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::FatalApi
    }
}
