//! # MIG Pool Indexer
//!
//! Historical pool-creation indexing for EVM factories through a rate-limited,
//! pagination-bounded block-explorer API (Etherscan v2 style).
//!
//! ## Overview
//!
//! The crate produces a *complete* log set over an arbitrarily large block range from an
//! API that paginates with a fixed page size, answers "query timeout" when a range holds
//! too much data, rate-limits callers and now and then returns 5xx errors. It focuses on:
//!
//! - **Transport**: classified explorer responses, retries with backoff and jitter
//! - **Scanning**: pagination plus bisection of ranges that time out
//! - **Decoding**: topic and return-data decoding, including packed `int24` values
//! - **Materialization**: typed pool-creation records with a tick-spacing → fee cache
//!
//! ## Architecture
//!
//! ### Transport Layer
//! [`transport`] performs the HTTP GETs and the sleeps; [`explorer_client`] classifies
//! replies into the [`error::ErrorKind`] taxonomy and retries transient failures.
//!
//! ### Scanning Layer
//! [`log_scanner`] walks a work stack of block ranges, paging each one and splitting it
//! in half whenever the explorer reports the query as too large.
//!
//! ### Decoding Layer
//! [`abi_codec`] holds the pure ABI helpers; [`pool_event_extractor`] turns raw logs into
//! [`pool_event_extractor::DecodedEvent`]s.
//!
//! ### Output Layer
//! [`orchestrator`] drives windows and factories, [`normalization`] dedups by pool and
//! [`token_enricher`] attaches ERC-20 metadata and pool names.

// Core Types
/// Block ranges, log filters and raw explorer log rows
pub mod types;
/// Error taxonomy shared by every layer
pub mod error;

// Transport Layer
/// HTTP and sleep seams
pub mod transport;
/// Explorer API client with response classification and retries
pub mod explorer_client;

// Decoding Layer
/// ABI helpers for topics and call results
pub mod abi_codec;
/// Tick spacing → fee cache
pub mod cache;
/// Pool creation event materialization
pub mod pool_event_extractor;

// Scanning Layer
/// Adaptive paginating / bisecting log scanner
pub mod log_scanner;
/// Window-by-window indexing pipeline
pub mod orchestrator;

// Output Layer
/// Dedup and output row shapes
pub mod normalization;
/// Token metadata enrichment and pool naming
pub mod token_enricher;

// Utilities
/// General utilities
pub mod utils;

// Settings & Configuration
/// Configuration management
pub mod settings;

// Re-exports for convenience
pub use error::{ErrorKind, ExplorerError};
pub use explorer_client::ExplorerClient;
pub use log_scanner::{LogScanner, ScanStats};
pub use orchestrator::{IndexReport, PoolIndexer};
pub use pool_event_extractor::DecodedEvent;
pub use settings::Settings;
pub use types::{BlockRange, LogFilter, RawLogEntry};
