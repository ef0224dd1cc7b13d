//! Shared fixtures: in-memory explorer transports, a recording pacer and JSON builders.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, H256};
use mig_pool_indexer::settings::{Explorer as ExplorerSettings, Scanner as ScannerSettings};
use mig_pool_indexer::transport::{HttpReply, Pacer, PauseReason, Transport};
use mig_pool_indexer::{ExplorerClient, ExplorerError};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub type Query = Vec<(String, String)>;

pub fn param<'a>(query: &'a [(String, String)], key: &str) -> Option<&'a str> {
    query
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

pub fn param_u64(query: &[(String, String)], key: &str) -> u64 {
    param(query, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| panic!("missing numeric param {}", key))
}

/// Replays canned replies in order and records every query.
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<HttpReply>>,
    queries: Mutex<Vec<Query>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<HttpReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, query: &[(String, String)]) -> Result<HttpReply, ExplorerError> {
        self.queries.lock().unwrap().push(query.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ExplorerError::Api("script exhausted".into()))
    }
}

type Handler = dyn Fn(&[(String, String)]) -> HttpReply + Send + Sync;

/// Answers each query through a closure, like a tiny fake explorer.
pub struct FnTransport {
    handler: Box<Handler>,
    queries: Mutex<Vec<Query>>,
}

impl FnTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&[(String, String)]) -> HttpReply + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn queries(&self) -> Vec<Query> {
        self.queries.lock().unwrap().clone()
    }

    pub fn count_action(&self, action: &str) -> usize {
        self.queries
            .lock()
            .unwrap()
            .iter()
            .filter(|q| param(q, "action") == Some(action))
            .count()
    }
}

#[async_trait]
impl Transport for FnTransport {
    async fn get(&self, query: &[(String, String)]) -> Result<HttpReply, ExplorerError> {
        self.queries.lock().unwrap().push(query.to_vec());
        Ok((self.handler)(query))
    }
}

#[derive(Default)]
pub struct RecordingPacer {
    pauses: Mutex<Vec<(PauseReason, Duration)>>,
}

impl RecordingPacer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self, reason: PauseReason) -> usize {
        self.pauses
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| *r == reason)
            .count()
    }

    pub fn pauses(&self) -> Vec<(PauseReason, Duration)> {
        self.pauses.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn pause(&self, reason: PauseReason, duration: Duration) {
        self.pauses.lock().unwrap().push((reason, duration));
    }
}

pub fn explorer_settings() -> ExplorerSettings {
    ExplorerSettings {
        api_key: "TESTKEY".into(),
        max_retries: 3,
        ..ExplorerSettings::default()
    }
}

pub fn scanner_settings(page_size: u32, min_span: u64, window_size: u64) -> ScannerSettings {
    ScannerSettings {
        window_size,
        min_span,
        page_size,
        ..ScannerSettings::default()
    }
}

pub fn client(transport: Arc<dyn Transport>, pacer: Arc<RecordingPacer>) -> ExplorerClient {
    ExplorerClient::with_transport(explorer_settings(), transport, pacer)
}

fn reply(body: Value) -> HttpReply {
    HttpReply {
        status: 200,
        body: body.to_string(),
    }
}

pub fn logs_page(rows: Vec<Value>) -> HttpReply {
    if rows.is_empty() {
        return no_records();
    }
    reply(json!({"status": "1", "message": "OK", "result": rows}))
}

pub fn no_records() -> HttpReply {
    reply(json!({"status": "0", "message": "No records found", "result": []}))
}

pub fn rate_limited() -> HttpReply {
    reply(json!({"status": "0", "message": "NOTOK", "result": "Max rate limit reached"}))
}

pub fn query_timeout() -> HttpReply {
    reply(json!({
        "status": "0",
        "message": "Query Timeout occured. Please select a smaller result dataset",
        "result": null
    }))
}

pub fn invalid_key() -> HttpReply {
    reply(json!({"status": "0", "message": "NOTOK", "result": "Invalid API Key"}))
}

pub fn bad_gateway() -> HttpReply {
    HttpReply {
        status: 502,
        body: "<html>502 Bad Gateway</html>".into(),
    }
}

pub fn rpc_result(data: &[u8]) -> HttpReply {
    reply(json!({"jsonrpc": "2.0", "id": 1, "result": format!("0x{}", hex::encode(data))}))
}

pub fn rpc_error(message: &str) -> HttpReply {
    reply(json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": message}}))
}

pub fn creation_block(contract: Address, block: u64) -> HttpReply {
    reply(json!({
        "status": "1",
        "message": "OK",
        "result": [{
            "contractAddress": format!("{:?}", contract),
            "contractCreator": "0x0000000000000000000000000000000000000000",
            "txHash": format!("{:?}", H256::zero()),
            "blockNumber": block.to_string()
        }]
    }))
}

pub fn uint_word(value: u64) -> Vec<u8> {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word.to_vec()
}

/// Dynamic ABI `string` return value.
pub fn abi_string(value: &str) -> Vec<u8> {
    let mut out = uint_word(32);
    out.extend(uint_word(value.len() as u64));
    let mut body = value.as_bytes().to_vec();
    body.resize(((value.len() + 31) / 32).max(1) * 32, 0);
    out.extend(body);
    out
}

pub fn address_topic(address: Address) -> H256 {
    H256::from(address)
}

/// Explorer getLogs row, shaped like the real API (hex quantities, extra fields).
pub fn log_row(
    address: Address,
    topics: &[H256],
    data: &[u8],
    block: u64,
    tx_hash: H256,
    log_index: u64,
) -> Value {
    json!({
        "address": format!("{:?}", address),
        "topics": topics.iter().map(|t| format!("{:?}", t)).collect::<Vec<_>>(),
        "data": format!("0x{}", hex::encode(data)),
        "blockNumber": format!("0x{:x}", block),
        "timeStamp": "0x65a1b2c3",
        "gasPrice": "0x3b9aca00",
        "gasUsed": "0x5208",
        "logIndex": format!("0x{:x}", log_index),
        "transactionHash": format!("{:?}", tx_hash),
        "transactionIndex": "0x1"
    })
}

/// A distinct, otherwise meaningless log at `block`.
pub fn filler_row(block: u64, index: u64) -> Value {
    log_row(
        Address::repeat_byte(0x42),
        &[H256::repeat_byte(0x01)],
        &[],
        block,
        H256::from_low_u64_be(block * 10_000 + index),
        index,
    )
}
