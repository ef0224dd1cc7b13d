//! # Explorer Client
//!
//! Resilient client for an Etherscan-v2 style API (single GET endpoint, `apikey` +
//! `chainid` on every call).
//!
//! ## Responsibilities
//!
//! - **Classification**: [`classify_response`] maps an HTTP reply onto a success value or
//!   a typed [`ExplorerError`]. It is the only place that inspects explorer wording.
//! - **Retries**: transient network failures are retried with exponential backoff plus
//!   jitter, up to `max_retries` attempts.
//! - **Calls**: paginated `getLogs`, `eth_call`, contract-creation lookup and
//!   `eth_blockNumber`.
//!
//! Log-page requests hand rate limits and "query timeout" failures back to the caller,
//! because the scanner resolves those itself (cooldown, bisection). Direct calls absorb
//! them here.

use crate::error::{ErrorKind, ExplorerError};
use crate::settings::Explorer as ExplorerSettings;
use crate::transport::{HttpTransport, Pacer, PauseReason, TokioPacer, Transport};
use crate::types::conversions::{address_to_string, h256_to_string, parse_hex_bytes, parse_quantity};
use crate::types::{BlockRange, LogFilter, RawLogEntry};
use crate::utils::truncate_for_log;
use ethers::types::{Address, Bytes};
use rand::Rng;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Cap on the backoff exponent: `base * 2^6` at most, before jitter.
pub const MAX_BACKOFF_EXPONENT: u32 = 6;
/// Jitter is drawn uniformly from `[0, JITTER_FRACTION * backoff)`.
pub const JITTER_FRACTION: f64 = 0.25;

const NO_RECORDS_MARKERS: &[&str] = &["no records found", "no transactions found"];
const QUERY_TIMEOUT_MARKERS: &[&str] = &[
    "query timeout",
    "timeout occured",
    "timeout occurred",
    "result window is too large",
];
const RATE_LIMIT_MARKERS: &[&str] = &["rate limit"];
const BUSY_MARKERS: &[&str] = &["busy"];

/// Successful, classified explorer reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ExplorerResponse {
    /// Envelope with `status == "1"`; carries `result`.
    Records(Value),
    /// Envelope with `status == "0"` and a "no records found" message. Not an error.
    NoRecords,
    /// JSON-RPC style reply from `module=proxy`; carries `result`.
    Rpc(Value),
}

/// Maps an HTTP reply to a response or a typed error.
///
/// The retry-set status codes are transient before the body is looked at; 429 is a
/// rate limit; any other non-2xx is fatal. Bodies are either an explorer envelope
/// (`status`/`message`/`result`) or a JSON-RPC reply (`result` or `error`).
pub fn classify_response(
    http_status: u16,
    body: &str,
    retry_status_codes: &[u16],
) -> Result<ExplorerResponse, ExplorerError> {
    if retry_status_codes.contains(&http_status) {
        return Err(ExplorerError::Network(format!(
            "HTTP {}: {}",
            http_status,
            truncate_for_log(body, 200)
        )));
    }
    if http_status == 429 {
        return Err(ExplorerError::RateLimited(format!(
            "HTTP 429: {}",
            truncate_for_log(body, 200)
        )));
    }
    if !(200..300).contains(&http_status) {
        return Err(ExplorerError::HttpStatus {
            status: http_status,
            body: truncate_for_log(body, 200),
        });
    }

    let data: Value = serde_json::from_str(body).map_err(|e| {
        ExplorerError::MalformedResponse(format!("{}: {}", e, truncate_for_log(body, 200)))
    })?;

    if let Some(status) = data.get("status") {
        let message = data.get("message").and_then(Value::as_str).unwrap_or_default();
        let result = data.get("result").cloned().unwrap_or(Value::Null);
        return match value_as_text(status).as_str() {
            "1" => Ok(ExplorerResponse::Records(result)),
            "0" => {
                // El texto útil suele venir en `result` con message = "NOTOK"
                let detail = match &result {
                    Value::String(s) => format!("{} {}", message, s),
                    _ => message.to_string(),
                };
                let lowered = detail.to_lowercase();
                if NO_RECORDS_MARKERS.iter().any(|m| lowered.contains(m)) {
                    Ok(ExplorerResponse::NoRecords)
                } else {
                    Err(classify_failure_text(&detail))
                }
            }
            other => Err(ExplorerError::MalformedResponse(format!(
                "unexpected status {:?}: {}",
                other,
                truncate_for_log(body, 200)
            ))),
        };
    }

    if let Some(error) = data.get("error").filter(|e| !e.is_null()) {
        let detail = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(classify_failure_text(&detail));
    }

    match data.get("result") {
        Some(result) => Ok(ExplorerResponse::Rpc(result.clone())),
        None => Err(ExplorerError::MalformedResponse(format!(
            "no status/result/error: {}",
            truncate_for_log(body, 200)
        ))),
    }
}

/// Marker table for explorer-reported failures. Upstream wording changes land here only.
fn classify_failure_text(detail: &str) -> ExplorerError {
    let lowered = detail.to_lowercase();
    let text = detail.trim().to_string();
    if QUERY_TIMEOUT_MARKERS.iter().any(|m| lowered.contains(m)) {
        ExplorerError::QueryTooLarge(text)
    } else if RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m)) {
        ExplorerError::RateLimited(text)
    } else if BUSY_MARKERS.iter().any(|m| lowered.contains(m)) {
        ExplorerError::Network(text)
    } else {
        ExplorerError::Api(text)
    }
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// `base * 2^min(attempt, 6)` plus `jitter_unit * 0.25 * backoff`, `jitter_unit` in `[0, 1)`.
pub fn backoff_delay(base: Duration, attempt: u32, jitter_unit: f64) -> Duration {
    let backoff = base * 2u32.pow(attempt.min(MAX_BACKOFF_EXPONENT));
    backoff + backoff.mul_f64(JITTER_FRACTION * jitter_unit.clamp(0.0, 1.0))
}

/// How a request treats rate limits and oversized queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestMode {
    /// Surface them to the caller (log pages).
    Surface,
    /// Cooldown on rate limits, backoff on query timeouts.
    Absorb,
}

/// Per-request retry bookkeeping; dropped once the request completes.
#[derive(Debug, Default)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error: Option<ExplorerError>,
}

impl RetryState {
    fn record(&mut self, error: ExplorerError) {
        self.attempt += 1;
        self.last_error = Some(error);
    }

    fn exhausted(self, action: &str) -> ExplorerError {
        ExplorerError::RetriesExhausted {
            action: action.to_string(),
            attempts: self.attempt,
            last: Box::new(
                self.last_error
                    .unwrap_or_else(|| ExplorerError::Api("no attempt recorded".to_string())),
            ),
        }
    }
}

/// Explorer API client. Cheap to share by reference; holds no per-request state.
pub struct ExplorerClient {
    transport: Arc<dyn Transport>,
    pacer: Arc<dyn Pacer>,
    settings: ExplorerSettings,
}

impl ExplorerClient {
    /// Production client: `reqwest` transport and real sleeps.
    pub fn new(settings: &ExplorerSettings) -> Result<Self, ExplorerError> {
        let transport = HttpTransport::new(
            &settings.api_url,
            settings.connect_timeout(),
            settings.read_timeout(),
        )?;
        Ok(Self::with_transport(
            settings.clone(),
            Arc::new(transport),
            Arc::new(TokioPacer),
        ))
    }

    pub fn with_transport(
        settings: ExplorerSettings,
        transport: Arc<dyn Transport>,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            transport,
            pacer,
            settings,
        }
    }

    pub fn settings(&self) -> &ExplorerSettings {
        &self.settings
    }

    pub fn pacer(&self) -> &dyn Pacer {
        self.pacer.as_ref()
    }

    /// One page of `module=logs&action=getLogs`. An empty page means no (more) logs.
    ///
    /// Rate limits and query timeouts come back as `RateLimited` / `QueryTooLarge`.
    pub async fn get_logs_page(
        &self,
        filter: &LogFilter,
        range: BlockRange,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawLogEntry>, ExplorerError> {
        let params = vec![
            ("module", "logs".to_string()),
            ("action", "getLogs".to_string()),
            ("address", address_to_string(filter.address)),
            ("fromBlock", range.from_block().to_string()),
            ("toBlock", range.to_block().to_string()),
            ("topic0", h256_to_string(filter.topic0)),
            ("page", page.to_string()),
            ("offset", page_size.to_string()),
        ];
        match self.request(params, RequestMode::Surface).await? {
            ExplorerResponse::NoRecords => Ok(Vec::new()),
            ExplorerResponse::Records(Value::Array(rows)) => {
                rows.iter().map(RawLogEntry::from_json).collect()
            }
            other => Err(ExplorerError::MalformedResponse(format!(
                "getLogs {} page {}: expected an array, got {:?}",
                range, page, other
            ))),
        }
    }

    /// Read-only `eth_call` against `latest`. Returns the raw return data.
    pub async fn eth_call(&self, to: Address, calldata: &[u8]) -> Result<Bytes, ExplorerError> {
        let params = vec![
            ("module", "proxy".to_string()),
            ("action", "eth_call".to_string()),
            ("to", address_to_string(to)),
            ("data", format!("0x{}", hex::encode(calldata))),
            ("tag", "latest".to_string()),
        ];
        let response = self.request(params, RequestMode::Absorb).await?;
        let raw = rpc_hex_result(&response, "eth_call")?;
        Ok(parse_hex_bytes(&raw)?)
    }

    /// Block in which `contract` was deployed (`getcontractcreation`).
    pub async fn contract_creation_block(&self, contract: Address) -> Result<u64, ExplorerError> {
        let params = vec![
            ("module", "contract".to_string()),
            ("action", "getcontractcreation".to_string()),
            ("contractaddresses", address_to_string(contract)),
        ];
        let response = self.request(params, RequestMode::Absorb).await?;
        let block = match &response {
            ExplorerResponse::Records(Value::Array(rows)) => rows
                .first()
                .and_then(|row| row.get("blockNumber"))
                .map(value_as_text),
            _ => None,
        };
        match block {
            Some(raw) => Ok(parse_quantity(&raw)?),
            None => Err(ExplorerError::Api(format!(
                "Could not get creation block for {:?}: {:?}",
                contract, response
            ))),
        }
    }

    /// Latest block number (`eth_blockNumber`).
    pub async fn latest_block_number(&self) -> Result<u64, ExplorerError> {
        let params = vec![
            ("module", "proxy".to_string()),
            ("action", "eth_blockNumber".to_string()),
        ];
        let response = self.request(params, RequestMode::Absorb).await?;
        let raw = rpc_hex_result(&response, "eth_blockNumber")?;
        Ok(parse_quantity(&raw)?)
    }

    fn build_query(&self, params: Vec<(&'static str, String)>) -> Vec<(String, String)> {
        let mut query: Vec<(String, String)> = params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        query.push(("apikey".to_string(), self.settings.api_key.clone()));
        query.push(("chainid".to_string(), self.settings.chain_id.to_string()));
        query
    }

    async fn attempt(&self, query: &[(String, String)]) -> Result<ExplorerResponse, ExplorerError> {
        let reply = self.transport.get(query).await?;
        classify_response(reply.status, &reply.body, &self.settings.retry_status_codes)
    }

    async fn request(
        &self,
        params: Vec<(&'static str, String)>,
        mode: RequestMode,
    ) -> Result<ExplorerResponse, ExplorerError> {
        let action = describe_action(&params);
        let query = self.build_query(params);
        let max_attempts = self.settings.max_retries.max(1);
        let mut retry = RetryState::default();
        let mut rate_limit_waits: u32 = 0;

        loop {
            let error = match self.attempt(&query).await {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            match (error.kind(), mode) {
                (ErrorKind::TransientRateLimit, RequestMode::Absorb) => {
                    rate_limit_waits += 1;
                    if rate_limit_waits > self.settings.max_rate_limit_waits {
                        return Err(ExplorerError::RetriesExhausted {
                            action,
                            attempts: rate_limit_waits,
                            last: Box::new(error),
                        });
                    }
                    warn!(
                        "⚠️ [ExplorerClient] {} rate-limited (wait {}/{}); cooling down {:?}",
                        action,
                        rate_limit_waits,
                        self.settings.max_rate_limit_waits,
                        self.settings.rate_limit_cooldown()
                    );
                    self.pacer
                        .pause(
                            PauseReason::RateLimitCooldown,
                            self.settings.rate_limit_cooldown(),
                        )
                        .await;
                }
                (ErrorKind::TransientNetwork, _)
                | (ErrorKind::TransientRangeTooLarge, RequestMode::Absorb) => {
                    warn!(
                        "⚠️ [ExplorerClient] {} failed (attempt {}/{}): {}",
                        action,
                        retry.attempt + 1,
                        max_attempts,
                        error
                    );
                    let delay = backoff_delay(
                        self.settings.backoff_base(),
                        retry.attempt,
                        rand::thread_rng().gen::<f64>(),
                    );
                    retry.record(error);
                    if retry.attempt >= max_attempts {
                        return Err(retry.exhausted(&action));
                    }
                    debug!("[ExplorerClient] {} backing off {:?}", action, delay);
                    self.pacer.pause(PauseReason::Backoff, delay).await;
                }
                _ => return Err(error),
            }
        }
    }
}

fn describe_action(params: &[(&'static str, String)]) -> String {
    let find = |key: &str| {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
            .unwrap_or("?")
    };
    format!("{}/{}", find("module"), find("action"))
}

fn rpc_hex_result(response: &ExplorerResponse, action: &str) -> Result<String, ExplorerError> {
    let result = match response {
        ExplorerResponse::Rpc(v) | ExplorerResponse::Records(v) => v,
        ExplorerResponse::NoRecords => {
            return Err(ExplorerError::MalformedResponse(format!(
                "Unexpected {} response: no records",
                action
            )))
        }
    };
    match result.as_str() {
        Some(s) if s.starts_with("0x") => Ok(s.to_string()),
        _ => Err(ExplorerError::MalformedResponse(format!(
            "Unexpected {} response: {}",
            action, result
        ))),
    }
}
