use config::{Config, ConfigError, Environment, File, FileFormat};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Explorer {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Normalmente viene de ETHERSCAN_API_KEY (.env), no del TOML
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_read_timeout_seconds")]
    pub read_timeout_seconds: u64,
    /// Total attempts for one logical request (first try included).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_rate_limit_cooldown_ms")]
    pub rate_limit_cooldown_ms: u64,
    /// Cooldown waits allowed for one request before giving up. Not shared with `max_retries`.
    #[serde(default = "default_max_rate_limit_waits")]
    pub max_rate_limit_waits: u32,
    #[serde(default = "default_retry_status_codes")]
    pub retry_status_codes: Vec<u16>,
}

fn default_api_url() -> String {
    "https://api.etherscan.io/v2/api".to_string()
}
fn default_chain_id() -> u64 {
    8453 // Base mainnet
}
fn default_connect_timeout_seconds() -> u64 {
    10
}
fn default_read_timeout_seconds() -> u64 {
    60
}
fn default_max_retries() -> u32 {
    8
}
fn default_backoff_base_ms() -> u64 {
    800
}
fn default_rate_limit_cooldown_ms() -> u64 {
    1500
}
fn default_max_rate_limit_waits() -> u32 {
    50
}
fn default_retry_status_codes() -> Vec<u16> {
    vec![502, 503, 504, 520, 521, 522] // 52x: errores de Cloudflare delante del explorer
}

impl Default for Explorer {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            chain_id: default_chain_id(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            read_timeout_seconds: default_read_timeout_seconds(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            rate_limit_cooldown_ms: default_rate_limit_cooldown_ms(),
            max_rate_limit_waits: default_max_rate_limit_waits(),
            retry_status_codes: default_retry_status_codes(),
        }
    }
}

impl Explorer {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_seconds)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Scanner {
    /// Pre-partition size for long scans. Only bounds response size and progress granularity.
    #[serde(default = "default_window_size")]
    pub window_size: u64,
    /// Ranges with `to - from <= min_span` are not bisected further.
    #[serde(default = "default_min_span")]
    pub min_span: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_courtesy_delay_ms")]
    pub courtesy_delay_ms: u64,
}

fn default_window_size() -> u64 {
    50_000
}
fn default_min_span() -> u64 {
    1_000
}
fn default_page_size() -> u32 {
    1_000
}
fn default_courtesy_delay_ms() -> u64 {
    210 // ~5 req/s, límite del plan free
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            min_span: default_min_span(),
            page_size: default_page_size(),
            courtesy_delay_ms: default_courtesy_delay_ms(),
        }
    }
}

impl Scanner {
    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Factories {
    /// vAMM/sAMM pool factory; empty string disables it.
    #[serde(default = "default_constant_product_factory")]
    pub constant_product: String,
    /// SlipStream CLFactory; empty string disables it.
    #[serde(default = "default_concentrated_factory")]
    pub concentrated_liquidity: String,
}

fn default_constant_product_factory() -> String {
    "0x420dd381b31aef6683db6b902084cb0ffece40da".to_string() // Aerodrome PoolFactory (Base)
}
fn default_concentrated_factory() -> String {
    "0x5e7bb104d84c7cb9b682aac2f3d509f5f406809a".to_string() // Aerodrome CLFactory (Base)
}

impl Default for Factories {
    fn default() -> Self {
        Self {
            constant_product: default_constant_product_factory(),
            concentrated_liquidity: default_concentrated_factory(),
        }
    }
}

impl Factories {
    pub fn constant_product_address(&self) -> Result<Option<Address>, ConfigError> {
        parse_optional_address("factories.constant_product", &self.constant_product)
    }

    pub fn concentrated_liquidity_address(&self) -> Result<Option<Address>, ConfigError> {
        parse_optional_address(
            "factories.concentrated_liquidity",
            &self.concentrated_liquidity,
        )
    }
}

fn parse_optional_address(field: &str, raw: &str) -> Result<Option<Address>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Address::from_str(trimmed)
        .map(Some)
        .map_err(|e| ConfigError::Message(format!("{}: invalid address {}: {}", field, trimmed, e)))
}

/// `0` means "resolve automatically" for both bounds.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Range {
    #[serde(default)]
    pub start_block: u64,
    #[serde(default)]
    pub end_block: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Tokens {
    #[serde(default = "default_lookup_delay_ms")]
    pub lookup_delay_ms: u64,
    #[serde(default = "default_token_cache_path")]
    pub cache_path: String,
}

fn default_lookup_delay_ms() -> u64 {
    50
}
fn default_token_cache_path() -> String {
    "token_cache.json".to_string()
}

impl Default for Tokens {
    fn default() -> Self {
        Self {
            lookup_delay_ms: default_lookup_delay_ms(),
            cache_path: default_token_cache_path(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub explorer: Explorer,
    #[serde(default)]
    pub scanner: Scanner,
    #[serde(default)]
    pub factories: Factories,
    #[serde(default)]
    pub range: Range,
    #[serde(default)]
    pub tokens: Tokens,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_path("Config.toml")
    }

    /// Loads `path` (optional), then `INDEXER__SECTION__KEY` env overrides, then
    /// `ETHERSCAN_API_KEY`.
    pub fn from_path(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::new(path, FileFormat::Toml).required(false))
            .add_source(
                Environment::with_prefix("INDEXER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        if let Ok(key) = env::var("ETHERSCAN_API_KEY") {
            let trimmed = key.trim();
            if !trimmed.is_empty() {
                settings.explorer.api_key = trimmed.to_string();
            }
        }

        Ok(settings)
    }

    /// Parses settings from an in-memory TOML document, without env overrides.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        url::Url::parse(&self.explorer.api_url).map_err(|e| {
            ConfigError::Message(format!(
                "explorer.api_url: invalid URL {}: {}",
                self.explorer.api_url, e
            ))
        })?;
        if self.explorer.api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "Missing explorer API key (set ETHERSCAN_API_KEY in .env or explorer.api_key)"
                    .to_string(),
            ));
        }
        if self.explorer.max_retries == 0 {
            return Err(ConfigError::Message(
                "explorer.max_retries must be at least 1".to_string(),
            ));
        }
        if self.scanner.page_size == 0 {
            return Err(ConfigError::Message(
                "scanner.page_size must be positive".to_string(),
            ));
        }
        if self.scanner.window_size == 0 {
            return Err(ConfigError::Message(
                "scanner.window_size must be positive".to_string(),
            ));
        }
        self.factories.constant_product_address()?;
        self.factories.concentrated_liquidity_address()?;
        if self.range.start_block > 0
            && self.range.end_block > 0
            && self.range.end_block < self.range.start_block
        {
            return Err(ConfigError::Message(format!(
                "range.end_block ({}) < range.start_block ({})",
                self.range.end_block, self.range.start_block
            )));
        }
        Ok(())
    }
}
