// Token Enricher - symbol/name/decimals vía eth_call + nombres de pool legibles
// Los fallos por token nunca abortan: el valor queda ausente y el símbolo cae a TKN_XXXX

use crate::abi_codec::{decode_string, decode_uint256};
use crate::explorer_client::ExplorerClient;
use crate::normalization::NamedPoolRow;
use crate::pool_event_extractor::DecodedEvent;
use crate::settings::Tokens as TokenSettings;
use crate::transport::PauseReason;
use crate::types::conversions::address_to_string;
use ethers::types::{Address, U256};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
pub const NAME_SELECTOR: [u8; 4] = [0x06, 0xfd, 0xde, 0x03];
pub const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

#[derive(Debug, Error)]
pub enum TokenCacheError {
    #[error("token cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("token cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// On-chain ERC-20 metadata. `symbol` is always filled (fallback when undecodable).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
}

/// `TKN_` plus the last four hex digits of the address, upper-cased.
pub fn fallback_symbol(token: Address) -> String {
    let hex = hex::encode(token.as_bytes());
    format!("TKN_{}", hex[hex.len() - 4..].to_uppercase())
}

/// `sAMM-A/B`, `vAMM-A/B` or `CL<fee>-A/B`.
pub fn pool_name(event: &DecodedEvent, symbol0: &str, symbol1: &str) -> String {
    match event {
        DecodedEvent::ConstantProduct(p) => {
            let prefix = if p.stable { "sAMM" } else { "vAMM" };
            format!("{}-{}/{}", prefix, symbol0, symbol1)
        }
        DecodedEvent::ConcentratedLiquidity(p) => {
            format!("CL{}-{}/{}", p.fee, symbol0, symbol1)
        }
    }
}

fn decimals_from(value: U256) -> Option<u8> {
    if value > U256::from(u8::MAX) {
        None
    } else {
        Some(value.as_u32() as u8)
    }
}

pub struct TokenEnricher<'a> {
    client: &'a ExplorerClient,
    lookup_delay: Duration,
    cache_path: Option<PathBuf>,
    /// Keyed by lower-case 0x address.
    cache: BTreeMap<String, TokenMetadata>,
    lookups: u64,
}

impl<'a> TokenEnricher<'a> {
    pub fn new(client: &'a ExplorerClient, settings: &TokenSettings) -> Self {
        let cache_path = if settings.cache_path.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(settings.cache_path.trim()))
        };
        Self {
            client,
            lookup_delay: Duration::from_millis(settings.lookup_delay_ms),
            cache_path,
            cache: BTreeMap::new(),
            lookups: 0,
        }
    }

    /// Tokens fetched from chain so far (cache hits excluded).
    pub fn lookups(&self) -> u64 {
        self.lookups
    }

    pub fn cached(&self, token: Address) -> Option<&TokenMetadata> {
        self.cache.get(&address_to_string(token))
    }

    /// Loads the configured cache file if it exists. Returns the number of entries.
    pub fn load_cache(&mut self) -> Result<usize, TokenCacheError> {
        let path = match &self.cache_path {
            Some(p) => p.clone(),
            None => return Ok(0),
        };
        self.load_cache_from(&path)
    }

    pub fn load_cache_from(&mut self, path: &Path) -> Result<usize, TokenCacheError> {
        if !path.exists() {
            debug!("[TokenEnricher] No cache at {}", path.display());
            return Ok(0);
        }
        let raw = fs::read_to_string(path)?;
        let entries: BTreeMap<String, TokenMetadata> = serde_json::from_str(&raw)?;
        let loaded = entries.len();
        for (key, meta) in entries {
            self.cache.insert(key.to_lowercase(), meta);
        }
        info!("✅ [TokenEnricher] Loaded {} cached tokens from {}", loaded, path.display());
        Ok(loaded)
    }

    pub fn save_cache(&self) -> Result<(), TokenCacheError> {
        match &self.cache_path {
            Some(path) => self.save_cache_to(path),
            None => Ok(()),
        }
    }

    /// Pretty JSON written to `<path>.tmp`, then renamed over `path`.
    pub fn save_cache_to(&self, path: &Path) -> Result<(), TokenCacheError> {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, serde_json::to_string_pretty(&self.cache)?)?;
        fs::rename(&tmp, path)?;
        debug!("[TokenEnricher] Saved {} tokens to {}", self.cache.len(), path.display());
        Ok(())
    }

    /// Metadata for `token`, memoized. Never fails.
    pub async fn metadata(&mut self, token: Address) -> TokenMetadata {
        let key = address_to_string(token);
        if let Some(meta) = self.cache.get(&key).filter(|m| !m.symbol.is_empty()) {
            return meta.clone();
        }

        let symbol = self.call(token, &SYMBOL_SELECTOR, "symbol").await.and_then(|r| decode_string(&r));
        let name = self.call(token, &NAME_SELECTOR, "name").await.and_then(|r| decode_string(&r));
        let decimals = self
            .call(token, &DECIMALS_SELECTOR, "decimals")
            .await
            .and_then(|r| decode_uint256(&r))
            .and_then(decimals_from);

        let meta = TokenMetadata {
            symbol: symbol.unwrap_or_else(|| fallback_symbol(token)),
            name,
            decimals,
        };
        self.lookups += 1;
        self.cache.insert(key, meta.clone());

        self.client
            .pacer()
            .pause(PauseReason::Courtesy, self.lookup_delay)
            .await;
        meta
    }

    async fn call(&self, token: Address, selector: &[u8; 4], label: &str) -> Option<Vec<u8>> {
        match self.client.eth_call(token, selector).await {
            Ok(ret) => Some(ret.to_vec()),
            Err(e) => {
                warn!("⚠️ [TokenEnricher] {}() failed for {:?}: {}", label, token, e);
                None
            }
        }
    }

    /// Attaches token metadata and a display name to a decoded pool event.
    pub async fn enrich(&mut self, event: DecodedEvent) -> NamedPoolRow {
        let (token0, token1) = event.tokens();
        let meta0 = self.metadata(token0).await;
        let meta1 = self.metadata(token1).await;
        let pool_name = pool_name(&event, &meta0.symbol, &meta1.symbol);
        NamedPoolRow {
            event,
            token0_symbol: meta0.symbol,
            token1_symbol: meta1.symbol,
            token0_name: meta0.name,
            token1_name: meta1.name,
            token0_decimals: meta0.decimals,
            token1_decimals: meta1.decimals,
            pool_name,
        }
    }
}
