// Pool Event Extractor - convierte logs PoolCreated crudos en eventos tipados
// vAMM/sAMM: PoolCreated(address indexed,address indexed,bool indexed,address,uint256)
// CL (SlipStream): PoolCreated(address indexed,address indexed,int24 indexed,address) + fee vía tickSpacingToFee

use ethers::types::{Address, H256, U256};
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::abi_codec::{
    self, checksum, decode_topic_address, decode_topic_bool, decode_topic_int24,
    decode_uint256, decode_word_address, UINT24_MAX,
};
use crate::cache::TickFeeCache;
use crate::error::ExplorerError;
use crate::explorer_client::ExplorerClient;
use crate::types::conversions::h256_to_string;
use crate::types::RawLogEntry;

pub const CONSTANT_PRODUCT_POOL_CREATED: &str =
    "PoolCreated(address,address,bool,address,uint256)";
pub const CONCENTRATED_POOL_CREATED: &str = "PoolCreated(address,address,int24,address)";
pub const TICK_SPACING_TO_FEE: &str = "tickSpacingToFee(int24)";

/// Constant-product (volatile or stable) pool creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstantProductPool {
    #[serde(serialize_with = "serialize_checksum")]
    pub pool: Address,
    #[serde(serialize_with = "serialize_checksum")]
    pub token0: Address,
    #[serde(serialize_with = "serialize_checksum")]
    pub token1: Address,
    pub stable: bool,
    pub created_block: u64,
    #[serde(serialize_with = "serialize_hash")]
    pub tx_hash: H256,
}

/// Concentrated-liquidity pool creation, fee already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcentratedLiquidityPool {
    #[serde(serialize_with = "serialize_checksum")]
    pub pool: Address,
    #[serde(serialize_with = "serialize_checksum")]
    pub token0: Address,
    #[serde(serialize_with = "serialize_checksum")]
    pub token1: Address,
    pub tick_spacing: i32,
    pub fee: u32,
    pub created_block: u64,
    #[serde(serialize_with = "serialize_hash")]
    pub tx_hash: H256,
}

/// Closed set of records the materializer produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "pool_type")]
pub enum DecodedEvent {
    #[serde(rename = "vamm")]
    ConstantProduct(ConstantProductPool),
    #[serde(rename = "cl")]
    ConcentratedLiquidity(ConcentratedLiquidityPool),
}

impl DecodedEvent {
    /// Identity key for dedup.
    pub fn pool(&self) -> Address {
        match self {
            DecodedEvent::ConstantProduct(p) => p.pool,
            DecodedEvent::ConcentratedLiquidity(p) => p.pool,
        }
    }

    pub fn tokens(&self) -> (Address, Address) {
        match self {
            DecodedEvent::ConstantProduct(p) => (p.token0, p.token1),
            DecodedEvent::ConcentratedLiquidity(p) => (p.token0, p.token1),
        }
    }

    pub fn created_block(&self) -> u64 {
        match self {
            DecodedEvent::ConstantProduct(p) => p.created_block,
            DecodedEvent::ConcentratedLiquidity(p) => p.created_block,
        }
    }

    pub fn pool_type(&self) -> &'static str {
        match self {
            DecodedEvent::ConstantProduct(_) => "vamm",
            DecodedEvent::ConcentratedLiquidity(_) => "cl",
        }
    }
}

fn serialize_checksum<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&checksum(address))
}

fn serialize_hash<S: Serializer>(hash: &H256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&h256_to_string(*hash))
}

/// Topic0 values recognised by the materializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolEventTopics {
    pub constant_product: H256,
    pub concentrated_liquidity: H256,
}

impl Default for PoolEventTopics {
    fn default() -> Self {
        Self {
            constant_product: abi_codec::event_topic(CONSTANT_PRODUCT_POOL_CREATED),
            concentrated_liquidity: abi_codec::event_topic(CONCENTRATED_POOL_CREATED),
        }
    }
}

fn require_shape(log: &RawLogEntry, topics: usize, words: usize) -> Result<(), ExplorerError> {
    if log.topics.len() < topics || log.data.len() < words * 32 {
        return Err(ExplorerError::MalformedResponse(format!(
            "PoolCreated log in tx {} has {} topics and {} data bytes (need {} and {})",
            h256_to_string(log.transaction_hash),
            log.topics.len(),
            log.data.len(),
            topics,
            words * 32
        )));
    }
    Ok(())
}

fn pool_from_data(log: &RawLogEntry) -> Result<Address, ExplorerError> {
    // El pool va en la primera palabra de `data` en ambos eventos
    decode_word_address(log.data.as_ref(), 0).ok_or_else(|| {
        ExplorerError::MalformedResponse(format!(
            "PoolCreated log in tx {} has no pool word",
            h256_to_string(log.transaction_hash)
        ))
    })
}

/// Decodes a constant-product `PoolCreated` log (4 topics, `pool` + `uint256` in data).
pub fn decode_constant_product(log: &RawLogEntry) -> Result<ConstantProductPool, ExplorerError> {
    require_shape(log, 4, 1)?;
    Ok(ConstantProductPool {
        pool: pool_from_data(log)?,
        token0: decode_topic_address(&log.topics[1]),
        token1: decode_topic_address(&log.topics[2]),
        stable: decode_topic_bool(&log.topics[3]),
        created_block: log.block_number,
        tx_hash: log.transaction_hash,
    })
}

/// Tick spacing carried in topic 3 of a concentrated-liquidity `PoolCreated` log.
pub fn concentrated_tick_spacing(log: &RawLogEntry) -> Result<i32, ExplorerError> {
    require_shape(log, 4, 1)?;
    Ok(decode_topic_int24(&log.topics[3]))
}

/// Decodes a concentrated-liquidity `PoolCreated` log given its resolved fee.
pub fn decode_concentrated_liquidity(
    log: &RawLogEntry,
    fee: u32,
) -> Result<ConcentratedLiquidityPool, ExplorerError> {
    let tick_spacing = concentrated_tick_spacing(log)?;
    Ok(ConcentratedLiquidityPool {
        pool: pool_from_data(log)?,
        token0: decode_topic_address(&log.topics[1]),
        token1: decode_topic_address(&log.topics[2]),
        tick_spacing,
        fee,
        created_block: log.block_number,
        tx_hash: log.transaction_hash,
    })
}

/// Turns scanned logs into [`DecodedEvent`]s, resolving CL fees through the explorer.
pub struct PoolEventExtractor<'a> {
    client: &'a ExplorerClient,
    topics: PoolEventTopics,
}

impl<'a> PoolEventExtractor<'a> {
    pub fn new(client: &'a ExplorerClient) -> Self {
        Self::with_topics(client, PoolEventTopics::default())
    }

    pub fn with_topics(client: &'a ExplorerClient, topics: PoolEventTopics) -> Self {
        Self { client, topics }
    }

    pub fn topics(&self) -> &PoolEventTopics {
        &self.topics
    }

    /// `Ok(None)` for logs whose topic0 is not a known pool-creation event.
    pub async fn materialize(
        &self,
        log: &RawLogEntry,
        fees: &mut TickFeeCache,
    ) -> Result<Option<DecodedEvent>, ExplorerError> {
        let topic0 = match log.topic0() {
            Some(t) => *t,
            None => return Ok(None),
        };

        if topic0 == self.topics.constant_product {
            let event = decode_constant_product(log)?;
            debug!(
                "🔍 [EventExtractor] vAMM pool {:?} (stable={}) at block {}",
                event.pool, event.stable, event.created_block
            );
            return Ok(Some(DecodedEvent::ConstantProduct(event)));
        }

        if topic0 == self.topics.concentrated_liquidity {
            let tick_spacing = concentrated_tick_spacing(log)?;
            // La factory que emitió el log es la que conoce tickSpacingToFee
            let fee = self.resolve_fee(log.address, tick_spacing, fees).await?;
            let event = decode_concentrated_liquidity(log, fee)?;
            debug!(
                "🔍 [EventExtractor] CL pool {:?} (tickSpacing={}, fee={}) at block {}",
                event.pool, event.tick_spacing, event.fee, event.created_block
            );
            return Ok(Some(DecodedEvent::ConcentratedLiquidity(event)));
        }

        Ok(None)
    }

    /// Fee for `tick_spacing`, from the cache or via `tickSpacingToFee(int24)` on `factory`.
    pub async fn resolve_fee(
        &self,
        factory: Address,
        tick_spacing: i32,
        fees: &mut TickFeeCache,
    ) -> Result<u32, ExplorerError> {
        if let Some(fee) = fees.get(tick_spacing) {
            return Ok(fee);
        }

        let calldata = abi_codec::encode_call_int24(TICK_SPACING_TO_FEE, tick_spacing)?;
        let ret = self.client.eth_call(factory, &calldata).await?;
        let value = decode_uint256(ret.as_ref()).ok_or_else(|| {
            ExplorerError::MalformedResponse(format!(
                "tickSpacingToFee({}) returned {} bytes",
                tick_spacing,
                ret.len()
            ))
        })?;
        if value > U256::from(UINT24_MAX) {
            return Err(ExplorerError::MalformedResponse(format!(
                "tickSpacingToFee({}) returned {} (not a uint24)",
                tick_spacing, value
            )));
        }

        let fee = fees.insert(tick_spacing, value.as_u32());
        info!(
            "✅ [EventExtractor] tickSpacing {} -> fee {} (cached {} spacings)",
            tick_spacing,
            fee,
            fees.len()
        );
        Ok(fee)
    }
}
