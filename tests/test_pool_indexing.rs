//! Integration tests for pool indexing
//!
//! Tests cover:
//! - PoolCreated materialization (vAMM + CL) and the tick-spacing fee cache
//! - Window-by-window orchestration over both factories, then dedup
//! - Start/end block discovery
//! - Token metadata enrichment with fallbacks and the JSON cache

mod common;

use common::*;
use ethers::types::{Address, H256};
use mig_pool_indexer::abi_codec::{encode_int24, selector};
use mig_pool_indexer::cache::TickFeeCache;
use mig_pool_indexer::normalization::dedupe_by_pool;
use mig_pool_indexer::pool_event_extractor::{
    ConstantProductPool, PoolEventExtractor, PoolEventTopics,
};
use mig_pool_indexer::settings::Tokens as TokenSettings;
use mig_pool_indexer::token_enricher::TokenEnricher;
use mig_pool_indexer::transport::PauseReason;
use mig_pool_indexer::{BlockRange, DecodedEvent, ExplorerError, PoolIndexer, RawLogEntry};
use std::str::FromStr;

fn vamm_factory() -> Address {
    Address::from_str("0x420dd381b31aef6683db6b902084cb0ffece40da").unwrap()
}

fn cl_factory() -> Address {
    Address::from_str("0x5e7bb104d84c7cb9b682aac2f3d509f5f406809a").unwrap()
}

fn weth() -> Address {
    Address::from_str("0x4200000000000000000000000000000000000006").unwrap()
}

fn usdc() -> Address {
    Address::from_str("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913").unwrap()
}

fn vamm_row(pool: Address, stable: bool, block: u64) -> serde_json::Value {
    let mut data = address_topic(pool).as_bytes().to_vec();
    data.extend(uint_word(block)); // allPools.length, ignorado
    log_row(
        vamm_factory(),
        &[
            PoolEventTopics::default().constant_product,
            address_topic(weth()),
            address_topic(usdc()),
            H256::from_low_u64_be(stable as u64),
        ],
        &data,
        block,
        H256::from_low_u64_be(block),
        0,
    )
}

fn cl_row(pool: Address, tick_spacing: i32, block: u64) -> serde_json::Value {
    log_row(
        cl_factory(),
        &[
            PoolEventTopics::default().concentrated_liquidity,
            address_topic(weth()),
            address_topic(usdc()),
            H256::from(encode_int24(tick_spacing).unwrap()),
        ],
        address_topic(pool).as_bytes(),
        block,
        H256::from_low_u64_be(block + 1),
        1,
    )
}

fn raw(row: serde_json::Value) -> RawLogEntry {
    RawLogEntry::from_json(&row).unwrap()
}

fn fee_selector_hex() -> String {
    format!("0x{}", hex::encode(selector("tickSpacingToFee(int24)")))
}

/// Fake explorer: getLogs filtered by address and block range, fee lookups answered with `fee`.
fn fake_explorer(
    vamm: Vec<(u64, serde_json::Value)>,
    cl: Vec<(u64, serde_json::Value)>,
    fee: u64,
) -> std::sync::Arc<FnTransport> {
    let vamm_address = format!("{:?}", vamm_factory());
    FnTransport::new(move |q| match param(q, "action") {
        Some("getLogs") => {
            let from = param_u64(q, "fromBlock");
            let to = param_u64(q, "toBlock");
            let source = if param(q, "address") == Some(vamm_address.as_str()) {
                &vamm
            } else {
                &cl
            };
            logs_page(
                source
                    .iter()
                    .filter(|(b, _)| (from..=to).contains(b))
                    .map(|(_, row)| row.clone())
                    .collect(),
            )
        }
        Some("eth_call") => rpc_result(&uint_word(fee)),
        other => panic!("unexpected action {:?}", other),
    })
}

#[tokio::test]
async fn test_same_tick_spacing_triggers_one_fee_call() {
    let transport = fake_explorer(vec![], vec![], 500);
    let client = client(transport.clone(), RecordingPacer::new());
    let extractor = PoolEventExtractor::new(&client);
    let mut fees = TickFeeCache::new();

    let first = extractor
        .materialize(&raw(cl_row(Address::repeat_byte(1), 100, 10)), &mut fees)
        .await
        .unwrap()
        .unwrap();
    let second = extractor
        .materialize(&raw(cl_row(Address::repeat_byte(2), 100, 11)), &mut fees)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(transport.count_action("eth_call"), 1);

    for event in [&first, &second] {
        match event {
            DecodedEvent::ConcentratedLiquidity(p) => {
                assert_eq!(p.tick_spacing, 100);
                assert_eq!(p.fee, 500);
                assert_eq!(p.token0, weth());
                assert_eq!(p.token1, usdc());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
    assert_eq!(first.pool(), Address::repeat_byte(1));

    // Nueva tickSpacing negativa: otra llamada, calldata en complemento a dos
    extractor
        .materialize(&raw(cl_row(Address::repeat_byte(3), -1, 12)), &mut fees)
        .await
        .unwrap();
    assert_eq!(transport.count_action("eth_call"), 2);
    let queries = transport.queries();
    let call = queries
        .iter()
        .rev()
        .find(|q| param(q, "action") == Some("eth_call"))
        .unwrap();
    assert_eq!(
        param(call, "data").unwrap(),
        format!("{}{}", fee_selector_hex(), "ff".repeat(32))
    );
    assert_eq!(param(call, "to").unwrap(), format!("{:?}", cl_factory()));
    assert_eq!(fees.iter().collect::<Vec<_>>(), vec![(-1, 500), (100, 500)]);
}

#[tokio::test]
async fn test_unknown_topic_is_ignored_without_requests() {
    let transport = fake_explorer(vec![], vec![], 500);
    let client = client(transport.clone(), RecordingPacer::new());
    let extractor = PoolEventExtractor::new(&client);
    let mut fees = TickFeeCache::new();

    let log = raw(filler_row(5, 0));
    assert!(extractor.materialize(&log, &mut fees).await.unwrap().is_none());
    assert!(transport.queries().is_empty());
    assert!(fees.is_empty());
}

#[tokio::test]
async fn test_fee_wider_than_uint24_is_rejected() {
    let transport = fake_explorer(vec![], vec![], 1 << 24);
    let client = client(transport, RecordingPacer::new());
    let extractor = PoolEventExtractor::new(&client);
    let mut fees = TickFeeCache::new();

    let err = extractor
        .materialize(&raw(cl_row(Address::repeat_byte(1), 200, 10)), &mut fees)
        .await
        .unwrap_err();
    assert!(matches!(err, ExplorerError::MalformedResponse(_)));
    assert!(fees.is_empty());
}

#[tokio::test]
async fn test_indexer_scans_windows_and_factories_in_order() {
    let p1 = Address::repeat_byte(0x01);
    let p2 = Address::repeat_byte(0x02);
    let p3 = Address::repeat_byte(0x03);
    let transport = fake_explorer(
        vec![(10, vamm_row(p1, false, 10)), (60, vamm_row(p2, true, 60))],
        vec![(20, cl_row(p3, 100, 20)), (70, cl_row(p3, 100, 70))],
        500,
    );
    let pacer = RecordingPacer::new();
    let client = client(transport.clone(), pacer);
    let indexer = PoolIndexer::with_factories(
        &client,
        scanner_settings(1000, 1000, 50),
        Some(vamm_factory()),
        Some(cl_factory()),
    );

    let report = indexer.run(BlockRange::new(0, 99).unwrap()).await.unwrap();

    let pools: Vec<Address> = report.events.iter().map(DecodedEvent::pool).collect();
    assert_eq!(pools, vec![p1, p3, p2, p3]);
    assert_eq!(report.windows, 2);
    assert_eq!(report.constant_product_count, 2);
    assert_eq!(report.concentrated_count, 2);
    assert_eq!(report.tick_fees.get(100), Some(500));
    assert_eq!(report.stats.requests, 4);
    assert_eq!(report.stats.logs, 4);
    assert_eq!(transport.count_action("eth_call"), 1);

    match &report.events[2] {
        DecodedEvent::ConstantProduct(p) => {
            assert!(p.stable);
            assert_eq!(p.created_block, 60);
        }
        other => panic!("unexpected event {:?}", other),
    }

    let unique = dedupe_by_pool(report.events);
    let pools: Vec<Address> = unique.iter().map(DecodedEvent::pool).collect();
    assert_eq!(pools, vec![p1, p3, p2]);
    assert_eq!(unique[1].created_block(), 20, "first occurrence wins");
}

#[tokio::test]
async fn test_indexer_fails_loudly_when_a_window_cannot_complete() {
    let transport = ScriptedTransport::new(vec![query_timeout()]);
    let client = client(transport, RecordingPacer::new());
    let indexer = PoolIndexer::with_factories(
        &client,
        scanner_settings(1000, 1000, 500),
        Some(vamm_factory()),
        None,
    );

    let err = indexer
        .run(BlockRange::new(0, 499).unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ExplorerError::RangeUnsplittable { .. }));
}

#[tokio::test]
async fn test_resolve_range_discovers_bounds() {
    let vamm_address = format!("{:?}", vamm_factory());
    let transport = FnTransport::new(move |q| match param(q, "action") {
        Some("getcontractcreation") => {
            if param(q, "contractaddresses") == Some(vamm_address.as_str()) {
                creation_block(vamm_factory(), 3_200_934)
            } else {
                creation_block(cl_factory(), 13_843_704)
            }
        }
        Some("eth_blockNumber") => rpc_result(&20_000_000u64.to_be_bytes()),
        other => panic!("unexpected action {:?}", other),
    });
    let client = client(transport.clone(), RecordingPacer::new());
    let indexer = PoolIndexer::with_factories(
        &client,
        scanner_settings(1000, 1000, 50_000),
        Some(vamm_factory()),
        Some(cl_factory()),
    );

    let range = indexer.resolve_range(0, 0).await.unwrap();
    assert_eq!(range, BlockRange::new(3_200_934, 20_000_000).unwrap());
    assert_eq!(transport.count_action("getcontractcreation"), 2);

    let explicit = indexer.resolve_range(5, 10).await.unwrap();
    assert_eq!(explicit, BlockRange::new(5, 10).unwrap());
    assert_eq!(transport.queries().len(), 3, "explicit bounds need no lookups");

    assert!(matches!(
        indexer.resolve_range(30_000_000, 0).await,
        Err(ExplorerError::InvalidRange { .. })
    ));
}

fn bytes32(text: &str) -> Vec<u8> {
    let mut word = text.as_bytes().to_vec();
    word.resize(32, 0);
    word
}

fn token_explorer(odd_token: Address) -> std::sync::Arc<FnTransport> {
    let weth_address = format!("{:?}", weth());
    let odd_address = format!("{:?}", odd_token);
    let symbol = format!("0x{}", hex::encode(selector("symbol()")));
    let name = format!("0x{}", hex::encode(selector("name()")));
    FnTransport::new(move |q| {
        let to = param(q, "to").unwrap_or_default();
        let data = param(q, "data").unwrap_or_default();
        if to == weth_address {
            if data == symbol {
                rpc_result(&abi_string("WETH"))
            } else if data == name {
                rpc_result(&bytes32("Wrapped Ether"))
            } else {
                rpc_result(&uint_word(18))
            }
        } else if to == odd_address {
            if data == symbol {
                // offset fuera del payload
                let mut bad = uint_word(4096);
                bad.extend(uint_word(4));
                rpc_result(&bad)
            } else if data == name {
                rpc_error("execution reverted")
            } else {
                rpc_result(&uint_word(6))
            }
        } else {
            panic!("unexpected eth_call to {}", to)
        }
    })
}

#[tokio::test]
async fn test_token_enrichment_with_fallbacks_and_memoization() {
    let odd = Address::from_low_u64_be(0xabcd);
    let transport = token_explorer(odd);
    let pacer = RecordingPacer::new();
    let client = client(transport.clone(), pacer.clone());
    let settings = TokenSettings {
        lookup_delay_ms: 50,
        cache_path: String::new(),
    };
    let mut enricher = TokenEnricher::new(&client, &settings);

    let event = DecodedEvent::ConstantProduct(ConstantProductPool {
        pool: Address::repeat_byte(9),
        token0: weth(),
        token1: odd,
        stable: false,
        created_block: 1,
        tx_hash: H256::zero(),
    });
    let row = enricher.enrich(event.clone()).await;

    assert_eq!(row.token0_symbol, "WETH");
    assert_eq!(row.token0_name.as_deref(), Some("Wrapped Ether"));
    assert_eq!(row.token0_decimals, Some(18));
    assert_eq!(row.token1_symbol, "TKN_ABCD");
    assert_eq!(row.token1_name, None);
    assert_eq!(row.token1_decimals, Some(6));
    assert_eq!(row.pool_name, "vAMM-WETH/TKN_ABCD");
    assert_eq!(transport.count_action("eth_call"), 6);
    assert_eq!(pacer.count(PauseReason::Courtesy), 2);

    let again = enricher.enrich(event).await;
    assert_eq!(again, row);
    assert_eq!(transport.count_action("eth_call"), 6, "metadata is memoized");
    assert_eq!(enricher.lookups(), 2);
}

#[tokio::test]
async fn test_token_cache_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("token_cache.json");
    let settings = TokenSettings {
        lookup_delay_ms: 0,
        cache_path: path.to_string_lossy().into_owned(),
    };
    let odd = Address::from_low_u64_be(0xabcd);

    let transport = token_explorer(odd);
    let client_a = client(transport, RecordingPacer::new());
    let mut enricher = TokenEnricher::new(&client_a, &settings);
    enricher.metadata(weth()).await;
    enricher.save_cache().unwrap();
    assert!(path.exists());
    assert!(!dir.path().join("token_cache.json.tmp").exists());

    let transport = token_explorer(odd);
    let client_b = client(transport.clone(), RecordingPacer::new());
    let mut reloaded = TokenEnricher::new(&client_b, &settings);
    assert_eq!(reloaded.load_cache().unwrap(), 1);
    let meta = reloaded.metadata(weth()).await;
    assert_eq!(meta.symbol, "WETH");
    assert_eq!(meta.decimals, Some(18));
    assert!(transport.queries().is_empty());
}
