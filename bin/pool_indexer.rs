//! # Pool Indexer
//!
//! Indexes every vAMM/sAMM and SlipStream CL pool created by the configured factories
//! through the block-explorer API, and writes one JSON object per pool.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin pool_indexer -- --start 3200000 --end 3300000 --out pools
//! cargo run --bin pool_indexer -- --with-names --log-level debug
//! ```
//!
//! `ETHERSCAN_API_KEY` is read from the environment (or `.env`).

use anyhow::{Context, Result};
use clap::Parser;
use mig_pool_indexer::{
    normalization::{dedupe_by_pool, unique_pools},
    token_enricher::TokenEnricher,
    ExplorerClient, PoolIndexer, Settings,
};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};

#[derive(Parser, Debug)]
#[command(
    name = "pool_indexer",
    about = "Index Aerodrome vAMM/sAMM + SlipStream CL pools via the block-explorer API"
)]
struct Cli {
    /// Settings file (TOML)
    #[arg(long, default_value = "Config.toml")]
    config: String,
    /// Start block (0 = auto from factory creation)
    #[arg(long)]
    start: Option<u64>,
    /// End block (0 = latest)
    #[arg(long)]
    end: Option<u64>,
    /// Window size in blocks
    #[arg(long)]
    step: Option<u64>,
    /// Minimum span to split when the explorer times out
    #[arg(long)]
    min_span: Option<u64>,
    /// Output prefix; rows go to `<out>.jsonl`
    #[arg(long, default_value = "pools")]
    out: String,
    /// error, warn, info, debug or trace
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Read timeout in seconds (connect timeout comes from settings)
    #[arg(long)]
    http_timeout: Option<u64>,
    /// Max attempts per explorer request
    #[arg(long)]
    http_retries: Option<u32>,
    /// Resolve token symbols/names/decimals and add a pool name to every row
    #[arg(long)]
    with_names: bool,
}

fn init_logging(level: &str) {
    #[cfg(feature = "observability")]
    {
        let max_level = level
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO);
        tracing_subscriber::fmt()
            .json()
            .with_max_level(max_level)
            .init();
    }
    #[cfg(not(feature = "observability"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
            .init();
    }
}

fn write_jsonl<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let mut settings = Settings::from_path(&cli.config)?;
    if let Some(start) = cli.start {
        settings.range.start_block = start;
    }
    if let Some(end) = cli.end {
        settings.range.end_block = end;
    }
    if let Some(step) = cli.step {
        settings.scanner.window_size = step;
    }
    if let Some(min_span) = cli.min_span {
        settings.scanner.min_span = min_span;
    }
    if let Some(timeout) = cli.http_timeout {
        settings.explorer.read_timeout_seconds = timeout;
    }
    if let Some(retries) = cli.http_retries {
        settings.explorer.max_retries = retries;
    }
    settings.validate()?;
    log::info!("✅ Settings loaded from {}", cli.config);

    let client = ExplorerClient::new(&settings.explorer)?;
    let indexer = PoolIndexer::new(&client, &settings)?;

    let range = indexer
        .resolve_range(settings.range.start_block, settings.range.end_block)
        .await?;
    let report = indexer.run(range).await?;

    let events = dedupe_by_pool(report.events);
    log::info!(
        "Done. vAMM={} CL={} unique_pools={} tick_fees={:?}",
        report.constant_product_count,
        report.concentrated_count,
        unique_pools(&events),
        report.tick_fees.iter().collect::<Vec<_>>()
    );

    let jsonl_path = format!("{}.jsonl", cli.out);
    if cli.with_names {
        let mut enricher = TokenEnricher::new(&client, &settings.tokens);
        if let Err(e) = enricher.load_cache() {
            log::warn!("⚠️ Ignoring unreadable token cache: {}", e);
        }
        let total = events.len();
        let mut rows = Vec::with_capacity(total);
        for (i, event) in events.into_iter().enumerate() {
            rows.push(enricher.enrich(event).await);
            if (i + 1) % 100 == 0 {
                log::info!("Named {}/{} pools", i + 1, total);
                enricher.save_cache()?;
            }
        }
        enricher.save_cache()?;
        log::info!("Token lookups from chain: {}", enricher.lookups());
        write_jsonl(&jsonl_path, &rows)?;
    } else {
        write_jsonl(&jsonl_path, &events)?;
    }
    log::info!("Wrote {}", jsonl_path);

    Ok(())
}
