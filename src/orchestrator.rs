// Orchestrator - pipeline de indexado de pools
// Rango global -> ventanas -> (factory vAMM, factory CL) por ventana -> scanner -> materializer

use crate::cache::TickFeeCache;
use crate::error::ExplorerError;
use crate::explorer_client::ExplorerClient;
use crate::log_scanner::{LogScanner, ScanStats};
use crate::pool_event_extractor::{DecodedEvent, PoolEventExtractor, PoolEventTopics};
use crate::settings::{Scanner as ScannerSettings, Settings};
use crate::transport::PauseReason;
use crate::types::{BlockRange, LogFilter};
use ethers::types::Address;
use tracing::{debug, info};

/// One factory contract to scan for one `PoolCreated` signature.
#[derive(Debug, Clone)]
pub struct FactoryTarget {
    pub label: String,
    pub filter: LogFilter,
}

/// Everything one indexing run produced.
#[derive(Debug, Clone, Default)]
pub struct IndexReport {
    /// In scan order: per window, constant-product events first.
    pub events: Vec<DecodedEvent>,
    pub tick_fees: TickFeeCache,
    pub constant_product_count: usize,
    pub concentrated_count: usize,
    pub windows: usize,
    pub stats: ScanStats,
}

pub struct PoolIndexer<'a> {
    client: &'a ExplorerClient,
    scanner: ScannerSettings,
    targets: Vec<FactoryTarget>,
    topics: PoolEventTopics,
}

impl<'a> PoolIndexer<'a> {
    /// Indexer over the factories configured in `settings` (empty addresses skipped).
    pub fn new(client: &'a ExplorerClient, settings: &Settings) -> Result<Self, ExplorerError> {
        let constant_product = settings
            .factories
            .constant_product_address()
            .map_err(|e| ExplorerError::Init(e.to_string()))?;
        let concentrated = settings
            .factories
            .concentrated_liquidity_address()
            .map_err(|e| ExplorerError::Init(e.to_string()))?;
        Ok(Self::with_factories(
            client,
            settings.scanner.clone(),
            constant_product,
            concentrated,
        ))
    }

    pub fn with_factories(
        client: &'a ExplorerClient,
        scanner: ScannerSettings,
        constant_product: Option<Address>,
        concentrated_liquidity: Option<Address>,
    ) -> Self {
        let topics = PoolEventTopics::default();
        let mut targets = Vec::new();
        if let Some(factory) = constant_product {
            targets.push(FactoryTarget {
                label: "VAMM_FACTORY".to_string(),
                filter: LogFilter::new(factory, topics.constant_product),
            });
        }
        if let Some(factory) = concentrated_liquidity {
            targets.push(FactoryTarget {
                label: "CL_FACTORY".to_string(),
                filter: LogFilter::new(factory, topics.concentrated_liquidity),
            });
        }
        Self {
            client,
            scanner,
            targets,
            topics,
        }
    }

    pub fn targets(&self) -> &[FactoryTarget] {
        &self.targets
    }

    /// Resolves the scan range. `0` start means the earliest factory creation block,
    /// `0` end means the latest block.
    pub async fn resolve_range(&self, start: u64, end: u64) -> Result<BlockRange, ExplorerError> {
        let start = if start > 0 {
            info!("[Indexer] Using provided start_block={}", start);
            start
        } else {
            if self.targets.is_empty() {
                return Err(ExplorerError::Init(
                    "no factory configured to derive start_block from".to_string(),
                ));
            }
            let mut earliest = u64::MAX;
            for target in &self.targets {
                let block = self
                    .client
                    .contract_creation_block(target.filter.address)
                    .await?;
                info!(
                    "[Indexer] {} creation block: {} ({:?})",
                    target.label, block, target.filter.address
                );
                earliest = earliest.min(block);
            }
            info!("[Indexer] Auto start_block={} (min(factory creation blocks))", earliest);
            earliest
        };

        let end = if end > 0 {
            info!("[Indexer] Using provided end_block={}", end);
            end
        } else {
            let latest = self.client.latest_block_number().await?;
            info!("[Indexer] Auto end_block={} (latest)", latest);
            latest
        };

        BlockRange::new(start, end)
    }

    /// Scans every window of `range`, factory by factory, and materializes the logs.
    pub async fn run(&self, range: BlockRange) -> Result<IndexReport, ExplorerError> {
        let extractor = PoolEventExtractor::with_topics(self.client, self.topics);
        let windows = range.windows(self.scanner.window_size);
        let total = windows.len();
        let mut report = IndexReport {
            windows: total,
            ..IndexReport::default()
        };

        info!(
            "🚀 [Indexer] Starting scan: {} step={} ({} windows, {} factories)",
            range,
            self.scanner.window_size,
            total,
            self.targets.len()
        );

        for (i, window) in windows.into_iter().enumerate() {
            info!("=== Range {}/{} | blocks {} ===", i + 1, total, window);

            for target in &self.targets {
                // Cada scanner nuevo empieza sin pausa; la pausa entre rangos va aquí
                if report.stats.requests > 0 {
                    self.client
                        .pacer()
                        .pause(PauseReason::Courtesy, self.scanner.courtesy_delay())
                        .await;
                }
                let before = report.events.len();
                let mut scanner =
                    LogScanner::new(self.client, target.filter, window, &self.scanner)
                        .with_label(target.label.clone());

                while let Some(log) = scanner.next_log().await? {
                    if let Some(event) = extractor.materialize(&log, &mut report.tick_fees).await? {
                        match event {
                            DecodedEvent::ConstantProduct(_) => report.constant_product_count += 1,
                            DecodedEvent::ConcentratedLiquidity(_) => report.concentrated_count += 1,
                        }
                        report.events.push(event);
                    }
                }

                let stats = scanner.stats();
                report.stats.absorb(&stats);
                info!(
                    "📊 [Indexer] {} | +{} pools in this range ({} requests, {} splits)",
                    target.label,
                    report.events.len() - before,
                    stats.requests,
                    stats.splits
                );
            }

            if !report.tick_fees.is_empty() {
                debug!(
                    "[Indexer] tickSpacings cached: {:?}",
                    report.tick_fees.iter().collect::<Vec<_>>()
                );
            }
        }

        info!(
            "✅ [Indexer] Done. vAMM={} CL={} logs={} splits={} rate_limit_waits={}",
            report.constant_product_count,
            report.concentrated_count,
            report.stats.logs,
            report.stats.splits,
            report.stats.rate_limit_waits
        );
        Ok(report)
    }
}
