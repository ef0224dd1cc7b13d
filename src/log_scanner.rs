//! # Adaptive Log Scanner
//!
//! Enumerates every log matching a [`LogFilter`] inside a block range, one page at a time.
//!
//! ## Algorithm
//!
//! - A work stack of pending [`BlockRange`]s is seeded with the caller's range (or with
//!   its windows, lowest first).
//! - The top range is paged: a page with exactly `page_size` rows means another page of
//!   the *same* range follows; a shorter page closes the range.
//! - A rate-limit reply waits a fixed cooldown and repeats the same page. It does not
//!   count as a split or as a backoff attempt.
//! - A "query timeout" reply bisects the range: `(mid + 1, to)` is pushed, then
//!   `(from, mid)`, so the lower half is scanned first. Ranges with
//!   `to - from <= min_span` are not split; the scan fails with the narrowest range.
//! - Any other error aborts the scan.
//!
//! Logs are pulled lazily through [`LogScanner::next_log`] or the stream returned by
//! [`LogScanner::into_stream`]. After a failure the scanner refuses further work; callers
//! restart with the remaining range.
//!
//! When a range times out after some of its pages were already yielded, those rows are
//! remembered and dropped (exact match) when they reappear in the halves.

use crate::error::{ErrorKind, ExplorerError};
use crate::explorer_client::ExplorerClient;
use crate::settings::Scanner as ScannerSettings;
use crate::transport::PauseReason;
use crate::types::{BlockRange, LogFilter, RawLogEntry};
use futures::Stream;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Counters for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// getLogs calls issued, rate-limited repeats included.
    pub requests: u64,
    /// Pages that returned successfully.
    pub pages: u64,
    /// Logs yielded to the caller.
    pub logs: u64,
    pub splits: u64,
    pub rate_limit_waits: u64,
    pub ranges_completed: u64,
    /// Rows dropped because they were already yielded before a split.
    pub suppressed: u64,
}

impl ScanStats {
    /// Adds another scan's counters into this one.
    pub fn absorb(&mut self, other: &ScanStats) {
        self.requests += other.requests;
        self.pages += other.pages;
        self.logs += other.logs;
        self.splits += other.splits;
        self.rate_limit_waits += other.rate_limit_waits;
        self.ranges_completed += other.ranges_completed;
        self.suppressed += other.suppressed;
    }
}

struct PageCursor {
    range: BlockRange,
    page: u32,
    /// Rows returned by earlier pages of this range.
    emitted: Vec<RawLogEntry>,
}

impl PageCursor {
    fn new(range: BlockRange) -> Self {
        Self {
            range,
            page: 1,
            emitted: Vec::new(),
        }
    }
}

pub struct LogScanner<'a> {
    client: &'a ExplorerClient,
    filter: LogFilter,
    label: String,
    page_size: u32,
    min_span: u64,
    courtesy_delay: Duration,
    pending: Vec<BlockRange>,
    cursor: Option<PageCursor>,
    buffered: VecDeque<RawLogEntry>,
    suppressed: HashSet<RawLogEntry>,
    stats: ScanStats,
    poisoned: bool,
}

impl<'a> LogScanner<'a> {
    /// Scanner over `range` as a single initial work item.
    pub fn new(
        client: &'a ExplorerClient,
        filter: LogFilter,
        range: BlockRange,
        settings: &ScannerSettings,
    ) -> Self {
        Self::with_pending(client, filter, vec![range], settings)
    }

    /// Scanner over `range` pre-partitioned into `settings.window_size` windows.
    pub fn windowed(
        client: &'a ExplorerClient,
        filter: LogFilter,
        range: BlockRange,
        settings: &ScannerSettings,
    ) -> Self {
        let mut windows = range.windows(settings.window_size);
        // La pila saca por el final: invertir para empezar por la ventana más baja
        windows.reverse();
        Self::with_pending(client, filter, windows, settings)
    }

    fn with_pending(
        client: &'a ExplorerClient,
        filter: LogFilter,
        pending: Vec<BlockRange>,
        settings: &ScannerSettings,
    ) -> Self {
        Self {
            client,
            filter,
            label: format!("{:?}", filter.address),
            page_size: settings.page_size.max(1),
            min_span: settings.min_span,
            courtesy_delay: settings.courtesy_delay(),
            pending,
            cursor: None,
            buffered: VecDeque::new(),
            suppressed: HashSet::new(),
            stats: ScanStats::default(),
            poisoned: false,
        }
    }

    /// Label used as log prefix (defaults to the contract address).
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    pub fn filter(&self) -> &LogFilter {
        &self.filter
    }

    /// Next matching log, `Ok(None)` once every range is exhausted.
    pub async fn next_log(&mut self) -> Result<Option<RawLogEntry>, ExplorerError> {
        if self.poisoned {
            return Err(ExplorerError::ScanPoisoned);
        }
        loop {
            if let Some(log) = self.buffered.pop_front() {
                return Ok(Some(log));
            }
            match self.advance().await {
                Ok(true) => continue,
                Ok(false) => return Ok(None),
                Err(e) => {
                    self.poisoned = true;
                    self.buffered.clear();
                    return Err(e);
                }
            }
        }
    }

    /// Drains the scanner into a vector.
    pub async fn collect_remaining(&mut self) -> Result<Vec<RawLogEntry>, ExplorerError> {
        let mut logs = Vec::new();
        while let Some(log) = self.next_log().await? {
            logs.push(log);
        }
        Ok(logs)
    }

    /// Stream view of the scan; ends after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<RawLogEntry, ExplorerError>> + 'a {
        futures::stream::try_unfold(self, |mut scanner| async move {
            let next = scanner.next_log().await?;
            Ok::<_, ExplorerError>(next.map(|log| (log, scanner)))
        })
    }

    /// Fetches one page. `Ok(false)` when no work is left.
    async fn advance(&mut self) -> Result<bool, ExplorerError> {
        let cursor = match self.cursor.take() {
            Some(cursor) => cursor,
            None => match self.pending.pop() {
                Some(range) => {
                    info!("📊 [Scanner] {} | getLogs range {}", self.label, range);
                    PageCursor::new(range)
                }
                None => return Ok(false),
            },
        };

        if self.stats.requests > 0 {
            self.client
                .pacer()
                .pause(PauseReason::Courtesy, self.courtesy_delay)
                .await;
        }

        let cooldown = self.client.settings().rate_limit_cooldown();
        let max_waits = self.client.settings().max_rate_limit_waits;
        let mut rate_limit_waits: u32 = 0;

        loop {
            self.stats.requests += 1;
            let error = match self
                .client
                .get_logs_page(&self.filter, cursor.range, cursor.page, self.page_size)
                .await
            {
                Ok(rows) => {
                    self.accept_page(cursor, rows);
                    return Ok(true);
                }
                Err(e) => e,
            };

            match error.kind() {
                ErrorKind::TransientRateLimit => {
                    rate_limit_waits += 1;
                    self.stats.rate_limit_waits += 1;
                    if rate_limit_waits > max_waits {
                        let exhausted = ExplorerError::RetriesExhausted {
                            action: "logs/getLogs".to_string(),
                            attempts: rate_limit_waits,
                            last: Box::new(error),
                        };
                        return Err(self.abort(&cursor, exhausted));
                    }
                    warn!(
                        "⚠️ [Scanner] {} | rate-limited on range {} page {}; sleeping {:?}",
                        self.label, cursor.range, cursor.page, cooldown
                    );
                    self.client
                        .pacer()
                        .pause(PauseReason::RateLimitCooldown, cooldown)
                        .await;
                }
                ErrorKind::TransientRangeTooLarge => {
                    self.bisect(cursor, error)?;
                    return Ok(true);
                }
                _ => return Err(self.abort(&cursor, error)),
            }
        }
    }

    fn accept_page(&mut self, mut cursor: PageCursor, rows: Vec<RawLogEntry>) {
        let fetched = rows.len();
        let full = fetched > 0 && fetched >= self.page_size as usize;
        self.stats.pages += 1;

        for row in rows {
            if full {
                cursor.emitted.push(row.clone());
            }
            if !self.suppressed.is_empty() && self.suppressed.remove(&row) {
                self.stats.suppressed += 1;
                continue;
            }
            self.stats.logs += 1;
            self.buffered.push_back(row);
        }

        debug!(
            "[Scanner] {} | range {} page {} -> {} logs",
            self.label, cursor.range, cursor.page, fetched
        );

        if full {
            cursor.page += 1;
            self.cursor = Some(cursor);
        } else {
            self.stats.ranges_completed += 1;
        }
    }

    fn bisect(&mut self, cursor: PageCursor, last: ExplorerError) -> Result<(), ExplorerError> {
        let range = cursor.range;
        let span = range.span();
        let halves = if span > self.min_span {
            range.split()
        } else {
            None
        };

        let (lower, upper) = match halves {
            Some(halves) => halves,
            None => {
                error!(
                    "❌ [Scanner] {} | cannot split {} further (span={}, min_span={})",
                    self.label, range, span, self.min_span
                );
                return Err(ExplorerError::RangeUnsplittable {
                    address: self.filter.address,
                    topic0: self.filter.topic0,
                    range,
                    span,
                    min_span: self.min_span,
                    last: Box::new(last),
                });
            }
        };

        warn!(
            "⚠️ [Scanner] {} | Query timeout on page {} -> split {} into {} and {}",
            self.label, cursor.page, range, lower, upper
        );
        self.suppressed.extend(cursor.emitted);
        self.pending.push(upper);
        self.pending.push(lower);
        self.stats.splits += 1;
        Ok(())
    }

    fn abort(&self, cursor: &PageCursor, source: ExplorerError) -> ExplorerError {
        error!(
            "❌ [Scanner] {} | aborting at range {} page {}: {}",
            self.label, cursor.range, cursor.page, source
        );
        ExplorerError::ScanAborted {
            address: self.filter.address,
            topic0: self.filter.topic0,
            range: cursor.range,
            page: cursor.page,
            source: Box::new(source),
        }
    }
}
