//! Full-universe screening run: list symbols, value each one against its
//! DCF estimate, and persist undervalued and fairly-valued rows.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use fmp_client::FmpClient;
use screener_core::valuation::round2;
use screener_core::{classify, table, CompanyProfile, ScreenedStock, ScreenerError};
use screener_core::{ValuationStatus, OVERVALUED_BUFFER};
use stock_cache::{CandidateCache, SymbolCache};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::fetch::{fan_out_with, FetchConfig, Progress};
use crate::report;

pub struct ScreenConfig {
    pub fetch: FetchConfig,
    /// Per-symbol cache file.
    pub cache_file: PathBuf,
    /// Flat undervalued-candidate file consumed by the enrichment stage.
    pub candidate_file: PathBuf,
    /// CSV output with undervalued and fairly-valued rows.
    pub output_file: PathBuf,
    /// Fraction above DCF at which a stock counts as overvalued.
    pub overvalued_buffer: f64,
    /// Optional cap on the number of symbols, for trial runs.
    pub limit: Option<usize>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            cache_file: PathBuf::from("stock_cache.json"),
            candidate_file: PathBuf::from("undervalued_stocks_cache.json"),
            output_file: PathBuf::from("stock_valuations.csv"),
            overvalued_buffer: OVERVALUED_BUFFER,
            limit: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct ScreenSummary {
    pub processed: usize,
    pub with_data: usize,
    pub undervalued: usize,
    pub fair: usize,
    pub overvalued: usize,
    pub rate_limited: u64,
}

/// Per-symbol outcome reported back to the batch driver.
#[derive(Debug, Clone)]
struct StockDetail {
    symbol: String,
    status: ValuationStatus,
}

#[derive(Debug, Default)]
struct BatchStats {
    processed: usize,
    with_data: usize,
    no_data: usize,
    undervalued: usize,
    fair: usize,
    overvalued: usize,
    failed: usize,
}

impl BatchStats {
    fn absorb(&mut self, other: &BatchStats) {
        self.processed += other.processed;
        self.with_data += other.with_data;
        self.no_data += other.no_data;
        self.undervalued += other.undervalued;
        self.fair += other.fair;
        self.overvalued += other.overvalued;
        self.failed += other.failed;
    }

    fn tally(&mut self, detail: &StockDetail) {
        self.processed += 1;
        match detail.status {
            ValuationStatus::Undervalued => {
                self.with_data += 1;
                self.undervalued += 1;
            }
            ValuationStatus::Fair => {
                self.with_data += 1;
                self.fair += 1;
            }
            ValuationStatus::Overvalued => {
                self.with_data += 1;
                self.overvalued += 1;
            }
            _ => self.no_data += 1,
        }
    }
}

/// Shared state cloned into every per-symbol worker.
#[derive(Clone)]
struct ScreenState {
    client: Arc<FmpClient>,
    cache: Arc<Mutex<SymbolCache>>,
    candidates: Arc<Mutex<CandidateCache>>,
    undervalued: Arc<Mutex<Vec<ScreenedStock>>>,
    fair: Arc<Mutex<Vec<ScreenedStock>>>,
    dcf_bulk: Arc<Option<HashMap<String, f64>>>,
    profiles_bulk: Arc<Option<HashMap<String, CompanyProfile>>>,
    rate_limited: Arc<AtomicU64>,
    delay: Duration,
    buffer: f64,
}

pub async fn run_screen(client: Arc<FmpClient>, cfg: &ScreenConfig) -> anyhow::Result<ScreenSummary> {
    let listing = client.list_stocks().await?;
    let mut symbols: Vec<String> = listing
        .into_iter()
        .map(|s| s.symbol)
        .filter(|s| !s.trim().is_empty())
        .collect();
    if let Some(limit) = cfg.limit {
        symbols.truncate(limit);
        info!("Limiting run to first {} symbols", symbols.len());
    }
    info!("Screening {} symbols", symbols.len());

    // Bulk prefetches are best-effort; per-symbol endpoints cover the gaps.
    let dcf_bulk = match client.dcf_bulk().await {
        Ok(map) => Some(map),
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => {
            warn!("Bulk DCF unavailable ({e}), falling back to per-symbol requests");
            None
        }
    };
    let profiles_bulk = match client.profiles_bulk(cfg.fetch.request_delay).await {
        Ok(map) => Some(map),
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => {
            warn!("Bulk profiles unavailable ({e}), falling back to per-symbol requests");
            None
        }
    };

    let state = ScreenState {
        client,
        cache: Arc::new(Mutex::new(SymbolCache::load(&cfg.cache_file))),
        candidates: Arc::new(Mutex::new(CandidateCache::load(&cfg.candidate_file))),
        undervalued: Arc::new(Mutex::new(Vec::new())),
        fair: Arc::new(Mutex::new(Vec::new())),
        dcf_bulk: Arc::new(dcf_bulk),
        profiles_bulk: Arc::new(profiles_bulk),
        rate_limited: Arc::new(AtomicU64::new(0)),
        delay: cfg.fetch.request_delay,
        buffer: cfg.overvalued_buffer,
    };

    let progress = Arc::new(Progress::new(symbols.len(), cfg.fetch.progress_every));

    let run = run_batches(&state, cfg, &symbols, &progress);
    let totals = tokio::select! {
        result = run => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, saving caches before exit");
            save_caches(&state, cfg)?;
            bail!("interrupted after {} symbols", progress.done());
        }
    };

    let mut undervalued = take_rows(&state.undervalued);
    let mut fair = take_rows(&state.fair);
    undervalued.sort_by(|a, b| {
        b.discount_pct
            .partial_cmp(&a.discount_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    fair.sort_by(|a, b| {
        b.premium_pct
            .partial_cmp(&a.premium_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let summary = ScreenSummary {
        processed: totals.processed,
        with_data: totals.with_data,
        undervalued: undervalued.len(),
        fair: fair.len(),
        overvalued: totals.overvalued,
        rate_limited: state.rate_limited.load(Ordering::Relaxed),
    };

    let mut output = undervalued;
    output.append(&mut fair);
    table::write_rows(&cfg.output_file, &output)
        .with_context(|| format!("writing {}", cfg.output_file.display()))?;
    info!(
        "Wrote {} rows ({} undervalued, {} fair) to {}",
        output.len(),
        summary.undervalued,
        summary.fair,
        cfg.output_file.display()
    );

    for row in output.iter().take(10) {
        info!(
            "  {} ({}): price {:.2?} vs DCF {:.2?}, {} {:.2}%",
            row.company_name,
            row.symbol,
            row.current_price,
            row.dcf_price,
            row.valuation_status.label(),
            if row.valuation_status == ValuationStatus::Undervalued {
                row.discount_pct
            } else {
                row.premium_pct
            }
        );
    }

    if let Some(stats) = report::discount_stats(&output) {
        info!(
            "Discounts: avg {:.2}%, max {:.2}%, min {:.2}%",
            stats.avg, stats.max, stats.min
        );
    }
    if summary.rate_limited > 0 {
        warn!("{} requests were rate limited during the run", summary.rate_limited);
    }

    save_caches(&state, cfg)?;
    Ok(summary)
}

async fn run_batches(
    state: &ScreenState,
    cfg: &ScreenConfig,
    symbols: &[String],
    progress: &Arc<Progress>,
) -> anyhow::Result<BatchStats> {
    let mut totals = BatchStats::default();
    let batch_count = symbols.len().div_ceil(cfg.fetch.batch_size.max(1));

    for (batch_idx, batch) in symbols.chunks(cfg.fetch.batch_size.max(1)).enumerate() {
        info!(
            "Batch {}/{}: {} symbols",
            batch_idx + 1,
            batch_count,
            batch.len()
        );

        let mut stats = BatchStats::default();
        let mut fatal: Option<ScreenerError> = None;

        let worker_state = state.clone();
        let worker = move |symbol: String| {
            let state = worker_state.clone();
            async move { process_symbol(state, symbol).await }
        };

        {
            let progress = Arc::clone(progress);
            let state = state.clone();
            let checkpoint_every = cfg.fetch.checkpoint_every.max(1);
            let cache_file = cfg.cache_file.clone();
            let candidate_file = cfg.candidate_file.clone();

            fan_out_with(batch.to_vec(), cfg.fetch.concurrency, worker, |result| {
                if let Ok(detail) = &result {
                    let done = progress.tick();
                    debug!("completed {}", detail.symbol);
                    if done % checkpoint_every == 0 {
                        checkpoint(&state, &cache_file, &candidate_file);
                    }
                }
                record_outcome(&mut stats, &mut fatal, result);
            })
            .await;
        }

        save_caches(state, cfg)?;

        info!(
            "Batch {} done: {} processed, {} with data, {} no data, {} failed",
            batch_idx + 1,
            stats.processed,
            stats.with_data,
            stats.no_data,
            stats.failed
        );
        info!(
            "Batch {} valuations: {} undervalued, {} fair, {} overvalued",
            batch_idx + 1,
            stats.undervalued,
            stats.fair,
            stats.overvalued
        );
        if stats.processed + stats.failed != batch.len() {
            warn!(
                "Batch {} accounting mismatch: {} outcomes for {} symbols",
                batch_idx + 1,
                stats.processed + stats.failed,
                batch.len()
            );
        }

        totals.absorb(&stats);
        if let Some(e) = fatal {
            bail!("aborting run: {e}");
        }
    }

    Ok(totals)
}

/// Fold one worker result into the batch stats. Every outcome lands in
/// either `processed` or `failed` so the batch accounting stays exact;
/// fatal errors are counted as failures and the first one is kept to
/// abort the run.
fn record_outcome(
    stats: &mut BatchStats,
    fatal: &mut Option<ScreenerError>,
    result: Result<StockDetail, ScreenerError>,
) {
    match result {
        Ok(detail) => stats.tally(&detail),
        Err(e) if e.is_fatal() => {
            stats.failed += 1;
            if fatal.is_none() {
                *fatal = Some(e);
            }
        }
        Err(e) => {
            stats.failed += 1;
            warn!("symbol worker failed: {e}");
        }
    }
}

/// Value one symbol: cache and bulk data first, API calls only for what
/// is still missing. Soft API failures degrade to a no-data status;
/// fatal errors propagate and abort the run.
async fn process_symbol(state: ScreenState, symbol: String) -> Result<StockDetail, ScreenerError> {
    let mut profile: Option<CompanyProfile> = (*state.profiles_bulk)
        .as_ref()
        .and_then(|m| m.get(&symbol).cloned());

    let mut dcf: Option<f64> = (*state.dcf_bulk)
        .as_ref()
        .and_then(|m| m.get(&symbol).copied());
    let mut price: Option<f64> = None;

    {
        let cache = state.cache.lock().expect("cache lock poisoned");
        if let Some(entry) = cache.get(&symbol) {
            if dcf.is_none() {
                dcf = entry.dcf;
            }
            price = entry.price;
            if profile.is_none() {
                profile = entry.profile.clone();
            }
        }
    }

    if dcf.is_none() {
        sleep(state.delay).await;
        match state.client.dcf(&symbol).await {
            Ok(Some(valuation)) => {
                dcf = Some(valuation.dcf);
                if price.is_none() {
                    price = valuation.stock_price;
                }
            }
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => soft_failure(&state, &symbol, "DCF", e),
        }
    }

    if price.is_none() {
        sleep(state.delay).await;
        match state.client.quote(&symbol).await {
            Ok(Some(quote)) => price = quote.price,
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => soft_failure(&state, &symbol, "quote", e),
        }
    }

    let valuation = classify(price, dcf, state.buffer);

    if valuation.status.has_data() && profile.is_none() {
        sleep(state.delay).await;
        match state.client.profile(&symbol).await {
            Ok(Some(p)) => profile = Some(p.company()),
            Ok(None) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => soft_failure(&state, &symbol, "profile", e),
        }
    }

    let company_name = profile
        .as_ref()
        .map(|p| p.company_name.clone())
        .unwrap_or_else(|| symbol.clone());

    if valuation.status.has_data() {
        // classify() only returns a data-bearing status when both are set
        let price_val = price.unwrap_or_default();
        let dcf_val = dcf.unwrap_or_default();
        info!(
            "{}: {} ({}) price {:.2} vs DCF {:.2}",
            valuation.status.label(),
            company_name,
            symbol,
            price_val,
            dcf_val
        );

        if matches!(
            valuation.status,
            ValuationStatus::Undervalued | ValuationStatus::Fair
        ) {
            let mut row = ScreenedStock::new(&symbol, &company_name);
            row.current_price = Some(round2(price_val));
            row.dcf_price = Some(round2(dcf_val));
            row.discount_pct = valuation.discount_pct;
            row.premium_pct = valuation.premium_pct;
            row.valuation_status = valuation.status;
            row.sector = profile.as_ref().and_then(|p| p.sector.clone());
            row.industry = profile.as_ref().and_then(|p| p.industry.clone());
            row.timestamp = Utc::now().to_rfc3339();

            if valuation.status == ValuationStatus::Undervalued {
                state
                    .undervalued
                    .lock()
                    .expect("result lock poisoned")
                    .push(row.clone());
                state
                    .candidates
                    .lock()
                    .expect("candidate lock poisoned")
                    .upsert(row.clone());
                state
                    .cache
                    .lock()
                    .expect("cache lock poisoned")
                    .upsert_undervalued(row);
            } else {
                state
                    .fair
                    .lock()
                    .expect("result lock poisoned")
                    .push(row.clone());
                state
                    .cache
                    .lock()
                    .expect("cache lock poisoned")
                    .upsert_fair(row);
            }
        }
    } else {
        debug!("{}: {} ({})", valuation.status.label(), company_name, symbol);
    }

    state
        .cache
        .lock()
        .expect("cache lock poisoned")
        .update(&symbol, price, dcf, profile);

    Ok(StockDetail {
        symbol,
        status: valuation.status,
    })
}

fn soft_failure(state: &ScreenState, symbol: &str, what: &str, e: ScreenerError) {
    if matches!(e, ScreenerError::RateLimited(_)) {
        state.rate_limited.fetch_add(1, Ordering::Relaxed);
    }
    debug!("{what} fetch failed for {symbol}: {e}");
}

fn checkpoint(state: &ScreenState, cache_file: &std::path::Path, candidate_file: &std::path::Path) {
    let result = state
        .cache
        .lock()
        .expect("cache lock poisoned")
        .save(cache_file)
        .and_then(|_| {
            state
                .candidates
                .lock()
                .expect("candidate lock poisoned")
                .save(candidate_file)
        });
    if let Err(e) = result {
        warn!("checkpoint save failed: {e}");
    }
}

fn save_caches(state: &ScreenState, cfg: &ScreenConfig) -> anyhow::Result<()> {
    state
        .cache
        .lock()
        .expect("cache lock poisoned")
        .save(&cfg.cache_file)
        .with_context(|| format!("saving {}", cfg.cache_file.display()))?;
    state
        .candidates
        .lock()
        .expect("candidate lock poisoned")
        .save(&cfg.candidate_file)
        .with_context(|| format!("saving {}", cfg.candidate_file.display()))?;
    Ok(())
}

fn take_rows(rows: &Arc<Mutex<Vec<ScreenedStock>>>) -> Vec<ScreenedStock> {
    std::mem::take(&mut *rows.lock().expect("result lock poisoned"))
}
