//! Sector partitioning: fetch market caps for a screened table, drop
//! small caps, and write one CSV per sector.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use fmp_client::FmpClient;
use screener_core::sectors::{partition_by_sector, safe_filename};
use screener_core::stages::{drop_missing_symbols, filter_min_market_cap, MIN_MARKET_CAP};
use screener_core::{table, ScreenedStock, ScreenerError};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::fetch::{fan_out_with, FetchConfig, Progress};
use crate::report;

pub struct SectorSplitConfig {
    pub fetch: FetchConfig,
    /// Screened table to partition.
    pub input_file: PathBuf,
    /// Directory receiving one CSV per sector plus a summary.
    pub output_dir: PathBuf,
    /// Minimum market capitalization in USD.
    pub min_market_cap: f64,
}

impl Default for SectorSplitConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            input_file: PathBuf::from("undervalued_stocks_with_regions.csv"),
            output_dir: PathBuf::from("sectors"),
            min_market_cap: MIN_MARKET_CAP,
        }
    }
}

#[derive(Debug, Default)]
pub struct SectorSplitSummary {
    pub rows_in: usize,
    pub rows_with_cap: usize,
    pub rows_kept: usize,
    pub sectors: Vec<(String, usize)>,
}

pub async fn run_sector_split(
    client: Arc<FmpClient>,
    cfg: &SectorSplitConfig,
) -> anyhow::Result<SectorSplitSummary> {
    let started = Instant::now();

    let rows = table::read_rows(&cfg.input_file, &table::SYMBOL_SCHEMA)
        .with_context(|| format!("reading {}", cfg.input_file.display()))?;
    let rows_in = rows.len();
    let rows = drop_missing_symbols(rows);
    if rows.is_empty() {
        bail!("no usable rows in {}", cfg.input_file.display());
    }
    info!(
        "Partitioning {} rows by sector (min cap ${:.0})",
        rows.len(),
        cfg.min_market_cap
    );

    let progress = Arc::new(Progress::new(rows.len(), cfg.fetch.progress_every));
    let delay = cfg.fetch.request_delay;

    let mut with_cap: Vec<ScreenedStock> = Vec::with_capacity(rows.len());
    let mut fatal: Option<ScreenerError> = None;

    let worker_client = Arc::clone(&client);
    let worker = move |row: ScreenedStock| {
        let client = Arc::clone(&worker_client);
        async move { fill_market_cap(client, row, delay).await }
    };

    {
        let progress = Arc::clone(&progress);
        fan_out_with(rows, cfg.fetch.concurrency, worker, |result| match result {
            Ok(row) => {
                progress.tick();
                if row.market_cap.is_some() {
                    with_cap.push(row);
                }
            }
            Err(e) => {
                if fatal.is_none() {
                    fatal = Some(e);
                }
            }
        })
        .await;
    }
    if let Some(e) = fatal {
        bail!("aborting sector split: {e}");
    }

    let rows_with_cap = with_cap.len();
    let kept = filter_min_market_cap(with_cap, cfg.min_market_cap);
    let rows_kept = kept.len();
    info!(
        "{} rows have a market cap, {} meet the ${:.0} floor",
        rows_with_cap, rows_kept, cfg.min_market_cap
    );

    let partitions = partition_by_sector(kept);
    let mut sectors = Vec::with_capacity(partitions.len());
    for (sector, rows) in &partitions {
        let file = cfg.output_dir.join(format!("{}.csv", safe_filename(sector)));
        table::write_rows(&file, rows)
            .with_context(|| format!("writing {}", file.display()))?;
        info!("  {sector}: {} rows -> {}", rows.len(), file.display());
        sectors.push((sector.clone(), rows.len()));
    }

    let summary = SectorSplitSummary {
        rows_in,
        rows_with_cap,
        rows_kept,
        sectors,
    };
    report::write_sector_summary(
        &cfg.output_dir.join("_summary.txt"),
        cfg.min_market_cap,
        started.elapsed(),
        &summary,
    )
    .with_context(|| "writing sector summary")?;

    Ok(summary)
}

/// Fetch the market cap for one row unless it already has one. Rows
/// whose cap cannot be determined keep `None` and are dropped by the
/// caller; fatal errors propagate.
async fn fill_market_cap(
    client: Arc<FmpClient>,
    mut row: ScreenedStock,
    delay: Duration,
) -> Result<ScreenedStock, ScreenerError> {
    if row.market_cap.filter(|c| *c > 0.0).is_some() {
        return Ok(row);
    }
    sleep(delay).await;
    match client.market_cap(&row.symbol).await {
        Ok(cap) => {
            if cap.is_none() {
                debug!("no market cap for {}", row.symbol);
            }
            row.market_cap = cap;
            Ok(row)
        }
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            debug!("market cap fetch failed for {}: {e}", row.symbol);
            Ok(row)
        }
    }
}
