//! Region enrichment: take the undervalued candidates and attach
//! country, exchange, currency, and address metadata from the profile
//! endpoint.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use fmp_client::FmpClient;
use screener_core::{stages, table, ScreenedStock, ScreenerError};
use stock_cache::CandidateCache;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::fetch::{fan_out_with, FetchConfig, Progress};
use crate::report;

pub struct EnrichConfig {
    pub fetch: FetchConfig,
    /// Candidate file produced by the screening stage.
    pub candidate_file: PathBuf,
    /// Enriched CSV output.
    pub output_file: PathBuf,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            fetch: FetchConfig::default(),
            candidate_file: PathBuf::from("undervalued_stocks_cache.json"),
            output_file: PathBuf::from("undervalued_stocks_with_regions.csv"),
        }
    }
}

#[derive(Debug, Default)]
pub struct EnrichSummary {
    pub total: usize,
    pub fetched: usize,
    pub top_countries: Vec<(String, usize)>,
}

pub async fn run_enrich(client: Arc<FmpClient>, cfg: &EnrichConfig) -> anyhow::Result<EnrichSummary> {
    let candidates = CandidateCache::load_required(&cfg.candidate_file)?;
    let rows = candidates.rows;
    if rows.is_empty() {
        bail!("no candidate rows in {}", cfg.candidate_file.display());
    }
    info!("Enriching {} candidate rows with region data", rows.len());

    let progress = Arc::new(Progress::new(rows.len(), cfg.fetch.progress_every));
    let delay = cfg.fetch.request_delay;
    let batch_count = rows.len().div_ceil(cfg.fetch.batch_size.max(1));

    let mut enriched: Vec<ScreenedStock> = Vec::with_capacity(rows.len());
    for (batch_idx, batch) in rows.chunks(cfg.fetch.batch_size.max(1)).enumerate() {
        info!(
            "Batch {}/{}: {} rows",
            batch_idx + 1,
            batch_count,
            batch.len()
        );

        let mut fatal: Option<ScreenerError> = None;
        let worker_client = Arc::clone(&client);
        let worker = move |row: ScreenedStock| {
            let client = Arc::clone(&worker_client);
            async move { enrich_row(client, row, delay).await }
        };

        {
            let progress = Arc::clone(&progress);
            fan_out_with(batch.to_vec(), cfg.fetch.concurrency, worker, |result| {
                match result {
                    Ok(row) => {
                        progress.tick();
                        enriched.push(row);
                    }
                    Err(e) => {
                        if fatal.is_none() {
                            fatal = Some(e);
                        }
                    }
                }
            })
            .await;
        }

        if let Some(e) = fatal {
            bail!("aborting enrichment: {e}");
        }
    }

    stages::sort_by_discount_desc(&mut enriched);
    table::write_rows(&cfg.output_file, &enriched)
        .with_context(|| format!("writing {}", cfg.output_file.display()))?;

    let fetched = enriched
        .iter()
        .filter(|r| r.region_fetched == Some(true))
        .count();
    let top_countries = report::country_counts(&enriched);

    info!(
        "Enriched {}/{} rows ({:.1}%), wrote {}",
        fetched,
        enriched.len(),
        fetched as f64 / enriched.len().max(1) as f64 * 100.0,
        cfg.output_file.display()
    );
    for (country, count) in top_countries.iter().take(10) {
        info!("  {country}: {count}");
    }

    Ok(EnrichSummary {
        total: enriched.len(),
        fetched,
        top_countries,
    })
}

/// Fetch region metadata for one row. A missing profile or a soft API
/// failure marks the row as not fetched; fatal errors propagate.
async fn enrich_row(
    client: Arc<FmpClient>,
    mut row: ScreenedStock,
    delay: Duration,
) -> Result<ScreenedStock, ScreenerError> {
    sleep(delay).await;
    match client.profile(&row.symbol).await {
        Ok(Some(profile)) => {
            row.apply_region(&profile.region());
            if row.sector.is_none() {
                row.sector = profile.sector.clone();
            }
            if row.industry.is_none() {
                row.industry = profile.industry.clone();
            }
        }
        Ok(None) => {
            debug!("no profile for {}", row.symbol);
            row.region_fetched = Some(false);
        }
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            debug!("profile fetch failed for {}: {e}", row.symbol);
            row.region_fetched = Some(false);
        }
    }
    row.region_fetch_timestamp = Some(Utc::now().to_rfc3339());
    Ok(row)
}
