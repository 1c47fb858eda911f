//! Attach region metadata to the undervalued candidates collected by
//! fetch-undervalued.
//!
//! Usage: fetch-regions [--candidates FILE] [--output FILE]

use std::path::PathBuf;
use std::sync::Arc;

use fmp_client::FmpClient;
use screener_pipeline::enrich::{run_enrich, EnrichConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    screener_cli::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut cfg = EnrichConfig::default();
    screener_cli::apply_env_overrides(&mut cfg.fetch);
    if let Some(candidates) = screener_cli::flag_value(&args, "--candidates") {
        cfg.candidate_file = PathBuf::from(candidates);
    }
    if let Some(output) = screener_cli::flag_value(&args, "--output") {
        cfg.output_file = PathBuf::from(output);
    }

    let client = Arc::new(FmpClient::new(screener_cli::api_key()?));
    client.validate_api_key().await?;

    let summary = run_enrich(client, &cfg).await?;
    info!(
        "Enrichment complete: {}/{} rows with region data",
        summary.fetched, summary.total
    );
    Ok(())
}
