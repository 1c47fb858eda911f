//! Partition a screened table into per-sector CSV files, keeping only
//! rows above a market-cap floor.
//!
//! Usage: split-sectors [--input FILE] [--output-dir DIR] [--min-cap N]

use std::path::PathBuf;
use std::sync::Arc;

use fmp_client::FmpClient;
use screener_pipeline::sector_split::{run_sector_split, SectorSplitConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    screener_cli::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut cfg = SectorSplitConfig::default();
    screener_cli::apply_env_overrides(&mut cfg.fetch);
    if let Some(input) = screener_cli::flag_value(&args, "--input") {
        cfg.input_file = PathBuf::from(input);
    }
    if let Some(output_dir) = screener_cli::flag_value(&args, "--output-dir") {
        cfg.output_dir = PathBuf::from(output_dir);
    }
    cfg.min_market_cap = screener_cli::flag_parse(&args, "--min-cap", cfg.min_market_cap)?;

    let client = Arc::new(FmpClient::new(screener_cli::api_key()?));
    client.validate_api_key().await?;

    let summary = run_sector_split(client, &cfg).await?;
    info!(
        "Done: {} of {} rows kept across {} sectors",
        summary.rows_kept,
        summary.rows_in,
        summary.sectors.len()
    );
    Ok(())
}
