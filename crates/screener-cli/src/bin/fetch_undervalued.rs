//! Screen the full stock universe against DCF estimates and write the
//! undervalued and fairly-valued rows to CSV.
//!
//! Usage: fetch-undervalued [--limit N] [--output FILE]

use std::path::PathBuf;
use std::sync::Arc;

use fmp_client::FmpClient;
use screener_pipeline::screen::{run_screen, ScreenConfig};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    screener_cli::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut cfg = ScreenConfig::default();
    screener_cli::apply_env_overrides(&mut cfg.fetch);
    cfg.limit = screener_cli::flag_value(&args, "--limit")
        .map(|v| v.parse())
        .transpose()
        .map_err(|e| anyhow::anyhow!("invalid value for --limit: {e}"))?;
    if let Some(output) = screener_cli::flag_value(&args, "--output") {
        cfg.output_file = PathBuf::from(output);
    }

    let client = Arc::new(FmpClient::new(screener_cli::api_key()?));
    client.validate_api_key().await?;

    let summary = run_screen(client, &cfg).await?;
    info!(
        "Run complete: {} processed, {} undervalued, {} fair",
        summary.processed, summary.undervalued, summary.fair
    );
    Ok(())
}
