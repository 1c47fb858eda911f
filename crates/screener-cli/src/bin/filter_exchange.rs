//! Filter every CSV table in a directory down to rows listed on the
//! major US exchanges.
//!
//! Usage: filter-exchange --input-dir DIR --output-dir DIR

use std::path::PathBuf;

use anyhow::bail;
use screener_core::stages::ALLOWED_EXCHANGES;
use screener_pipeline::exchange::run_exchange_filter;
use tracing::info;

fn main() -> anyhow::Result<()> {
    screener_cli::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (Some(input_dir), Some(output_dir)) = (
        screener_cli::flag_value(&args, "--input-dir"),
        screener_cli::flag_value(&args, "--output-dir"),
    ) else {
        bail!("usage: filter-exchange --input-dir DIR --output-dir DIR");
    };
    let input_dir = PathBuf::from(input_dir);
    let output_dir = PathBuf::from(output_dir);

    let stats = run_exchange_filter(&input_dir, &output_dir, ALLOWED_EXCHANGES)?;
    info!(
        "Done: {} files processed, {} rows kept of {}",
        stats.files_processed, stats.rows_kept, stats.rows_in
    );
    Ok(())
}
