//! Remove duplicate symbols from a screened CSV table, keeping the first
//! occurrence of each.
//!
//! Usage: dedup-rows --input FILE [--output FILE | --overwrite]

use std::path::PathBuf;

use anyhow::bail;
use screener_core::stages::dedup_by_symbol;
use screener_core::table;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    screener_cli::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let Some(input) = screener_cli::flag_value(&args, "--input") else {
        bail!("usage: dedup-rows --input FILE [--output FILE | --overwrite]");
    };
    let input = PathBuf::from(input);

    let output = match screener_cli::flag_value(&args, "--output") {
        Some(path) => PathBuf::from(path),
        None if screener_cli::has_flag(&args, "--overwrite") => input.clone(),
        None => input.with_file_name(format!(
            "{}_deduped.csv",
            input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        )),
    };

    let rows = table::read_rows(&input, &table::SYMBOL_SCHEMA)?;
    let total = rows.len();
    let outcome = dedup_by_symbol(rows);

    if outcome.removed == 0 {
        info!("No duplicate symbols in {} rows", total);
    } else {
        warn!(
            "Removed {} duplicate rows ({} symbols affected)",
            outcome.removed,
            outcome.duplicate_symbols.len()
        );
        for symbol in outcome.duplicate_symbols.iter().take(20) {
            info!("  duplicate: {symbol}");
        }
    }

    table::write_rows(&output, &outcome.rows)?;
    info!("Wrote {} rows to {}", outcome.rows.len(), output.display());
    Ok(())
}
