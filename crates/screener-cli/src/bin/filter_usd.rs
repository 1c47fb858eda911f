//! Keep only US-listed, USD-denominated rows from an enriched table,
//! dropping duplicates and re-sorting by discount.
//!
//! Usage: filter-usd --input FILE --output FILE

use std::path::PathBuf;

use anyhow::bail;
use screener_core::stages::{
    dedup_by_symbol, filter_us_country, filter_usd_currency, sort_by_discount_desc,
};
use screener_core::table;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    screener_cli::init();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (Some(input), Some(output)) = (
        screener_cli::flag_value(&args, "--input"),
        screener_cli::flag_value(&args, "--output"),
    ) else {
        bail!("usage: filter-usd --input FILE --output FILE");
    };
    let input = PathBuf::from(input);
    let output = PathBuf::from(output);

    let has_country = table::has_column(&input, "Country")?;
    let rows = table::read_rows(&input, &table::CURRENCY_SCHEMA)?;
    let total = rows.len();

    let rows = filter_usd_currency(rows);
    let after_currency = rows.len();
    let rows = if has_country {
        filter_us_country(rows)
    } else {
        warn!("No Country column in {}, skipping country filter", input.display());
        rows
    };
    let after_country = rows.len();

    let outcome = dedup_by_symbol(rows);
    let mut rows = outcome.rows;
    sort_by_discount_desc(&mut rows);

    info!(
        "{} rows: {} after currency filter, {} after country filter, {} duplicates removed",
        total, after_currency, after_country, outcome.removed
    );
    table::write_rows(&output, &rows)?;
    info!("Wrote {} rows to {}", rows.len(), output.display());
    Ok(())
}
