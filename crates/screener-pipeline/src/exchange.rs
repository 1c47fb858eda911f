//! Exchange filter over a directory of CSV tables: keep only rows listed
//! on the major US exchanges and mirror the files into an output
//! directory.

use std::path::{Path, PathBuf};

use anyhow::Context;
use screener_core::{stages, table, ScreenerError};
use tracing::{info, warn};

use crate::report;

#[derive(Debug, Default)]
pub struct ExchangeFilterStats {
    pub files_processed: usize,
    pub files_with_results: usize,
    pub files_skipped: usize,
    pub rows_in: usize,
    pub rows_kept: usize,
}

impl ExchangeFilterStats {
    pub fn retention_pct(&self) -> f64 {
        if self.rows_in == 0 {
            0.0
        } else {
            self.rows_kept as f64 / self.rows_in as f64 * 100.0
        }
    }
}

/// Filter every CSV in `input_dir` down to the allowed exchanges.
/// Summary and report files (names starting with `_`) are not tables and
/// are skipped; a table without an Exchange column is reported and
/// skipped rather than failing the whole run.
pub fn run_exchange_filter(
    input_dir: &Path,
    output_dir: &Path,
    allowed: &[&str],
) -> anyhow::Result<ExchangeFilterStats> {
    let files = csv_tables(input_dir)
        .with_context(|| format!("listing {}", input_dir.display()))?;
    if files.is_empty() {
        warn!("No CSV tables found in {}", input_dir.display());
    }

    let mut stats = ExchangeFilterStats::default();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let rows = match table::read_rows(&path, &table::EXCHANGE_SCHEMA) {
            Ok(rows) => rows,
            Err(e @ ScreenerError::MissingColumn { .. }) => {
                warn!("{name}: {e}, skipping file");
                stats.files_skipped += 1;
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };

        stats.files_processed += 1;
        stats.rows_in += rows.len();

        let kept = stages::filter_exchanges(rows, allowed);
        info!("{name}: kept {} rows", kept.len());
        stats.rows_kept += kept.len();

        if !kept.is_empty() {
            stats.files_with_results += 1;
            table::write_rows(&output_dir.join(&name), &kept)
                .with_context(|| format!("writing {name}"))?;
        }
    }

    report::write_exchange_summary(&output_dir.join("_summary.txt"), input_dir, allowed, &stats)
        .with_context(|| "writing exchange summary")?;
    info!(
        "Exchange filter: {}/{} rows kept ({:.1}%) across {} files",
        stats.rows_kept,
        stats.rows_in,
        stats.retention_pct(),
        stats.files_processed
    );
    Ok(stats)
}

/// CSV files directly under `dir`, excluding `_`-prefixed report files,
/// sorted by name for stable processing order.
fn csv_tables(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        let is_report = path
            .file_name()
            .map(|n| n.to_string_lossy().starts_with('_'))
            .unwrap_or(true);
        if path.is_file() && is_csv && !is_report {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use screener_core::stages::ALLOWED_EXCHANGES;
    use screener_core::ScreenedStock;

    fn row(symbol: &str, exchange: &str) -> ScreenedStock {
        let mut row = ScreenedStock::new(symbol, format!("{symbol} Corp"));
        row.exchange = Some(exchange.to_string());
        row
    }

    #[test]
    fn filters_directory_and_writes_summary() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();

        table::write_rows(
            &input.path().join("tech.csv"),
            &[row("AAPL", "NASDAQ"), row("SAP", "XETRA")],
        )
        .unwrap();
        table::write_rows(&input.path().join("energy.csv"), &[row("TTE", "EPA")]).unwrap();
        std::fs::write(input.path().join("_summary.txt"), "not a table").unwrap();

        let stats =
            run_exchange_filter(input.path(), output.path(), ALLOWED_EXCHANGES).unwrap();

        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.files_with_results, 1);
        assert_eq!(stats.rows_in, 3);
        assert_eq!(stats.rows_kept, 1);

        let kept = table::read_rows(&output.path().join("tech.csv"), &table::EXCHANGE_SCHEMA)
            .unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].symbol, "AAPL");
        assert!(!output.path().join("energy.csv").exists());
        assert!(output.path().join("_summary.txt").exists());
    }

    #[test]
    fn csv_tables_skips_reports_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.csv"), "Symbol\n").unwrap();
        std::fs::write(dir.path().join("a.csv"), "Symbol\n").unwrap();
        std::fs::write(dir.path().join("_notes.csv"), "Symbol\n").unwrap();
        std::fs::write(dir.path().join("readme.txt"), "hi").unwrap();

        let files = csv_tables(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }
}
