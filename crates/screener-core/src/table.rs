//! CSV table I/O with explicit per-stage schemas.
//!
//! Every stage declares the columns it needs up front; a missing column
//! aborts the stage with a clear message instead of being guessed around.

use std::path::Path;

use crate::error::ScreenerError;
use crate::types::ScreenedStock;

/// Required columns for a stage, checked against the CSV header on read.
#[derive(Debug, Clone, Copy)]
pub struct CsvSchema {
    required: &'static [&'static str],
}

impl CsvSchema {
    pub const fn new(required: &'static [&'static str]) -> Self {
        Self { required }
    }

    pub fn check(&self, headers: &csv::StringRecord) -> Result<(), ScreenerError> {
        for column in self.required {
            if !headers.iter().any(|h| h == *column) {
                return Err(ScreenerError::MissingColumn {
                    column: column.to_string(),
                    available: headers.iter().collect::<Vec<_>>().join(", "),
                });
            }
        }
        Ok(())
    }
}

/// Stages keyed by symbol only (dedup, sector split)
pub const SYMBOL_SCHEMA: CsvSchema = CsvSchema::new(&["Symbol"]);
/// Currency filter stage
pub const CURRENCY_SCHEMA: CsvSchema = CsvSchema::new(&["Symbol", "Currency"]);
/// Exchange filter stage
pub const EXCHANGE_SCHEMA: CsvSchema = CsvSchema::new(&["Symbol", "Exchange"]);

/// Read a table, validating the header against `schema` first.
pub fn read_rows(path: &Path, schema: &CsvSchema) -> Result<Vec<ScreenedStock>, ScreenerError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ScreenerError::Io(std::io::Error::other(format!("{}: {e}", path.display()))))?;

    let headers = reader
        .headers()
        .map_err(|e| ScreenerError::Parse(e.to_string()))?
        .clone();
    schema.check(&headers)?;

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: ScreenedStock = record.map_err(|e| ScreenerError::Parse(e.to_string()))?;
        rows.push(row);
    }
    Ok(rows)
}

/// Whether the table's header includes `column`. Lets a stage downgrade
/// an optional filter to a warning instead of requiring the column.
pub fn has_column(path: &Path, column: &str) -> Result<bool, ScreenerError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| ScreenerError::Io(std::io::Error::other(format!("{}: {e}", path.display()))))?;
    let headers = reader
        .headers()
        .map_err(|e| ScreenerError::Parse(e.to_string()))?;
    Ok(headers.iter().any(|h| h == column))
}

/// Write a table with the full column set.
pub fn write_rows(path: &Path, rows: &[ScreenedStock]) -> Result<(), ScreenerError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| ScreenerError::Io(std::io::Error::other(format!("{}: {e}", path.display()))))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ScreenerError::Parse(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(ScreenerError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValuationStatus;

    fn sample_row(symbol: &str) -> ScreenedStock {
        let mut row = ScreenedStock::new(symbol, format!("{symbol} Corp"));
        row.current_price = Some(90.0);
        row.dcf_price = Some(100.0);
        row.discount_pct = 10.0;
        row.valuation_status = ValuationStatus::Undervalued;
        row.currency = Some("USD".to_string());
        row
    }

    #[test]
    fn round_trips_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let rows = vec![sample_row("AAPL"), sample_row("MSFT")];

        write_rows(&path, &rows).unwrap();
        let back = read_rows(&path, &CURRENCY_SCHEMA).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn schema_rejects_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noexchange.csv");
        std::fs::write(&path, "Symbol,Currency\nAAPL,USD\n").unwrap();

        let err = read_rows(&path, &EXCHANGE_SCHEMA).unwrap_err();
        match err {
            ScreenerError::MissingColumn { column, .. } => assert_eq!(column, "Exchange"),
            other => panic!("expected MissingColumn, got {other}"),
        }
    }

    #[test]
    fn reads_rows_with_empty_status_cell() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.csv");
        std::fs::write(&path, "Symbol,Currency,Valuation Status\nAAPL,USD,\n").unwrap();

        let rows = read_rows(&path, &CURRENCY_SCHEMA).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "AAPL");
        assert_eq!(rows[0].valuation_status, ValuationStatus::DataUnavailable);
    }

    #[test]
    fn reads_rows_with_garbage_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edited.csv");
        std::fs::write(
            &path,
            "Symbol,Currency,Current Price,Discount %,Valuation Status,Region_Fetched\n\
             AAPL,USD,n/a,,maybe,yes\n\
             MSFT,USD,310.5,4.25,UNDERVALUED,true\n",
        )
        .unwrap();

        let rows = read_rows(&path, &CURRENCY_SCHEMA).unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].current_price, None);
        assert_eq!(rows[0].discount_pct, 0.0);
        assert_eq!(rows[0].valuation_status, ValuationStatus::DataUnavailable);
        assert_eq!(rows[0].region_fetched, None);

        assert_eq!(rows[1].current_price, Some(310.5));
        assert_eq!(rows[1].discount_pct, 4.25);
        assert_eq!(rows[1].valuation_status, ValuationStatus::Undervalued);
        assert_eq!(rows[1].region_fetched, Some(true));
    }

    #[test]
    fn has_column_checks_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        std::fs::write(&path, "Symbol,Currency\nAAPL,USD\n").unwrap();

        assert!(has_column(&path, "Currency").unwrap());
        assert!(!has_column(&path, "Country").unwrap());
    }

    #[test]
    fn reads_partial_tables_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.csv");
        std::fs::write(&path, "Symbol,Currency\nAAPL,USD\nBHP,AUD\n").unwrap();

        let rows = read_rows(&path, &CURRENCY_SCHEMA).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "AAPL");
        assert_eq!(rows[0].current_price, None);
        assert_eq!(rows[1].currency.as_deref(), Some("AUD"));
    }
}
