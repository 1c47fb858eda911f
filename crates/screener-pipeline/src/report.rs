//! Plain-text summary reports and small aggregate helpers.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use screener_core::{ScreenedStock, ValuationStatus};

use crate::exchange::ExchangeFilterStats;
use crate::sector_split::SectorSplitSummary;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiscountStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

/// Discount statistics over the undervalued rows; `None` when there are
/// no undervalued rows.
pub fn discount_stats(rows: &[ScreenedStock]) -> Option<DiscountStats> {
    let discounts: Vec<f64> = rows
        .iter()
        .filter(|r| r.valuation_status == ValuationStatus::Undervalued)
        .map(|r| r.discount_pct)
        .collect();
    if discounts.is_empty() {
        return None;
    }
    let sum: f64 = discounts.iter().sum();
    let max = discounts.iter().cloned().fold(f64::MIN, f64::max);
    let min = discounts.iter().cloned().fold(f64::MAX, f64::min);
    Some(DiscountStats {
        avg: sum / discounts.len() as f64,
        max,
        min,
    })
}

/// Row counts per country, most common first. Rows without a country are
/// grouped under "Unknown".
pub fn country_counts(rows: &[ScreenedStock]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let country = row
            .country
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("Unknown");
        *counts.entry(country.to_string()).or_default() += 1;
    }
    let mut counts: Vec<(String, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

pub fn write_exchange_summary(
    path: &Path,
    input_dir: &Path,
    allowed: &[&str],
    stats: &ExchangeFilterStats,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::fs::File::create(path)?;
    writeln!(out, "Exchange Filter Summary")?;
    writeln!(out, "Generated: {}", Utc::now().to_rfc3339())?;
    writeln!(out, "Source: {}", input_dir.display())?;
    writeln!(out, "Allowed exchanges: {}", allowed.join(", "))?;
    writeln!(out)?;
    writeln!(out, "Files processed: {}", stats.files_processed)?;
    writeln!(out, "Files with results: {}", stats.files_with_results)?;
    writeln!(out, "Files skipped: {}", stats.files_skipped)?;
    writeln!(out, "Rows in: {}", stats.rows_in)?;
    writeln!(out, "Rows kept: {}", stats.rows_kept)?;
    writeln!(out, "Retention: {:.1}%", stats.retention_pct())?;
    Ok(())
}

pub fn write_sector_summary(
    path: &Path,
    min_market_cap: f64,
    elapsed: Duration,
    summary: &SectorSplitSummary,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = std::fs::File::create(path)?;
    writeln!(out, "Sector Partition Summary")?;
    writeln!(out, "Generated: {}", Utc::now().to_rfc3339())?;
    writeln!(out, "Minimum market cap: ${:.0}", min_market_cap)?;
    writeln!(out, "Elapsed: {:.1}s", elapsed.as_secs_f64())?;
    writeln!(out)?;
    writeln!(out, "Rows in: {}", summary.rows_in)?;
    writeln!(out, "Rows with market cap: {}", summary.rows_with_cap)?;
    writeln!(out, "Rows kept: {}", summary.rows_kept)?;
    writeln!(out)?;
    writeln!(out, "Sectors ({}):", summary.sectors.len())?;
    for (sector, count) in &summary.sectors {
        writeln!(out, "  {sector}: {count}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn undervalued(symbol: &str, discount: f64, country: Option<&str>) -> ScreenedStock {
        let mut row = ScreenedStock::new(symbol, format!("{symbol} Corp"));
        row.valuation_status = ValuationStatus::Undervalued;
        row.discount_pct = discount;
        row.country = country.map(str::to_string);
        row
    }

    #[test]
    fn discount_stats_ignore_non_undervalued() {
        let mut fair = ScreenedStock::new("F", "Fair Co");
        fair.valuation_status = ValuationStatus::Fair;
        fair.premium_pct = 5.0;

        let rows = vec![
            undervalued("A", 10.0, None),
            undervalued("B", 30.0, None),
            fair,
        ];
        let stats = discount_stats(&rows).unwrap();
        assert_eq!(stats.avg, 20.0);
        assert_eq!(stats.max, 30.0);
        assert_eq!(stats.min, 10.0);
    }

    #[test]
    fn discount_stats_none_without_undervalued() {
        assert!(discount_stats(&[]).is_none());
    }

    #[test]
    fn country_counts_sorted_with_unknown_bucket() {
        let rows = vec![
            undervalued("A", 1.0, Some("US")),
            undervalued("B", 1.0, Some("US")),
            undervalued("C", 1.0, Some("CA")),
            undervalued("D", 1.0, None),
            undervalued("E", 1.0, Some("  ")),
        ];
        let counts = country_counts(&rows);
        assert_eq!(counts[0], ("US".to_string(), 2));
        assert!(counts.contains(&("CA".to_string(), 1)));
        assert!(counts.contains(&("Unknown".to_string(), 2)));
    }

    #[test]
    fn sector_summary_lists_each_sector() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_summary.txt");
        let summary = SectorSplitSummary {
            rows_in: 10,
            rows_with_cap: 8,
            rows_kept: 5,
            sectors: vec![("Energy".to_string(), 2), ("Technology".to_string(), 3)],
        };
        write_sector_summary(&path, 1e9, Duration::from_secs(12), &summary).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("Rows kept: 5"));
        assert!(text.contains("Energy: 2"));
        assert!(text.contains("Technology: 3"));
    }
}
