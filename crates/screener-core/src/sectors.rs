//! Sector partitioning for the split stage.

use std::collections::BTreeMap;

use crate::stages::sort_by_discount_desc;
use crate::types::ScreenedStock;

/// Sector assigned to rows without one
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Partition rows by sector. Rows with a missing or blank sector land in
/// the "Unknown" partition; each partition is sorted by discount
/// percentage descending. The union of partitions is exactly the input.
pub fn partition_by_sector(rows: Vec<ScreenedStock>) -> BTreeMap<String, Vec<ScreenedStock>> {
    let mut partitions: BTreeMap<String, Vec<ScreenedStock>> = BTreeMap::new();

    for row in rows {
        let sector = match row.sector.as_deref() {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => UNKNOWN_SECTOR.to_string(),
        };
        partitions.entry(sector).or_default().push(row);
    }

    for rows in partitions.values_mut() {
        sort_by_discount_desc(rows);
    }

    partitions
}

/// Derive a filesystem-safe file stem from a sector name: strip anything
/// that is not alphanumeric, space, dash, or underscore, then replace
/// spaces with underscores. Falls back to "Unknown" when nothing survives.
pub fn safe_filename(sector: &str) -> String {
    let cleaned: String = sector
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let stem = cleaned.trim().replace(' ', "_");
    if stem.is_empty() {
        UNKNOWN_SECTOR.to_string()
    } else {
        stem
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str, sector: Option<&str>, discount: f64) -> ScreenedStock {
        let mut r = ScreenedStock::new(symbol, format!("{symbol} Inc"));
        r.sector = sector.map(|s| s.to_string());
        r.discount_pct = discount;
        r
    }

    #[test]
    fn partition_is_exact_cover() {
        let rows = vec![
            row("A", Some("Technology"), 10.0),
            row("B", Some("Energy"), 5.0),
            row("C", None, 7.0),
            row("D", Some("Technology"), 20.0),
            row("E", Some(""), 1.0),
        ];
        let input_symbols: Vec<_> = rows.iter().map(|r| r.symbol.clone()).collect();

        let partitions = partition_by_sector(rows);

        let mut union: Vec<String> = partitions
            .values()
            .flatten()
            .map(|r| r.symbol.clone())
            .collect();
        union.sort();
        let mut expected = input_symbols;
        expected.sort();
        assert_eq!(union, expected);

        // Null and blank sectors share the Unknown partition
        let unknown = partitions.get(UNKNOWN_SECTOR).unwrap();
        assert_eq!(unknown.len(), 2);
    }

    #[test]
    fn partitions_sorted_by_discount_desc() {
        let rows = vec![
            row("A", Some("Technology"), 10.0),
            row("D", Some("Technology"), 20.0),
        ];
        let partitions = partition_by_sector(rows);
        let tech = partitions.get("Technology").unwrap();
        assert_eq!(tech[0].symbol, "D");
        assert_eq!(tech[1].symbol, "A");
    }

    #[test]
    fn safe_filenames_strip_punctuation() {
        assert_eq!(safe_filename("Consumer Cyclical"), "Consumer_Cyclical");
        assert_eq!(safe_filename("Oil & Gas"), "Oil__Gas");
        assert_eq!(safe_filename("***"), "Unknown");
        assert_eq!(safe_filename("Real-Estate"), "Real-Estate");
    }
}
