//! Pure table transforms: currency/country/exchange filters, symbol
//! dedup, market-cap thresholding. Each takes rows in and gives rows out;
//! nothing here touches the network or the filesystem.

use std::collections::HashSet;

use crate::types::ScreenedStock;

/// Exact currency spellings accepted by the USD filter in addition to the
/// case-insensitive "USD" / "US Dollar" substring match.
const USD_VARIANTS: &[&str] = &["USD", "US$", "$"];

/// Exchanges retained by the exchange filter (upper-cased substring match).
pub const ALLOWED_EXCHANGES: &[&str] = &["NYSE", "NASDAQ", "NYS", "NSDQ"];

/// Market-cap floor for the sector stage: $1B.
pub const MIN_MARKET_CAP: f64 = 1_000_000_000.0;

/// Keep rows quoted in US dollars.
pub fn filter_usd_currency(rows: Vec<ScreenedStock>) -> Vec<ScreenedStock> {
    rows.into_iter()
        .filter(|row| match row.currency.as_deref() {
            Some(c) => {
                let upper = c.to_uppercase();
                USD_VARIANTS.contains(&c)
                    || upper.contains("USD")
                    || upper.contains("US DOLLAR")
            }
            None => false,
        })
        .collect()
}

/// Keep rows whose country matches the United States.
pub fn filter_us_country(rows: Vec<ScreenedStock>) -> Vec<ScreenedStock> {
    rows.into_iter()
        .filter(|row| match row.country.as_deref() {
            Some(c) => {
                let upper = c.to_uppercase();
                upper.contains("UNITED STATES") || upper.contains("USA") || upper.contains("US")
            }
            None => false,
        })
        .collect()
}

/// Keep rows listed on one of `allowed` (upper-cased substring match).
pub fn filter_exchanges(rows: Vec<ScreenedStock>, allowed: &[&str]) -> Vec<ScreenedStock> {
    rows.into_iter()
        .filter(|row| match row.exchange.as_deref() {
            Some(e) => {
                let upper = e.to_uppercase();
                allowed.iter().any(|a| upper.contains(a))
            }
            None => false,
        })
        .collect()
}

/// Result of symbol deduplication
#[derive(Debug)]
pub struct DedupOutcome {
    pub rows: Vec<ScreenedStock>,
    pub removed: usize,
    /// Symbols that appeared more than once, in first-seen order
    pub duplicate_symbols: Vec<String>,
}

/// Drop duplicate rows per symbol, keeping the first occurrence in input
/// order. Idempotent.
pub fn dedup_by_symbol(rows: Vec<ScreenedStock>) -> DedupOutcome {
    let input_len = rows.len();
    let mut seen: HashSet<String> = HashSet::new();
    let mut duplicates: Vec<String> = Vec::new();
    let mut kept = Vec::with_capacity(input_len);

    for row in rows {
        if seen.insert(row.symbol.clone()) {
            kept.push(row);
        } else if !duplicates.contains(&row.symbol) {
            duplicates.push(row.symbol.clone());
        }
    }

    DedupOutcome {
        removed: input_len - kept.len(),
        rows: kept,
        duplicate_symbols: duplicates,
    }
}

/// Drop rows whose symbol is missing or blank.
pub fn drop_missing_symbols(rows: Vec<ScreenedStock>) -> Vec<ScreenedStock> {
    rows.into_iter()
        .filter(|row| !row.symbol.trim().is_empty())
        .collect()
}

/// Keep rows with a known market cap of at least `min_cap`. Rows without
/// a market cap are dropped by this stage.
pub fn filter_min_market_cap(rows: Vec<ScreenedStock>, min_cap: f64) -> Vec<ScreenedStock> {
    rows.into_iter()
        .filter(|row| row.market_cap.map(|cap| cap >= min_cap).unwrap_or(false))
        .collect()
}

/// Sort rows by discount percentage, highest discount first.
pub fn sort_by_discount_desc(rows: &mut [ScreenedStock]) {
    rows.sort_by(|a, b| {
        b.discount_pct
            .partial_cmp(&a.discount_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(symbol: &str) -> ScreenedStock {
        ScreenedStock::new(symbol, format!("{symbol} Inc"))
    }

    fn row_with_currency(symbol: &str, currency: &str) -> ScreenedStock {
        let mut r = row(symbol);
        r.currency = Some(currency.to_string());
        r
    }

    #[test]
    fn usd_filter_is_case_insensitive() {
        let rows = vec![
            row_with_currency("A", "usd"),
            row_with_currency("B", "USD"),
            row_with_currency("C", "EUR"),
            row_with_currency("D", "US Dollar"),
            row_with_currency("E", "$"),
        ];
        let kept = filter_usd_currency(rows);
        let symbols: Vec<_> = kept.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B", "D", "E"]);
    }

    #[test]
    fn usd_filter_drops_missing_currency() {
        let rows = vec![row("A"), row_with_currency("B", "USD")];
        let kept = filter_usd_currency(rows);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].symbol, "B");
    }

    #[test]
    fn country_filter_matches_variants() {
        let mk = |sym: &str, country: &str| {
            let mut r = row(sym);
            r.country = Some(country.to_string());
            r
        };
        let rows = vec![
            mk("A", "US"),
            mk("B", "United States"),
            mk("C", "usa"),
            mk("D", "Germany"),
        ];
        let kept = filter_us_country(rows);
        let symbols: Vec<_> = kept.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B", "C"]);
    }

    #[test]
    fn exchange_filter_keeps_nyse_and_nasdaq() {
        let mk = |sym: &str, exchange: &str| {
            let mut r = row(sym);
            r.exchange = Some(exchange.to_string());
            r
        };
        let rows = vec![
            mk("A", "NASDAQ"),
            mk("B", "nyse"),
            mk("C", "LSE"),
            mk("D", "NYS"),
        ];
        let kept = filter_exchanges(rows, ALLOWED_EXCHANGES);
        let symbols: Vec<_> = kept.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["A", "B", "D"]);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut first = row("X");
        first.current_price = Some(1.0);
        let mut second = row("X");
        second.current_price = Some(2.0);

        let outcome = dedup_by_symbol(vec![first, second]);
        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].current_price, Some(1.0));
        assert_eq!(outcome.removed, 1);
        assert_eq!(outcome.duplicate_symbols, vec!["X".to_string()]);
    }

    #[test]
    fn dedup_is_idempotent() {
        let rows = vec![row("A"), row("B"), row("A"), row("C"), row("B")];
        let once = dedup_by_symbol(rows);
        let twice = dedup_by_symbol(once.rows.clone());
        assert_eq!(once.rows, twice.rows);
        assert_eq!(twice.removed, 0);
        assert!(twice.duplicate_symbols.is_empty());
        assert!(once.rows.len() <= 5);
    }

    #[test]
    fn market_cap_filter_drops_unknown_and_small() {
        let mk = |sym: &str, cap: Option<f64>| {
            let mut r = row(sym);
            r.market_cap = cap;
            r
        };
        let rows = vec![
            mk("BIG", Some(2e9)),
            mk("SMALL", Some(5e8)),
            mk("UNKNOWN", None),
            mk("EDGE", Some(MIN_MARKET_CAP)),
        ];
        let kept = filter_min_market_cap(rows, MIN_MARKET_CAP);
        let symbols: Vec<_> = kept.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BIG", "EDGE"]);
    }

    #[test]
    fn blank_symbols_are_dropped() {
        let rows = vec![row("A"), row(""), row("  "), row("B")];
        let kept = drop_missing_symbols(rows);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn sorts_by_discount_descending() {
        let mk = |sym: &str, discount: f64| {
            let mut r = row(sym);
            r.discount_pct = discount;
            r
        };
        let mut rows = vec![mk("A", 5.0), mk("B", 42.0), mk("C", 17.5)];
        sort_by_discount_desc(&mut rows);
        let symbols: Vec<_> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["B", "C", "A"]);
    }
}
