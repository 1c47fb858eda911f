//! On-disk JSON caches that survive between runs.
//!
//! Two documents: the symbol cache (per-symbol price/DCF/profile plus the
//! accumulated undervalued and fair result lists) and the candidate cache
//! (a flat list of screened rows consumed by the enrichment stage). Both
//! are read whole at startup and rewritten whole at checkpoints; entries
//! are merged monotonically and never expired.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use screener_core::{CompanyProfile, ScreenedStock, ScreenerError};
use serde::{Deserialize, Serialize};

/// Last-known data for one symbol. A later fetch only adds or replaces
/// fields; it never clears one that was previously present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub dcf: Option<f64>,
    #[serde(default)]
    pub profile: Option<CompanyProfile>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl CacheEntry {
    /// Merge fresh data into the entry; `None` arguments leave the
    /// existing field untouched. Stamps the merge time.
    pub fn merge(
        &mut self,
        price: Option<f64>,
        dcf: Option<f64>,
        profile: Option<CompanyProfile>,
    ) {
        if price.is_some() {
            self.price = price;
        }
        if dcf.is_some() {
            self.dcf = dcf;
        }
        if profile.is_some() {
            self.profile = profile;
        }
        self.timestamp = Some(Utc::now().to_rfc3339());
    }
}

/// The symbol cache document: per-symbol entries plus the derived result
/// lists accumulated across runs.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SymbolCache {
    #[serde(default)]
    pub entries: HashMap<String, CacheEntry>,
    #[serde(default)]
    pub undervalued: Vec<ScreenedStock>,
    #[serde(default)]
    pub fair: Vec<ScreenedStock>,
}

impl SymbolCache {
    /// Load from disk; a missing, unreadable, or corrupt file logs a
    /// warning and starts empty.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<SymbolCache>(&bytes) {
                Ok(cache) => {
                    tracing::info!(
                        "Loaded cache with {} symbols, {} undervalued, {} fair",
                        cache.entries.len(),
                        cache.undervalued.len(),
                        cache.fair.len()
                    );
                    cache
                }
                Err(e) => {
                    tracing::warn!(
                        "Error parsing cache {}: {e}. Starting with empty cache.",
                        path.display()
                    );
                    SymbolCache::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SymbolCache::default(),
            Err(e) => {
                tracing::warn!(
                    "Error reading cache {}: {e}. Starting with empty cache.",
                    path.display()
                );
                SymbolCache::default()
            }
        }
    }

    /// Rewrite the whole document atomically (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<(), ScreenerError> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| ScreenerError::Cache(e.to_string()))?;
        write_atomic(path, &json)?;
        tracing::debug!(
            "Saved cache with {} symbols, {} undervalued, {} fair",
            self.entries.len(),
            self.undervalued.len(),
            self.fair.len()
        );
        Ok(())
    }

    pub fn get(&self, symbol: &str) -> Option<&CacheEntry> {
        self.entries.get(symbol)
    }

    /// Merge fresh data into the cache entry for `symbol`, creating it on
    /// first sight.
    pub fn update(
        &mut self,
        symbol: &str,
        price: Option<f64>,
        dcf: Option<f64>,
        profile: Option<CompanyProfile>,
    ) {
        self.entries
            .entry(symbol.to_string())
            .or_default()
            .merge(price, dcf, profile);
    }

    /// Replace the stored undervalued row for the symbol, or append.
    pub fn upsert_undervalued(&mut self, row: ScreenedStock) {
        upsert_row(&mut self.undervalued, row);
    }

    /// Replace the stored fair-value row for the symbol, or append.
    pub fn upsert_fair(&mut self, row: ScreenedStock) {
        upsert_row(&mut self.fair, row);
    }
}

/// The flat candidate document consumed by the enrichment stage.
#[derive(Debug, Default)]
pub struct CandidateCache {
    pub rows: Vec<ScreenedStock>,
}

impl CandidateCache {
    /// Load from disk; missing or corrupt starts empty with a warning.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<ScreenedStock>>(&bytes) {
                Ok(rows) => {
                    tracing::info!("Loaded candidate cache with {} rows", rows.len());
                    CandidateCache { rows }
                }
                Err(e) => {
                    tracing::warn!(
                        "Error parsing candidate cache {}: {e}. Starting empty.",
                        path.display()
                    );
                    CandidateCache::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CandidateCache::default(),
            Err(e) => {
                tracing::warn!(
                    "Error reading candidate cache {}: {e}. Starting empty.",
                    path.display()
                );
                CandidateCache::default()
            }
        }
    }

    /// Load from disk, failing when the file does not exist. Used by
    /// stages that cannot proceed without upstream output.
    pub fn load_required(path: &Path) -> Result<Self, ScreenerError> {
        if !path.exists() {
            return Err(ScreenerError::Cache(format!(
                "candidate cache not found: {}",
                path.display()
            )));
        }
        let bytes = std::fs::read(path)?;
        let rows = serde_json::from_slice::<Vec<ScreenedStock>>(&bytes)
            .map_err(|e| ScreenerError::Cache(format!("{}: {e}", path.display())))?;
        tracing::info!("Loaded candidate cache with {} rows", rows.len());
        Ok(CandidateCache { rows })
    }

    pub fn save(&self, path: &Path) -> Result<(), ScreenerError> {
        let json = serde_json::to_vec_pretty(&self.rows)
            .map_err(|e| ScreenerError::Cache(e.to_string()))?;
        write_atomic(path, &json)?;
        tracing::debug!("Saved candidate cache with {} rows", self.rows.len());
        Ok(())
    }

    /// Replace the row for the symbol, or append.
    pub fn upsert(&mut self, row: ScreenedStock) {
        upsert_row(&mut self.rows, row);
    }
}

fn upsert_row(rows: &mut Vec<ScreenedStock>, row: ScreenedStock) {
    match rows.iter_mut().find(|r| r.symbol == row.symbol) {
        Some(existing) => *existing = row,
        None => rows.push(row),
    }
}

/// Write the full document to a temp file in the same directory, then
/// rename over the target so readers never see a partial file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ScreenerError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use screener_core::ValuationStatus;

    fn profile(name: &str) -> CompanyProfile {
        CompanyProfile {
            company_name: name.to_string(),
            sector: Some("Technology".to_string()),
            industry: None,
        }
    }

    #[test]
    fn merge_is_monotonic() {
        let mut entry = CacheEntry::default();
        entry.merge(Some(100.0), Some(120.0), Some(profile("Apple Inc.")));

        // A later price-only fetch must not clear dcf or profile
        entry.merge(Some(101.5), None, None);
        assert_eq!(entry.price, Some(101.5));
        assert_eq!(entry.dcf, Some(120.0));
        assert_eq!(entry.profile.as_ref().unwrap().company_name, "Apple Inc.");
        assert!(entry.timestamp.is_some());
    }

    #[test]
    fn update_creates_entry_on_first_fetch() {
        let mut cache = SymbolCache::default();
        cache.update("AAPL", Some(100.0), None, None);
        assert_eq!(cache.get("AAPL").unwrap().price, Some(100.0));
        assert!(cache.get("MSFT").is_none());
    }

    #[test]
    fn symbol_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_cache.json");

        let mut cache = SymbolCache::default();
        cache.update("AAPL", Some(100.0), Some(120.0), Some(profile("Apple Inc.")));
        let mut row = ScreenedStock::new("AAPL", "Apple Inc.");
        row.valuation_status = ValuationStatus::Undervalued;
        cache.upsert_undervalued(row);
        cache.save(&path).unwrap();

        let back = SymbolCache::load(&path);
        assert_eq!(back.entries.len(), 1);
        assert_eq!(back.get("AAPL").unwrap().dcf, Some(120.0));
        assert_eq!(back.undervalued.len(), 1);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_cache_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stock_cache.json");
        std::fs::write(&path, "{not json").unwrap();

        let cache = SymbolCache::load(&path);
        assert!(cache.entries.is_empty());
    }

    #[test]
    fn upsert_replaces_existing_symbol() {
        let mut cache = CandidateCache::default();
        let mut first = ScreenedStock::new("X", "X Inc");
        first.discount_pct = 5.0;
        let mut second = ScreenedStock::new("X", "X Inc");
        second.discount_pct = 9.0;

        cache.upsert(first);
        cache.upsert(second);
        assert_eq!(cache.rows.len(), 1);
        assert_eq!(cache.rows[0].discount_pct, 9.0);
    }

    #[test]
    fn required_load_fails_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(CandidateCache::load_required(&path).is_err());
    }
}
