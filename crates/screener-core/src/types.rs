use std::fmt;

use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize};

/// Valuation of a symbol relative to its DCF estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValuationStatus {
    Undervalued,
    Fair,
    Overvalued,
    /// Price available but no DCF estimate
    NoDcfData,
    /// DCF estimate available but no price
    NoPriceData,
    /// Neither price nor DCF available
    #[default]
    DataUnavailable,
}

impl ValuationStatus {
    /// True when both price and DCF were available for classification
    pub fn has_data(&self) -> bool {
        matches!(
            self,
            ValuationStatus::Undervalued | ValuationStatus::Fair | ValuationStatus::Overvalued
        )
    }

    /// Parse a status label, tolerating edited tables: unknown or empty
    /// text maps to `DataUnavailable` instead of failing the read.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "UNDERVALUED" => ValuationStatus::Undervalued,
            "FAIR" => ValuationStatus::Fair,
            "OVERVALUED" => ValuationStatus::Overvalued,
            "NO_DCF_DATA" => ValuationStatus::NoDcfData,
            "NO_PRICE_DATA" => ValuationStatus::NoPriceData,
            _ => ValuationStatus::DataUnavailable,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ValuationStatus::Undervalued => "UNDERVALUED",
            ValuationStatus::Fair => "FAIR",
            ValuationStatus::Overvalued => "OVERVALUED",
            ValuationStatus::NoDcfData => "NO_DCF_DATA",
            ValuationStatus::NoPriceData => "NO_PRICE_DATA",
            ValuationStatus::DataUnavailable => "DATA_UNAVAILABLE",
        }
    }
}

/// Company metadata kept in the symbol cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub company_name: String,
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
}

/// Region metadata fetched by the enrichment stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
}

/// One row of the screening table. Field order defines the CSV column
/// order; the serde renames are the exact output headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenedStock {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Company Name", default)]
    pub company_name: String,
    #[serde(rename = "Current Price", default, deserialize_with = "cell_opt_f64")]
    pub current_price: Option<f64>,
    #[serde(rename = "DCF Price", default, deserialize_with = "cell_opt_f64")]
    pub dcf_price: Option<f64>,
    #[serde(rename = "Discount %", default, deserialize_with = "cell_f64")]
    pub discount_pct: f64,
    #[serde(rename = "Premium %", default, deserialize_with = "cell_f64")]
    pub premium_pct: f64,
    #[serde(rename = "Valuation Status", default, deserialize_with = "cell_status")]
    pub valuation_status: ValuationStatus,
    #[serde(rename = "Sector", default)]
    pub sector: Option<String>,
    #[serde(rename = "Industry", default)]
    pub industry: Option<String>,
    #[serde(rename = "Market Cap", default, deserialize_with = "cell_opt_f64")]
    pub market_cap: Option<f64>,
    #[serde(rename = "Country", default)]
    pub country: Option<String>,
    #[serde(rename = "City", default)]
    pub city: Option<String>,
    #[serde(rename = "State", default)]
    pub state: Option<String>,
    #[serde(rename = "Exchange", default)]
    pub exchange: Option<String>,
    #[serde(rename = "Currency", default)]
    pub currency: Option<String>,
    #[serde(rename = "Address", default)]
    pub address: Option<String>,
    #[serde(rename = "Phone", default)]
    pub phone: Option<String>,
    #[serde(rename = "Website", default)]
    pub website: Option<String>,
    #[serde(rename = "Region_Fetched", default, deserialize_with = "cell_opt_bool")]
    pub region_fetched: Option<bool>,
    #[serde(rename = "Timestamp", default)]
    pub timestamp: String,
    #[serde(rename = "Region_Fetch_Timestamp", default)]
    pub region_fetch_timestamp: Option<String>,
}

impl ScreenedStock {
    /// Minimal row: everything beyond identity and valuation left empty
    pub fn new(symbol: impl Into<String>, company_name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            company_name: company_name.into(),
            current_price: None,
            dcf_price: None,
            discount_pct: 0.0,
            premium_pct: 0.0,
            valuation_status: ValuationStatus::DataUnavailable,
            sector: None,
            industry: None,
            market_cap: None,
            country: None,
            city: None,
            state: None,
            exchange: None,
            currency: None,
            address: None,
            phone: None,
            website: None,
            region_fetched: None,
            timestamp: String::new(),
            region_fetch_timestamp: None,
        }
    }

    /// Copy region metadata onto the row and mark it fetched
    pub fn apply_region(&mut self, region: &RegionInfo) {
        self.country = region.country.clone();
        self.city = region.city.clone();
        self.state = region.state.clone();
        self.address = region.address.clone();
        self.phone = region.phone.clone();
        self.website = region.website.clone();
        self.exchange = region.exchange.clone();
        self.currency = region.currency.clone();
        self.region_fetched = Some(true);
    }
}

// Lenient cell deserializers. Tables come back from external edits with
// empty or garbage cells; a bad cell degrades to the field's empty value
// instead of failing the whole read. They also accept the native JSON
// types so the cache documents keep round-tripping.

fn cell_opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    struct CellF64;

    impl Visitor<'_> for CellF64 {
        type Value = Option<f64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a number or numeric text")
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(v as f64))
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(v.trim().parse().ok())
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    d.deserialize_any(CellF64)
}

fn cell_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    Ok(cell_opt_f64(d)?.unwrap_or(0.0))
}

fn cell_status<'de, D: Deserializer<'de>>(d: D) -> Result<ValuationStatus, D::Error> {
    struct CellStatus;

    impl Visitor<'_> for CellStatus {
        type Value = ValuationStatus;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a valuation status label")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(ValuationStatus::from_label(v))
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(ValuationStatus::DataUnavailable)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(ValuationStatus::DataUnavailable)
        }
    }

    d.deserialize_any(CellStatus)
}

fn cell_opt_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    struct CellBool;

    impl Visitor<'_> for CellBool {
        type Value = Option<bool>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a boolean or boolean text")
        }

        fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
            Ok(match v.trim().to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            })
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
    }

    d.deserialize_any(CellBool)
}
