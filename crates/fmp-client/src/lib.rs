//! Financial Modeling Prep (FMP) REST client.
//!
//! Thin typed wrappers over the v3 endpoints the screener consumes.
//! Failure policy follows the pipeline contract: 401/403 map to a fatal
//! auth error, 429 maps to a soft rate-limit error, and everything else
//! (timeouts, other HTTP errors, malformed bodies) is a soft per-call
//! failure. No call is ever retried here; pacing between calls is the
//! caller's job.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use screener_core::{CompanyProfile, RegionInfo, ScreenerError};
use serde::de::DeserializeOwned;
use serde::Deserialize;

const BASE_URL: &str = "https://financialmodelingprep.com/api/v3";

/// Request timeout matching the upstream socket timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Items per part returned by the bulk profile endpoint; a shorter page
/// means the last part was reached.
const PROFILE_BULK_PAGE: usize = 1000;

/// Fallback universe when the stock listing endpoint is unavailable.
const POPULAR_SYMBOLS: &[&str] = &[
    "AAPL", "MSFT", "GOOGL", "AMZN", "META", "TSLA", "NVDA", "BRK.B", "V", "JNJ",
    "WMT", "JPM", "MA", "PG", "UNH", "HD", "DIS", "BAC", "ADBE", "NFLX",
    "PYPL", "CMCSA", "KO", "PFE", "TMO", "COST", "AVGO", "CSCO", "PEP", "ABT",
    "NKE", "MRK", "T", "VZ", "CVX", "XOM", "LLY", "ABBV", "ACN", "DHR",
];

#[derive(Clone)]
pub struct FmpClient {
    api_key: String,
    client: Client,
    base_url: String,
}

impl FmpClient {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    /// GET a v3 endpoint and decode the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ScreenerError> {
        let url = format!("{}/{}", self.base_url, path);

        let mut query: Vec<(&str, String)> = vec![("apikey", self.api_key.clone())];
        query.extend(params.iter().cloned());

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ScreenerError::Api(format!("request timeout for {url}"))
                } else {
                    ScreenerError::Api(format!("request error for {url}: {e}"))
                }
            })?;

        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            let detail = response
                .json::<ApiErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error_message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(ScreenerError::Auth(detail));
        }
        if status == 429 {
            return Err(ScreenerError::RateLimited(url));
        }
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(ScreenerError::Api(format!(
                "HTTP {status} for {url}: {snippet}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ScreenerError::Parse(format!("{url}: {e}")))
    }

    /// Probe the API key with a cheap request before starting a run.
    /// Only a definite 401/403 fails validation; anything else proceeds.
    pub async fn validate_api_key(&self) -> Result<(), ScreenerError> {
        match self.get_json::<Vec<ProfileResponse>>("profile/AAPL", &[]).await {
            Ok(_) => {
                tracing::info!("API key is valid");
                Ok(())
            }
            Err(e @ ScreenerError::Auth(_)) => Err(e),
            Err(e) => {
                tracing::warn!("API key validation inconclusive ({e}), proceeding anyway");
                Ok(())
            }
        }
    }

    /// List all available stock symbols. Falls back to a built-in list of
    /// popular US symbols when the endpoint fails or returns nothing.
    pub async fn list_stocks(&self) -> Result<Vec<StockListing>, ScreenerError> {
        match self.get_json::<Vec<StockListing>>("stock/list", &[]).await {
            Ok(stocks) if !stocks.is_empty() => {
                tracing::info!("Fetched {} stocks from stock/list", stocks.len());
                Ok(stocks)
            }
            Ok(_) => {
                tracing::warn!("stock/list returned an empty list, using fallback symbols");
                Ok(fallback_listing())
            }
            Err(e @ ScreenerError::Auth(_)) => Err(e),
            Err(e) => {
                tracing::warn!("stock/list unavailable ({e}), using fallback symbols");
                Ok(fallback_listing())
            }
        }
    }

    /// Bulk DCF values for all symbols. Symbols without a positive DCF are
    /// dropped from the map.
    pub async fn dcf_bulk(&self) -> Result<HashMap<String, f64>, ScreenerError> {
        let items: Vec<DcfResponse> = self.get_json("dcf-bulk", &[]).await?;
        let mut dcf_map = HashMap::with_capacity(items.len());
        for item in items {
            if let Some(dcf) = item.dcf {
                if !item.symbol.is_empty() && dcf > 0.0 {
                    dcf_map.insert(item.symbol, dcf);
                }
            }
        }
        tracing::info!("Fetched bulk DCF values for {} symbols", dcf_map.len());
        Ok(dcf_map)
    }

    /// Bulk company profiles, paginated by `part` until a short page.
    /// `page_delay` paces consecutive part requests.
    pub async fn profiles_bulk(
        &self,
        page_delay: Duration,
    ) -> Result<HashMap<String, CompanyProfile>, ScreenerError> {
        let mut profiles = HashMap::new();
        let mut part: u32 = 0;

        loop {
            let items: Vec<ProfileResponse> = self
                .get_json("profile-bulk", &[("part", part.to_string())])
                .await?;
            if items.is_empty() {
                break;
            }
            let page_len = items.len();
            for item in items {
                if !item.symbol.is_empty() {
                    profiles.insert(item.symbol.clone(), item.company());
                }
            }
            if page_len < PROFILE_BULK_PAGE {
                break;
            }
            part += 1;
            tokio::time::sleep(page_delay).await;
        }

        tracing::info!("Fetched bulk profiles for {} symbols", profiles.len());
        Ok(profiles)
    }

    /// Per-symbol DCF estimate. The response also carries the current
    /// stock price, which saves a separate quote call when present.
    pub async fn dcf(&self, symbol: &str) -> Result<Option<DcfValuation>, ScreenerError> {
        let items: Vec<DcfResponse> = self
            .get_json(&format!("discounted-cash-flow/{symbol}"), &[])
            .await?;
        Ok(items.into_iter().next().and_then(|item| {
            let dcf = item.dcf.filter(|d| *d > 0.0)?;
            Some(DcfValuation {
                dcf,
                stock_price: item.stock_price.filter(|p| *p > 0.0),
                date: item.date,
            })
        }))
    }

    /// Current quote for a symbol (price + shares outstanding).
    pub async fn quote(&self, symbol: &str) -> Result<Option<QuoteData>, ScreenerError> {
        let items: Vec<QuoteResponse> = self.get_json(&format!("quote/{symbol}"), &[]).await?;
        Ok(items.into_iter().next().map(|q| QuoteData {
            price: q.price.filter(|p| *p > 0.0),
            shares_outstanding: q.shares_outstanding,
        }))
    }

    /// Full company profile including region metadata and market cap.
    pub async fn profile(&self, symbol: &str) -> Result<Option<FmpProfile>, ScreenerError> {
        let items: Vec<ProfileResponse> = self
            .get_json(&format!("profile/{symbol}"), &[])
            .await?;
        Ok(items.into_iter().next().map(FmpProfile::from))
    }

    /// Market capitalization with the upstream fallback chain:
    /// key-metrics, then profile, then quote (price × shares outstanding).
    /// Soft failures move on to the next source; auth errors propagate.
    pub async fn market_cap(&self, symbol: &str) -> Result<Option<f64>, ScreenerError> {
        match self.key_metrics_market_cap(symbol).await {
            Ok(Some(cap)) => return Ok(Some(cap)),
            Err(e) if e.is_fatal() => return Err(e),
            Ok(None) | Err(_) => {}
        }

        match self.profile(symbol).await {
            Ok(Some(profile)) => {
                if let Some(cap) = profile.market_cap.filter(|c| *c > 0.0) {
                    return Ok(Some(cap));
                }
            }
            Err(e) if e.is_fatal() => return Err(e),
            Ok(None) | Err(_) => {}
        }

        match self.quote(symbol).await {
            Ok(Some(quote)) => {
                if let (Some(price), Some(shares)) = (quote.price, quote.shares_outstanding) {
                    let cap = price * shares;
                    if cap > 0.0 {
                        return Ok(Some(cap));
                    }
                }
                Ok(None)
            }
            Err(e) if e.is_fatal() => Err(e),
            Ok(None) | Err(_) => Ok(None),
        }
    }

    async fn key_metrics_market_cap(&self, symbol: &str) -> Result<Option<f64>, ScreenerError> {
        let items: Vec<KeyMetricsResponse> = self
            .get_json(&format!("key-metrics/{symbol}"), &[])
            .await?;
        Ok(items
            .into_iter()
            .next()
            .and_then(|m| m.market_cap)
            .filter(|cap| *cap > 0.0))
    }
}

fn fallback_listing() -> Vec<StockListing> {
    POPULAR_SYMBOLS
        .iter()
        .map(|s| StockListing {
            symbol: s.to_string(),
            name: None,
            exchange_short_name: None,
        })
        .collect()
}

/// Entry from the stock listing endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct StockListing {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "exchangeShortName")]
    pub exchange_short_name: Option<String>,
}

/// Per-symbol DCF estimate
#[derive(Debug, Clone, PartialEq)]
pub struct DcfValuation {
    pub dcf: f64,
    /// Current price as reported alongside the DCF, when present
    pub stock_price: Option<f64>,
    pub date: Option<String>,
}

/// Per-symbol quote
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteData {
    pub price: Option<f64>,
    pub shares_outstanding: Option<f64>,
}

/// Decoded company profile
#[derive(Debug, Clone)]
pub struct FmpProfile {
    pub symbol: String,
    pub company_name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub exchange_short_name: Option<String>,
    pub currency: Option<String>,
    pub market_cap: Option<f64>,
}

impl FmpProfile {
    pub fn company(&self) -> CompanyProfile {
        CompanyProfile {
            company_name: self
                .company_name
                .clone()
                .unwrap_or_else(|| self.symbol.clone()),
            sector: self.sector.clone(),
            industry: self.industry.clone(),
        }
    }

    pub fn region(&self) -> RegionInfo {
        RegionInfo {
            country: self.country.clone(),
            city: self.city.clone(),
            state: self.state.clone(),
            address: self.address.clone(),
            phone: self.phone.clone(),
            website: self.website.clone(),
            exchange: self.exchange_short_name.clone(),
            currency: self.currency.clone(),
        }
    }
}

impl From<ProfileResponse> for FmpProfile {
    fn from(r: ProfileResponse) -> Self {
        Self {
            symbol: r.symbol,
            company_name: r.company_name,
            sector: r.sector,
            industry: r.industry,
            country: r.country,
            city: r.city,
            state: r.state,
            address: r.address,
            phone: r.phone,
            website: r.website,
            exchange_short_name: r.exchange_short_name,
            currency: r.currency,
            market_cap: r.mkt_cap,
        }
    }
}

// Response structures

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DcfResponse {
    #[serde(default)]
    symbol: String,
    #[serde(default)]
    dcf: Option<f64>,
    #[serde(default, rename = "Stock Price")]
    stock_price: Option<f64>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    price: Option<f64>,
    #[serde(default, rename = "sharesOutstanding")]
    shares_outstanding: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    symbol: String,
    #[serde(default, rename = "companyName")]
    company_name: Option<String>,
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    industry: Option<String>,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    website: Option<String>,
    #[serde(default, rename = "exchangeShortName")]
    exchange_short_name: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default, rename = "mktCap")]
    mkt_cap: Option<f64>,
}

impl ProfileResponse {
    fn company(&self) -> CompanyProfile {
        CompanyProfile {
            company_name: self
                .company_name
                .clone()
                .unwrap_or_else(|| self.symbol.clone()),
            sector: self.sector.clone(),
            industry: self.industry.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeyMetricsResponse {
    #[serde(default, rename = "marketCap")]
    market_cap: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dcf_response_reads_stock_price_field() {
        let body = r#"[{"symbol":"AAPL","date":"2024-05-01","dcf":151.2,"Stock Price":148.9}]"#;
        let items: Vec<DcfResponse> = serde_json::from_str(body).unwrap();
        assert_eq!(items[0].symbol, "AAPL");
        assert_eq!(items[0].dcf, Some(151.2));
        assert_eq!(items[0].stock_price, Some(148.9));
    }

    #[test]
    fn profile_response_maps_region_fields() {
        let body = r#"[{"symbol":"AAPL","companyName":"Apple Inc.","sector":"Technology",
            "country":"US","city":"Cupertino","exchangeShortName":"NASDAQ",
            "currency":"USD","mktCap":2800000000000.0}]"#;
        let items: Vec<ProfileResponse> = serde_json::from_str(body).unwrap();
        let profile = FmpProfile::from(items.into_iter().next().unwrap());

        let region = profile.region();
        assert_eq!(region.country.as_deref(), Some("US"));
        assert_eq!(region.exchange.as_deref(), Some("NASDAQ"));
        assert_eq!(region.currency.as_deref(), Some("USD"));
        assert_eq!(region.state, None);

        let company = profile.company();
        assert_eq!(company.company_name, "Apple Inc.");
        assert_eq!(company.sector.as_deref(), Some("Technology"));
    }

    #[test]
    fn profile_company_falls_back_to_symbol() {
        let body = r#"[{"symbol":"XYZ"}]"#;
        let items: Vec<ProfileResponse> = serde_json::from_str(body).unwrap();
        assert_eq!(items[0].company().company_name, "XYZ");
    }

    #[test]
    fn fallback_listing_is_nonempty() {
        let listing = fallback_listing();
        assert_eq!(listing.len(), POPULAR_SYMBOLS.len());
        assert!(listing.iter().any(|s| s.symbol == "AAPL"));
    }
}
