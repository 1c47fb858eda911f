//! Price-vs-DCF classification.

use crate::types::ValuationStatus;

/// Fair-value band above the DCF estimate: up to 20% over DCF is FAIR.
pub const OVERVALUED_BUFFER: f64 = 0.20;

/// Outcome of classifying one symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Valuation {
    pub status: ValuationStatus,
    /// (DCF − price) / DCF × 100 when undervalued, else 0
    pub discount_pct: f64,
    /// (price − DCF) / DCF × 100 when fair or overvalued, else 0
    pub premium_pct: f64,
}

impl Valuation {
    fn no_data(status: ValuationStatus) -> Self {
        Self {
            status,
            discount_pct: 0.0,
            premium_pct: 0.0,
        }
    }
}

/// Classify a symbol from its current price and DCF intrinsic value.
///
/// UNDERVALUED iff price < dcf; FAIR iff dcf ≤ price ≤ dcf·(1+buffer);
/// OVERVALUED otherwise. Non-positive or missing inputs produce the
/// corresponding no-data status. Percentages are rounded to 2 decimals.
pub fn classify(price: Option<f64>, dcf: Option<f64>, buffer: f64) -> Valuation {
    let price = price.filter(|p| *p > 0.0);
    let dcf = dcf.filter(|d| *d > 0.0);

    let (price, dcf) = match (price, dcf) {
        (None, None) => return Valuation::no_data(ValuationStatus::DataUnavailable),
        (Some(_), None) => return Valuation::no_data(ValuationStatus::NoDcfData),
        (None, Some(_)) => return Valuation::no_data(ValuationStatus::NoPriceData),
        (Some(p), Some(d)) => (p, d),
    };

    if price < dcf {
        Valuation {
            status: ValuationStatus::Undervalued,
            discount_pct: round2((dcf - price) / dcf * 100.0),
            premium_pct: 0.0,
        }
    } else if price <= dcf * (1.0 + buffer) {
        Valuation {
            status: ValuationStatus::Fair,
            discount_pct: 0.0,
            premium_pct: round2((price - dcf) / dcf * 100.0),
        }
    } else {
        Valuation {
            status: ValuationStatus::Overvalued,
            discount_pct: 0.0,
            premium_pct: round2((price - dcf) / dcf * 100.0),
        }
    }
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undervalued_iff_price_below_dcf() {
        let v = classify(Some(90.0), Some(100.0), OVERVALUED_BUFFER);
        assert_eq!(v.status, ValuationStatus::Undervalued);
        assert_eq!(v.discount_pct, 10.0);
        assert_eq!(v.premium_pct, 0.0);
    }

    #[test]
    fn fair_at_dcf_and_within_buffer() {
        let v = classify(Some(100.0), Some(100.0), OVERVALUED_BUFFER);
        assert_eq!(v.status, ValuationStatus::Fair);
        assert_eq!(v.premium_pct, 0.0);

        // Exactly at the 1.2x boundary is still FAIR
        let v = classify(Some(120.0), Some(100.0), OVERVALUED_BUFFER);
        assert_eq!(v.status, ValuationStatus::Fair);
        assert_eq!(v.premium_pct, 20.0);
    }

    #[test]
    fn overvalued_above_buffer() {
        let v = classify(Some(130.0), Some(100.0), OVERVALUED_BUFFER);
        assert_eq!(v.status, ValuationStatus::Overvalued);
        assert_eq!(v.premium_pct, 30.0);
        assert_eq!(v.discount_pct, 0.0);
    }

    #[test]
    fn missing_inputs_tag_no_data() {
        assert_eq!(
            classify(Some(50.0), None, OVERVALUED_BUFFER).status,
            ValuationStatus::NoDcfData
        );
        assert_eq!(
            classify(None, Some(50.0), OVERVALUED_BUFFER).status,
            ValuationStatus::NoPriceData
        );
        assert_eq!(
            classify(None, None, OVERVALUED_BUFFER).status,
            ValuationStatus::DataUnavailable
        );
        // Non-positive values count as missing
        assert_eq!(
            classify(Some(0.0), Some(-5.0), OVERVALUED_BUFFER).status,
            ValuationStatus::DataUnavailable
        );
    }

    #[test]
    fn discount_rounds_to_two_decimals() {
        let v = classify(Some(66.6), Some(100.0), OVERVALUED_BUFFER);
        assert_eq!(v.discount_pct, 33.4);
    }
}
