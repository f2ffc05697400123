use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::CoreError;

/// Label used when a holding carries no sector or asset type.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

fn unknown_category() -> String {
    UNKNOWN_CATEGORY.to_string()
}

/// Accepts ids sent either as JSON numbers (`42`) or strings (`"42"`).
pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(n) => n.to_string(),
    })
}

fn null_as_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(s) if !s.trim().is_empty() => s,
        _ => unknown_category(),
    })
}

/// One position within a portfolio.
///
/// Fetched per view and never persisted client-side. `value()` is derived,
/// never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    /// Ticker symbol (e.g. "AAPL"). May be empty on malformed rows.
    #[serde(default)]
    pub ticker: String,

    /// Number of shares held (≥ 0).
    #[serde(default)]
    pub shares: f64,

    /// Price per share (≥ 0).
    #[serde(default)]
    pub price_per_share: f64,

    /// Sector label, "Unknown" when absent.
    #[serde(default = "unknown_category", deserialize_with = "null_as_unknown")]
    pub sector: String,

    /// Asset type label (Stock, Bond, ETF, REIT…), "Unknown" when absent.
    #[serde(default = "unknown_category", deserialize_with = "null_as_unknown")]
    pub asset_type: String,

    /// Volatility relative to the market.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,

    /// Annual dividend yield as a percentage (0–100).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dividend_yield: Option<f64>,
}

impl Holding {
    pub fn new(ticker: impl Into<String>, shares: f64, price_per_share: f64) -> Self {
        Self {
            ticker: ticker.into(),
            shares,
            price_per_share,
            sector: unknown_category(),
            asset_type: unknown_category(),
            beta: None,
            dividend_yield: None,
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = sector.into();
        self
    }

    pub fn with_asset_type(mut self, asset_type: impl Into<String>) -> Self {
        self.asset_type = asset_type.into();
        self
    }

    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = Some(beta);
        self
    }

    pub fn with_dividend_yield(mut self, dividend_yield: f64) -> Self {
        self.dividend_yield = Some(dividend_yield);
        self
    }

    /// Market value of the position: `shares × price_per_share`, with a
    /// negative or non-finite factor counted as 0.
    pub fn value(&self) -> f64 {
        clamp_non_negative(self.shares) * clamp_non_negative(self.price_per_share)
    }

    /// Reject holdings whose quantity or price is negative or not finite.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (field, v) in [("shares", self.shares), ("pricePerShare", self.price_per_share)] {
            if !v.is_finite() || v < 0.0 {
                return Err(CoreError::ValidationError(format!(
                    "{field} for {} must be a finite non-negative number, got {v}",
                    self.ticker
                )));
            }
        }
        if let Some(y) = self.dividend_yield {
            if !(0.0..=100.0).contains(&y) {
                return Err(CoreError::ValidationError(format!(
                    "dividendYield for {} must be within 0–100, got {y}",
                    self.ticker
                )));
            }
        }
        Ok(())
    }
}

/// A client portfolio as returned by the data service.
///
/// `declared_total_value` includes cash; invested value and cash are derived
/// from the holdings by the metrics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Portfolio {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "string_or_number_opt")]
    pub client_id: String,

    #[serde(rename = "totalValue", alias = "declaredTotalValue", default)]
    pub declared_total_value: f64,
}

fn string_or_number_opt<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "string_or_number")] String);

    let value: Option<Wrapper> = Option::deserialize(deserializer)?;
    Ok(value.map(|w| w.0).unwrap_or_default())
}

impl Portfolio {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        client_id: impl Into<String>,
        declared_total_value: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            client_id: client_id.into(),
            declared_total_value,
        }
    }
}

fn clamp_non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}
