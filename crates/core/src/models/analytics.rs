use serde::{Deserialize, Serialize};

/// Aggregated value for one category (sector or asset type).
///
/// Produced fresh on every recomputation; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBucket {
    /// Category label (e.g. "Technology", "ETF")
    pub category: String,

    /// Sum of holding values in this category
    pub value: f64,

    /// Share of the invested value: value / invested × 100 (0 when nothing is invested)
    pub percentage: f64,
}

/// Summary of one portfolio computed from its holdings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    /// Portfolio this summary was computed for
    pub portfolio_id: String,

    /// Total value declared by the data service (includes cash)
    pub declared_total_value: f64,

    /// Σ shares × price over all holdings
    pub invested_value: f64,

    /// declared total − invested, subject to the configured cash policy
    pub cash: f64,

    /// Number of holdings the summary was computed from
    pub holdings_count: usize,

    /// Value-weighted beta; holdings without a beta contribute 0
    pub weighted_beta: f64,

    /// Value-weighted dividend yield (percent); holdings without a yield contribute 0
    pub weighted_dividend_yield: f64,

    /// Sector breakdown, largest first
    pub sectors: Vec<CategoryBucket>,

    /// Asset-type breakdown, largest first
    pub asset_types: Vec<CategoryBucket>,
}

impl PortfolioMetrics {
    /// Metrics for a portfolio whose data could not be loaded.
    pub fn empty(portfolio_id: impl Into<String>) -> Self {
        Self {
            portfolio_id: portfolio_id.into(),
            declared_total_value: 0.0,
            invested_value: 0.0,
            cash: 0.0,
            holdings_count: 0,
            weighted_beta: 0.0,
            weighted_dividend_yield: 0.0,
            sectors: Vec::new(),
            asset_types: Vec::new(),
        }
    }
}
