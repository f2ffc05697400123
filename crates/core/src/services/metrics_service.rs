use std::collections::BTreeMap;

use crate::models::analytics::{CategoryBucket, PortfolioMetrics};
use crate::models::holding::{Holding, Portfolio, UNKNOWN_CATEGORY};
use crate::models::settings::CashPolicy;

/// Derives financial metrics from a raw holdings list.
///
/// Pure business logic with no I/O and no state. Negative or non-finite share
/// counts and prices are clamped to 0 before they enter any sum.
pub struct MetricsEngine {
    cash_policy: CashPolicy,
}

impl MetricsEngine {
    pub fn new(cash_policy: CashPolicy) -> Self {
        Self { cash_policy }
    }

    pub fn cash_policy(&self) -> CashPolicy {
        self.cash_policy
    }

    /// Value of a holding with invalid inputs clamped to 0.
    pub fn holding_value(holding: &Holding) -> f64 {
        holding.value()
    }

    /// Σ shares × price over all holdings.
    pub fn invested_value(&self, holdings: &[Holding]) -> f64 {
        holdings.iter().map(Self::holding_value).sum()
    }

    /// Uninvested part of the declared total, per the configured policy.
    pub fn cash(&self, declared_total: f64, invested: f64) -> f64 {
        let cash = declared_total - invested;
        match self.cash_policy {
            CashPolicy::Propagate => cash,
            CashPolicy::ClampToZero => cash.max(0.0),
        }
    }

    /// Σ (value / invested) × selector(holding).
    ///
    /// A holding for which `selector` yields `None` contributes 0; the
    /// remaining weights are NOT renormalized. Returns 0 when nothing is invested.
    pub fn weighted_average<F>(&self, holdings: &[Holding], selector: F, invested: f64) -> f64
    where
        F: Fn(&Holding) -> Option<f64>,
    {
        if invested <= 0.0 || !invested.is_finite() {
            return 0.0;
        }
        holdings
            .iter()
            .filter_map(|h| {
                let metric = selector(h).filter(|m| m.is_finite())?;
                Some(Self::holding_value(h) / invested * metric)
            })
            .sum()
    }

    /// Group holdings by `key_fn` and compute each category's value and share.
    ///
    /// Sorted by value descending; equal values are ordered by ascending label.
    /// Empty labels are grouped under "Unknown".
    pub fn bucket_by<F>(&self, holdings: &[Holding], key_fn: F, invested: f64) -> Vec<CategoryBucket>
    where
        F: Fn(&Holding) -> &str,
    {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for holding in holdings {
            let key = key_fn(holding).trim();
            let key = if key.is_empty() { UNKNOWN_CATEGORY } else { key };
            *totals.entry(key).or_insert(0.0) += Self::holding_value(holding);
        }

        let mut buckets: Vec<CategoryBucket> = totals
            .into_iter()
            .map(|(category, value)| CategoryBucket {
                category: category.to_string(),
                value,
                percentage: if invested > 0.0 {
                    value / invested * 100.0
                } else {
                    0.0
                },
            })
            .collect();

        // BTreeMap iteration already yields labels ascending; a stable sort on
        // value keeps that order among ties.
        buckets.sort_by(|a, b| b.value.total_cmp(&a.value));
        buckets
    }

    /// Full metrics summary for one portfolio.
    pub fn summarize(&self, portfolio: &Portfolio, holdings: &[Holding]) -> PortfolioMetrics {
        let invested = self.invested_value(holdings);
        PortfolioMetrics {
            portfolio_id: portfolio.id.clone(),
            declared_total_value: portfolio.declared_total_value,
            invested_value: invested,
            cash: self.cash(portfolio.declared_total_value, invested),
            holdings_count: holdings.len(),
            weighted_beta: self.weighted_average(holdings, |h| h.beta, invested),
            weighted_dividend_yield: self.weighted_average(holdings, |h| h.dividend_yield, invested),
            sectors: self.bucket_by(holdings, |h| h.sector.as_str(), invested),
            asset_types: self.bucket_by(holdings, |h| h.asset_type.as_str(), invested),
        }
    }
}

impl Default for MetricsEngine {
    fn default() -> Self {
        Self::new(CashPolicy::default())
    }
}
