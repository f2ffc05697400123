use async_trait::async_trait;

use crate::errors::CoreError;
use crate::models::holding::{Holding, Portfolio};
use crate::models::insight::InsightRecord;
use crate::models::news::RawNewsItem;

/// Everything the dashboard core needs from the outside world.
///
/// The HTTP implementation lives in `providers::http`; tests substitute
/// in-memory mocks. Implementations report failures as `CoreError` and
/// leave recovery to the services.
#[async_trait]
pub trait DataService: Send + Sync {
    /// Human-readable name of this backend (for logs/errors).
    fn name(&self) -> &str;

    async fn fetch_portfolio(&self, id: &str) -> Result<Portfolio, CoreError>;

    async fn fetch_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>, CoreError>;

    async fn fetch_insights_by_portfolio(
        &self,
        portfolio_id: &str,
    ) -> Result<Vec<InsightRecord>, CoreError>;

    async fn fetch_insights_by_client(
        &self,
        client_id: &str,
    ) -> Result<Vec<InsightRecord>, CoreError>;

    /// Ask the (opaque) generator for a new insight on a portfolio.
    async fn generate_insight(
        &self,
        portfolio_id: &str,
        preferences: &str,
        client_id: &str,
    ) -> Result<InsightRecord, CoreError>;

    /// Lightweight reachability check of the context service.
    async fn probe_context_service(&self) -> Result<(), CoreError>;

    async fn fetch_generic_news(&self) -> Result<Vec<RawNewsItem>, CoreError>;

    async fn fetch_portfolio_news(
        &self,
        portfolio_id: &str,
        tickers: &[String],
    ) -> Result<Vec<RawNewsItem>, CoreError>;
}
