pub mod errors;
pub mod models;
pub mod providers;
pub mod services;

use std::sync::Arc;
use tracing::{info, warn};

use models::{
    analytics::PortfolioMetrics,
    holding::Holding,
    insight::{InsightEntry, InsightRecord},
    news::{ContextCacheEntry, ContextKey, NewsItem},
    settings::Settings,
};
use providers::{http::HttpDataService, traits::DataService};
use services::{
    context_service::{Clock, ContextCache},
    insight_service::InsightReconciler,
    metrics_service::MetricsEngine,
    rotation_service::RotationScheduler,
};

use errors::CoreError;

/// Main entry point for the dashboard core.
///
/// Wires the pipeline a view runs for the selected portfolio: metrics from
/// holdings, reconciled insights, contextual news, and the rotation timer
/// that cycles through portfolios. No method here returns a transport
/// error; every failure degrades to a defined default and is logged.
#[must_use]
pub struct InsightDashboard {
    service: Arc<dyn DataService>,
    settings: Settings,
    metrics: MetricsEngine,
    reconciler: InsightReconciler,
    context: Arc<ContextCache>,
    rotation: RotationScheduler,
}

impl std::fmt::Debug for InsightDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightDashboard")
            .field("service", &self.service.name())
            .field("settings", &self.settings)
            .field("cached_context_keys", &self.context.len())
            .field("portfolios", &self.rotation.portfolio_count())
            .field("rotating", &self.rotation.is_running())
            .finish()
    }
}

impl InsightDashboard {
    /// Build a dashboard over any `DataService`.
    pub fn new(service: Arc<dyn DataService>, settings: Settings) -> Result<Self, CoreError> {
        settings.validate()?;
        let context = Arc::new(ContextCache::new(Arc::clone(&service), &settings));
        Ok(Self::build(service, settings, context))
    }

    /// Same as `new`, with an explicit clock for the news cache.
    pub fn with_clock(
        service: Arc<dyn DataService>,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        settings.validate()?;
        let context = Arc::new(ContextCache::with_clock(Arc::clone(&service), &settings, clock));
        Ok(Self::build(service, settings, context))
    }

    /// Dashboard talking HTTP to the services named in `settings`.
    pub fn connect(settings: Settings) -> Result<Self, CoreError> {
        let service: Arc<dyn DataService> = Arc::new(HttpDataService::new(&settings));
        Self::new(service, settings)
    }

    fn build(service: Arc<dyn DataService>, settings: Settings, context: Arc<ContextCache>) -> Self {
        let rotation = RotationScheduler::new(Arc::clone(&context), settings.rotation_interval());
        Self {
            metrics: MetricsEngine::new(settings.cash_policy),
            reconciler: InsightReconciler::new(),
            service,
            settings,
            context,
            rotation,
        }
    }

    // ── Accessors ───────────────────────────────────────────────────

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn metrics(&self) -> &MetricsEngine {
        &self.metrics
    }

    #[must_use]
    pub fn reconciler(&self) -> &InsightReconciler {
        &self.reconciler
    }

    #[must_use]
    pub fn context(&self) -> &Arc<ContextCache> {
        &self.context
    }

    #[must_use]
    pub fn rotation(&self) -> &RotationScheduler {
        &self.rotation
    }

    // ── Metrics ─────────────────────────────────────────────────────

    /// Metrics for one portfolio. Load failures yield empty metrics.
    pub async fn portfolio_overview(&self, portfolio_id: &str) -> PortfolioMetrics {
        let portfolio = match self.service.fetch_portfolio(portfolio_id).await {
            Ok(p) => p,
            Err(e) => {
                warn!(portfolio_id, error = %e, "cannot load portfolio");
                return PortfolioMetrics::empty(portfolio_id);
            }
        };
        let holdings: Vec<Holding> = match self.service.fetch_holdings(portfolio_id).await {
            Ok(h) => h,
            Err(e) => {
                warn!(portfolio_id, error = %e, "cannot load holdings");
                return PortfolioMetrics::empty(portfolio_id);
            }
        };
        self.metrics.summarize(&portfolio, &holdings)
    }

    // ── Insights ────────────────────────────────────────────────────

    /// Insights of a portfolio, newest first, each reconciled once.
    pub async fn insights_for_portfolio(&self, portfolio_id: &str) -> Vec<InsightEntry> {
        let records = self.service.fetch_insights_by_portfolio(portfolio_id).await;
        self.prepare_insights(records, "portfolio", portfolio_id)
    }

    /// Insights of a client across portfolios, newest first.
    pub async fn insights_for_client(&self, client_id: &str) -> Vec<InsightEntry> {
        let records = self.service.fetch_insights_by_client(client_id).await;
        self.prepare_insights(records, "client", client_id)
    }

    fn prepare_insights(
        &self,
        records: Result<Vec<InsightRecord>, CoreError>,
        scope: &str,
        id: &str,
    ) -> Vec<InsightEntry> {
        match records {
            Ok(records) => {
                info!(scope, id, count = records.len(), "loaded insights");
                self.reconciler.prepare(records)
            }
            Err(e) => {
                warn!(scope, id, error = %e, "cannot load insights");
                Vec::new()
            }
        }
    }

    /// Request a fresh insight. Blank preferences are replaced by the
    /// configured default. `None` if generation failed.
    pub async fn generate_insight(
        &self,
        portfolio_id: &str,
        preferences: &str,
        client_id: &str,
    ) -> Option<InsightEntry> {
        let preferences = if preferences.trim().is_empty() {
            self.settings.default_preferences.as_str()
        } else {
            preferences
        };
        match self
            .service
            .generate_insight(portfolio_id, preferences, client_id)
            .await
        {
            Ok(record) => Some(self.reconciler.entry(record)),
            Err(e) => {
                warn!(portfolio_id, client_id, error = %e, "insight generation failed");
                None
            }
        }
    }

    // ── Context news ────────────────────────────────────────────────

    /// Contextual news for a portfolio (cached for the configured TTL).
    pub async fn context_news(&self, portfolio_id: &str) -> ContextCacheEntry {
        self.context.get(&ContextKey::portfolio(portfolio_id)).await
    }

    /// General market news, used when no portfolio is selected.
    pub async fn market_news(&self) -> ContextCacheEntry {
        self.context.get(&ContextKey::Global).await
    }

    /// The news set currently on display.
    pub fn displayed_news(&self) -> Vec<NewsItem> {
        self.context.active()
    }

    // ── Rotation ────────────────────────────────────────────────────

    pub fn set_portfolios(&self, portfolio_ids: Vec<String>) {
        self.rotation.set_portfolios(portfolio_ids);
    }

    pub fn start_rotation(&self) {
        self.rotation.start();
    }

    pub fn stop_rotation(&self) {
        self.rotation.stop();
    }

    /// Manually pick a portfolio; restarts the rotation window.
    pub async fn select_portfolio(&self, index: usize) -> Option<ContextCacheEntry> {
        self.rotation.select(index).await
    }
}
