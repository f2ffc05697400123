// ═══════════════════════════════════════════════════════════════════
// Shared test doubles — scripted DataService, manual clock
// ═══════════════════════════════════════════════════════════════════

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use portfolio_insight_core::errors::CoreError;
use portfolio_insight_core::models::holding::{Holding, Portfolio};
use portfolio_insight_core::models::insight::InsightRecord;
use portfolio_insight_core::models::news::RawNewsItem;
use portfolio_insight_core::providers::traits::DataService;
use portfolio_insight_core::services::context_service::Clock;

/// How a mocked call completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Fail,
    /// Never completes within any test deadline.
    Hang,
}

async fn settle(outcome: Outcome, call: &str) -> Result<(), CoreError> {
    match outcome {
        Outcome::Succeed => Ok(()),
        Outcome::Fail => Err(CoreError::Network(format!("{call}: connection refused"))),
        Outcome::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(CoreError::Network(format!("{call}: hung")))
        }
    }
}

/// In-memory `DataService` with per-call outcomes and a call log.
pub struct MockDataService {
    portfolios: HashMap<String, Portfolio>,
    holdings: HashMap<String, Vec<Holding>>,
    insights_by_portfolio: HashMap<String, Vec<InsightRecord>>,
    insights_by_client: HashMap<String, Vec<InsightRecord>>,
    generated: Option<InsightRecord>,
    generic_news: Vec<RawNewsItem>,
    portfolio_news: HashMap<String, Vec<RawNewsItem>>,
    holdings_delay: HashMap<String, Duration>,

    probe_outcome: Outcome,
    holdings_outcome: Outcome,
    insights_outcome: Outcome,
    generic_outcome: Outcome,
    news_outcome: Outcome,

    /// Overrides for successive portfolio news calls: (delay, response).
    scripted_news: Mutex<VecDeque<(Duration, Vec<RawNewsItem>)>>,
    calls: Mutex<Vec<String>>,
    last_preferences: Mutex<Option<String>>,
}

impl MockDataService {
    pub fn new() -> Self {
        Self {
            portfolios: HashMap::new(),
            holdings: HashMap::new(),
            insights_by_portfolio: HashMap::new(),
            insights_by_client: HashMap::new(),
            generated: None,
            generic_news: Vec::new(),
            portfolio_news: HashMap::new(),
            holdings_delay: HashMap::new(),
            probe_outcome: Outcome::Succeed,
            holdings_outcome: Outcome::Succeed,
            insights_outcome: Outcome::Succeed,
            generic_outcome: Outcome::Succeed,
            news_outcome: Outcome::Succeed,
            scripted_news: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            last_preferences: Mutex::new(None),
        }
    }

    pub fn with_portfolio(mut self, portfolio: Portfolio, holdings: Vec<Holding>) -> Self {
        self.holdings.insert(portfolio.id.clone(), holdings);
        self.portfolios.insert(portfolio.id.clone(), portfolio);
        self
    }

    pub fn with_portfolio_news(mut self, portfolio_id: &str, items: Vec<RawNewsItem>) -> Self {
        self.portfolio_news.insert(portfolio_id.to_string(), items);
        self
    }

    pub fn with_generic_news(mut self, items: Vec<RawNewsItem>) -> Self {
        self.generic_news = items;
        self
    }

    pub fn with_portfolio_insights(mut self, portfolio_id: &str, records: Vec<InsightRecord>) -> Self {
        self.insights_by_portfolio.insert(portfolio_id.to_string(), records);
        self
    }

    pub fn with_client_insights(mut self, client_id: &str, records: Vec<InsightRecord>) -> Self {
        self.insights_by_client.insert(client_id.to_string(), records);
        self
    }

    pub fn with_generated(mut self, record: InsightRecord) -> Self {
        self.generated = Some(record);
        self
    }

    /// Delay every holdings response for `portfolio_id`.
    pub fn with_holdings_delay(mut self, portfolio_id: &str, delay: Duration) -> Self {
        self.holdings_delay.insert(portfolio_id.to_string(), delay);
        self
    }

    pub fn probe(mut self, outcome: Outcome) -> Self {
        self.probe_outcome = outcome;
        self
    }

    pub fn holdings_outcome(mut self, outcome: Outcome) -> Self {
        self.holdings_outcome = outcome;
        self
    }

    pub fn insights_outcome(mut self, outcome: Outcome) -> Self {
        self.insights_outcome = outcome;
        self
    }

    pub fn generic(mut self, outcome: Outcome) -> Self {
        self.generic_outcome = outcome;
        self
    }

    pub fn news(mut self, outcome: Outcome) -> Self {
        self.news_outcome = outcome;
        self
    }

    /// Queue a response for the next portfolio news call, delivered after `delay`.
    pub fn script_news(&self, delay: Duration, items: Vec<RawNewsItem>) {
        self.scripted_news.lock().unwrap().push_back((delay, items));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn last_preferences(&self) -> Option<String> {
        self.last_preferences.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl DataService for MockDataService {
    fn name(&self) -> &str {
        "MockDataService"
    }

    async fn fetch_portfolio(&self, id: &str) -> Result<Portfolio, CoreError> {
        self.record(format!("portfolio:{id}"));
        self.portfolios
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("portfolio {id}")))
    }

    async fn fetch_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>, CoreError> {
        self.record(format!("holdings:{portfolio_id}"));
        if let Some(delay) = self.holdings_delay.get(portfolio_id) {
            tokio::time::sleep(*delay).await;
        }
        settle(self.holdings_outcome, "holdings").await?;
        Ok(self.holdings.get(portfolio_id).cloned().unwrap_or_default())
    }

    async fn fetch_insights_by_portfolio(
        &self,
        portfolio_id: &str,
    ) -> Result<Vec<InsightRecord>, CoreError> {
        self.record(format!("insights-portfolio:{portfolio_id}"));
        settle(self.insights_outcome, "insights").await?;
        Ok(self
            .insights_by_portfolio
            .get(portfolio_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_insights_by_client(&self, client_id: &str) -> Result<Vec<InsightRecord>, CoreError> {
        self.record(format!("insights-client:{client_id}"));
        settle(self.insights_outcome, "insights").await?;
        Ok(self
            .insights_by_client
            .get(client_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn generate_insight(
        &self,
        portfolio_id: &str,
        preferences: &str,
        client_id: &str,
    ) -> Result<InsightRecord, CoreError> {
        self.record(format!("generate:{portfolio_id}:{client_id}"));
        *self.last_preferences.lock().unwrap() = Some(preferences.to_string());
        self.generated.clone().ok_or_else(|| CoreError::Api {
            service: "MockDataService".into(),
            message: "generator offline".into(),
        })
    }

    async fn probe_context_service(&self) -> Result<(), CoreError> {
        self.record("probe".to_string());
        settle(self.probe_outcome, "probe").await
    }

    async fn fetch_generic_news(&self) -> Result<Vec<RawNewsItem>, CoreError> {
        self.record("generic-news".to_string());
        settle(self.generic_outcome, "generic news").await?;
        Ok(self.generic_news.clone())
    }

    async fn fetch_portfolio_news(
        &self,
        portfolio_id: &str,
        tickers: &[String],
    ) -> Result<Vec<RawNewsItem>, CoreError> {
        self.record(format!("portfolio-news:{portfolio_id}:{}", tickers.join(",")));
        let scripted = self.scripted_news.lock().unwrap().pop_front();
        if let Some((delay, items)) = scripted {
            tokio::time::sleep(delay).await;
            return Ok(items);
        }
        settle(self.news_outcome, "portfolio news").await?;
        Ok(self
            .portfolio_news
            .get(portfolio_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

/// AAPL 10 × 150 + MSFT 5 × 300 (Tech) and JNJ 8 × 160 (Health).
pub fn sample_holdings() -> Vec<Holding> {
    vec![
        Holding::new("AAPL", 10.0, 150.0).with_sector("Tech").with_asset_type("Stock"),
        Holding::new("MSFT", 5.0, 300.0).with_sector("Tech").with_asset_type("Stock"),
        Holding::new("JNJ", 8.0, 160.0).with_sector("Health").with_asset_type("Stock"),
    ]
}

pub fn sample_portfolio() -> Portfolio {
    Portfolio::new("1", "Growth", "c1", 5000.0)
}

pub fn headline(text: &str) -> RawNewsItem {
    RawNewsItem::headline(text)
}

pub fn headlines(texts: &[&str]) -> Vec<RawNewsItem> {
    texts.iter().map(|t| headline(t)).collect()
}
