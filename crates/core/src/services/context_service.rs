use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::errors::CoreError;
use crate::models::holding::Holding;
use crate::models::news::{
    ContextCacheEntry, ContextKey, FallbackKind, NewsItem, NewsSource, RawNewsItem,
};
use crate::models::settings::Settings;
use crate::providers::traits::DataService;

/// Source of "now" for freshness checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// The canned items shown when a step of the refresh protocol fails.
pub fn fallback_set(kind: FallbackKind, placeholder_url: &str) -> Vec<NewsItem> {
    let items: [(&str, &str); 3] = match kind {
        FallbackKind::ServiceUnavailable => [
            ("Service Unavailable", "AI microservice is not responding. Please check if it is running."),
            ("Portfolio Update", "Portfolio analysis shows continued market opportunities and strategic positioning."),
            ("Investment Strategy", "Focus on diversification and risk management for optimal portfolio performance."),
        ],
        FallbackKind::PortfolioUpdate => [
            ("Portfolio Update", "Portfolio analysis shows continued market opportunities and strategic positioning."),
            ("Investment Strategy", "Focus on diversification and risk management for optimal portfolio performance."),
            ("Market Analysis", "Current market conditions support strategic portfolio adjustments and rebalancing."),
        ],
        FallbackKind::MarketUpdate => [
            ("Market Update", "Financial markets continue to show resilience amid economic data releases."),
            ("Investment Trends", "Investors focus on sector rotation and portfolio diversification strategies."),
            ("Economic Outlook", "Analysts project steady growth with continued market volatility expected."),
        ],
    };
    items
        .into_iter()
        .map(|(headline, summary)| NewsItem::new(headline, summary, placeholder_url))
        .collect()
}

/// Non-empty ticker symbols of a holdings list, in holdings order.
pub fn extract_tickers(holdings: &[Holding]) -> Vec<String> {
    holdings
        .iter()
        .map(|h| h.ticker.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// What a portfolio request falling back to general news should do.
enum Handoff {
    Cached(ContextCacheEntry),
    /// Fetch generic news; commit under this global sequence number if any.
    Load(Option<u64>),
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<ContextKey, ContextCacheEntry>,
    /// Latest request sequence number issued per key.
    issued: HashMap<ContextKey, u64>,
    /// Key of the most recent request; only it may replace the display set.
    focus: Option<ContextKey>,
    active: Vec<NewsItem>,
}

/// Time-boxed cache of contextual news, one entry per portfolio plus one
/// global entry.
///
/// Refresh protocol for a portfolio:
/// 1. Probe the context service (short deadline). Failure → "service unavailable" set.
/// 2. Fetch holdings and collect tickers. None (or no holdings) → global path.
/// 3. Fetch portfolio news (longer deadline). Failure → "portfolio update" set.
/// 4. Normalize and commit.
///
/// Responses can complete out of order, so every refresh takes a sequence
/// number for its key up front and may only commit if that number is still
/// the latest issued. The lock is never held across an `.await`.
pub struct ContextCache {
    service: Arc<dyn DataService>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    probe_timeout: Duration,
    news_timeout: Duration,
    placeholder_url: String,
    state: Mutex<CacheState>,
}

impl ContextCache {
    pub fn new(service: Arc<dyn DataService>, settings: &Settings) -> Self {
        Self::with_clock(service, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(service: Arc<dyn DataService>, settings: &Settings, clock: Arc<dyn Clock>) -> Self {
        Self {
            service,
            clock,
            ttl: settings.context_ttl(),
            probe_timeout: settings.probe_timeout(),
            news_timeout: settings.news_timeout(),
            placeholder_url: settings.placeholder_url.clone(),
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Cached news for `key` if still fresh, otherwise the result of a refresh.
    pub async fn get(&self, key: &ContextKey) -> ContextCacheEntry {
        if let Some(entry) = self.fresh(key) {
            debug!(key = %key, "serving cached context news");
            return entry;
        }
        self.refresh(key).await
    }

    /// Run the refresh protocol for `key` regardless of freshness.
    ///
    /// Returns the entry this call produced. It is committed to the cache
    /// only if no newer request for the same key was issued meanwhile.
    pub async fn refresh(&self, key: &ContextKey) -> ContextCacheEntry {
        match key {
            ContextKey::Global => self.refresh_global().await,
            ContextKey::Portfolio(id) => self.refresh_portfolio(id).await,
        }
    }

    /// The news set currently selected for display.
    pub fn active(&self) -> Vec<NewsItem> {
        self.state.lock().active.clone()
    }

    /// Peek at the stored entry for `key` without refreshing.
    pub fn entry(&self, key: &ContextKey) -> Option<ContextCacheEntry> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Number of keys with a stored entry.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Refresh protocol ────────────────────────────────────────────

    async fn refresh_portfolio(&self, portfolio_id: &str) -> ContextCacheEntry {
        let key = ContextKey::portfolio(portfolio_id);
        let seq = self.issue(&key);
        debug!(portfolio_id, seq, "refreshing portfolio context news");

        if let Err(e) = self
            .deadline(self.probe_timeout, "context service probe", self.service.probe_context_service())
            .await
        {
            warn!(portfolio_id, error = %e, "context service not responding");
            return self.commit_fallback(&key, seq, FallbackKind::ServiceUnavailable);
        }

        let holdings = match self
            .deadline(self.news_timeout, "holdings fetch", self.service.fetch_holdings(portfolio_id))
            .await
        {
            Ok(h) => h,
            Err(e) => {
                warn!(portfolio_id, error = %e, "cannot load holdings, using general news");
                return self.global_or_cached(&key, seq).await;
            }
        };

        let tickers = extract_tickers(&holdings);
        if tickers.is_empty() {
            info!(portfolio_id, "no tickers in portfolio, using general news");
            return self.global_or_cached(&key, seq).await;
        }

        match self
            .deadline(
                self.news_timeout,
                "portfolio news",
                self.service.fetch_portfolio_news(portfolio_id, &tickers),
            )
            .await
        {
            Ok(raw) => {
                let items = self.normalize(raw);
                info!(portfolio_id, count = items.len(), "loaded portfolio context news");
                self.commit_live(&key, seq, items)
            }
            Err(e) => {
                warn!(portfolio_id, error = %e, "portfolio news failed");
                self.commit_fallback(&key, seq, FallbackKind::PortfolioUpdate)
            }
        }
    }

    async fn refresh_global(&self) -> ContextCacheEntry {
        let seq = self.issue(&ContextKey::Global);
        debug!(seq, "refreshing global context news");
        self.load_global(Some(seq)).await
    }

    /// Fetch generic news. With `seq` the result is committed under the
    /// global key, without it the entry is only returned.
    async fn load_global(&self, seq: Option<u64>) -> ContextCacheEntry {
        let (items, source) = match self
            .deadline(self.news_timeout, "generic news", self.service.fetch_generic_news())
            .await
        {
            Ok(raw) => {
                let items = self.normalize(raw);
                info!(count = items.len(), "loaded general market news");
                (items, NewsSource::Live)
            }
            Err(e) => {
                warn!(error = %e, "general market news failed");
                let kind = FallbackKind::MarketUpdate;
                (fallback_set(kind, &self.placeholder_url), NewsSource::Fallback(kind))
            }
        };
        match seq {
            Some(seq) => self.commit(&ContextKey::Global, seq, items, source),
            None => self.stamp(items, source),
        }
    }

    /// Global entry if fresh, else a global refresh, on behalf of the
    /// portfolio request `(owner, owner_seq)`.
    ///
    /// The display set moves to the global entry only while that request is
    /// still the latest for its key and still in focus. A superseded request
    /// gets general news back but leaves focus and the cache alone.
    async fn global_or_cached(&self, owner: &ContextKey, owner_seq: u64) -> ContextCacheEntry {
        match self.hand_off_to_global(owner, owner_seq) {
            Handoff::Cached(entry) => entry,
            Handoff::Load(seq) => {
                if seq.is_none() {
                    debug!(key = %owner, seq = owner_seq, "superseded request, not taking over display");
                }
                self.load_global(seq).await
            }
        }
    }

    async fn deadline<T, F>(&self, limit: Duration, step: &str, fut: F) -> Result<T, CoreError>
    where
        F: Future<Output = Result<T, CoreError>>,
    {
        tokio::time::timeout(limit, fut)
            .await
            .unwrap_or_else(|_| Err(CoreError::Timeout(limit.as_secs(), step.to_string())))
    }

    fn normalize(&self, raw: Vec<RawNewsItem>) -> Vec<NewsItem> {
        raw.into_iter()
            .filter_map(|item| NewsItem::from_raw(item, &self.placeholder_url))
            .collect()
    }

    // ── State transitions ───────────────────────────────────────────

    fn fresh(&self, key: &ContextKey) -> Option<ContextCacheEntry> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let entry = state.entries.get(key).filter(|e| e.is_fresh(now, self.ttl))?.clone();
        state.focus = Some(key.clone());
        state.active = entry.items.clone();
        Some(entry)
    }

    fn issue(&self, key: &ContextKey) -> u64 {
        let mut state = self.state.lock();
        let seq = state.issued.entry(key.clone()).or_insert(0);
        *seq += 1;
        let seq = *seq;
        state.focus = Some(key.clone());
        seq
    }

    fn hand_off_to_global(&self, owner: &ContextKey, owner_seq: u64) -> Handoff {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let current = state.issued.get(owner) == Some(&owner_seq) && state.focus.as_ref() == Some(owner);
        let key = ContextKey::Global;

        if let Some(entry) = state.entries.get(&key).filter(|e| e.is_fresh(now, self.ttl)).cloned() {
            if current {
                state.focus = Some(key);
                state.active = entry.items.clone();
            }
            return Handoff::Cached(entry);
        }
        if !current {
            return Handoff::Load(None);
        }
        let seq = state.issued.entry(key.clone()).or_insert(0);
        *seq += 1;
        let seq = *seq;
        state.focus = Some(key);
        Handoff::Load(Some(seq))
    }

    fn commit_live(&self, key: &ContextKey, seq: u64, items: Vec<NewsItem>) -> ContextCacheEntry {
        self.commit(key, seq, items, NewsSource::Live)
    }

    fn commit_fallback(&self, key: &ContextKey, seq: u64, kind: FallbackKind) -> ContextCacheEntry {
        let items = fallback_set(kind, &self.placeholder_url);
        self.commit(key, seq, items, NewsSource::Fallback(kind))
    }

    fn stamp(&self, items: Vec<NewsItem>, source: NewsSource) -> ContextCacheEntry {
        ContextCacheEntry {
            items,
            fetched_at: self.clock.now(),
            source,
        }
    }

    fn commit(&self, key: &ContextKey, seq: u64, items: Vec<NewsItem>, source: NewsSource) -> ContextCacheEntry {
        let entry = self.stamp(items, source);

        let mut state = self.state.lock();
        let latest = state.issued.get(key).copied().unwrap_or(0);
        if seq != latest {
            debug!(key = %key, seq, latest, "discarding out-of-order context response");
            return entry;
        }
        state.entries.insert(key.clone(), entry.clone());
        if state.focus.as_ref() == Some(key) {
            state.active = entry.items.clone();
        }
        entry
    }
}
