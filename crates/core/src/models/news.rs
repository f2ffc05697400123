use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A contextual news item in the normalized display form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub headline: String,
    pub summary: String,
    pub url: String,
}

impl NewsItem {
    pub fn new(
        headline: impl Into<String>,
        summary: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            headline: headline.into(),
            summary: summary.into(),
            url: url.into(),
        }
    }

    /// Normalize a raw item: a missing summary falls back to the headline,
    /// a missing url to `placeholder_url`. Items without a headline are dropped.
    pub fn from_raw(raw: RawNewsItem, placeholder_url: &str) -> Option<Self> {
        let (headline, summary, url) = match raw {
            RawNewsItem::Text(text) => (text, None, None),
            RawNewsItem::Structured {
                headline,
                summary,
                url,
            } => (headline?, summary, url),
        };
        if headline.trim().is_empty() {
            return None;
        }
        let summary = non_empty(summary).unwrap_or_else(|| headline.clone());
        let url = non_empty(url).unwrap_or_else(|| placeholder_url.to_string());
        Some(Self {
            headline,
            summary,
            url,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// A news item as sent by the context service: either a bare headline
/// string or an object with optional summary and url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNewsItem {
    Text(String),
    Structured {
        #[serde(default)]
        headline: Option<String>,
        #[serde(default)]
        summary: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
}

impl RawNewsItem {
    pub fn headline(headline: impl Into<String>) -> Self {
        RawNewsItem::Text(headline.into())
    }
}

/// Envelope used by the context service for every news response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewsHeadlines {
    #[serde(default)]
    pub headlines: Vec<RawNewsItem>,
}

/// Cache key: one entry per portfolio plus a single global entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContextKey {
    Global,
    Portfolio(String),
}

impl ContextKey {
    pub const GLOBAL_SENTINEL: &'static str = "global";

    pub fn portfolio(id: impl Into<String>) -> Self {
        ContextKey::Portfolio(id.into())
    }

    /// Parse a raw key, mapping the `"global"` sentinel to `ContextKey::Global`.
    pub fn parse(raw: &str) -> Self {
        if raw == Self::GLOBAL_SENTINEL {
            ContextKey::Global
        } else {
            ContextKey::Portfolio(raw.to_string())
        }
    }
}

impl std::fmt::Display for ContextKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContextKey::Global => write!(f, "{}", Self::GLOBAL_SENTINEL),
            ContextKey::Portfolio(id) => write!(f, "{id}"),
        }
    }
}

/// Which canned set replaced live news after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FallbackKind {
    /// Liveness probe failed or timed out.
    ServiceUnavailable,
    /// Portfolio-scoped news request failed or timed out.
    PortfolioUpdate,
    /// Generic news request failed.
    MarketUpdate,
}

/// Where the items of a cache entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NewsSource {
    Live,
    Fallback(FallbackKind),
}

/// Cached contextual news for one key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextCacheEntry {
    pub items: Vec<NewsItem>,
    pub fetched_at: DateTime<Utc>,
    pub source: NewsSource,
}

impl ContextCacheEntry {
    /// Whether the entry can be served without a refresh.
    ///
    /// Only live, non-empty entries younger than `ttl` qualify; a fallback set
    /// never blocks the next attempt.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.source == NewsSource::Live && !self.items.is_empty() && now - self.fetched_at < ttl
    }
}
