use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::CoreError;

/// What to report as cash when holdings are worth more than the declared total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CashPolicy {
    /// Report the negative difference as-is.
    #[default]
    Propagate,
    /// Report 0 instead of a negative amount.
    ClampToZero,
}

impl std::str::FromStr for CashPolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "propagate" => Ok(CashPolicy::Propagate),
            "clamp" | "clamp_to_zero" => Ok(CashPolicy::ClampToZero),
            other => Err(CoreError::ValidationError(format!(
                "Unknown cash policy '{other}' (expected 'propagate' or 'clamp_to_zero')"
            ))),
        }
    }
}

/// Runtime configuration for the dashboard core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Negative cash handling.
    pub cash_policy: CashPolicy,

    /// Freshness window for cached contextual news.
    pub context_ttl_secs: u64,

    /// Period of the portfolio rotation timer.
    pub rotation_interval_secs: u64,

    /// Deadline for the context service liveness probe.
    pub probe_timeout_secs: u64,

    /// Deadline for the portfolio-scoped news request.
    pub news_timeout_secs: u64,

    /// Link used for news items that arrive without one.
    pub placeholder_url: String,

    /// Base URL of the portfolio/insight data API.
    pub data_service_url: String,

    /// Base URL of the context (news) service.
    pub context_service_url: String,

    /// Preferences sent with insight generation when the user gives none.
    pub default_preferences: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cash_policy: CashPolicy::Propagate,
            context_ttl_secs: 30 * 60,
            rotation_interval_secs: 10,
            probe_timeout_secs: 5,
            news_timeout_secs: 10,
            placeholder_url: "https://finnhub.io".to_string(),
            data_service_url: "http://localhost:8080/api".to_string(),
            context_service_url: "http://localhost:8000".to_string(),
            default_preferences: "Provide a comprehensive portfolio analysis".to_string(),
        }
    }
}

impl Settings {
    /// Defaults overlaid with `PORTFOLIO_INSIGHT_*` environment variables.
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();
        let mut settings = Self::default();

        if let Ok(v) = std::env::var("PORTFOLIO_INSIGHT_CASH_POLICY") {
            settings.cash_policy = v.parse()?;
        }
        settings.context_ttl_secs = env_secs("PORTFOLIO_INSIGHT_CONTEXT_TTL_SECS", settings.context_ttl_secs)?;
        settings.rotation_interval_secs =
            env_secs("PORTFOLIO_INSIGHT_ROTATION_INTERVAL_SECS", settings.rotation_interval_secs)?;
        settings.probe_timeout_secs = env_secs("PORTFOLIO_INSIGHT_PROBE_TIMEOUT_SECS", settings.probe_timeout_secs)?;
        settings.news_timeout_secs = env_secs("PORTFOLIO_INSIGHT_NEWS_TIMEOUT_SECS", settings.news_timeout_secs)?;
        if let Ok(v) = std::env::var("PORTFOLIO_INSIGHT_PLACEHOLDER_URL") {
            settings.placeholder_url = v;
        }
        if let Ok(v) = std::env::var("PORTFOLIO_INSIGHT_DATA_SERVICE_URL") {
            settings.data_service_url = v;
        }
        if let Ok(v) = std::env::var("PORTFOLIO_INSIGHT_CONTEXT_SERVICE_URL") {
            settings.context_service_url = v;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let durations = [
            ("context_ttl_secs", self.context_ttl_secs),
            ("rotation_interval_secs", self.rotation_interval_secs),
            ("probe_timeout_secs", self.probe_timeout_secs),
            ("news_timeout_secs", self.news_timeout_secs),
        ];
        for (name, secs) in durations {
            if secs == 0 {
                return Err(CoreError::ValidationError(format!("{name} must be greater than 0")));
            }
        }
        let urls = [
            ("data_service_url", &self.data_service_url),
            ("context_service_url", &self.context_service_url),
        ];
        for (name, url) in urls {
            if url.trim().is_empty() {
                return Err(CoreError::ValidationError(format!("{name} must not be empty")));
            }
        }
        Ok(())
    }

    pub fn context_ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(Duration::from_secs(self.context_ttl_secs))
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn news_timeout(&self) -> Duration {
        Duration::from_secs(self.news_timeout_secs)
    }
}

fn env_secs(name: &str, default: u64) -> Result<u64, CoreError> {
    match std::env::var(name) {
        Ok(v) => v.trim().parse::<u64>().map_err(|e| {
            CoreError::ValidationError(format!("{name}='{v}' is not a number of seconds: {e}"))
        }),
        Err(_) => Ok(default),
    }
}
