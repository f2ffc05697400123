use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::errors::CoreError;
use crate::models::holding::{Holding, Portfolio};
use crate::models::insight::InsightRecord;
use crate::models::news::{NewsHeadlines, RawNewsItem};
use crate::models::settings::Settings;
use super::traits::DataService;

const NAME: &str = "HttpDataService";

/// `DataService` backed by the portfolio REST API and the context
/// (news) microservice.
///
/// - **Data API**: portfolios, holdings, insight records, insight generation.
/// - **Context service**: `/market-news` (also used as the liveness probe)
///   and `/portfolio-news`.
///
/// The client-level timeout is a backstop only; the context cache applies
/// the tighter per-step deadlines itself.
pub struct HttpDataService {
    client: Client,
    data_url: String,
    context_url: String,
}

// ── Request bodies ──────────────────────────────────────────────────

#[derive(Serialize)]
struct GenerateRequest<'a> {
    preferences: &'a str,
}

#[derive(Serialize)]
struct PortfolioNewsRequest<'a> {
    portfolio_id: &'a str,
    holdings: &'a [String],
}

impl HttpDataService {
    pub fn new(settings: &Settings) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::with_client(client, settings)
    }

    pub fn with_client(client: Client, settings: &Settings) -> Self {
        Self {
            client,
            data_url: settings.data_service_url.trim_end_matches('/').to_string(),
            context_url: settings.context_service_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, CoreError> {
        debug!(url, "GET");
        let resp = self.client.get(url).send().await?;
        Self::parse(resp).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, CoreError> {
        debug!(url, "POST");
        let resp = self.client.post(url).json(body).send().await?;
        Self::parse(resp).await
    }

    async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, CoreError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CoreError::Api {
                service: NAME.into(),
                message: format!("HTTP {status}: {body}"),
            });
        }
        let bytes = resp.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            CoreError::MalformedData(format!("Failed to parse {NAME} response: {e}"))
        })
    }
}

#[async_trait]
impl DataService for HttpDataService {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_portfolio(&self, id: &str) -> Result<Portfolio, CoreError> {
        self.get_json(&format!("{}/portfolios/{id}", self.data_url)).await
    }

    async fn fetch_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>, CoreError> {
        self.get_json(&format!("{}/portfolios/{portfolio_id}/holdings", self.data_url))
            .await
    }

    async fn fetch_insights_by_portfolio(
        &self,
        portfolio_id: &str,
    ) -> Result<Vec<InsightRecord>, CoreError> {
        // Cache-busting parameter: intermediaries must not serve a stale list
        // right after a new insight was generated.
        let stamp = chrono::Utc::now().timestamp_millis();
        self.get_json(&format!(
            "{}/insights/portfolio/{portfolio_id}?_t={stamp}",
            self.data_url
        ))
        .await
    }

    async fn fetch_insights_by_client(
        &self,
        client_id: &str,
    ) -> Result<Vec<InsightRecord>, CoreError> {
        self.get_json(&format!("{}/insights/client/{client_id}", self.data_url))
            .await
    }

    async fn generate_insight(
        &self,
        portfolio_id: &str,
        preferences: &str,
        client_id: &str,
    ) -> Result<InsightRecord, CoreError> {
        let url = format!(
            "{}/insights/generate-portfolio/{portfolio_id}?clientId={client_id}",
            self.data_url
        );
        self.post_json(&url, &GenerateRequest { preferences }).await
    }

    async fn probe_context_service(&self) -> Result<(), CoreError> {
        let _: serde_json::Value = self
            .get_json(&format!("{}/market-news", self.context_url))
            .await?;
        Ok(())
    }

    async fn fetch_generic_news(&self) -> Result<Vec<RawNewsItem>, CoreError> {
        let resp: NewsHeadlines = self
            .get_json(&format!("{}/market-news", self.context_url))
            .await?;
        Ok(resp.headlines)
    }

    async fn fetch_portfolio_news(
        &self,
        portfolio_id: &str,
        tickers: &[String],
    ) -> Result<Vec<RawNewsItem>, CoreError> {
        let body = PortfolioNewsRequest {
            portfolio_id,
            holdings: tickers,
        };
        let resp: NewsHeadlines = self
            .post_json(&format!("{}/portfolio-news", self.context_url), &body)
            .await?;
        Ok(resp.headlines)
    }
}
