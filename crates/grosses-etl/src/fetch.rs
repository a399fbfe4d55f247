// HTTP retrieval of weekly grosses report pages.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use crate::config::SourceConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request for {url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Source of report pages, keyed by week-ending date.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// The raw HTML of the report for the week ending `week_end_date`.
    async fn fetch(&self, week_end_date: NaiveDate) -> Result<String, FetchError>;
}

/// Fetches reports from `{base_url}{YYYY-MM-DD}`.
pub struct HttpFetcher {
    http: reqwest::Client,
    base_url: String,
}

impl HttpFetcher {
    pub fn new(config: &SourceConfig) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn report_url(&self, week_end_date: NaiveDate) -> String {
        format!("{}{}", self.base_url, week_end_date.format("%Y-%m-%d"))
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, week_end_date: NaiveDate) -> Result<String, FetchError> {
        let url = self.report_url(week_end_date);
        debug!(%url, "fetching report");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }

        resp.text()
            .await
            .map_err(|source| FetchError::Http { url, source })
    }
}
