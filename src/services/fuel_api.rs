//! Client for the paginated live price API.
//!
//! One department is one unit of work: pages are requested with an offset
//! until the API returns an empty `results` array. Rate-limited pages are
//! retried at the same offset after a backoff; any other failure stops the
//! unit and hands back what was fetched so far.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid page body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    #[error("fetch cancelled")]
    Cancelled,
}

/// What to do when the API answers 429
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub backoff: Duration,
    /// Consecutive rate-limited attempts allowed per page; `None` = no limit
    pub max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Whether another request may follow `attempts` rate-limited ones
    pub fn allows_retry(&self, attempts: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempts < max)
    }
}

/// Everything gathered for one department, complete or not
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub results: Vec<Value>,
    pub pages: u32,
    pub rate_limited: u32,
    pub error: Option<FetchError>,
}

impl FetchOutcome {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    #[serde(default)]
    results: Vec<Value>,
}

enum PageResult {
    Page(Vec<Value>),
    RateLimited,
}

#[derive(Clone)]
pub struct FuelApiClient {
    client: Client,
    base_url: String,
    page_size: u32,
    retry: RetryPolicy,
    cancel: Arc<AtomicBool>,
}

impl FuelApiClient {
    pub fn new(config: &ApiConfig, cancel: Arc<AtomicBool>) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            page_size: config.page_size.max(1),
            retry: RetryPolicy {
                backoff: config.rate_limit_backoff,
                max_attempts: config.max_rate_limit_retries,
            },
            cancel,
        })
    }

    /// Fetch every station of a department, page by page
    pub async fn fetch_department(&self, code: &str) -> FetchOutcome {
        let filter = department_filter(code);
        let mut outcome = FetchOutcome::default();
        let mut offset: u64 = 0;
        let mut attempts: u32 = 0;

        loop {
            if self.cancel.load(Ordering::Relaxed) {
                outcome.error = Some(FetchError::Cancelled);
                break;
            }

            match self.fetch_page(&filter, offset).await {
                Ok(PageResult::Page(results)) => {
                    attempts = 0;
                    if results.is_empty() {
                        break;
                    }

                    outcome.pages += 1;
                    offset += u64::from(self.page_size);
                    outcome.results.extend(results);

                    tracing::debug!(
                        department = code,
                        page = outcome.pages,
                        total = outcome.results.len(),
                        "Fetched page"
                    );
                }
                Ok(PageResult::RateLimited) => {
                    attempts += 1;
                    outcome.rate_limited += 1;

                    if !self.retry.allows_retry(attempts) {
                        outcome.error = Some(FetchError::RateLimited { attempts });
                        break;
                    }

                    tracing::warn!(
                        department = code,
                        offset,
                        attempt = attempts,
                        "Rate limited, backing off for {:?}",
                        self.retry.backoff
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
                Err(e) => {
                    tracing::warn!(department = code, offset, "Stopping fetch: {}", e);
                    outcome.error = Some(e);
                    break;
                }
            }
        }

        tracing::info!(
            department = code,
            pages = outcome.pages,
            stations = outcome.results.len(),
            rate_limited = outcome.rate_limited,
            complete = outcome.is_complete(),
            "Department fetch finished"
        );

        outcome
    }

    async fn fetch_page(&self, filter: &str, offset: u64) -> Result<PageResult, FetchError> {
        let limit = self.page_size.to_string();
        let offset = offset.to_string();

        let response = self
            .client
            .get(&self.base_url)
            .header("accept", "application/json")
            .query(&[
                ("where", filter),
                ("limit", limit.as_str()),
                ("offset", offset.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Ok(PageResult::RateLimited);
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status { status, body });
        }

        let body = response.text().await?;
        let page: PageResponse = serde_json::from_str(&body)?;
        Ok(PageResult::Page(page.results))
    }
}

/// Query filter selecting stations whose postal code starts with `code`
pub fn department_filter(code: &str) -> String {
    format!("startswith(cp, \"{}\")", code)
}
