//! Calls the API's status poll endpoint on schedule

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8080";
const POLL_PATH: &str = "/cron/check-filing-status";

/// Poll runs include provider round-trips for every unresolved filing
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("CRON_SECRET not set")]
    MissingSecret,

    #[error("poll endpoint rejected the cron secret")]
    Unauthorized,

    #[error("poll endpoint returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Summary fields of a poll run
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PollRun {
    pub checked: usize,
    pub updated: usize,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct PollTrigger {
    http: Client,
    url: String,
    cron_secret: String,
}

impl PollTrigger {
    pub fn new(
        base_url: &str,
        cron_secret: impl Into<String>,
    ) -> Result<Self, TriggerError> {
        let http = Client::builder().timeout(TRIGGER_TIMEOUT).build()?;
        Ok(Self {
            http,
            url: format!("{}{}", base_url.trim_end_matches('/'), POLL_PATH),
            cron_secret: cron_secret.into(),
        })
    }

    /// `API_BASE_URL` (defaults to the local API) and `CRON_SECRET`
    pub fn from_env() -> Result<Self, TriggerError> {
        let base_url = std::env::var("API_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        let cron_secret = std::env::var("CRON_SECRET")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or(TriggerError::MissingSecret)?;

        Self::new(&base_url, cron_secret)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn trigger(&self) -> Result<PollRun, TriggerError> {
        let response = self
            .http
            .get(&self.url)
            .bearer_auth(&self.cron_secret)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(TriggerError::Unauthorized);
        }
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|b| b.error)
                .unwrap_or_else(|_| "no error body".to_string());
            return Err(TriggerError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}
