//! E-filing provider status API
//!
//! The reconciliation logic only depends on [`FilingProvider`]; the
//! concrete [`ProviderClient`] owns request signing, timeouts and transport
//! retries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use time::OffsetDateTime;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::ProviderConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::signing::sign_request;
use crate::status::FormType;

/// Connection failures are retried this many times per status query
pub const CONNECT_RETRIES: usize = 2;

/// One record's status as reported by the provider
///
/// Shared by webhook payloads and status query responses.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderStatusRecord {
    #[serde(default)]
    pub record_id: Option<serde_json::Value>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub status_code: Option<serde_json::Value>,
    #[serde(default)]
    pub status_time: Option<String>,
    #[serde(default)]
    pub errors: Option<serde_json::Value>,
}

/// Body of `GET /v1/{FormType}/Status`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProviderStatusResponse {
    #[serde(default)]
    pub submission_id: Option<String>,
    #[serde(default)]
    pub form_type: Option<String>,
    #[serde(default, alias = "StatusRecords")]
    pub records: Vec<ProviderStatusRecord>,
}

#[async_trait]
pub trait FilingProvider: Send + Sync {
    /// Current status of a submission.
    ///
    /// `Ok(None)` means the provider has nothing to report yet.
    async fn submission_status(
        &self,
        submission_id: &str,
        form_type: FormType,
    ) -> ReconcileResult<Option<ProviderStatusRecord>>;
}

/// HTTP client for the provider's status endpoint
#[derive(Clone)]
pub struct ProviderClient {
    http: Client,
    config: ProviderConfig,
    retry_base: Duration,
}

impl ProviderClient {
    pub fn new(config: ProviderConfig) -> ReconcileResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.request_timeout)
            .build()
            .map_err(|e| ReconcileError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            retry_base: Duration::from_millis(200),
        })
    }

    /// Override the first backoff delay (tests use a few milliseconds)
    pub fn with_retry_base(mut self, retry_base: Duration) -> Self {
        self.retry_base = retry_base;
        self
    }

    fn classify(&self, e: reqwest::Error) -> ReconcileError {
        if e.is_timeout() {
            ReconcileError::ProviderTimeout(self.config.request_timeout.as_secs())
        } else if e.is_connect() {
            ReconcileError::ProviderConnect(e.to_string())
        } else {
            ReconcileError::ProviderTransport(e.to_string())
        }
    }

    async fn query_once(
        &self,
        submission_id: &str,
        form_type: FormType,
    ) -> ReconcileResult<ProviderStatusResponse> {
        let credentials = self.config.api_credentials()?;
        let url = format!(
            "{}/v1/{}/Status",
            self.config.base_url(),
            form_type.provider_path()
        );

        // Signed per attempt so retries never reuse a timestamp
        let timestamp = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let signature = sign_request(credentials.api_secret, credentials.client_id, timestamp)?;

        let response = self
            .http
            .get(&url)
            .query(&[("submissionId", submission_id)])
            .header("X-Api-Key", credentials.api_key)
            .header("X-Timestamp", timestamp.to_string())
            .header("X-Signature", signature)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReconcileError::ProviderStatus {
                status: status.as_u16(),
            });
        }

        response
            .json::<ProviderStatusResponse>()
            .await
            .map_err(|e| ReconcileError::ProviderDecode(e.to_string()))
    }
}

#[async_trait]
impl FilingProvider for ProviderClient {
    async fn submission_status(
        &self,
        submission_id: &str,
        form_type: FormType,
    ) -> ReconcileResult<Option<ProviderStatusRecord>> {
        // retry_base * 2, * 4, ...
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(self.retry_base.as_millis().max(1) as u64)
            .max_delay(self.config.request_timeout)
            .map(jitter)
            .take(CONNECT_RETRIES);

        let response = RetryIf::spawn(
            strategy,
            || self.query_once(submission_id, form_type),
            |e: &ReconcileError| matches!(e, ReconcileError::ProviderConnect(_)),
        )
        .await?;

        Ok(response.records.into_iter().next())
    }
}
