//! Scheduled status polling
//!
//! Backstop for missed or delayed webhooks. Each run selects recent
//! unresolved filings, asks the provider for every one of them in
//! parallel, and applies whatever changed. A failed or slow provider call
//! only costs that filing its update for this run; the next scheduled run
//! is the retry.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use crate::config::{PollConfig, ProviderConfig};
use crate::error::{ReconcileError, ReconcileResult};
use crate::provider::{FilingProvider, CONNECT_RETRIES};
use crate::reconcile::{ReconcileSource, StatusReconciler};
use crate::record::{FilingRecord, StatusChange};
use crate::status::FormType;

/// Result of one poll run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PollSummary {
    pub checked: usize,
    pub updated: usize,
    pub results: Vec<StatusChange>,
}

pub struct PollReconciler {
    config: ProviderConfig,
    poll: PollConfig,
    provider: Arc<dyn FilingProvider>,
    reconciler: StatusReconciler,
    record_deadline: Duration,
}

impl PollReconciler {
    pub fn new(
        config: ProviderConfig,
        poll: PollConfig,
        provider: Arc<dyn FilingProvider>,
        reconciler: StatusReconciler,
    ) -> Self {
        // Every attempt is bounded by request_timeout; leave room for backoff
        let attempts = CONNECT_RETRIES as u32 + 1;
        let record_deadline = config.request_timeout * attempts + Duration::from_secs(1);

        Self {
            config,
            poll,
            provider,
            reconciler,
            record_deadline,
        }
    }

    /// Override the per-filing deadline
    pub fn with_record_deadline(mut self, record_deadline: Duration) -> Self {
        self.record_deadline = record_deadline;
        self
    }

    /// Check an `Authorization` header against the configured cron secret.
    ///
    /// Fails closed: no configured secret means nobody is authorized.
    pub fn authorize(&self, authorization: Option<&str>) -> ReconcileResult<()> {
        let Some(secret) = self.config.cron_secret.as_deref().filter(|s| !s.is_empty()) else {
            tracing::error!("Cron trigger rejected: CRON_SECRET not configured");
            return Err(ReconcileError::Unauthorized);
        };

        // Auth scheme names are case-insensitive
        let token = authorization
            .and_then(|h| h.trim().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token);
        let Some(token) = token else {
            tracing::warn!(
                header_present = authorization.is_some(),
                "Cron trigger rejected: missing bearer token"
            );
            return Err(ReconcileError::Unauthorized);
        };

        let token = token.trim().as_bytes();
        let expected = secret.as_bytes();
        if token.len() != expected.len() || !bool::from(token.ct_eq(expected)) {
            tracing::warn!(token_len = token.len(), "Cron trigger rejected: bearer token mismatch");
            return Err(ReconcileError::Unauthorized);
        }

        Ok(())
    }

    /// Run one reconciliation sweep
    pub async fn run(&self) -> ReconcileResult<PollSummary> {
        self.config.api_credentials()?;

        let created_after = OffsetDateTime::now_utc() - self.poll.window;
        let mut candidates: Vec<FilingRecord> = Vec::new();
        for form_type in FormType::ALL {
            let records = self
                .reconciler
                .store()
                .pollable(form_type, created_after, self.poll.limit_per_form)
                .await?;
            if !records.is_empty() {
                tracing::debug!(form_type = %form_type, count = records.len(), "Filings to poll");
            }
            candidates.extend(records);
        }

        tracing::info!(
            candidates = candidates.len(),
            window_hours = self.poll.window.whole_hours(),
            "Polling provider for filing statuses"
        );

        let checks = candidates.iter().map(|record| self.check_record(record));
        let results: Vec<StatusChange> = join_all(checks).await.into_iter().flatten().collect();

        let summary = PollSummary {
            checked: candidates.len(),
            updated: results.len(),
            results,
        };

        tracing::info!(
            checked = summary.checked,
            updated = summary.updated,
            "Filing status poll complete"
        );

        Ok(summary)
    }

    /// Query and apply one filing; every failure becomes "no update"
    async fn check_record(&self, record: &FilingRecord) -> Option<StatusChange> {
        let submission_id = record.submission_id.as_deref()?;

        let provider_record = match tokio::time::timeout(
            self.record_deadline,
            self.provider.submission_status(submission_id, record.form_type),
        )
        .await
        {
            Ok(Ok(Some(provider_record))) => provider_record,
            Ok(Ok(None)) => {
                tracing::debug!(filing_id = %record.id, "Provider has no status records yet");
                return None;
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    filing_id = %record.id,
                    submission_id = %submission_id,
                    error = %e,
                    "Provider status check failed"
                );
                return None;
            }
            Err(_) => {
                tracing::warn!(
                    filing_id = %record.id,
                    submission_id = %submission_id,
                    deadline_ms = self.record_deadline.as_millis() as u64,
                    "Provider status check timed out"
                );
                return None;
            }
        };

        match self
            .reconciler
            .apply(record, &provider_record, ReconcileSource::Poll)
            .await
        {
            Ok(change) => change,
            Err(e) => {
                tracing::error!(
                    filing_id = %record.id,
                    error = %e,
                    "Failed to apply polled status"
                );
                None
            }
        }
    }
}
