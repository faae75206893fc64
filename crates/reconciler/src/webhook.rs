//! E-filing provider webhook handling
//!
//! The HTTP layer acknowledges every delivery immediately and hands the raw
//! headers and body to [`WebhookReceiver::dispatch`]. Verification and
//! persistence happen on a supervised background task, so a slow database
//! never makes the provider time out and redeliver.

use std::sync::Arc;

use serde::Deserialize;
use tokio::task::JoinHandle;

use crate::config::ProviderConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::provider::ProviderStatusRecord;
use crate::reconcile::{ReconcileSource, StatusReconciler};
use crate::record::StatusChange;
use crate::signing::verify_webhook_signature;
use crate::task::spawn_supervised;

/// Authentication headers sent with every webhook delivery
#[derive(Debug, Clone, Default)]
pub struct WebhookHeaders {
    pub signature: Option<String>,
    pub timestamp: Option<String>,
}

/// Webhook body: one submission with one or more record statuses
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WebhookPayload {
    pub submission_id: String,
    #[serde(default)]
    pub form_type: Option<String>,
    #[serde(default)]
    pub records: Vec<ProviderStatusRecord>,
}

/// What a processed delivery did, for logs and tests
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WebhookOutcome {
    pub records: usize,
    pub updated: Vec<StatusChange>,
    pub unknown_submission: usize,
    pub failed: usize,
}

pub struct WebhookReceiver {
    config: ProviderConfig,
    reconciler: StatusReconciler,
}

impl WebhookReceiver {
    pub fn new(config: ProviderConfig, reconciler: StatusReconciler) -> Self {
        Self { config, reconciler }
    }

    /// Check the `Signature` header against `HMAC(client_id || Timestamp)`
    pub fn verify(&self, headers: &WebhookHeaders) -> ReconcileResult<()> {
        let (Some(signature), Some(timestamp)) = (&headers.signature, &headers.timestamp) else {
            tracing::warn!(
                signature_present = headers.signature.is_some(),
                timestamp_present = headers.timestamp.is_some(),
                "Filing webhook rejected: missing authentication headers"
            );
            return Err(ReconcileError::SignatureInvalid("missing authentication headers"));
        };

        let credentials = self.config.webhook_credentials().inspect_err(|e| {
            tracing::error!(error = %e, "Filing webhook rejected: provider secret not configured");
        })?;

        verify_webhook_signature(&credentials, timestamp, signature).inspect_err(|e| {
            tracing::warn!(
                timestamp = %timestamp,
                signature_len = signature.len(),
                reason = %e,
                "Filing webhook rejected: signature verification failed"
            );
        })
    }

    /// Verify and apply one delivery.
    ///
    /// Unknown submission ids and per-record store failures are logged and
    /// skipped; only authentication and payload errors fail the delivery.
    pub async fn process(
        &self,
        headers: &WebhookHeaders,
        body: &[u8],
    ) -> ReconcileResult<WebhookOutcome> {
        self.verify(headers)?;

        let payload: WebhookPayload = serde_json::from_slice(body)
            .map_err(|e| ReconcileError::InvalidPayload(e.to_string()))?;
        if payload.submission_id.trim().is_empty() {
            return Err(ReconcileError::InvalidPayload("empty SubmissionId".to_string()));
        }

        tracing::info!(
            submission_id = %payload.submission_id,
            form_type = ?payload.form_type,
            records = payload.records.len(),
            "Processing filing webhook"
        );

        let mut outcome = WebhookOutcome {
            records: payload.records.len(),
            ..Default::default()
        };

        for incoming in &payload.records {
            // Re-read per record so later records see earlier writes
            let record = match self
                .reconciler
                .store()
                .find_by_submission_id(&payload.submission_id)
                .await
            {
                Ok(Some(record)) => record,
                Ok(None) => {
                    tracing::warn!(
                        submission_id = %payload.submission_id,
                        record_id = ?incoming.record_id,
                        "Filing webhook references unknown submission, skipping"
                    );
                    outcome.unknown_submission += 1;
                    continue;
                }
                Err(e) => {
                    tracing::error!(
                        submission_id = %payload.submission_id,
                        error = %e,
                        "Failed to load filing for webhook"
                    );
                    outcome.failed += 1;
                    continue;
                }
            };

            match self
                .reconciler
                .apply(&record, incoming, ReconcileSource::Webhook)
                .await
            {
                Ok(Some(change)) => outcome.updated.push(change),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        filing_id = %record.id,
                        submission_id = %payload.submission_id,
                        error = %e,
                        "Failed to apply webhook status"
                    );
                    outcome.failed += 1;
                }
            }
        }

        tracing::info!(
            submission_id = %payload.submission_id,
            updated = outcome.updated.len(),
            unknown = outcome.unknown_submission,
            failed = outcome.failed,
            "Filing webhook processed"
        );

        Ok(outcome)
    }

    /// Process a delivery on a supervised background task
    pub fn dispatch(self: &Arc<Self>, headers: WebhookHeaders, body: Vec<u8>) -> JoinHandle<()> {
        let receiver = Arc::clone(self);
        spawn_supervised("filing_webhook", async move {
            receiver.process(&headers, &body).await
        })
    }
}
