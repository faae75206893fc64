//! Status reconciliation shared by the webhook and poll paths

use std::fmt;
use std::sync::Arc;

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::config::RefundEstimateConfig;
use crate::error::ReconcileResult;
use crate::notify::{FilingNotifier, StatusNotification};
use crate::provider::ProviderStatusRecord;
use crate::record::{FilingRecord, StatusChange, StatusUpdate};
use crate::refund::estimate_refund;
use crate::status::{map_provider_status, FilingStatus};
use crate::store::FilingStore;

/// Which path observed the provider status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileSource {
    Webhook,
    Poll,
}

impl fmt::Display for ReconcileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileSource::Webhook => write!(f, "webhook"),
            ReconcileSource::Poll => write!(f, "poll"),
        }
    }
}

/// Parse a provider `StatusTime`
///
/// Accepts RFC 3339, the provider's `MM/DD/YYYY HH:MM:SS ±HH:MM` form, and
/// offset-less ISO timestamps (taken as UTC).
pub fn parse_status_time(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(t);
    }

    let us_with_offset = format_description!(
        "[month]/[day]/[year] [hour]:[minute]:[second] [offset_hour sign:mandatory]:[offset_minute]"
    );
    if let Ok(t) = OffsetDateTime::parse(raw, us_with_offset) {
        return Some(t);
    }

    let iso_naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    PrimitiveDateTime::parse(raw, iso_naive)
        .ok()
        .map(PrimitiveDateTime::assume_utc)
}

/// Applies provider statuses to stored filings and notifies filers
#[derive(Clone)]
pub struct StatusReconciler {
    store: Arc<dyn FilingStore>,
    notifier: Arc<dyn FilingNotifier>,
    refund: RefundEstimateConfig,
}

impl StatusReconciler {
    pub fn new(
        store: Arc<dyn FilingStore>,
        notifier: Arc<dyn FilingNotifier>,
        refund: RefundEstimateConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            refund,
        }
    }

    pub fn store(&self) -> &Arc<dyn FilingStore> {
        &self.store
    }

    /// Decide what, if anything, to write for a provider status
    pub fn plan(
        &self,
        record: &FilingRecord,
        incoming: &ProviderStatusRecord,
        now: OffsetDateTime,
    ) -> Option<StatusUpdate> {
        let status = map_provider_status(&incoming.status);
        if !record.status.can_transition_to(status) {
            return None;
        }

        let stamped_at = || {
            incoming
                .status_time
                .as_deref()
                .and_then(parse_status_time)
                .unwrap_or(now)
        };

        let mut update = StatusUpdate {
            status,
            accepted_at: None,
            rejected_at: None,
            rejection_errors: None,
            refund_estimate: None,
        };

        match status {
            FilingStatus::Accepted => {
                update.accepted_at = Some(stamped_at());
                if record.refund_estimate.is_none() {
                    // Missing income fields count as zero
                    let estimate = estimate_refund(
                        &self.refund,
                        record.wages.unwrap_or(0.0),
                        record.federal_tax_withheld.unwrap_or(0.0),
                    );
                    if estimate.is_none() {
                        tracing::warn!(
                            filing_id = %record.id,
                            "Refund estimate skipped: non-finite income amounts"
                        );
                    }
                    update.refund_estimate = estimate.map(|e| e.refund_dollars());
                }
            }
            FilingStatus::Rejected => {
                update.rejected_at = Some(stamped_at());
                update.rejection_errors = incoming.errors.clone();
            }
            _ => {}
        }

        Some(update)
    }

    /// Apply a provider status to one filing.
    ///
    /// Returns the persisted change, or `None` when the write was a no-op
    /// (same or regressive status, terminal record).
    pub async fn apply(
        &self,
        record: &FilingRecord,
        incoming: &ProviderStatusRecord,
        source: ReconcileSource,
    ) -> ReconcileResult<Option<StatusChange>> {
        let Some(update) = self.plan(record, incoming, OffsetDateTime::now_utc()) else {
            tracing::debug!(
                filing_id = %record.id,
                stored_status = %record.status,
                provider_status = %incoming.status,
                source = %source,
                "No status transition"
            );
            return Ok(None);
        };

        if !self.store.apply_status_update(record.id, &update).await? {
            tracing::info!(
                filing_id = %record.id,
                status = %update.status,
                source = %source,
                "Status write skipped, filing already resolved"
            );
            return Ok(None);
        }

        tracing::info!(
            filing_id = %record.id,
            previous_status = %record.status,
            status = %update.status,
            refund_estimate = ?update.refund_estimate,
            source = %source,
            "Filing status updated"
        );

        let notification = StatusNotification {
            filing_id: record.id,
            user_id: record.user_id,
            status: update.status,
        };
        if let Err(e) = self.notifier.notify_status_change(&notification).await {
            tracing::error!(
                filing_id = %record.id,
                user_id = %record.user_id,
                error = %e,
                "Failed to notify filer of status change"
            );
        }

        Ok(Some(StatusChange {
            filing_id: record.id,
            user_id: record.user_id,
            submission_id: record.submission_id.clone().unwrap_or_default(),
            form_type: record.form_type,
            previous_status: record.status,
            status: update.status,
        }))
    }
}
