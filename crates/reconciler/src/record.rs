//! Filing records and the status writes applied to them

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::status::{FilingStatus, FormType};

/// One submitted tax form
///
/// Created by the submission flow; this crate only mutates the status
/// columns and the refund estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilingRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Provider-assigned id, the join key for webhooks and polling
    pub submission_id: Option<String>,
    pub form_type: FormType,
    pub tax_year: i32,
    pub wages: Option<f64>,
    pub federal_tax_withheld: Option<f64>,
    pub status: FilingStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub submitted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub accepted_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub rejected_at: Option<OffsetDateTime>,
    /// Provider error list, stored exactly as received
    pub rejection_errors: Option<serde_json::Value>,
    pub refund_estimate: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl FilingRecord {
    /// A freshly submitted filing awaiting the provider's verdict
    pub fn submitted(
        user_id: Uuid,
        form_type: FormType,
        tax_year: i32,
        submission_id: impl Into<String>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            user_id,
            submission_id: Some(submission_id.into()),
            form_type,
            tax_year,
            wages: None,
            federal_tax_withheld: None,
            status: FilingStatus::Submitted,
            submitted_at: Some(now),
            accepted_at: None,
            rejected_at: None,
            rejection_errors: None,
            refund_estimate: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: FilingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_income(mut self, wages: f64, federal_tax_withheld: f64) -> Self {
        self.wages = Some(wages);
        self.federal_tax_withheld = Some(federal_tax_withheld);
        self
    }

    pub fn with_created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Column values written when a transition is applied
///
/// `None` fields leave the stored column untouched. The refund estimate is
/// only written when the stored value is absent.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: FilingStatus,
    pub accepted_at: Option<OffsetDateTime>,
    pub rejected_at: Option<OffsetDateTime>,
    pub rejection_errors: Option<serde_json::Value>,
    pub refund_estimate: Option<f64>,
}

/// A transition that was persisted, reported back to callers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusChange {
    pub filing_id: Uuid,
    pub user_id: Uuid,
    pub submission_id: String,
    pub form_type: FormType,
    pub previous_status: FilingStatus,
    pub status: FilingStatus,
}
