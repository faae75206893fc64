//! Filing persistence
//!
//! The `filings` table is owned by the managed database. Columns read and
//! written here:
//!
//! | column | type |
//! |---|---|
//! | `id`, `user_id` | `UUID` |
//! | `submission_id` | `TEXT UNIQUE NULL` |
//! | `form_type`, `status` | `TEXT` |
//! | `tax_year` | `INTEGER` |
//! | `wages`, `federal_tax_withheld`, `refund_estimate` | `DOUBLE PRECISION NULL` |
//! | `rejection_errors` | `JSONB NULL` |
//! | `submitted_at`, `accepted_at`, `rejected_at` | `TIMESTAMPTZ NULL` |
//! | `created_at`, `updated_at` | `TIMESTAMPTZ` |
//!
//! Status writes never touch a row that is already terminal, which is the
//! only protection against the webhook and the poller racing on a filing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{ReconcileError, ReconcileResult};
use crate::record::{FilingRecord, StatusUpdate};
use crate::status::{FilingStatus, FormType};

#[async_trait]
pub trait FilingStore: Send + Sync {
    async fn find_by_submission_id(&self, submission_id: &str)
        -> ReconcileResult<Option<FilingRecord>>;

    /// Unresolved filings of one form type created at or after `created_after`
    async fn pollable(
        &self,
        form_type: FormType,
        created_after: OffsetDateTime,
        limit: i64,
    ) -> ReconcileResult<Vec<FilingRecord>>;

    /// Apply a status write unless the stored status is terminal.
    /// Returns whether a row was updated.
    async fn apply_status_update(&self, filing_id: Uuid, update: &StatusUpdate)
        -> ReconcileResult<bool>;
}

/// Database row type for the `filings` table
#[derive(Debug, FromRow)]
struct FilingRow {
    id: Uuid,
    user_id: Uuid,
    submission_id: Option<String>,
    form_type: String,
    tax_year: i32,
    wages: Option<f64>,
    federal_tax_withheld: Option<f64>,
    status: String,
    submitted_at: Option<OffsetDateTime>,
    accepted_at: Option<OffsetDateTime>,
    rejected_at: Option<OffsetDateTime>,
    rejection_errors: Option<serde_json::Value>,
    refund_estimate: Option<f64>,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<FilingRow> for FilingRecord {
    type Error = ReconcileError;

    fn try_from(row: FilingRow) -> Result<Self, Self::Error> {
        Ok(FilingRecord {
            id: row.id,
            user_id: row.user_id,
            submission_id: row.submission_id,
            form_type: row
                .form_type
                .parse()
                .map_err(|_| ReconcileError::Database(format!("bad form_type '{}'", row.form_type)))?,
            tax_year: row.tax_year,
            wages: row.wages,
            federal_tax_withheld: row.federal_tax_withheld,
            status: row
                .status
                .parse()
                .map_err(|_| ReconcileError::Database(format!("bad status '{}'", row.status)))?,
            submitted_at: row.submitted_at,
            accepted_at: row.accepted_at,
            rejected_at: row.rejected_at,
            rejection_errors: row.rejection_errors,
            refund_estimate: row.refund_estimate,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const FILING_COLUMNS: &str = r#"
    id, user_id, submission_id, form_type, tax_year, wages, federal_tax_withheld,
    status, submitted_at, accepted_at, rejected_at, rejection_errors, refund_estimate,
    created_at, updated_at
"#;

/// Postgres-backed store
#[derive(Clone)]
pub struct PgFilingStore {
    pool: PgPool,
}

impl PgFilingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FilingStore for PgFilingStore {
    async fn find_by_submission_id(
        &self,
        submission_id: &str,
    ) -> ReconcileResult<Option<FilingRecord>> {
        let row: Option<FilingRow> = sqlx::query_as(&format!(
            "SELECT {} FROM filings WHERE submission_id = $1",
            FILING_COLUMNS
        ))
        .bind(submission_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(FilingRecord::try_from).transpose()
    }

    async fn pollable(
        &self,
        form_type: FormType,
        created_after: OffsetDateTime,
        limit: i64,
    ) -> ReconcileResult<Vec<FilingRecord>> {
        let statuses: Vec<String> = FilingStatus::POLLABLE
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let rows: Vec<FilingRow> = sqlx::query_as(&format!(
            r#"
            SELECT {}
            FROM filings
            WHERE status = ANY($1)
              AND submission_id IS NOT NULL
              AND form_type = $2
              AND created_at >= $3
            ORDER BY created_at ASC
            LIMIT $4
            "#,
            FILING_COLUMNS
        ))
        .bind(statuses)
        .bind(form_type.as_str())
        .bind(created_after)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FilingRecord::try_from).collect()
    }

    async fn apply_status_update(
        &self,
        filing_id: Uuid,
        update: &StatusUpdate,
    ) -> ReconcileResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE filings
            SET status = $2,
                accepted_at = COALESCE($3, accepted_at),
                rejected_at = COALESCE($4, rejected_at),
                rejection_errors = COALESCE($5, rejection_errors),
                refund_estimate = COALESCE(refund_estimate, $6),
                updated_at = NOW()
            WHERE id = $1
              AND status NOT IN ('accepted', 'rejected')
            "#,
        )
        .bind(filing_id)
        .bind(update.status.as_str())
        .bind(update.accepted_at)
        .bind(update.rejected_at)
        .bind(update.rejection_errors.clone())
        .bind(update.refund_estimate)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-process store for tests and local development
#[derive(Clone, Default)]
pub struct InMemoryFilingStore {
    records: Arc<RwLock<HashMap<Uuid, FilingRecord>>>,
}

impl InMemoryFilingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: FilingRecord) {
        self.records.write().await.insert(record.id, record);
    }

    pub async fn get(&self, filing_id: Uuid) -> Option<FilingRecord> {
        self.records.read().await.get(&filing_id).cloned()
    }
}

#[async_trait]
impl FilingStore for InMemoryFilingStore {
    async fn find_by_submission_id(
        &self,
        submission_id: &str,
    ) -> ReconcileResult<Option<FilingRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.submission_id.as_deref() == Some(submission_id))
            .cloned())
    }

    async fn pollable(
        &self,
        form_type: FormType,
        created_after: OffsetDateTime,
        limit: i64,
    ) -> ReconcileResult<Vec<FilingRecord>> {
        let mut matching: Vec<FilingRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| {
                FilingStatus::POLLABLE.contains(&r.status)
                    && r.submission_id.is_some()
                    && r.form_type == form_type
                    && r.created_at >= created_after
            })
            .cloned()
            .collect();

        matching.sort_by_key(|r| r.created_at);
        matching.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(matching)
    }

    async fn apply_status_update(
        &self,
        filing_id: Uuid,
        update: &StatusUpdate,
    ) -> ReconcileResult<bool> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&filing_id) else {
            return Ok(false);
        };
        if record.status.is_terminal() {
            return Ok(false);
        }

        record.status = update.status;
        if update.accepted_at.is_some() {
            record.accepted_at = update.accepted_at;
        }
        if update.rejected_at.is_some() {
            record.rejected_at = update.rejected_at;
        }
        if update.rejection_errors.is_some() {
            record.rejection_errors = update.rejection_errors.clone();
        }
        if record.refund_estimate.is_none() {
            record.refund_estimate = update.refund_estimate;
        }
        record.updated_at = OffsetDateTime::now_utc();
        Ok(true)
    }
}
