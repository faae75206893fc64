//! Reconciliation error types

use thiserror::Error;

pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A required provider setting is absent. Carries the setting name only.
    #[error("Filing provider not configured: missing {0}")]
    NotConfigured(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Webhook signature invalid: {0}")]
    SignatureInvalid(&'static str),

    #[error("Unauthorized trigger")]
    Unauthorized,

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    /// Connection could not be established; safe to retry
    #[error("Provider connection failed: {0}")]
    ProviderConnect(String),

    #[error("Provider request failed: {0}")]
    ProviderTransport(String),

    #[error("Provider returned HTTP {status}")]
    ProviderStatus { status: u16 },

    #[error("Provider response could not be decoded: {0}")]
    ProviderDecode(String),

    #[error("Provider request timed out after {0}s")]
    ProviderTimeout(u64),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Notification failed: {0}")]
    Notification(String),
}

impl From<sqlx::Error> for ReconcileError {
    fn from(e: sqlx::Error) -> Self {
        ReconcileError::Database(e.to_string())
    }
}

impl ReconcileError {
    /// Whether the error stems from the caller failing authentication
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ReconcileError::SignatureInvalid(_) | ReconcileError::Unauthorized
        )
    }
}
