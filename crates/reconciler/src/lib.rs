// Test code patterns (expected in test files):
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Filing Status Reconciliation
//!
//! Keeps locally stored tax filings in line with the e-filing provider's
//! authoritative status.
//!
//! ## Features
//!
//! - **Webhook Receiver**: verifies provider push notifications (HMAC-SHA256,
//!   constant-time compare) and applies them on a supervised background task
//! - **Poll Reconciler**: scheduled sweep that queries the provider for every
//!   recent unresolved filing in parallel, as a backstop for lost webhooks
//! - **State Machine**: monotonic transitions with terminal `accepted` /
//!   `rejected` states shared by both paths
//! - **Refund Estimate**: simplified estimate stored when a filing is accepted
//! - **Notifications**: best-effort filer notification after each transition

pub mod config;
pub mod error;
pub mod notify;
pub mod poller;
pub mod provider;
pub mod reconcile;
pub mod record;
pub mod refund;
pub mod signing;
pub mod status;
pub mod store;
pub mod task;
pub mod webhook;


// Config
pub use config::{
    PollConfig, ProviderConfig, ProviderEnvironment, ReconcilerConfig, RefundEstimateConfig,
};

// Error
pub use error::{ReconcileError, ReconcileResult};

// Notifications
pub use notify::{FilingNotifier, NotificationDispatcher, StatusNotification};

// Poller
pub use poller::{PollReconciler, PollSummary};

// Provider
pub use provider::{FilingProvider, ProviderClient, ProviderStatusRecord, ProviderStatusResponse};

// Reconciliation
pub use reconcile::{ReconcileSource, StatusReconciler};

// Records
pub use record::{FilingRecord, StatusChange, StatusUpdate};

// Refund
pub use refund::{estimate_refund, RefundEstimate};

// Status
pub use status::{map_provider_status, FilingStatus, FormType};

// Store
pub use store::{FilingStore, InMemoryFilingStore, PgFilingStore};

// Webhooks
pub use webhook::{WebhookHeaders, WebhookOutcome, WebhookPayload, WebhookReceiver};

use std::sync::Arc;

use sqlx::PgPool;

/// Webhook receiver and poll reconciler wired to the same store,
/// notifier and state machine
#[derive(Clone)]
pub struct ReconciliationService {
    pub webhooks: Arc<WebhookReceiver>,
    pub poller: Arc<PollReconciler>,
}

impl ReconciliationService {
    /// Create the service against Postgres with the HTTP provider client
    pub fn from_pool(config: ReconcilerConfig, pool: PgPool) -> ReconcileResult<Self> {
        let store: Arc<dyn FilingStore> = Arc::new(PgFilingStore::new(pool));
        let provider: Arc<dyn FilingProvider> =
            Arc::new(ProviderClient::new(config.provider.clone())?);
        let dispatcher =
            NotificationDispatcher::new(reqwest::Client::new(), config.notification_url.clone());
        if dispatcher.is_enabled() {
            tracing::info!("Filing status notifications enabled");
        } else {
            tracing::info!("NOTIFICATION_WEBHOOK_URL not set - status notifications are log-only");
        }
        let notifier: Arc<dyn FilingNotifier> = Arc::new(dispatcher);

        Ok(Self::new(config, store, provider, notifier))
    }

    /// Create the service from explicit collaborators
    pub fn new(
        config: ReconcilerConfig,
        store: Arc<dyn FilingStore>,
        provider: Arc<dyn FilingProvider>,
        notifier: Arc<dyn FilingNotifier>,
    ) -> Self {
        let reconciler = StatusReconciler::new(store, notifier, config.refund);

        Self {
            webhooks: Arc::new(WebhookReceiver::new(
                config.provider.clone(),
                reconciler.clone(),
            )),
            poller: Arc::new(PollReconciler::new(
                config.provider,
                config.poll,
                provider,
                reconciler,
            )),
        }
    }
}
