//! Application state

use filing_reconciler::ReconciliationService;
use sqlx::PgPool;

use crate::config::Config;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub reconciliation: ReconciliationService,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> anyhow::Result<Self> {
        let provider = &config.reconciler.provider;
        if provider.api_credentials().is_ok() {
            tracing::info!(
                environment = ?provider.environment,
                base_url = provider.base_url(),
                "Filing provider credentials configured"
            );
        } else {
            tracing::warn!(
                "Filing provider credentials incomplete - webhooks and polling will be rejected"
            );
        }
        if provider.cron_secret.is_none() {
            tracing::warn!("CRON_SECRET not set - status poll endpoint will reject every caller");
        }

        let reconciliation = ReconciliationService::from_pool(config.reconciler.clone(), pool)?;
        Ok(Self::with_service(reconciliation))
    }

    /// Build state around an already-wired service
    pub fn with_service(reconciliation: ReconciliationService) -> Self {
        Self { reconciliation }
    }
}
