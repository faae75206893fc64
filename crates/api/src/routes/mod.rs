//! HTTP routes

mod cron;
mod filing_webhook;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub use cron::check_filing_status;
pub use filing_webhook::{receive_filing_webhook, webhook_liveness};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/filing/webhook",
            get(webhook_liveness).post(receive_filing_webhook),
        )
        .route("/cron/check-filing-status", get(check_filing_status))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{body::Body, http::Response};
    use filing_reconciler::{
        FilingProvider, FormType, InMemoryFilingStore, NotificationDispatcher, ProviderConfig,
        ProviderStatusRecord, ReconcileError, ReconcileResult, ReconcilerConfig,
        ReconciliationService,
    };
    use serde_json::Value;

    use crate::state::AppState;

    pub const API_SECRET: &str = "route-secret";
    pub const CLIENT_ID: &str = "route-client";
    pub const CRON_SECRET: &str = "route-cron";

    /// Provider answering from a fixed submission id -> status table
    #[derive(Default)]
    pub struct TableProvider(pub HashMap<String, Result<&'static str, u16>>);

    #[async_trait]
    impl FilingProvider for TableProvider {
        async fn submission_status(
            &self,
            submission_id: &str,
            _form_type: FormType,
        ) -> ReconcileResult<Option<ProviderStatusRecord>> {
            match self.0.get(submission_id) {
                Some(Ok(status)) => Ok(Some(ProviderStatusRecord {
                    status: status.to_string(),
                    ..Default::default()
                })),
                Some(Err(code)) => Err(ReconcileError::ProviderStatus { status: *code }),
                None => Ok(None),
            }
        }
    }

    pub fn provider_config() -> ProviderConfig {
        ProviderConfig {
            api_key: Some("route-key".to_string()),
            api_secret: Some(API_SECRET.to_string()),
            client_id: Some(CLIENT_ID.to_string()),
            cron_secret: Some(CRON_SECRET.to_string()),
            ..Default::default()
        }
    }

    pub fn app_state(
        provider_config: ProviderConfig,
        store: &InMemoryFilingStore,
        provider: TableProvider,
    ) -> AppState {
        let reconciler = ReconcilerConfig {
            provider: provider_config,
            ..Default::default()
        };
        let service = ReconciliationService::new(
            reconciler,
            Arc::new(store.clone()),
            Arc::new(provider),
            Arc::new(NotificationDispatcher::new(reqwest::Client::new(), None)),
        );
        AppState::with_service(service)
    }

    pub async fn json_body(response: Response<Body>) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use filing_reconciler::InMemoryFilingStore;
    use tower::ServiceExt;

    use super::test_support::*;
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let state = app_state(
            provider_config(),
            &InMemoryFilingStore::new(),
            TableProvider::default(),
        );

        let response = create_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }
}
