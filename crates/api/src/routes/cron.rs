//! Scheduled status poll trigger
//!
//! Called by the worker (or any external scheduler) with
//! `Authorization: Bearer <CRON_SECRET>`.

use axum::{extract::State, http::header, http::HeaderMap, Json};
use filing_reconciler::StatusChange;
use serde::Serialize;

use crate::{error::ApiResult, state::AppState};

#[derive(Debug, Serialize)]
pub struct CheckFilingStatusResponse {
    pub success: bool,
    pub message: String,
    pub checked: usize,
    pub updated: usize,
    pub results: Vec<StatusChange>,
}

/// Poll the provider for every recent unresolved filing
pub async fn check_filing_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<CheckFilingStatusResponse>> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let poller = &state.reconciliation.poller;
    poller.authorize(authorization)?;

    let summary = poller.run().await?;

    Ok(Json(CheckFilingStatusResponse {
        success: true,
        message: format!(
            "Checked {} filings, updated {}",
            summary.checked, summary.updated
        ),
        checked: summary.checked,
        updated: summary.updated,
        results: summary.results,
    }))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use filing_reconciler::{
        FilingRecord, FilingStatus, FormType, InMemoryFilingStore, ProviderConfig,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::routes::create_router;
    use crate::routes::test_support::*;

    fn cron_request(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::get("/cron/check-filing-status");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_rejects_wrong_secret() {
        let app = create_router(app_state(
            provider_config(),
            &InMemoryFilingStore::new(),
            TableProvider::default(),
        ));

        let response = app
            .oneshot(cron_request(Some("Bearer not-the-secret")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(json_body(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_rejects_when_secret_unset() {
        let config = ProviderConfig {
            cron_secret: None,
            ..provider_config()
        };
        let app = create_router(app_state(
            config,
            &InMemoryFilingStore::new(),
            TableProvider::default(),
        ));

        let response = app.oneshot(cron_request(None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_provider_credentials_is_server_error() {
        let config = ProviderConfig {
            api_key: None,
            ..provider_config()
        };
        let app = create_router(app_state(
            config,
            &InMemoryFilingStore::new(),
            TableProvider::default(),
        ));

        let auth = format!("Bearer {}", CRON_SECRET);
        let response = app.oneshot(cron_request(Some(&auth))).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("FILING_PROVIDER_API_KEY"));
    }

    #[tokio::test]
    async fn test_poll_summary() {
        let store = InMemoryFilingStore::new();
        let mut table = HashMap::new();
        for (submission_id, outcome) in [
            ("sub-accepted", Ok("Accepted")),
            ("sub-pending", Ok("Pending")),
            ("sub-failing", Err(500)),
        ] {
            let record = FilingRecord::submitted(Uuid::new_v4(), FormType::W2, 2024, submission_id)
                .with_status(FilingStatus::Pending);
            store.insert(record).await;
            table.insert(submission_id.to_string(), outcome);
        }
        let app = create_router(app_state(provider_config(), &store, TableProvider(table)));

        let auth = format!("Bearer {}", CRON_SECRET);
        let response = app.oneshot(cron_request(Some(&auth))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["checked"], 3);
        assert_eq!(body["updated"], 1);
        assert_eq!(body["results"][0]["submission_id"], "sub-accepted");
        assert_eq!(body["results"][0]["status"], "accepted");
        assert!(body["message"].is_string());
    }
}
