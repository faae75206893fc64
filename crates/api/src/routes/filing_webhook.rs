//! E-filing provider webhook endpoint
//!
//! Every POST is acknowledged with `200 {"success": true}` before the
//! signature is checked; the provider retries on anything else. Verification
//! and persistence run on a supervised background task, and rejected or
//! failed deliveries are only visible in the logs.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use filing_reconciler::WebhookHeaders;
use serde_json::{json, Value};

use crate::state::AppState;

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Receive a status push from the provider
pub async fn receive_filing_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Value> {
    let webhook_headers = WebhookHeaders {
        signature: header_value(&headers, "signature"),
        timestamp: header_value(&headers, "timestamp"),
    };

    tracing::debug!(
        body_len = body.len(),
        signature_present = webhook_headers.signature.is_some(),
        "Filing webhook received"
    );

    // Detached: the response does not wait for processing
    let _ = state
        .reconciliation
        .webhooks
        .dispatch(webhook_headers, body.to_vec());

    Json(json!({ "success": true }))
}

/// Liveness probe used when registering the webhook URL with the provider
pub async fn webhook_liveness() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Filing webhook endpoint is active",
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use filing_reconciler::{
        config::WebhookCredentials, signing::webhook_signature, FilingRecord, FilingStatus,
        FormType, InMemoryFilingStore,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::routes::create_router;
    use crate::routes::test_support::*;

    fn signed_request(submission_id: &str, status: &str, signature: Option<String>) -> Request<Body> {
        let timestamp = "1710000000";
        let signature = signature.unwrap_or_else(|| {
            webhook_signature(
                &WebhookCredentials {
                    api_secret: API_SECRET,
                    client_id: CLIENT_ID,
                },
                timestamp,
            )
            .unwrap()
        });
        let body = serde_json::json!({
            "SubmissionId": submission_id,
            "FormType": "FormW2",
            "Records": [{"RecordId": "r-1", "Status": status}]
        });

        Request::post("/filing/webhook")
            .header("content-type", "application/json")
            // Header names are matched case-insensitively
            .header("SIGNATURE", signature)
            .header("timestamp", timestamp)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn wait_for_status(store: &InMemoryFilingStore, id: Uuid, status: FilingStatus) -> bool {
        for _ in 0..50 {
            if store.get(id).await.map(|r| r.status) == Some(status) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_signed_webhook_acknowledged_and_applied() {
        let store = InMemoryFilingStore::new();
        let record = FilingRecord::submitted(Uuid::new_v4(), FormType::W2, 2024, "sub-1");
        store.insert(record.clone()).await;
        let app = create_router(app_state(provider_config(), &store, TableProvider::default()));

        let response = app
            .oneshot(signed_request("sub-1", "Accepted", None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, serde_json::json!({"success": true}));
        assert!(wait_for_status(&store, record.id, FilingStatus::Accepted).await);
    }

    #[tokio::test]
    async fn test_bad_signature_still_acknowledged_but_ignored() {
        let store = InMemoryFilingStore::new();
        let record = FilingRecord::submitted(Uuid::new_v4(), FormType::W2, 2024, "sub-1");
        store.insert(record.clone()).await;
        let app = create_router(app_state(provider_config(), &store, TableProvider::default()));

        let response = app
            .oneshot(signed_request(
                "sub-1",
                "Accepted",
                Some("bm90IHRoZSByaWdodCBzaWduYXR1cmUhISE=".to_string()),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
        assert!(!wait_for_status(&store, record.id, FilingStatus::Accepted).await);
        assert_eq!(store.get(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_missing_headers_acknowledged() {
        let app = create_router(app_state(
            provider_config(),
            &InMemoryFilingStore::new(),
            TableProvider::default(),
        ));

        let response = app
            .oneshot(
                Request::post("/filing/webhook")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_liveness_get() {
        let app = create_router(app_state(
            provider_config(),
            &InMemoryFilingStore::new(),
            TableProvider::default(),
        ));

        let response = app
            .oneshot(Request::get("/filing/webhook").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert!(body["message"].is_string());
    }
}
