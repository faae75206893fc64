//! Filer notifications after a status change
//!
//! Delivery is best effort: callers log failures and never roll back or
//! retry the status write that triggered the notification.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ReconcileError, ReconcileResult};
use crate::status::FilingStatus;

/// Body posted to the notification dispatcher
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusNotification {
    pub filing_id: Uuid,
    pub user_id: Uuid,
    pub status: FilingStatus,
}

#[async_trait]
pub trait FilingNotifier: Send + Sync {
    async fn notify_status_change(&self, notification: &StatusNotification) -> ReconcileResult<()>;
}

/// Posts status changes to the configured dispatcher endpoint, or only logs
/// them when no endpoint is configured
#[derive(Clone)]
pub struct NotificationDispatcher {
    http: Client,
    endpoint: Option<String>,
}

impl NotificationDispatcher {
    pub fn new(http: Client, endpoint: Option<String>) -> Self {
        Self { http, endpoint }
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[async_trait]
impl FilingNotifier for NotificationDispatcher {
    async fn notify_status_change(&self, notification: &StatusNotification) -> ReconcileResult<()> {
        let Some(endpoint) = &self.endpoint else {
            tracing::info!(
                filing_id = %notification.filing_id,
                user_id = %notification.user_id,
                status = %notification.status,
                "Filing status changed (notification dispatcher not configured)"
            );
            return Ok(());
        };

        let response = self
            .http
            .post(endpoint)
            .json(notification)
            .send()
            .await
            .map_err(|e| ReconcileError::Notification(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ReconcileError::Notification(format!(
                "dispatcher returned HTTP {}",
                response.status().as_u16()
            )));
        }

        tracing::debug!(
            filing_id = %notification.filing_id,
            status = %notification.status,
            "Filing status notification dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn notification() -> StatusNotification {
        StatusNotification {
            filing_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            status: FilingStatus::Accepted,
        }
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_succeeds_without_http() {
        let dispatcher = NotificationDispatcher::new(Client::new(), None);
        assert!(!dispatcher.is_enabled());
        assert!(dispatcher.notify_status_change(&notification()).await.is_ok());
    }

    #[tokio::test]
    async fn test_posts_notification_body() {
        let mut server = mockito::Server::new_async().await;
        let body = notification();
        let mock = server
            .mock("POST", "/notify")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "filing_id": body.filing_id,
                "user_id": body.user_id,
                "status": "accepted",
            })))
            .with_status(202)
            .create_async()
            .await;

        let dispatcher =
            NotificationDispatcher::new(Client::new(), Some(format!("{}/notify", server.url())));
        assert!(dispatcher.is_enabled());
        dispatcher.notify_status_change(&body).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/notify")
            .with_status(503)
            .create_async()
            .await;

        let dispatcher =
            NotificationDispatcher::new(Client::new(), Some(format!("{}/notify", server.url())));
        let err = dispatcher
            .notify_status_change(&notification())
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::Notification(_)));
    }
}
