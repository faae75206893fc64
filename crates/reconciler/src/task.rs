//! Supervised background tasks
//!
//! Work spawned outside a request lifecycle runs inside an inner task; the
//! outer task awaits it and logs whatever comes back, panics included, so a
//! failing job never takes the process down or disappears silently.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::error::ReconcileResult;

pub fn spawn_supervised<F, T>(task: &'static str, work: F) -> JoinHandle<()>
where
    F: Future<Output = ReconcileResult<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(async move {
        match tokio::spawn(work).await {
            Ok(Ok(_)) => {
                tracing::debug!(task, "Background task completed");
            }
            Ok(Err(e)) if e.is_auth_failure() => {
                tracing::warn!(task, error = %e, "Background task rejected unauthenticated input");
            }
            Ok(Err(e)) => {
                tracing::error!(task, error = %e, "Background task failed");
            }
            Err(join_error) if join_error.is_panic() => {
                tracing::error!(task, "Background task panicked");
            }
            Err(join_error) => {
                tracing::warn!(task, error = %join_error, "Background task cancelled");
            }
        }
    })
}
