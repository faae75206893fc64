// Test code patterns:
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Filing Background Worker
//!
//! Handles scheduled jobs including:
//! - Filing status poll trigger (every 5 minutes by default, `FILING_POLL_CRON`)
//! - Health check heartbeat (every 5 minutes)

mod poll_trigger;

use std::time::Duration;

use filing_shared::init_tracing;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::poll_trigger::{PollTrigger, TriggerError};

const DEFAULT_POLL_CRON: &str = "0 */5 * * * *";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_tracing("info");

    info!("Starting Filing Worker");

    let trigger = match PollTrigger::from_env() {
        Ok(trigger) => trigger,
        Err(TriggerError::MissingSecret) => {
            // Nothing to authenticate with; stay up so deploys don't crash-loop
            warn!("CRON_SECRET not set - running in heartbeat-only mode");
            loop {
                tokio::time::sleep(Duration::from_secs(300)).await;
                info!("Worker heartbeat (heartbeat-only mode)");
            }
        }
        Err(e) => return Err(e.into()),
    };

    let poll_cron = std::env::var("FILING_POLL_CRON")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_POLL_CRON.to_string());

    let scheduler = JobScheduler::new().await?;

    // Job 1: Trigger the filing status poll
    let poll_trigger = trigger.clone();
    scheduler
        .add(Job::new_async(poll_cron.as_str(), move |_uuid, _l| {
            let trigger = poll_trigger.clone();
            Box::pin(async move {
                info!(url = trigger.url(), "Running scheduled filing status poll");
                match trigger.trigger().await {
                    Ok(run) => info!(
                        checked = run.checked,
                        updated = run.updated,
                        "Filing status poll complete"
                    ),
                    Err(e) => error!(error = %e, "Filing status poll failed"),
                }
            })
        })?)
        .await?;
    info!(cron = %poll_cron, "Scheduled: Filing status poll");

    // Job 2: Health check heartbeat (every 5 minutes)
    scheduler
        .add(Job::new_async("0 */5 * * * *", |_uuid, _l| {
            Box::pin(async move {
                info!("Worker heartbeat - all systems operational");
            })
        })?)
        .await?;
    info!("Scheduled: Health check heartbeat (every 5 minutes)");

    info!("Starting job scheduler");
    scheduler.start().await?;

    info!("Filing Worker started successfully with {} scheduled jobs", 2);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    Ok(())
}
