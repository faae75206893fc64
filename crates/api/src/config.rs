//! API server configuration

use anyhow::Context;
use filing_reconciler::ReconcilerConfig;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub database_url: String,
    pub reconciler: ReconcilerConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .context("DATABASE_URL must be set")?;

        let bind_address = std::env::var("BIND_ADDRESS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let reconciler =
            ReconcilerConfig::from_env().context("Invalid filing reconciliation configuration")?;

        Ok(Self {
            bind_address,
            database_url,
            reconciler,
        })
    }
}
