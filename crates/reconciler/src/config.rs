//! Reconciliation configuration
//!
//! All provider credentials and tuning knobs are carried in explicit structs
//! injected into the webhook receiver and poll reconciler, so both can be
//! constructed with fake credentials in tests.

use std::str::FromStr;
use std::time::Duration;

use crate::error::{ReconcileError, ReconcileResult};

const SANDBOX_BASE_URL: &str = "https://testapi.taxbandits.com";
const PRODUCTION_BASE_URL: &str = "https://api.taxbandits.com";

/// Provider deployment the service talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl ProviderEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            ProviderEnvironment::Sandbox => SANDBOX_BASE_URL,
            ProviderEnvironment::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl FromStr for ProviderEnvironment {
    type Err = ReconcileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "test" | "development" => Ok(ProviderEnvironment::Sandbox),
            "production" | "prod" | "live" => Ok(ProviderEnvironment::Production),
            other => Err(ReconcileError::InvalidConfig(format!(
                "unknown provider environment '{}'",
                other
            ))),
        }
    }
}

/// E-filing provider credentials and endpoint settings
///
/// Credentials are optional at construction time: a missing value only
/// fails the invocation that needs it.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub client_id: Option<String>,
    pub environment: ProviderEnvironment,
    /// Overrides the environment's base URL (local mocks, staging proxies)
    pub base_url_override: Option<String>,
    /// Bearer secret the scheduled trigger must present
    pub cron_secret: Option<String>,
    /// Per-call deadline for outbound status queries
    pub request_timeout: Duration,
}

/// Credentials required for outbound provider calls
#[derive(Debug, Clone, Copy)]
pub struct ApiCredentials<'a> {
    pub api_key: &'a str,
    pub api_secret: &'a str,
    pub client_id: &'a str,
}

/// Credentials required to verify inbound webhooks
#[derive(Debug, Clone, Copy)]
pub struct WebhookCredentials<'a> {
    pub api_secret: &'a str,
    pub client_id: &'a str,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            client_id: None,
            environment: ProviderEnvironment::Sandbox,
            base_url_override: None,
            cron_secret: None,
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl ProviderConfig {
    pub fn from_env() -> ReconcileResult<Self> {
        let environment = match env_opt("FILING_PROVIDER_ENVIRONMENT") {
            Some(value) => value.parse()?,
            None => ProviderEnvironment::default(),
        };

        Ok(Self {
            api_key: env_opt("FILING_PROVIDER_API_KEY"),
            api_secret: env_opt("FILING_PROVIDER_API_SECRET"),
            client_id: env_opt("FILING_PROVIDER_CLIENT_ID"),
            environment,
            base_url_override: env_opt("FILING_PROVIDER_BASE_URL"),
            cron_secret: env_opt("CRON_SECRET"),
            request_timeout: Duration::from_secs(env_parse("FILING_PROVIDER_TIMEOUT_SECS", 10)?),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url_override
            .as_deref()
            .unwrap_or_else(|| self.environment.base_url())
            .trim_end_matches('/')
    }

    pub fn api_credentials(&self) -> ReconcileResult<ApiCredentials<'_>> {
        Ok(ApiCredentials {
            api_key: required(&self.api_key, "FILING_PROVIDER_API_KEY")?,
            api_secret: required(&self.api_secret, "FILING_PROVIDER_API_SECRET")?,
            client_id: required(&self.client_id, "FILING_PROVIDER_CLIENT_ID")?,
        })
    }

    pub fn webhook_credentials(&self) -> ReconcileResult<WebhookCredentials<'_>> {
        Ok(WebhookCredentials {
            api_secret: required(&self.api_secret, "FILING_PROVIDER_API_SECRET")?,
            client_id: required(&self.client_id, "FILING_PROVIDER_CLIENT_ID")?,
        })
    }
}

/// Poll window and per-run caps
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Only filings created within this window are polled
    pub window: time::Duration,
    /// Maximum filings selected per form type per run
    pub limit_per_form: i64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            window: time::Duration::hours(24),
            limit_per_form: 100,
        }
    }
}

impl PollConfig {
    pub fn from_env() -> ReconcileResult<Self> {
        let hours: i64 = env_parse("FILING_POLL_WINDOW_HOURS", 24)?;
        let limit_per_form: i64 = env_parse("FILING_POLL_LIMIT_PER_FORM", 100)?;
        if hours <= 0 || limit_per_form <= 0 {
            return Err(ReconcileError::InvalidConfig(
                "poll window and per-form limit must be positive".to_string(),
            ));
        }
        Ok(Self {
            window: time::Duration::hours(hours),
            limit_per_form,
        })
    }
}

/// Constants for the simplified refund estimate
///
/// These are placeholders, not tax-law-accurate values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefundEstimateConfig {
    pub standard_deduction: f64,
    pub flat_rate: f64,
}

impl Default for RefundEstimateConfig {
    fn default() -> Self {
        Self {
            standard_deduction: 13_850.0,
            flat_rate: 0.10,
        }
    }
}

impl RefundEstimateConfig {
    pub fn from_env() -> ReconcileResult<Self> {
        let defaults = Self::default();
        let config = Self {
            standard_deduction: env_parse("REFUND_STANDARD_DEDUCTION", defaults.standard_deduction)?,
            flat_rate: env_parse("REFUND_FLAT_RATE", defaults.flat_rate)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Both constants must be finite and non-negative
    pub fn validate(&self) -> ReconcileResult<()> {
        for (name, value) in [
            ("REFUND_STANDARD_DEDUCTION", self.standard_deduction),
            ("REFUND_FLAT_RATE", self.flat_rate),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ReconcileError::InvalidConfig(format!(
                    "{} must be a finite, non-negative number",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Everything the reconciliation service needs, loaded in one place
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    pub provider: ProviderConfig,
    pub poll: PollConfig,
    pub refund: RefundEstimateConfig,
    /// Notification dispatcher endpoint; unset means log-only
    pub notification_url: Option<String>,
}

impl ReconcilerConfig {
    pub fn from_env() -> ReconcileResult<Self> {
        Ok(Self {
            provider: ProviderConfig::from_env()?,
            poll: PollConfig::from_env()?,
            refund: RefundEstimateConfig::from_env()?,
            notification_url: env_opt("NOTIFICATION_WEBHOOK_URL"),
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> ReconcileResult<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(ReconcileError::NotConfigured(name))
}

/// Read an env var, treating empty values as unset
fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> ReconcileResult<T> {
    match env_opt(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| ReconcileError::InvalidConfig(format!("{} has invalid value", name))),
        None => Ok(default),
    }
}
