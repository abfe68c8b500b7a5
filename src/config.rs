//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Top-level gateway configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the local job ledger database file.
    pub db_path: PathBuf,
    /// Port the HTTP/WS API binds to.
    pub port: u16,
    /// Remote provider settings.
    pub provider: ProviderConfig,
    /// Status poller settings.
    pub poller: PollerConfig,
}

/// Remote provider connection settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the provider API (no trailing slash).
    pub base_url: String,
    /// Pre-issued bearer credential, usable instead of a payment proof.
    pub bearer_token: Option<SecretString>,
    /// Path to the payment signing key file. When set, calls are
    /// payment-capable and recover from 402 challenges automatically.
    pub signer_key_path: Option<PathBuf>,
}

/// Status poller settings.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval between polling rounds.
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Read configuration from `VIDGATE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("VIDGATE_PROVIDER_URL")
            .map_err(|_| ConfigError::MissingEnvVar("VIDGATE_PROVIDER_URL".into()))?
            .trim_end_matches('/')
            .to_string();

        let port: u16 = match std::env::var("VIDGATE_PORT") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "VIDGATE_PORT".into(),
                message: format!("not a valid port: {raw}"),
            })?,
            Err(_) => 8080,
        };

        let interval = match std::env::var("VIDGATE_POLL_INTERVAL_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|_| ConfigError::InvalidValue {
                    key: "VIDGATE_POLL_INTERVAL_SECS".into(),
                    message: format!("not a valid number of seconds: {raw}"),
                })?;
                Duration::from_secs(secs)
            }
            Err(_) => PollerConfig::default().interval,
        };

        Ok(Self {
            db_path: std::env::var("VIDGATE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data/vidgate.db")),
            port,
            provider: ProviderConfig {
                base_url,
                bearer_token: std::env::var("VIDGATE_BEARER_TOKEN")
                    .ok()
                    .filter(|t| !t.is_empty())
                    .map(SecretString::from),
                signer_key_path: std::env::var("VIDGATE_SIGNER_KEY").ok().map(PathBuf::from),
            },
            poller: PollerConfig { interval },
        })
    }
}
