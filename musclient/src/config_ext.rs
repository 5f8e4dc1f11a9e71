//! Extension pour intégrer la configuration du client dans musconfig
//!
//! ```rust,ignore
//! use musconfig::get_config;
//! use musclient::ClientConfigExt;
//!
//! let config = get_config();
//! let client = musclient::ClientBuilder::from_config(&config)?.build()?;
//! ```

use crate::client::ClientBuilder;
use crate::retry::{DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES_PER_ORIGIN, RetryPolicy};
use anyhow::Result;
use musconfig::Config;
use serde_yaml::{Number, Value};
use std::time::Duration;

/// Origine utilisée quand la liste configurée est vide
const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Trait d'extension pour la configuration du client résilient
pub trait ClientConfigExt {
    /// Liste ordonnée des origines (`client.origins`), la première est la principale
    fn get_client_origins(&self) -> Result<Vec<String>>;

    fn set_client_origins(&self, origins: &[String]) -> Result<()>;

    /// Politique de retry (`client.retry.max_retries_per_origin`, `client.retry.base_delay_ms`)
    fn get_client_retry_policy(&self) -> Result<RetryPolicy>;

    /// Nombre de succès sur une origine de secours avant de revenir à la principale (0 = jamais)
    fn get_client_reset_to_primary_after(&self) -> Result<usize>;

    fn set_client_reset_to_primary_after(&self, successes: usize) -> Result<()>;

    /// Timeout de connexion (`client.timeout_secs`)
    fn get_client_timeout(&self) -> Result<Duration>;
}

impl ClientConfigExt for Config {
    fn get_client_origins(&self) -> Result<Vec<String>> {
        let origins = self.get_string_list(&["client", "origins"]);
        if origins.is_empty() {
            Ok(vec![DEFAULT_ORIGIN.to_string()])
        } else {
            Ok(origins)
        }
    }

    fn set_client_origins(&self, origins: &[String]) -> Result<()> {
        self.set_string_list(&["client", "origins"], origins)
    }

    fn get_client_retry_policy(&self) -> Result<RetryPolicy> {
        let retries = self.get_u64_or(
            &["client", "retry", "max_retries_per_origin"],
            DEFAULT_MAX_RETRIES_PER_ORIGIN as u64,
        );
        let delay_ms = self.get_u64_or(
            &["client", "retry", "base_delay_ms"],
            DEFAULT_BASE_DELAY.as_millis() as u64,
        );
        Ok(RetryPolicy::new(
            retries as usize,
            Duration::from_millis(delay_ms),
        ))
    }

    fn get_client_reset_to_primary_after(&self) -> Result<usize> {
        Ok(self.get_u64_or(&["client", "retry", "reset_to_primary_after"], 0) as usize)
    }

    fn set_client_reset_to_primary_after(&self, successes: usize) -> Result<()> {
        self.set_value(
            &["client", "retry", "reset_to_primary_after"],
            Value::Number(Number::from(successes)),
        )
    }

    fn get_client_timeout(&self) -> Result<Duration> {
        Ok(Duration::from_secs(self.get_u64_or(
            &["client", "timeout_secs"],
            crate::client::DEFAULT_CONNECT_TIMEOUT_SECS,
        )))
    }
}

impl ClientBuilder {
    /// Builder initialisé depuis `client.*`
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(ClientBuilder::new()
            .origins(config.get_client_origins()?)
            .retry_policy(config.get_client_retry_policy()?)
            .reset_to_primary_after(config.get_client_reset_to_primary_after()?)
            .connect_timeout(config.get_client_timeout()?))
    }
}
