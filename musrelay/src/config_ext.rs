//! Extension pour intégrer la configuration du relais dans musconfig

use crate::api::{DEFAULT_SEARCH_LIMIT, RelayState};
use crate::credentials::{CredentialProvider, StaticCredentials};
use crate::relay::StreamRelay;
use crate::resolver::HttpResolver;
use crate::search::CatalogSearch;
use anyhow::{Context, Result};
use musconfig::Config;
use std::{sync::Arc, time::Duration};
use tracing::info;

const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Trait d'extension pour la configuration du relais (`relay.*`)
pub trait RelayConfigExt {
    /// User-Agent envoyé à l'amont (`relay.upstream.user_agent`)
    fn get_relay_user_agent(&self) -> Result<Option<String>>;

    /// En-têtes supplémentaires envoyés à l'amont (`relay.upstream.headers`)
    fn get_relay_upstream_headers(&self) -> Result<Vec<(String, String)>>;

    /// Timeout de connexion à l'amont (`relay.upstream.timeout_secs`)
    fn get_relay_upstream_timeout(&self) -> Result<Duration>;

    /// Chemin du catalogue YAML de recherche, relatif au répertoire de config
    fn get_relay_search_catalog(&self) -> Result<Option<String>>;

    /// Nombre de résultats par défaut (`relay.search.default_limit`)
    fn get_relay_search_default_limit(&self) -> Result<usize>;
}

impl RelayConfigExt for Config {
    fn get_relay_user_agent(&self) -> Result<Option<String>> {
        let ua = self.get_string_or(&["relay", "upstream", "user_agent"], "");
        Ok((!ua.is_empty()).then_some(ua))
    }

    fn get_relay_upstream_headers(&self) -> Result<Vec<(String, String)>> {
        Ok(self.get_string_map(&["relay", "upstream", "headers"]))
    }

    fn get_relay_upstream_timeout(&self) -> Result<Duration> {
        Ok(Duration::from_secs(self.get_u64_or(
            &["relay", "upstream", "timeout_secs"],
            DEFAULT_UPSTREAM_TIMEOUT_SECS,
        )))
    }

    fn get_relay_search_catalog(&self) -> Result<Option<String>> {
        let path = self.get_string_or(&["relay", "search", "catalog"], "");
        Ok((!path.is_empty()).then(|| self.resolve_path(&path)))
    }

    fn get_relay_search_default_limit(&self) -> Result<usize> {
        Ok(self.get_u64_or(
            &["relay", "search", "default_limit"],
            DEFAULT_SEARCH_LIMIT as u64,
        ) as usize)
    }
}

impl RelayState {
    /// Assemble le relais complet depuis la configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let credentials: Arc<dyn CredentialProvider> = Arc::new(
            StaticCredentials::from_pairs(
                config.get_relay_user_agent()?.as_deref(),
                config.get_relay_upstream_headers()?,
            )
            .context("Invalid relay.upstream headers")?,
        );

        let catalog = match config.get_relay_search_catalog()? {
            Some(path) => {
                let catalog = CatalogSearch::from_yaml_file(&path)
                    .with_context(|| format!("Cannot load search catalogue {}", path))?;
                info!(path = %path, tracks = catalog.len(), "Search catalogue loaded");
                catalog
            }
            None => CatalogSearch::default(),
        };
        let catalog = Arc::new(catalog);

        let client = reqwest::Client::builder()
            .connect_timeout(config.get_relay_upstream_timeout()?)
            .build()
            .context("Cannot build upstream HTTP client")?;

        let resolver =
            HttpResolver::new(client.clone(), credentials.clone()).with_catalog(catalog.clone());
        let relay = StreamRelay::new(client, Arc::new(resolver), credentials);

        Ok(RelayState::new(relay, catalog)
            .with_default_limit(config.get_relay_search_default_limit()?))
    }
}
