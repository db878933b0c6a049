use async_trait::async_trait;
use opportunity_core::{MarketData, MetricSource, PatentData, SourceError, TradeData, TrialData};
use std::future::Future;

use crate::cache::{Cacheable, SourceCache};
use crate::{ClinicalTrialsClient, RegistryClient, SourceConfig, StaticRegistry};

/// Where market, trade and patent data come from
pub enum RegistryBackend {
    Http(RegistryClient),
    Static(StaticRegistry),
}

/// Where trial counts come from
pub enum TrialsBackend {
    ClinicalTrials(ClinicalTrialsClient),
    Static(StaticRegistry),
}

/// Uniform entry point to every per-disease data feed, with an optional memo cache
pub struct SourceGateway {
    registry: RegistryBackend,
    trials: TrialsBackend,
    cache: Option<SourceCache>,
}

impl SourceGateway {
    pub fn new(registry: RegistryBackend, trials: TrialsBackend) -> Self {
        Self {
            registry,
            trials,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: SourceCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fully in-process gateway over the demo tables
    pub fn offline() -> Self {
        Self::new(
            RegistryBackend::Static(StaticRegistry::default()),
            TrialsBackend::Static(StaticRegistry::default()),
        )
    }

    pub fn from_config(config: &SourceConfig) -> Self {
        let registry = match &config.mock_server_url {
            Some(url) => {
                tracing::info!("Registry data from mock server at {}", url);
                RegistryBackend::Http(RegistryClient::new(
                    url.clone(),
                    config.country.clone(),
                    config.registry_timeout,
                ))
            }
            None => {
                tracing::info!("MOCK_SERVER_URL not set, using static registry tables");
                RegistryBackend::Static(StaticRegistry::default())
            }
        };

        let trials = if config.clinical_trials_enabled {
            TrialsBackend::ClinicalTrials(ClinicalTrialsClient::new(
                config.clinical_trials_url.clone(),
                config.country.clone(),
                config.timeout,
            ))
        } else {
            TrialsBackend::Static(StaticRegistry::default())
        };

        let gateway = Self::new(registry, trials);
        if config.enable_caching {
            gateway.with_cache(SourceCache::new(config.cache_capacity))
        } else {
            gateway
        }
    }

    pub fn cache(&self) -> Option<&SourceCache> {
        self.cache.as_ref()
    }

    async fn cached<T, F, Fut>(&self, disease: &str, fetch: F) -> Result<T, SourceError>
    where
        T: Cacheable,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        if let Some(hit) = self.cache.as_ref().and_then(|c| c.get::<T>(disease)) {
            tracing::debug!("Source cache hit: {:?} for {}", T::KIND, disease);
            return Ok(hit);
        }
        let value = fetch().await?;
        if let Some(cache) = &self.cache {
            cache.insert(disease, value.clone());
        }
        Ok(value)
    }
}

#[async_trait]
impl MetricSource for SourceGateway {
    async fn market_data(&self, disease: &str) -> Result<MarketData, SourceError> {
        self.cached(disease, move || async move {
            match &self.registry {
                RegistryBackend::Http(client) => client.market_data(disease).await,
                RegistryBackend::Static(table) => Ok(table.market_data(disease)),
            }
        })
        .await
    }

    async fn trade_data(&self, disease: &str) -> Result<TradeData, SourceError> {
        self.cached(disease, move || async move {
            match &self.registry {
                RegistryBackend::Http(client) => client.trade_data(disease).await,
                RegistryBackend::Static(table) => Ok(table.trade_data(disease)),
            }
        })
        .await
    }

    async fn patent_data(&self, disease: &str) -> Result<PatentData, SourceError> {
        self.cached(disease, move || async move {
            match &self.registry {
                RegistryBackend::Http(client) => client.patent_data(disease).await,
                RegistryBackend::Static(table) => Ok(table.patent_data(disease)),
            }
        })
        .await
    }

    async fn trial_data(&self, disease: &str) -> Result<TrialData, SourceError> {
        self.cached(disease, move || async move {
            match &self.trials {
                TrialsBackend::ClinicalTrials(client) => client.trial_data(disease).await,
                TrialsBackend::Static(table) => Ok(table.trial_data(disease)),
            }
        })
        .await
    }
}
