use opportunity_core::{MarketData, PatentData, SourceError, TradeData, TrialData};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::{http_client, read_json, request_error};

#[derive(Debug, Serialize)]
struct DiseaseRequest<'a> {
    disease: &'a str,
    country: &'a str,
}

#[derive(Debug, Deserialize)]
struct MarketResponse {
    #[serde(default)]
    market_size_usd: f64,
    #[serde(default)]
    competitor_count: u32,
}

#[derive(Debug, Deserialize)]
struct TradeResponse {
    #[serde(default)]
    api_exports_tonnes: f64,
    #[serde(default)]
    api_imports_tonnes: f64,
}

#[derive(Debug, Deserialize)]
struct PatentResponse {
    #[serde(default)]
    patent_filings_last_5y: u32,
    #[serde(default)]
    key_patents_expiring_in_years: u32,
}

/// HTTP client for the mock IQVIA / EXIM / USPTO registry server
#[derive(Clone)]
pub struct RegistryClient {
    client: Client,
    base_url: String,
    country: String,
    timeout: Duration,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, country: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            country: country.into(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        disease: &str,
    ) -> Result<T, SourceError> {
        let url = format!("{}/mock/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(&DiseaseRequest {
                disease,
                country: &self.country,
            })
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        read_json(response).await
    }

    pub async fn market_data(&self, disease: &str) -> Result<MarketData, SourceError> {
        let body: MarketResponse = self.post("iqvia", disease).await?;
        Ok(MarketData {
            market_size: body.market_size_usd,
            competitor_count: body.competitor_count,
        })
    }

    pub async fn trade_data(&self, disease: &str) -> Result<TradeData, SourceError> {
        let body: TradeResponse = self.post("exim", disease).await?;
        Ok(TradeData {
            export_volume: body.api_exports_tonnes,
            import_volume: body.api_imports_tonnes,
        })
    }

    pub async fn patent_data(&self, disease: &str) -> Result<PatentData, SourceError> {
        let body: PatentResponse = self.post("uspto", disease).await?;
        Ok(PatentData {
            filings_last_5y: body.patent_filings_last_5y,
            expiring_in_years: body.key_patents_expiring_in_years,
        })
    }
}

#[derive(Debug, Clone)]
struct RegistryRow {
    market: MarketData,
    trade: TradeData,
    patents: PatentData,
}

/// Deterministic in-process registry with the demo data tables.
///
/// Unknown diseases get the generic default row, matching the mock server.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    rows: HashMap<String, RegistryRow>,
    fallback: RegistryRow,
}

impl Default for StaticRegistry {
    fn default() -> Self {
        let row = |market_size: f64,
                   competitor_count: u32,
                   exports: f64,
                   imports: f64,
                   filings: u32,
                   expiring: u32| RegistryRow {
            market: MarketData {
                market_size,
                competitor_count,
            },
            trade: TradeData {
                export_volume: exports,
                import_volume: imports,
            },
            patents: PatentData {
                filings_last_5y: filings,
                expiring_in_years: expiring,
            },
        };

        let mut rows = HashMap::new();
        rows.insert("COPD".to_string(), row(1_200_000_000.0, 18, 4.2, 6.8, 520, 5));
        rows.insert("Asthma".to_string(), row(900_000_000.0, 14, 3.1, 2.7, 410, 4));
        rows.insert("ILD".to_string(), row(300_000_000.0, 6, 0.5, 1.3, 160, 2));

        Self {
            rows,
            fallback: row(150_000_000.0, 5, 0.0, 0.0, 40, 1),
        }
    }
}

impl StaticRegistry {
    fn row(&self, disease: &str) -> &RegistryRow {
        self.rows.get(disease.trim()).unwrap_or(&self.fallback)
    }

    pub fn market_data(&self, disease: &str) -> MarketData {
        self.row(disease).market.clone()
    }

    pub fn trade_data(&self, disease: &str) -> TradeData {
        self.row(disease).trade.clone()
    }

    pub fn patent_data(&self, disease: &str) -> PatentData {
        self.row(disease).patents.clone()
    }

    /// The demo tables carry no trial data
    pub fn trial_data(&self, _disease: &str) -> TrialData {
        TrialData::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_registry_known_disease() {
        let registry = StaticRegistry::default();
        let market = registry.market_data("COPD");
        assert_eq!(market.market_size, 1_200_000_000.0);
        assert_eq!(market.competitor_count, 18);
        assert_eq!(registry.patent_data("ILD").expiring_in_years, 2);
        assert_eq!(registry.trade_data("Asthma").import_volume, 2.7);
    }

    #[test]
    fn test_static_registry_unknown_disease_uses_default_row() {
        let registry = StaticRegistry::default();
        let market = registry.market_data("Bronchiectasis");
        assert_eq!(market.market_size, 150_000_000.0);
        assert_eq!(market.competitor_count, 5);
        assert_eq!(registry.trade_data("Bronchiectasis"), TradeData::default());
        assert_eq!(registry.patent_data("Bronchiectasis").filings_last_5y, 40);
    }

    #[test]
    fn test_registry_response_defaults_missing_fields() {
        let body: MarketResponse = serde_json::from_str(r#"{"disease": "ILD"}"#).unwrap();
        assert_eq!(body.market_size_usd, 0.0);
        assert_eq!(body.competitor_count, 0);
    }

    #[test]
    fn test_registry_client_trims_base_url() {
        let client = RegistryClient::new("http://127.0.0.1:8000/", "India", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://127.0.0.1:8000");
    }
}
