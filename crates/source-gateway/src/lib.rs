use anyhow::{Context, Result};
use opportunity_core::SourceError;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::time::Duration;

pub mod bio_aiq;
pub mod cache;
pub mod chat;
pub mod clinical_trials;
pub mod gateway;
pub mod knowledge;
pub mod registry;
pub mod report;
pub mod tavily;

pub use bio_aiq::BioAiqClient;
pub use cache::{Cacheable, SourceCache, SourceKind};
pub use chat::ChatCompletionsClient;
pub use clinical_trials::ClinicalTrialsClient;
pub use gateway::{RegistryBackend, SourceGateway, TrialsBackend};
pub use knowledge::{DirectoryKnowledgeBase, StaticKnowledgeBase, TextChunker};
pub use registry::{RegistryClient, StaticRegistry};
pub use report::MarkdownReportWriter;
pub use tavily::TavilyClient;

pub const DEFAULT_CLINICAL_TRIALS_URL: &str = "https://clinicaltrials.gov/api/v2";
pub const DEFAULT_CHAT_URL: &str = "https://integrate.api.nvidia.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "meta/llama-3.1-70b-instruct";

/// Connection settings for every external collaborator
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Mock IQVIA/EXIM/USPTO server; the static registry is used when absent
    pub mock_server_url: Option<String>,
    pub country: String,
    pub clinical_trials_enabled: bool,
    pub clinical_trials_url: String,
    pub tavily_api_key: Option<String>,
    pub bioaiq_url: Option<String>,
    pub bioaiq_api_key: Option<String>,
    pub chat_api_key: Option<String>,
    pub chat_url: String,
    pub chat_model: String,
    pub knowledge_dir: Option<PathBuf>,
    pub reports_dir: PathBuf,
    pub enable_caching: bool,
    pub cache_capacity: usize,
    /// Applies to the mock registry only
    pub registry_timeout: Duration,
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mock_server_url: None,
            country: "India".to_string(),
            clinical_trials_enabled: false,
            clinical_trials_url: DEFAULT_CLINICAL_TRIALS_URL.to_string(),
            tavily_api_key: None,
            bioaiq_url: None,
            bioaiq_api_key: None,
            chat_api_key: None,
            chat_url: DEFAULT_CHAT_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            knowledge_dir: None,
            reports_dir: PathBuf::from("reports"),
            enable_caching: true,
            cache_capacity: cache::DEFAULT_CAPACITY,
            registry_timeout: Duration::from_secs(20),
            timeout: Duration::from_secs(30),
        }
    }
}

impl SourceConfig {
    /// Read settings from the environment, keeping defaults for anything unset.
    /// Malformed numbers are errors.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            mock_server_url: non_empty_env("MOCK_SERVER_URL"),
            country: non_empty_env("TRIALS_COUNTRY").unwrap_or(defaults.country),
            clinical_trials_enabled: std::env::var("CLINICAL_TRIALS_ENABLED")
                .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
                .unwrap_or(defaults.clinical_trials_enabled),
            clinical_trials_url: non_empty_env("CLINICAL_TRIALS_URL")
                .unwrap_or(defaults.clinical_trials_url),
            tavily_api_key: non_empty_env("TAVILY_API_KEY"),
            bioaiq_url: non_empty_env("NVIDIA_BIOAIQ_URL"),
            bioaiq_api_key: non_empty_env("NVIDIA_BIOAIQ_API_KEY"),
            chat_api_key: non_empty_env("NVIDIA_API_KEY"),
            chat_url: non_empty_env("NVIDIA_CHAT_URL").unwrap_or(defaults.chat_url),
            chat_model: non_empty_env("NVIDIA_CHAT_MODEL").unwrap_or(defaults.chat_model),
            knowledge_dir: non_empty_env("KNOWLEDGE_DIR").map(PathBuf::from),
            reports_dir: non_empty_env("REPORTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_dir),
            enable_caching: std::env::var("ENABLE_CACHING")
                .map(|v| !v.eq_ignore_ascii_case("false"))
                .unwrap_or(defaults.enable_caching),
            cache_capacity: parse_env("SOURCE_CACHE_CAPACITY", defaults.cache_capacity)?,
            registry_timeout: Duration::from_secs(parse_env(
                "REGISTRY_TIMEOUT",
                defaults.registry_timeout.as_secs(),
            )?),
            timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT", defaults.timeout.as_secs())?),
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty_env(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        None => Ok(default),
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

pub(crate) fn request_error(err: reqwest::Error, timeout: Duration) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(timeout)
    } else {
        SourceError::Unavailable(err.to_string())
    }
}

/// Check the status and decode a JSON body
pub(crate) async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, SourceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Http {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }
    response
        .json()
        .await
        .map_err(|e| SourceError::InvalidResponse(e.to_string()))
}
