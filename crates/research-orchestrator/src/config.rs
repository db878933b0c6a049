use anyhow::{Context, Result};
use opportunity_core::GenerationParams;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

pub const QUESTION_PLACEHOLDER: &str = "{question}";

/// A vocabulary keyword and the canonical candidate it maps to (`IPF` -> `ILD`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateKeyword {
    pub keyword: String,
    pub canonical: String,
}

impl CandidateKeyword {
    pub fn new(keyword: &str, canonical: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            canonical: canonical.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Search query template; `{question}` is replaced by the trimmed question
    pub search_query_template: String,
    /// Region passed to the ranking hint
    pub region: String,
    pub vocabulary: Vec<CandidateKeyword>,
    pub candidate_cap: usize,
    /// Used when nothing in the search payload matches the vocabulary
    pub default_candidates: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            search_query_template: QUESTION_PLACEHOLDER.to_string(),
            region: "India".to_string(),
            vocabulary: vec![
                CandidateKeyword::new("COPD", "COPD"),
                CandidateKeyword::new("Asthma", "Asthma"),
                CandidateKeyword::new("ILD", "ILD"),
                CandidateKeyword::new("IPF", "ILD"),
                CandidateKeyword::new("Bronchiectasis", "Bronchiectasis"),
            ],
            candidate_cap: 5,
            default_candidates: vec!["COPD".into(), "Asthma".into(), "ILD".into()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Upper bound on concurrent units; 0 forces sequential gathering
    pub max_workers: usize,
    pub unit_timeout: Duration,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            unit_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesizerConfig {
    pub generation: GenerationParams,
    pub prompt_rows: usize,
    pub max_citations: usize,
    pub heuristic_rows: usize,
    pub snippet_candidates: usize,
    pub snippets_per_candidate: usize,
    pub snippet_chars: usize,
    pub knowledge_k: usize,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            generation: GenerationParams::default(),
            prompt_rows: 10,
            max_citations: 5,
            heuristic_rows: 3,
            snippet_candidates: 3,
            snippets_per_candidate: 2,
            snippet_chars: 140,
            knowledge_k: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionLimits {
    pub min_chars: usize,
    pub min_words: usize,
    pub max_chars: usize,
}

impl Default for QuestionLimits {
    fn default() -> Self {
        Self {
            min_chars: 10,
            min_words: 3,
            max_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub resolver: ResolverConfig,
    pub aggregator: AggregatorConfig,
    pub synthesizer: SynthesizerConfig,
    pub limits: QuestionLimits,
    pub report_title: ReportTitle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportTitle(pub String);

impl Default for ReportTitle {
    fn default() -> Self {
        Self("Low-Competition, High-Burden Respiratory Diseases in India".to_string())
    }
}

impl PipelineConfig {
    /// Defaults overridden from the environment. Malformed numbers are errors.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        config.aggregator.max_workers = parse_var("MAX_WORKERS", config.aggregator.max_workers)?;
        config.aggregator.unit_timeout = Duration::from_secs(parse_var(
            "UNIT_TIMEOUT_SECS",
            config.aggregator.unit_timeout.as_secs(),
        )?);
        config.limits.max_chars = parse_var("MAX_QUERY_LENGTH", config.limits.max_chars)?;

        if let Ok(template) = env::var("SEARCH_QUERY_TEMPLATE") {
            if !template.trim().is_empty() {
                config.resolver.search_query_template = template;
            }
        }
        if let Ok(region) = env::var("TARGET_REGION") {
            if !region.trim().is_empty() {
                config.resolver.region = region;
            }
        }

        Ok(config)
    }
}

fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        _ => Ok(default),
    }
}
