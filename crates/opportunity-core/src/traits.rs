use async_trait::async_trait;
use std::path::PathBuf;

use crate::{
    GenerationParams, KnowledgeHit, MarketData, PatentData, PreAnalysis, RenderError,
    ReportDocument, SearchPayload, SourceError, TradeData, TrialData,
};

/// Per-disease data feeds consumed by the aggregator
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn market_data(&self, disease: &str) -> Result<MarketData, SourceError>;

    async fn trade_data(&self, disease: &str) -> Result<TradeData, SourceError>;

    async fn patent_data(&self, disease: &str) -> Result<PatentData, SourceError>;

    async fn trial_data(&self, disease: &str) -> Result<TrialData, SourceError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Web search used for candidate discovery
#[async_trait]
pub trait CandidateSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchPayload, SourceError>;

    fn is_configured(&self) -> bool;
}

/// External biomedical research service: ranking hints and question pre-analysis
#[async_trait]
pub trait BiomedicalAdvisor: Send + Sync {
    /// Proposed order over `diseases`, returned raw (`{"ranked": [{"name": ..}, ..]}`)
    async fn rank_candidates(
        &self,
        diseases: &[String],
        region: &str,
    ) -> Result<serde_json::Value, SourceError>;

    async fn analyze_question(&self, question: &str) -> Result<PreAnalysis, SourceError>;

    fn is_configured(&self) -> bool;
}

/// Generative text backend for narrative synthesis
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, SourceError>;

    fn is_configured(&self) -> bool;

    fn model_name(&self) -> &str;
}

/// Internal knowledge lookup
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<KnowledgeHit>, SourceError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Report artifact renderer; returns the written artifact path
#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, document: &ReportDocument) -> Result<PathBuf, RenderError>;

    fn is_configured(&self) -> bool {
        true
    }
}
