use chrono::Utc;
use opportunity_core::{
    AnalysisEnvelope, BiomedicalAdvisor, CandidateSearch, KnowledgeRetriever, KnowledgeSnippet,
    MetricSource, PipelineError, ReportDocument, ReportRenderer, ScoredRecord, TextGenerator,
};
use source_gateway::{
    BioAiqClient, ChatCompletionsClient, DirectoryKnowledgeBase, MarkdownReportWriter,
    SourceConfig, SourceGateway, StaticKnowledgeBase, TavilyClient, TextChunker,
};
use std::sync::Arc;

pub mod aggregator;
pub mod config;
pub mod ranker;
pub mod resolver;
pub mod scorer;
pub mod synthesizer;

pub use aggregator::Aggregator;
pub use config::{
    AggregatorConfig, CandidateKeyword, PipelineConfig, QuestionLimits, ReportTitle,
    ResolverConfig, SynthesizerConfig,
};
pub use resolver::{CandidateResolver, Resolution};
pub use synthesizer::{Narrative, NarrativeContext, Synthesizer};


/// Capability implementations injected into the pipeline
#[derive(Clone)]
pub struct Collaborators {
    pub sources: Arc<dyn MetricSource>,
    pub search: Arc<dyn CandidateSearch>,
    pub advisor: Arc<dyn BiomedicalAdvisor>,
    pub generator: Arc<dyn TextGenerator>,
    pub knowledge: Arc<dyn KnowledgeRetriever>,
    pub renderer: Arc<dyn ReportRenderer>,
}

impl Collaborators {
    /// Real clients where configured, in-process fallbacks otherwise
    pub fn from_config(config: &SourceConfig) -> Self {
        let knowledge: Arc<dyn KnowledgeRetriever> = match &config.knowledge_dir {
            Some(dir) => match DirectoryKnowledgeBase::load(dir, &TextChunker::default()) {
                Ok(base) if !base.is_empty() => Arc::new(base),
                Ok(_) => {
                    tracing::warn!("No documents in {}, using built-in notes", dir.display());
                    Arc::new(StaticKnowledgeBase::default())
                }
                Err(e) => {
                    tracing::warn!("Failed to load knowledge from {}: {}", dir.display(), e);
                    Arc::new(StaticKnowledgeBase::default())
                }
            },
            None => Arc::new(StaticKnowledgeBase::default()),
        };

        Self {
            sources: Arc::new(SourceGateway::from_config(config)),
            search: Arc::new(TavilyClient::new(config.tavily_api_key.clone(), config.timeout)),
            advisor: Arc::new(BioAiqClient::new(
                config.bioaiq_url.clone(),
                config.bioaiq_api_key.clone(),
                config.timeout,
            )),
            generator: Arc::new(ChatCompletionsClient::new(
                config.chat_url.clone(),
                config.chat_api_key.clone(),
                config.chat_model.clone(),
                config.timeout,
            )),
            knowledge,
            renderer: Arc::new(MarkdownReportWriter::new(config.reports_dir.clone())),
        }
    }

    /// No credentials, no network: static registry, built-in notes, heuristic summary
    pub fn offline() -> Self {
        Self::from_config(&SourceConfig::default())
    }
}

/// Trimmed question, or `InvalidQuestion` when it is too short, too vague or too long
pub fn validate_question<'a>(
    question: &'a str,
    limits: &QuestionLimits,
) -> Result<&'a str, PipelineError> {
    let question = question.trim();
    let chars = question.chars().count();
    if chars < limits.min_chars {
        return Err(PipelineError::InvalidQuestion(format!(
            "question must be at least {} characters",
            limits.min_chars
        )));
    }
    if question.split_whitespace().count() < limits.min_words {
        return Err(PipelineError::InvalidQuestion(format!(
            "question must contain at least {} words",
            limits.min_words
        )));
    }
    if chars > limits.max_chars {
        return Err(PipelineError::InvalidQuestion(format!(
            "question exceeds {} characters",
            limits.max_chars
        )));
    }
    Ok(question)
}

pub struct ResearchOrchestrator {
    resolver: CandidateResolver,
    aggregator: Aggregator,
    synthesizer: Synthesizer,
    advisor: Arc<dyn BiomedicalAdvisor>,
    renderer: Arc<dyn ReportRenderer>,
    config: PipelineConfig,
}

impl ResearchOrchestrator {
    pub fn new(collaborators: Collaborators, config: PipelineConfig) -> Self {
        Self {
            resolver: CandidateResolver::new(
                collaborators.search,
                Arc::clone(&collaborators.advisor),
                config.resolver.clone(),
            ),
            aggregator: Aggregator::new(collaborators.sources, config.aggregator.clone()),
            synthesizer: Synthesizer::new(
                collaborators.generator,
                collaborators.knowledge,
                config.synthesizer.clone(),
            ),
            advisor: collaborators.advisor,
            renderer: collaborators.renderer,
            config,
        }
    }

    /// Build everything from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        let config = PipelineConfig::from_env()?;
        let sources = SourceConfig::from_env()?;
        Ok(Self::new(Collaborators::from_config(&sources), config))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer one question end to end.
    ///
    /// Only an invalid question or a batch with no usable metrics is an error; every
    /// other collaborator failure degrades to a fallback and is logged.
    pub async fn run(&self, question: &str) -> Result<AnalysisEnvelope, PipelineError> {
        let question = validate_question(question, &self.config.limits)?;
        tracing::info!("🔬 Starting opportunity analysis: {}", question);

        let external_analysis = self.pre_analysis(question).await;
        let resolution = self.resolver.resolve(question).await;

        let records = self.aggregator.aggregate(&resolution.candidates).await?;
        let ranked = ranker::rank(scorer::score(&records));

        let knowledge = self.synthesizer.gather_knowledge(&ranked).await;
        let narrative = self
            .synthesizer
            .synthesize(&NarrativeContext {
                question,
                ranked: &ranked,
                search: &resolution.search,
                snippets: &knowledge,
                preface: external_analysis.as_deref(),
            })
            .await;

        let report_artifact_path = self
            .emit_report(question, &narrative.text, &ranked, &knowledge)
            .await;

        tracing::info!(
            "Analysis complete: {} ranked candidates, {:?} summary",
            ranked.len(),
            narrative.source
        );

        Ok(AnalysisEnvelope {
            question: question.to_string(),
            candidates: resolution.candidates,
            ranked,
            summary: narrative.text,
            summary_source: narrative.source,
            external_analysis,
            external_ranking_hint: resolution.ranking_hint,
            knowledge,
            report_artifact_path,
            generated_at: Utc::now(),
        })
    }

    async fn pre_analysis(&self, question: &str) -> Option<String> {
        if !self.advisor.is_configured() {
            return None;
        }
        match self.advisor.analyze_question(question).await {
            Ok(pre) if !pre.analysis.trim().is_empty() => Some(pre.analysis),
            Ok(_) => {
                tracing::debug!("Advisor returned an empty analysis");
                None
            }
            Err(e) => {
                tracing::warn!("Question pre-analysis failed: {}", e);
                None
            }
        }
    }

    async fn emit_report(
        &self,
        question: &str,
        summary: &str,
        ranked: &[ScoredRecord],
        knowledge: &[KnowledgeSnippet],
    ) -> Option<String> {
        if !self.renderer.is_configured() {
            return None;
        }
        let document = ReportDocument::from_ranked(
            self.config.report_title.0.clone(),
            question,
            summary,
            ranked,
            knowledge,
        );
        match self.renderer.render(&document).await {
            Ok(path) => Some(path.display().to_string()),
            Err(e) => {
                tracing::warn!("Report generation failed: {}", e);
                None
            }
        }
    }
}
