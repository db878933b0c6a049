//! Narrative summary and internal knowledge gathering.
//!
//! The generative path asks the configured [`TextGenerator`] for a structured markdown
//! answer built from the ranked table. Whenever that is not possible the heuristic
//! template is used instead, which is plain string formatting and cannot fail.

use opportunity_core::{
    KnowledgeRetriever, KnowledgeSnippet, NarrativeError, ScoredRecord, SearchPayload,
    SummarySource, TextGenerator,
};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;

use crate::config::SynthesizerConfig;

pub const CONTEXT_HEADER: &str = "disease,score,market_size,competitors,phase2,phase3,patent_filings_last_5y,key_patents_expiring_in_years,trials_total";

const RATIONALE: &str = "Score approximates burden (market size) minus competition (competitors + trials). Higher score => more attractive.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Narrative {
    pub text: String,
    pub source: SummarySource,
}

/// Inputs shared by both narrative paths
pub struct NarrativeContext<'a> {
    pub question: &'a str,
    pub ranked: &'a [ScoredRecord],
    pub search: &'a SearchPayload,
    pub snippets: &'a [KnowledgeSnippet],
    pub preface: Option<&'a str>,
}

pub struct Synthesizer {
    generator: Arc<dyn TextGenerator>,
    retriever: Arc<dyn KnowledgeRetriever>,
    config: SynthesizerConfig,
}

impl Synthesizer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        retriever: Arc<dyn KnowledgeRetriever>,
        config: SynthesizerConfig,
    ) -> Self {
        Self {
            generator,
            retriever,
            config,
        }
    }

    /// Internal notes for the top ranked candidates.
    ///
    /// The first retrieval error stops gathering; whatever was collected is kept.
    pub async fn gather_knowledge(&self, ranked: &[ScoredRecord]) -> Vec<KnowledgeSnippet> {
        if !self.retriever.is_configured() {
            return Vec::new();
        }

        let mut snippets = Vec::new();
        for row in ranked.iter().take(self.config.snippet_candidates) {
            let query = format!("past research on {}", row.disease());
            match self.retriever.retrieve(&query, self.config.knowledge_k).await {
                Ok(hits) => {
                    snippets.extend(hits.into_iter().take(self.config.snippets_per_candidate).map(
                        |hit| KnowledgeSnippet {
                            disease: row.disease().to_string(),
                            snippet: truncate_chars(&hit.text, self.config.snippet_chars),
                            source: hit.source,
                        },
                    ));
                }
                Err(e) => {
                    tracing::warn!("Knowledge retrieval stopped at {}: {}", row.disease(), e);
                    break;
                }
            }
        }
        tracing::debug!("Gathered {} knowledge snippets", snippets.len());
        snippets
    }

    pub async fn synthesize(&self, ctx: &NarrativeContext<'_>) -> Narrative {
        match self.generate(ctx).await {
            Ok(text) => Narrative {
                text,
                source: SummarySource::Generative,
            },
            Err(NarrativeError::NotConfigured) => {
                tracing::debug!("Text generator not configured, using heuristic summary");
                self.heuristic(ctx)
            }
            Err(e) => {
                tracing::warn!("Narrative generation failed, using heuristic summary: {}", e);
                self.heuristic(ctx)
            }
        }
    }

    async fn generate(&self, ctx: &NarrativeContext<'_>) -> Result<String, NarrativeError> {
        if !self.generator.is_configured() {
            return Err(NarrativeError::NotConfigured);
        }
        let prompt = self.build_prompt(ctx);
        tracing::info!(
            "Requesting narrative from {} ({} prompt chars)",
            self.generator.model_name(),
            prompt.len()
        );
        let text = self
            .generator
            .generate(&prompt, &self.config.generation)
            .await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(NarrativeError::EmptyResponse);
        }
        Ok(text.to_string())
    }

    pub fn build_prompt(&self, ctx: &NarrativeContext<'_>) -> String {
        let mut csv = String::from(CONTEXT_HEADER);
        for row in ctx.ranked.iter().take(self.config.prompt_rows) {
            let r = &row.record;
            let _ = write!(
                csv,
                "\n{},{:.3},{},{},{},{},{},{},{}",
                r.disease(),
                row.score,
                r.market_size(),
                r.competitor_count(),
                r.phase2_trial_count(),
                r.phase3_trial_count(),
                r.patent_filings_last_5y(),
                r.key_patents_expiring_in_years(),
                r.total_trial_count(),
            );
        }

        let web: Vec<String> = ctx
            .search
            .results
            .iter()
            .take(self.config.max_citations)
            .filter(|hit| !hit.url.is_empty())
            .map(|hit| format!("{} | {}", hit.title, hit.url))
            .collect();
        let internal: Vec<String> = ctx
            .snippets
            .iter()
            .take(self.config.max_citations)
            .map(|s| format!("{}: {}", s.disease, s.source))
            .collect();

        let mut prompt = String::from(
            "You are an expert pharma strategy analyst. Provide a structured and concise markdown answer.\n\
             Sections:\n\
             1. **Executive Summary**\n\
             2. **Ranking Rationale**\n\
             3. **Key Metrics Table**\n\
             4. **Signals & Gaps**\n\
             5. **Next Recommended Actions**\n\
             6. **Citations**\n",
        );
        let _ = write!(prompt, "\nQuestion: {}\n", ctx.question);
        let _ = write!(prompt, "\nContext CSV:\n{}\n", csv);
        if let Some(preface) = ctx.preface {
            let _ = write!(prompt, "\nExternal Biomedical Analysis:\n{}\n", preface);
        }
        if !web.is_empty() {
            let _ = write!(prompt, "\nWeb Sources:\n{}\n", web.join("\n"));
        }
        if !internal.is_empty() {
            let _ = write!(prompt, "\nInternal References:\n{}\n", internal.join("\n"));
        }
        prompt.push_str("\nKeep it < 500 words. Be precise.\n");
        prompt
    }

    fn heuristic(&self, ctx: &NarrativeContext<'_>) -> Narrative {
        Narrative {
            text: heuristic_summary(ctx, self.config.heuristic_rows),
            source: SummarySource::Heuristic,
        }
    }
}

/// Deterministic markdown summary used whenever generation is unavailable
pub fn heuristic_summary(ctx: &NarrativeContext<'_>, top_rows: usize) -> String {
    let mut lines = vec![
        "## Executive Summary (Heuristic)".to_string(),
        format!("Question: {}", ctx.question),
    ];

    if !ctx.ranked.is_empty() {
        lines.push("\n### Top Candidates".to_string());
        for row in ctx.ranked.iter().take(top_rows) {
            lines.push(format!(
                "- {} (score={:.2}, competitors={}, trialsP2={}, trialsP3={})",
                row.disease(),
                row.score,
                row.record.competitor_count(),
                row.record.phase2_trial_count(),
                row.record.phase3_trial_count(),
            ));
        }
    }

    lines.push("\n### External Analysis".to_string());
    lines.push(
        ctx.preface
            .filter(|p| !p.trim().is_empty())
            .unwrap_or("N/A")
            .to_string(),
    );

    lines.push("\n### Rationale".to_string());
    lines.push(RATIONALE.to_string());

    if !ctx.snippets.is_empty() {
        lines.push("\n### Internal Notes (Snippets)".to_string());
        for s in ctx.snippets.iter().take(3) {
            lines.push(format!("- {}: {}…", s.disease, s.snippet));
        }
    }

    lines.push("\n### Next Questions".to_string());
    lines.push("- Validate prevalence".to_string());
    lines.push("- Analyze regulatory timelines".to_string());
    lines.join("\n")
}

/// At most `max` characters, never splitting a UTF-8 sequence
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
