use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Market sizing and competitor count for one disease
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub market_size: f64,
    pub competitor_count: u32,
}

/// API export/import trade volumes for one disease
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeData {
    pub export_volume: f64,
    pub import_volume: f64,
}

/// Patent landscape summary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatentData {
    pub filings_last_5y: u32,
    pub expiring_in_years: u32,
}

/// Clinical trial counts in the target country
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialData {
    pub phase2_count: u32,
    pub phase3_count: u32,
    pub total_count: u32,
}

/// Aggregated metrics for one candidate.
///
/// Built once by the aggregator and never mutated. A failed record carries an error
/// marker and zero in every numeric field, so normalization downstream always sees
/// real numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MetricRecordRepr")]
pub struct MetricRecord {
    disease: String,
    market_size: f64,
    competitor_count: u32,
    export_volume: f64,
    import_volume: f64,
    patent_filings_last_5y: u32,
    key_patents_expiring_in_years: u32,
    phase2_trial_count: u32,
    phase3_trial_count: u32,
    total_trial_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Wire shape of `MetricRecord`; decoding goes back through the constructors
#[derive(Deserialize)]
struct MetricRecordRepr {
    disease: String,
    #[serde(default)]
    market_size: f64,
    #[serde(default)]
    competitor_count: u32,
    #[serde(default)]
    export_volume: f64,
    #[serde(default)]
    import_volume: f64,
    #[serde(default)]
    patent_filings_last_5y: u32,
    #[serde(default)]
    key_patents_expiring_in_years: u32,
    #[serde(default)]
    phase2_trial_count: u32,
    #[serde(default)]
    phase3_trial_count: u32,
    #[serde(default)]
    total_trial_count: u32,
    #[serde(default)]
    error: Option<String>,
}

impl From<MetricRecordRepr> for MetricRecord {
    fn from(raw: MetricRecordRepr) -> Self {
        if let Some(reason) = raw.error {
            return Self::failed(raw.disease, reason);
        }
        Self::from_sources(
            raw.disease,
            MarketData {
                market_size: raw.market_size,
                competitor_count: raw.competitor_count,
            },
            TradeData {
                export_volume: raw.export_volume,
                import_volume: raw.import_volume,
            },
            PatentData {
                filings_last_5y: raw.patent_filings_last_5y,
                expiring_in_years: raw.key_patents_expiring_in_years,
            },
            TrialData {
                phase2_count: raw.phase2_trial_count,
                phase3_count: raw.phase3_trial_count,
                total_count: raw.total_trial_count,
            },
        )
    }
}

impl MetricRecord {
    pub fn from_sources(
        disease: impl Into<String>,
        market: MarketData,
        trade: TradeData,
        patents: PatentData,
        trials: TrialData,
    ) -> Self {
        Self {
            disease: disease.into(),
            market_size: market.market_size,
            competitor_count: market.competitor_count,
            export_volume: trade.export_volume,
            import_volume: trade.import_volume,
            patent_filings_last_5y: patents.filings_last_5y,
            key_patents_expiring_in_years: patents.expiring_in_years,
            phase2_trial_count: trials.phase2_count,
            phase3_trial_count: trials.phase3_count,
            total_trial_count: trials.total_count,
            error: None,
        }
    }

    /// Zero-filled record marking a candidate whose data gathering failed
    pub fn failed(disease: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::from_sources(
            disease,
            MarketData::default(),
            TradeData::default(),
            PatentData::default(),
            TrialData::default(),
        )
        .with_error(reason.into())
    }

    fn with_error(mut self, reason: String) -> Self {
        self.error = Some(reason);
        self
    }

    pub fn disease(&self) -> &str {
        &self.disease
    }

    pub fn market_size(&self) -> f64 {
        self.market_size
    }

    pub fn competitor_count(&self) -> u32 {
        self.competitor_count
    }

    pub fn export_volume(&self) -> f64 {
        self.export_volume
    }

    pub fn import_volume(&self) -> f64 {
        self.import_volume
    }

    pub fn patent_filings_last_5y(&self) -> u32 {
        self.patent_filings_last_5y
    }

    pub fn key_patents_expiring_in_years(&self) -> u32 {
        self.key_patents_expiring_in_years
    }

    pub fn phase2_trial_count(&self) -> u32 {
        self.phase2_trial_count
    }

    pub fn phase3_trial_count(&self) -> u32 {
        self.phase3_trial_count
    }

    pub fn total_trial_count(&self) -> u32 {
        self.total_trial_count
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Competitors plus active phase 2 and phase 3 trials
    pub fn competition_pressure(&self) -> f64 {
        f64::from(self.competitor_count)
            + f64::from(self.phase2_trial_count)
            + f64::from(self.phase3_trial_count)
    }
}

/// A metric record with its opportunity score.
///
/// The score only ranks candidates within one run; scores from different candidate
/// sets are not comparable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub record: MetricRecord,
    pub score: f64,
}

impl ScoredRecord {
    pub fn disease(&self) -> &str {
        self.record.disease()
    }
}

/// Single web search hit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

/// Raw payload returned by the candidate search capability
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchPayload {
    pub provider: String,
    pub query: String,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchPayload {
    /// Placeholder payload used when search is unconfigured or failed
    pub fn fallback(query: impl Into<String>) -> Self {
        Self {
            provider: "fallback".to_string(),
            query: query.into(),
            answer: None,
            summary: Some(
                "No web search configured. Provide qualitative web hints via manual follow-up."
                    .to_string(),
            ),
            results: Vec::new(),
            error: None,
        }
    }

    /// All free text fields joined for keyword matching
    pub fn searchable_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.results.len() + 2);
        if let Some(answer) = &self.answer {
            parts.push(answer);
        }
        parts.extend(self.results.iter().map(|r| r.content.as_str()));
        if let Some(summary) = &self.summary {
            parts.push(summary);
        }
        parts.join(" ")
    }
}

/// Chunk returned by the knowledge retrieval capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    pub text: String,
    pub source: String,
}

/// Internal knowledge snippet attached to a ranked candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSnippet {
    pub disease: String,
    pub snippet: String,
    pub source: String,
}

/// Question analysis from the external biomedical advisor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreAnalysis {
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub citations: Vec<serde_json::Value>,
}

/// Sampling parameters for one text generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 4096,
        }
    }
}

/// Which path produced the narrative summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SummarySource {
    Generative,
    Heuristic,
}

/// A titled table in the rendered report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTable {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    fn new(title: &str, headers: &[&str], rows: Vec<Vec<String>>) -> Self {
        Self {
            title: title.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }
}

/// Everything the report renderer needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub title: String,
    pub question: String,
    pub summary: String,
    pub tables: Vec<ReportTable>,
}

impl ReportDocument {
    /// Build the standard tables (rankings, market, patents, trials, internal references)
    pub fn from_ranked(
        title: impl Into<String>,
        question: impl Into<String>,
        summary: impl Into<String>,
        ranked: &[ScoredRecord],
        knowledge: &[KnowledgeSnippet],
    ) -> Self {
        let rankings = ranked
            .iter()
            .map(|r| {
                vec![
                    r.disease().to_string(),
                    format!("{:.3}", r.score),
                    r.record.market_size().to_string(),
                    r.record.competitor_count().to_string(),
                    r.record.phase2_trial_count().to_string(),
                    r.record.phase3_trial_count().to_string(),
                ]
            })
            .collect();
        let market = ranked
            .iter()
            .map(|r| {
                vec![
                    r.disease().to_string(),
                    r.record.market_size().to_string(),
                    r.record.competitor_count().to_string(),
                ]
            })
            .collect();
        let patents = ranked
            .iter()
            .map(|r| {
                vec![
                    r.disease().to_string(),
                    r.record.patent_filings_last_5y().to_string(),
                    r.record.key_patents_expiring_in_years().to_string(),
                ]
            })
            .collect();
        let trials = ranked
            .iter()
            .map(|r| {
                vec![
                    r.disease().to_string(),
                    r.record.phase2_trial_count().to_string(),
                    r.record.phase3_trial_count().to_string(),
                    r.record.total_trial_count().to_string(),
                ]
            })
            .collect();
        let references = knowledge
            .iter()
            .map(|k| vec![k.disease.clone(), k.snippet.clone(), k.source.clone()])
            .collect();

        Self {
            title: title.into(),
            question: question.into(),
            summary: summary.into(),
            tables: vec![
                ReportTable::new(
                    "Disease Rankings",
                    &["disease", "score", "market_size", "competitor_count", "phase2", "phase3"],
                    rankings,
                ),
                ReportTable::new(
                    "Market & Competition",
                    &["disease", "market_size", "competitor_count"],
                    market,
                ),
                ReportTable::new(
                    "Patent Landscape",
                    &["disease", "patent_filings_last_5y", "key_patents_expiring_in_years"],
                    patents,
                ),
                ReportTable::new(
                    "Clinical Trials",
                    &["disease", "phase2", "phase3", "total"],
                    trials,
                ),
                ReportTable::new(
                    "Internal Knowledge References",
                    &["disease", "snippet", "source"],
                    references,
                ),
            ],
        }
    }
}

/// Final result of one pipeline invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    pub question: String,
    /// Candidate names after the ranking-hint merge
    pub candidates: Vec<String>,
    pub ranked: Vec<ScoredRecord>,
    pub summary: String,
    pub summary_source: SummarySource,
    #[serde(default)]
    pub external_analysis: Option<String>,
    /// Raw advisor ranking, passed through for observability only
    #[serde(default)]
    pub external_ranking_hint: Option<serde_json::Value>,
    #[serde(default)]
    pub knowledge: Vec<KnowledgeSnippet>,
    pub report_artifact_path: Option<String>,
    pub generated_at: DateTime<Utc>,
}
