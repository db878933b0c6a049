use opportunity_core::{BiomedicalAdvisor, CandidateSearch, SearchPayload};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

use crate::config::{ResolverConfig, QUESTION_PLACEHOLDER};

/// Candidates chosen for one question, with the evidence behind the choice
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub candidates: Vec<String>,
    pub search: SearchPayload,
    /// Raw advisor response, kept for the envelope
    pub ranking_hint: Option<Value>,
}

pub struct CandidateResolver {
    search: Arc<dyn CandidateSearch>,
    advisor: Arc<dyn BiomedicalAdvisor>,
    config: ResolverConfig,
}

impl CandidateResolver {
    pub fn new(
        search: Arc<dyn CandidateSearch>,
        advisor: Arc<dyn BiomedicalAdvisor>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            search,
            advisor,
            config,
        }
    }

    pub fn search_query(&self, question: &str) -> String {
        self.config
            .search_query_template
            .replace(QUESTION_PLACEHOLDER, question.trim())
    }

    /// Never fails: search and hint problems degrade to fallbacks
    pub async fn resolve(&self, question: &str) -> Resolution {
        let query = self.search_query(question);

        let search = if self.search.is_configured() {
            match self.search.search(&query).await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Candidate search failed, using fallback payload: {}", e);
                    let mut payload = SearchPayload::fallback(&query);
                    payload.error = Some(e.to_string());
                    payload
                }
            }
        } else {
            tracing::debug!("Candidate search not configured");
            SearchPayload::fallback(&query)
        };

        let mut candidates = extract_candidates(&search, &self.config);
        if candidates.is_empty() {
            tracing::info!(
                "No candidates found in search results, using defaults {:?}",
                self.config.default_candidates
            );
            candidates = self.config.default_candidates.clone();
        }

        let mut ranking_hint = None;
        if self.advisor.is_configured() {
            match self
                .advisor
                .rank_candidates(&candidates, &self.config.region)
                .await
            {
                Ok(hint) => {
                    let names = hint_names(&hint);
                    if !names.is_empty() {
                        candidates = merge_hint_order(&candidates, &names);
                    }
                    ranking_hint = Some(hint);
                }
                Err(e) => {
                    tracing::warn!("Ranking hint unavailable, keeping search order: {}", e);
                }
            }
        }

        tracing::info!("Resolved {} candidates: {:?}", candidates.len(), candidates);
        Resolution {
            candidates,
            search,
            ranking_hint,
        }
    }
}

fn mentions(text_lower: &str, words: &HashSet<&str>, keyword: &str) -> bool {
    let keyword = keyword.to_lowercase();
    if keyword.contains(char::is_whitespace) {
        text_lower.contains(&keyword)
    } else {
        words.contains(keyword.as_str())
    }
}

/// Vocabulary keywords found in the payload, canonicalized, in vocabulary order.
///
/// Single-word keywords match whole words only, so `ILD` does not fire on "mild".
pub fn extract_candidates(payload: &SearchPayload, config: &ResolverConfig) -> Vec<String> {
    let text = payload.searchable_text().to_lowercase();
    let words: HashSet<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    let mut seen = HashSet::new();
    let mut found = Vec::new();
    for entry in &config.vocabulary {
        if found.len() >= config.candidate_cap {
            break;
        }
        if mentions(&text, &words, &entry.keyword) && seen.insert(entry.canonical.clone()) {
            found.push(entry.canonical.clone());
        }
    }
    found
}

/// Names in an advisor ranking, read from `ranked` (or a bare array).
/// Entries may be plain strings or objects with a `name` or `disease` key.
pub fn hint_names(hint: &Value) -> Vec<String> {
    let entries = match hint {
        Value::Array(items) => items,
        Value::Object(map) => match map.get("ranked") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    entries
        .iter()
        .filter_map(|entry| match entry {
            Value::String(name) => Some(name.clone()),
            Value::Object(map) => map
                .get("name")
                .or_else(|| map.get("disease"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Hint-known candidates first in hint order, then the rest in input order.
/// Hint names that are not candidates are dropped.
pub fn merge_hint_order(candidates: &[String], hint: &[String]) -> Vec<String> {
    let known: HashSet<&str> = candidates.iter().map(String::as_str).collect();
    let mut placed = HashSet::new();
    let mut merged = Vec::with_capacity(candidates.len());

    for name in hint.iter().chain(candidates.iter()) {
        if known.contains(name.as_str()) && placed.insert(name.as_str()) {
            merged.push(name.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use opportunity_core::{PreAnalysis, SearchHit, SourceError};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn payload(answer: &str, contents: &[&str]) -> SearchPayload {
        SearchPayload {
            provider: "stub".to_string(),
            query: "q".to_string(),
            answer: Some(answer.to_string()),
            summary: None,
            results: contents
                .iter()
                .map(|c| SearchHit {
                    title: String::new(),
                    url: String::new(),
                    content: c.to_string(),
                })
                .collect(),
            error: None,
        }
    }

    struct StubSearch(Result<SearchPayload, SourceError>);

    #[async_trait]
    impl CandidateSearch for StubSearch {
        async fn search(&self, _query: &str) -> Result<SearchPayload, SourceError> {
            self.0.clone()
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    struct StubAdvisor(Option<Value>);

    #[async_trait]
    impl BiomedicalAdvisor for StubAdvisor {
        async fn rank_candidates(
            &self,
            _names: &[String],
            _region: &str,
        ) -> Result<Value, SourceError> {
            self.0
                .clone()
                .ok_or_else(|| SourceError::Unavailable("advisor down".to_string()))
        }

        async fn analyze_question(&self, _question: &str) -> Result<PreAnalysis, SourceError> {
            Err(SourceError::NotConfigured("stub".to_string()))
        }

        fn is_configured(&self) -> bool {
            true
        }
    }

    struct Unconfigured;

    #[async_trait]
    impl CandidateSearch for Unconfigured {
        async fn search(&self, _query: &str) -> Result<SearchPayload, SourceError> {
            Err(SourceError::NotConfigured("search".to_string()))
        }

        fn is_configured(&self) -> bool {
            false
        }
    }

    #[async_trait]
    impl BiomedicalAdvisor for Unconfigured {
        async fn rank_candidates(&self, _: &[String], _: &str) -> Result<Value, SourceError> {
            Err(SourceError::NotConfigured("advisor".to_string()))
        }

        async fn analyze_question(&self, _: &str) -> Result<PreAnalysis, SourceError> {
            Err(SourceError::NotConfigured("advisor".to_string()))
        }

        fn is_configured(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_extract_in_vocabulary_order_with_synonyms() {
        let config = ResolverConfig::default();
        let found = extract_candidates(
            &payload("Bronchiectasis and IPF are rising", &["asthma burden", "copd"]),
            &config,
        );
        assert_eq!(found, names(&["COPD", "Asthma", "ILD", "Bronchiectasis"]));
    }

    #[test]
    fn test_extract_dedupes_synonyms() {
        let config = ResolverConfig::default();
        let found = extract_candidates(&payload("ILD, also called IPF here", &[]), &config);
        assert_eq!(found, names(&["ILD"]));
    }

    #[test]
    fn test_extract_matches_whole_words() {
        let config = ResolverConfig::default();
        assert!(extract_candidates(&payload("mild symptoms in children", &[]), &config).is_empty());
    }

    #[test]
    fn test_extract_respects_cap() {
        let config = ResolverConfig {
            candidate_cap: 2,
            ..ResolverConfig::default()
        };
        let found = extract_candidates(&payload("copd asthma ild bronchiectasis", &[]), &config);
        assert_eq!(found, names(&["COPD", "Asthma"]));
    }

    #[test]
    fn test_merge_hint_order() {
        let merged = merge_hint_order(&names(&["A", "B", "C"]), &names(&["C", "X", "A"]));
        assert_eq!(merged, names(&["C", "A", "B"]));
    }

    #[test]
    fn test_merge_with_empty_hint_keeps_order() {
        let merged = merge_hint_order(&names(&["A", "B"]), &[]);
        assert_eq!(merged, names(&["A", "B"]));
    }

    #[test]
    fn test_hint_names_shapes() {
        let hint = serde_json::json!({
            "ranked": [{"name": "ILD"}, {"disease": "COPD", "score": 0.9}, "Asthma", 42]
        });
        assert_eq!(hint_names(&hint), names(&["ILD", "COPD", "Asthma"]));
        assert!(hint_names(&serde_json::json!({"status": "ok"})).is_empty());
        assert_eq!(hint_names(&serde_json::json!(["COPD"])), names(&["COPD"]));
    }

    #[test]
    fn test_search_query_template() {
        let resolver = CandidateResolver::new(
            Arc::new(Unconfigured),
            Arc::new(Unconfigured),
            ResolverConfig {
                search_query_template: "{question} prevalence".to_string(),
                ..ResolverConfig::default()
            },
        );
        assert_eq!(resolver.search_query("  Which one?  "), "Which one? prevalence");

        let fixed = CandidateResolver::new(
            Arc::new(Unconfigured),
            Arc::new(Unconfigured),
            ResolverConfig {
                search_query_template: "respiratory diseases India".to_string(),
                ..ResolverConfig::default()
            },
        );
        assert_eq!(fixed.search_query("anything"), "respiratory diseases India");
    }

    #[tokio::test]
    async fn test_unconfigured_resolves_to_defaults() {
        let resolver = CandidateResolver::new(
            Arc::new(Unconfigured),
            Arc::new(Unconfigured),
            ResolverConfig::default(),
        );
        let resolution = resolver.resolve("Which respiratory diseases matter?").await;
        assert_eq!(resolution.candidates, names(&["COPD", "Asthma", "ILD"]));
        assert_eq!(resolution.search.provider, "fallback");
        assert!(resolution.ranking_hint.is_none());
    }

    #[tokio::test]
    async fn test_search_failure_degrades_to_fallback() {
        let resolver = CandidateResolver::new(
            Arc::new(StubSearch(Err(SourceError::Unavailable("boom".to_string())))),
            Arc::new(Unconfigured),
            ResolverConfig::default(),
        );
        let resolution = resolver.resolve("Which respiratory diseases matter?").await;
        assert_eq!(resolution.search.provider, "fallback");
        assert!(resolution.search.error.is_some());
        assert_eq!(resolution.candidates.len(), 3);
    }

    #[tokio::test]
    async fn test_hint_reorders_candidates() {
        let resolver = CandidateResolver::new(
            Arc::new(StubSearch(Ok(payload("COPD and asthma and ILD", &[])))),
            Arc::new(StubAdvisor(Some(serde_json::json!({
                "ranked": [{"name": "ILD"}, {"name": "Tuberculosis"}]
            })))),
            ResolverConfig::default(),
        );
        let resolution = resolver.resolve("Which respiratory diseases matter?").await;
        assert_eq!(resolution.candidates, names(&["ILD", "COPD", "Asthma"]));
        assert!(resolution.ranking_hint.is_some());
    }

    #[tokio::test]
    async fn test_hint_failure_keeps_order() {
        let resolver = CandidateResolver::new(
            Arc::new(StubSearch(Ok(payload("asthma then copd", &[])))),
            Arc::new(StubAdvisor(None)),
            ResolverConfig::default(),
        );
        let resolution = resolver.resolve("Which respiratory diseases matter?").await;
        assert_eq!(resolution.candidates, names(&["COPD", "Asthma"]));
        assert!(resolution.ranking_hint.is_none());
    }
}
