use async_trait::async_trait;
use opportunity_core::{CandidateSearch, SearchHit, SearchPayload, SourceError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{http_client, read_json, request_error};

const TAVILY_URL: &str = "https://api.tavily.com/search";
const MAX_RESULTS: u32 = 5;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    include_answer: bool,
    search_depth: &'static str,
    include_images: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Tavily web search; unconfigured without an API key
#[derive(Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: Option<String>,
    timeout: Duration,
}

impl TavilyClient {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            api_key,
            timeout,
        }
    }
}

#[async_trait]
impl CandidateSearch for TavilyClient {
    async fn search(&self, query: &str) -> Result<SearchPayload, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("TAVILY_API_KEY".to_string()))?;

        let response = self
            .client
            .post(TAVILY_URL)
            .json(&SearchRequest {
                api_key,
                query,
                max_results: MAX_RESULTS,
                include_answer: true,
                search_depth: "basic",
                include_images: false,
            })
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let body: SearchResponse = read_json(response).await?;
        tracing::info!("Tavily returned {} results for '{}'", body.results.len(), query);

        Ok(SearchPayload {
            provider: "tavily".to_string(),
            query: query.to_string(),
            answer: body.answer,
            summary: None,
            results: body.results,
            error: None,
        })
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}
