use async_trait::async_trait;
use opportunity_core::{BiomedicalAdvisor, PreAnalysis, SourceError};
use reqwest::{Client, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::{http_client, read_json, request_error};

#[derive(Debug, Serialize)]
struct RankRequest<'a> {
    diseases: &'a [String],
    country: &'a str,
}

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    question: &'a str,
    context: &'a str,
    entities: &'a [String],
}

/// Client for an NVIDIA Biomedical AI-Q research service.
///
/// Expected endpoints:
/// - `POST {base}/aiq/rank_diseases` `{diseases, country}` -> `{ranked: [..]}`
/// - `POST {base}/aiq/analyze` `{question, context, entities}` -> `{analysis, citations}`
#[derive(Clone)]
pub struct BioAiqClient {
    client: Client,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout: Duration,
}

impl BioAiqClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
            api_key,
            timeout,
        }
    }

    fn request(&self, path: &str) -> Result<RequestBuilder, SourceError> {
        let base = self
            .base_url
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("NVIDIA_BIOAIQ_URL".to_string()))?;
        let builder = self.client.post(format!("{}/aiq/{}", base, path));
        Ok(match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        })
    }
}

#[async_trait]
impl BiomedicalAdvisor for BioAiqClient {
    async fn rank_candidates(
        &self,
        diseases: &[String],
        region: &str,
    ) -> Result<Value, SourceError> {
        let response = self
            .request("rank_diseases")?
            .json(&RankRequest {
                diseases,
                country: region,
            })
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        read_json(response).await
    }

    async fn analyze_question(&self, question: &str) -> Result<PreAnalysis, SourceError> {
        let response = self
            .request("analyze")?
            .json(&AnalyzeRequest {
                question,
                context: "",
                entities: &[],
            })
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;
        read_json(response).await
    }

    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }
}
