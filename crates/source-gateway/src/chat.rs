use async_trait::async_trait;
use opportunity_core::{GenerationParams, SourceError, TextGenerator};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{http_client, read_json, request_error};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible chat completions client (NVIDIA NIM by default)
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("NVIDIA_API_KEY".to_string()))?;

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(e, self.timeout))?;

        let body: ChatResponse = read_json(response).await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| SourceError::InvalidResponse("no choices in completion".to_string()))
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_parsing() {
        let body: ChatResponse = serde_json::from_str(
            r###"{"choices": [{"index": 0, "message": {"role": "assistant", "content": "## Summary"}}]}"###,
        )
        .unwrap();
        assert_eq!(
            body.choices[0].message.content.as_deref(),
            Some("## Summary")
        );
    }

    #[tokio::test]
    async fn test_unconfigured_generator() {
        let client = ChatCompletionsClient::new(
            crate::DEFAULT_CHAT_URL,
            None,
            crate::DEFAULT_CHAT_MODEL,
            Duration::from_secs(1),
        );
        assert!(!client.is_configured());
        let err = client
            .generate("hello", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured(_)));
    }
}
