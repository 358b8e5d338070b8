use crate::config::CohereConfig;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Optional sampling knobs for a chat call
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SamplingParams {
    pub temperature: Option<f32>,
    /// Nucleus sampling probability
    pub p: Option<f32>,
    pub seed: Option<u64>,
}

/// A chat-completion backend that answers a single user message with text
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, prompt: &str, sampling: SamplingParams) -> Result<String, String>;
}

#[derive(Debug, Clone)]
pub struct CohereClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    request_timeout: Duration,
    max_retry_time: Duration,
}

#[derive(Debug, Serialize)]
pub struct CohereChatRequest {
    pub model: String,
    pub stream: bool,
    pub messages: Vec<CohereMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CohereChatResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: Option<CohereResponseMessage>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CohereResponseMessage {
    #[serde(default)]
    pub content: Vec<CohereContent>,
}

#[derive(Debug, Deserialize)]
pub struct CohereContent {
    #[serde(rename = "type", default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl CohereChatResponse {
    /// Text of the first content block, or an empty string
    pub fn first_text(&self) -> String {
        self.message
            .as_ref()
            .and_then(|m| m.content.first())
            .and_then(|c| c.text.clone())
            .unwrap_or_default()
    }
}

impl CohereChatRequest {
    pub fn new(model: &str, prompt: &str, sampling: SamplingParams) -> Self {
        Self {
            model: model.to_string(),
            stream: false,
            messages: vec![CohereMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: sampling.temperature,
            p: sampling.p,
            seed: sampling.seed,
        }
    }
}

impl CohereClient {
    pub fn new(api_key: String, config: &CohereConfig) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            request_timeout: config.request_timeout,
            max_retry_time: config.max_retry_time,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn send_chat(&self, request: &CohereChatRequest) -> Result<CohereChatResponse, String> {
        let backoff_config = ExponentialBackoff {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(15),
            multiplier: 2.0,
            max_elapsed_time: Some(self.max_retry_time),
            ..Default::default()
        };

        // 429, 5xx and connection failures are retried, everything else fails fast
        let operation = || async {
            let response = self
                .client
                .post(format!("{}/chat", self.base_url))
                .bearer_auth(&self.api_key)
                .header("content-type", "application/json")
                .timeout(self.request_timeout)
                .json(request)
                .send()
                .await
                .map_err(|e| {
                    if e.is_connect() || e.is_timeout() {
                        tracing::warn!("Cohere API connection error (retrying): {}", e);
                        backoff::Error::transient(format!("Connection error: {}", e))
                    } else {
                        tracing::error!("Cohere API permanent error: {}", e);
                        backoff::Error::permanent(format!("Request error: {}", e))
                    }
                })?;

            let status = response.status();
            let response_text = response
                .text()
                .await
                .map_err(|e| backoff::Error::permanent(format!("Failed to read response: {}", e)))?;

            tracing::debug!("Cohere API response (status {}): {}", status, response_text);

            if status.as_u16() == 429 || status.is_server_error() {
                tracing::warn!("Cohere API returned {} (retrying)", status);
                return Err(backoff::Error::transient(format!(
                    "API error ({}): {}",
                    status, response_text
                )));
            }

            if !status.is_success() {
                tracing::error!("Cohere API permanent error ({}): {}", status, response_text);
                return Err(backoff::Error::permanent(format!(
                    "API error ({}): {}",
                    status, response_text
                )));
            }

            serde_json::from_str::<CohereChatResponse>(&response_text).map_err(|e| {
                backoff::Error::permanent(format!("Failed to parse response: {}", e))
            })
        };

        retry(backoff_config, operation).await
    }
}

#[async_trait]
impl ChatModel for CohereClient {
    async fn chat(&self, prompt: &str, sampling: SamplingParams) -> Result<String, String> {
        let request = CohereChatRequest::new(&self.model, prompt, sampling);
        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            temperature = ?sampling.temperature,
            seed = ?sampling.seed,
            "sending Cohere chat request"
        );

        let response = self.send_chat(&request).await?;
        if let Some(reason) = &response.finish_reason {
            tracing::debug!(id = ?response.id, finish_reason = %reason, "Cohere chat finished");
        }

        Ok(response.first_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_unset_sampling() {
        let request = CohereChatRequest::new("command-a-03-2025", "hi", SamplingParams::default());
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "model": "command-a-03-2025",
                "stream": false,
                "messages": [{"role": "user", "content": "hi"}]
            })
        );
    }

    #[test]
    fn test_request_includes_sampling() {
        let sampling = SamplingParams {
            temperature: Some(0.5),
            p: Some(0.75),
            seed: Some(42),
        };
        let value = serde_json::to_value(CohereChatRequest::new("m", "hi", sampling)).unwrap();

        assert_eq!(value["temperature"], json!(0.5));
        assert_eq!(value["p"], json!(0.75));
        assert_eq!(value["seed"], json!(42));
    }

    #[test]
    fn test_first_text() {
        let response: CohereChatResponse = serde_json::from_value(json!({
            "id": "abc",
            "finish_reason": "COMPLETE",
            "message": {
                "role": "assistant",
                "content": [{"type": "text", "text": "{\"title\":\"Soup\"}"}]
            }
        }))
        .unwrap();
        assert_eq!(response.first_text(), "{\"title\":\"Soup\"}");

        let empty: CohereChatResponse = serde_json::from_value(json!({"id": "x"})).unwrap();
        assert_eq!(empty.first_text(), "");
    }
}
