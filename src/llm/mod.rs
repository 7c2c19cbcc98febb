use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

use crate::core::config::LlmConfig;

#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        config: &Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAIClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl OpenAIClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl LLMProvider for OpenAIClient {
    async fn generate(
        &self,
        prompt: &str,
        config: &Value,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let system = config["system"]
            .as_str()
            .unwrap_or("You are a helpful assistant.");
        let max_tokens = config["max_tokens"]
            .as_u64()
            .unwrap_or(u64::from(self.max_tokens));

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    {"role": "system", "content": system},
                    {"role": "user", "content": prompt}
                ],
                "max_tokens": max_tokens,
                "temperature": 0.2
            }))
            .send()
            .await?
            .error_for_status()?;

        let result: Value = response.json().await?;
        extract_completion(&result).ok_or_else(|| "LLM returned an empty completion".into())
    }
}

/// Content of the first choice, if it is non-blank.
pub fn extract_completion(result: &Value) -> Option<String> {
    result["choices"][0]["message"]["content"]
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_completion() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  Pump replaced.  "}}]
        });
        assert_eq!(extract_completion(&body).as_deref(), Some("Pump replaced."));

        let empty = serde_json::json!({"choices": [{"message": {"content": "   "}}]});
        assert_eq!(extract_completion(&empty), None);
        assert_eq!(extract_completion(&serde_json::json!({})), None);
    }

    #[test]
    fn test_completions_url_trims_slash() {
        let client = OpenAIClient::from_config(&LlmConfig {
            api_url: "https://llm.example/v1/".into(),
            api_key: "k".into(),
            ..LlmConfig::default()
        })
        .unwrap();
        assert_eq!(client.completions_url(), "https://llm.example/v1/chat/completions");
    }
}
