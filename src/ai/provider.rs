//! External completion provider client.

use async_trait::async_trait;
use serde_json::json;

use crate::config::AiConfig;
use crate::error::ProviderError;

/// Stateless text-generation call. The session core invokes this, it never
/// reimplements any generation logic.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        language: &str,
        context: &str,
    ) -> Result<String, ProviderError>;
}

/// Gemini-style `generateContent` REST client.
pub struct GeminiProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(config: AiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            model: config.model,
        }
    }
}

#[async_trait]
impl AiProvider for GeminiProvider {
    async fn generate(
        &self,
        prompt: &str,
        language: &str,
        context: &str,
    ) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "AI API key is not set".to_string(),
            ));
        }

        let context_line = if context.is_empty() {
            String::new()
        } else {
            format!("Context: {}\n", context)
        };
        let full_prompt = format!(
            "Language: {}\n{}\n{}\n\nPlease provide code suggestions or solutions.",
            language, context_line, prompt
        );

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        );

        let response = self
            .http
            .post(&url)
            .json(&json!({
                "contents": [{ "parts": [{ "text": full_prompt }] }]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "AI provider returned error: {}", body);
            return Err(ProviderError::Request(format!(
                "provider responded with status {}",
                status
            )));
        }

        let body: serde_json::Value = response.json().await?;
        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ProviderError::BadResponse("no candidate text in response".to_string())
            })
    }
}
