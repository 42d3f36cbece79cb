use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::config::NarrativeConfig;
use crate::error::{Result, ScribeError};
use super::narrator::{NarrativeGenerator, NarrativeRequest};

const SYSTEM_PROMPT: &str = "You are an expert software documentation assistant. \
    Describe codebases clearly and concisely for developers who are new to them.";

const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Factory function to create the narrator named in the config
pub fn create_narrator(config: &NarrativeConfig) -> Result<Box<dyn NarrativeGenerator>> {
    match config.provider.as_str() {
        "anthropic" => Ok(Box::new(AnthropicProvider::new(config)?)),
        "openai" => Ok(Box::new(OpenAiProvider::new(config)?)),
        _ => Err(ScribeError::Config(format!(
            "Unsupported narrative provider: {}",
            config.provider
        ))),
    }
}

fn resolve_api_key(config: &NarrativeConfig, env_var: &str) -> Result<String> {
    config
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|key| !key.is_empty()))
        .ok_or_else(|| {
            ScribeError::Config(format!(
                "API key required for {} (set narrative.api_key or {})",
                config.provider, env_var
            ))
        })
}

fn build_client(config: &NarrativeConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|e| ScribeError::Config(format!("Failed to build HTTP client: {}", e)))
}

async fn post_json(
    request: reqwest::RequestBuilder,
    provider: &str,
    payload: &serde_json::Value,
) -> Result<serde_json::Value> {
    let response = request
        .header("Content-Type", "application/json")
        .json(payload)
        .send()
        .await
        .map_err(|e| ScribeError::Narrative(format!("{} API request failed: {}", provider, e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(ScribeError::Narrative(format!(
            "{} API error {}: {}",
            provider, status, error_text
        )));
    }

    response
        .json()
        .await
        .map_err(|e| ScribeError::Narrative(format!("Failed to parse {} response: {}", provider, e)))
}

fn non_empty(text: Option<String>, provider: &str) -> Result<String> {
    let text = text.ok_or_else(|| {
        ScribeError::Narrative(format!("{} response contained no text content", provider))
    })?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ScribeError::Narrative(format!(
            "{} returned an empty description",
            provider
        )));
    }
    Ok(trimmed.to_string())
}

/// Anthropic Messages API
pub struct AnthropicProvider {
    config: NarrativeConfig,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: &NarrativeConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            api_key: resolve_api_key(config, "ANTHROPIC_API_KEY")?,
            client: build_client(config)?,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(ANTHROPIC_BASE_URL);
        format!("{}/v1/messages", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl NarrativeGenerator for AnthropicProvider {
    async fn generate(&self, request: &NarrativeRequest) -> Result<String> {
        let payload = json!({
            "model": self.config.model,
            "system": SYSTEM_PROMPT,
            "messages": [
                {
                    "role": "user",
                    "content": request.build_prompt()
                }
            ],
            "max_tokens": self.config.max_tokens.unwrap_or(1024),
            "temperature": self.config.temperature.unwrap_or(0.3)
        });

        let http = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION);
        let response_data = post_json(http, "Anthropic", &payload).await?;

        let text = response_data["content"].as_array().map(|blocks| {
            blocks
                .iter()
                .filter(|block| block["type"] == "text")
                .filter_map(|block| block["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n")
        });

        if let Some(usage) = response_data.get("usage") {
            tracing::debug!(
                "Anthropic usage: {} input / {} output tokens",
                usage["input_tokens"],
                usage["output_tokens"]
            );
        }

        non_empty(text, "Anthropic")
    }

    fn provider_name(&self) -> &str {
        "Anthropic"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

/// OpenAI chat completions, or any compatible endpoint via `base_url`
pub struct OpenAiProvider {
    config: NarrativeConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: &NarrativeConfig) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            api_key: resolve_api_key(config, "OPENAI_API_KEY")?,
            client: build_client(config)?,
        })
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

#[async_trait]
impl NarrativeGenerator for OpenAiProvider {
    async fn generate(&self, request: &NarrativeRequest) -> Result<String> {
        let payload = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": request.build_prompt()
                }
            ],
            "max_tokens": self.config.max_tokens.unwrap_or(1024),
            "temperature": self.config.temperature.unwrap_or(0.3)
        });

        let http = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key));
        let response_data = post_json(http, "OpenAI", &payload).await?;

        if let Some(usage) = response_data.get("usage") {
            tracing::debug!("OpenAI usage: {} tokens", usage["total_tokens"]);
        }

        let text = response_data["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string);
        non_empty(text, "OpenAI")
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
