//! Messages API client implementing [`ClassificationOracle`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{OracleError, OracleResult};
use crate::prompts::{
    area_user_prompt, duplicate_user_prompt, AREA_SYSTEM_PROMPT, DUPLICATE_SYSTEM_PROMPT,
};
use crate::verdict::{
    parse_area_response, parse_duplicate_response, AreaDetection, CandidateBrief,
    DuplicateVerdict, ReportText,
};
use crate::ClassificationOracle;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

/// Messages API settings
#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
    pub area_max_tokens: u32,
    pub duplicate_max_tokens: u32,
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl AnthropicConfig {
    pub fn new(api_key: &str) -> Self {
        AnthropicConfig {
            api_url: DEFAULT_API_URL.to_string(),
            api_key: api_key.to_string(),
            model: DEFAULT_MODEL.to_string(),
            area_max_tokens: 100,
            duplicate_max_tokens: 2048,
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

/// Oracle backed by the Messages API, sampling at temperature 0
pub struct AnthropicOracle {
    config: AnthropicConfig,
    http: Client,
}

impl AnthropicOracle {
    pub fn new(config: AnthropicConfig) -> OracleResult<Self> {
        if config.api_key.is_empty() {
            return Err(OracleError::Config("API key is empty".to_string()));
        }
        let http = Client::builder()
            .user_agent(concat!("dupewatch/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(AnthropicOracle { config, http })
    }

    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> OracleResult<String> {
        let response = self
            .http
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&json!({
                "model": self.config.model,
                "max_tokens": max_tokens,
                "temperature": 0.0,
                "system": system,
                "messages": [{ "role": "user", "content": user }],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let message: MessageResponse = response.json().await?;
        if let Some(usage) = &message.usage {
            info!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "oracle token usage"
            );
        }

        match message.content.into_iter().next() {
            Some(block) if block.kind == "text" => Ok(block.text.unwrap_or_default()),
            _ => Err(OracleError::EmptyResponse),
        }
    }
}

#[async_trait]
impl ClassificationOracle for AnthropicOracle {
    async fn detect_areas(
        &self,
        report: &ReportText,
        taxonomy: &str,
    ) -> OracleResult<AreaDetection> {
        let text = self
            .complete(
                AREA_SYSTEM_PROMPT,
                &area_user_prompt(report, taxonomy),
                self.config.area_max_tokens,
            )
            .await?;
        debug!("Area response: {}", text.trim());
        Ok(parse_area_response(&text))
    }

    async fn judge_duplicates(
        &self,
        report: &ReportText,
        candidates: &[CandidateBrief],
    ) -> OracleResult<DuplicateVerdict> {
        let user = duplicate_user_prompt(report, candidates)?;
        let text = self
            .complete(
                DUPLICATE_SYSTEM_PROMPT,
                &user,
                self.config.duplicate_max_tokens,
            )
            .await?;
        Ok(parse_duplicate_response(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AnthropicConfig::new("sk-test");
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.area_max_tokens, 100);
        assert!(!format!("{:?}", config).contains("sk-test"));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            AnthropicOracle::new(AnthropicConfig::new("")),
            Err(OracleError::Config(_))
        ));
    }

    #[test]
    fn test_message_response_shape() {
        let message: MessageResponse = serde_json::from_value(json!({
            "content": [{ "type": "text", "text": "editor" }],
            "usage": { "input_tokens": 10, "output_tokens": 2 }
        }))
        .unwrap();
        assert_eq!(message.content[0].text.as_deref(), Some("editor"));
        assert_eq!(message.usage.unwrap().output_tokens, 2);
    }
}
