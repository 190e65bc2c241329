use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::prompts;
use super::provider::{check_summary_input, AiError, AiErrorKind, AiProvider, Completion};
use crate::config::AiConfig;
use crate::models::{SummaryResult, TranslateResult};

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: i64,
    #[serde(default)]
    output_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    #[serde(default)]
    message: String,
}

pub struct AnthropicProvider {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl AnthropicProvider {
    pub fn new(config: &AiConfig, client: Client) -> Self {
        Self {
            client,
            name: "anthropic".to_string(),
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(CLAUDE_API_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| CLAUDE_MODEL.to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout(),
        }
    }

    async fn complete(&self, system: Option<&str>, user: &str, max_tokens: u32) -> Result<Completion, AiError> {
        let request = MessageRequest {
            model: &self.model,
            max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
            system,
        };

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::network(&self.name, &e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::network(&self.name, &e))?;

        parse_response(&self.name, status, &body)
    }
}

fn parse_response(provider: &str, status: StatusCode, body: &str) -> Result<Completion, AiError> {
    if !status.is_success() {
        return Err(match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => {
                let error = envelope.error;
                let kind = if error.message.contains("credit balance") {
                    AiErrorKind::Quota
                } else if error.error_type.contains("invalid") {
                    AiErrorKind::InvalidRequest
                } else {
                    AiErrorKind::Api
                };
                AiError::new(provider, error.error_type, error.message, kind)
            }
            Err(_) => AiError::new(
                provider,
                format!("http_{}", status.as_u16()),
                format!("HTTP {}: {}", status, body),
                AiErrorKind::Api,
            ),
        });
    }

    let response: MessageResponse = serde_json::from_str(body).map_err(|e| {
        AiError::new(
            provider,
            "invalid_response",
            format!("failed to parse response: {}", e),
            AiErrorKind::Api,
        )
    })?;

    let text = response
        .content
        .into_iter()
        .filter_map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n");

    if text.trim().is_empty() {
        return Err(AiError::new(provider, "empty_response", "no text content returned", AiErrorKind::Api));
    }

    Ok(Completion {
        text,
        total_tokens: response.usage.input_tokens + response.usage.output_tokens,
    })
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslateResult, AiError> {
        let started = Instant::now();
        let prompt = prompts::translation(text, source_lang, target_lang);
        let completion = self
            .complete(Some(prompts::TRANSLATION_SYSTEM), &prompt, self.max_tokens)
            .await?;
        Ok(completion.into_translation(&self.name, &self.model, text, source_lang, target_lang, started))
    }

    async fn summarize(
        &self,
        text: &str,
        max_length: u32,
        min_length: u32,
    ) -> Result<SummaryResult, AiError> {
        check_summary_input(&self.name, text, min_length)?;
        let started = Instant::now();
        let prompt = prompts::summary(text, max_length);
        let completion = self
            .complete(Some(prompts::SUMMARY_SYSTEM), &prompt, self.max_tokens)
            .await?;
        Ok(completion.into_summary(&self.name, &self.model, text, max_length, min_length, started))
    }

    async fn is_available(&self) -> bool {
        match self.complete(None, "Hello", 10).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("{} is unavailable: {}", self.name, e);
                false
            }
        }
    }
}
