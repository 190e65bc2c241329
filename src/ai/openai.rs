//! OpenAI-compatible chat completions provider.
//!
//! Works against api.openai.com and any service exposing the same
//! `/chat/completions` endpoint (set `ai.base_url`).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::prompts;
use super::provider::{check_summary_input, AiError, AiErrorKind, AiProvider, Completion};
use crate::config::AiConfig;
use crate::models::{SummaryResult, TranslateResult};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Usage,
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: i64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

pub struct OpenAiProvider {
    client: Client,
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl OpenAiProvider {
    pub fn new(config: &AiConfig, client: Client) -> Self {
        Self {
            client,
            name: "openai".to_string(),
            base_url: config
                .base_url
                .as_deref()
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            timeout: config.timeout(),
        }
    }

    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<Completion, AiError> {
        let mut messages = Vec::with_capacity(2);
        if !system.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: user,
        });

        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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

/// Classify a chat completions response body.
fn parse_response(provider: &str, status: StatusCode, body: &str) -> Result<Completion, AiError> {
    let parsed = serde_json::from_str::<ChatResponse>(body);

    if let Ok(ChatResponse {
        error: Some(error), ..
    }) = &parsed
    {
        let error_type = error.error_type.as_deref().unwrap_or_default();
        let code = error.code.clone().unwrap_or_else(|| format!("http_{}", status.as_u16()));
        let kind = if error_type.contains("quota") || code.contains("quota") {
            AiErrorKind::Quota
        } else if error_type.contains("invalid") {
            AiErrorKind::InvalidRequest
        } else {
            AiErrorKind::Api
        };
        return Err(AiError::new(provider, code, error.message.clone(), kind));
    }

    if !status.is_success() {
        return Err(AiError::new(
            provider,
            format!("http_{}", status.as_u16()),
            format!("HTTP {}: {}", status, body),
            AiErrorKind::Api,
        ));
    }

    let response = parsed.map_err(|e| {
        AiError::new(
            provider,
            "invalid_response",
            format!("failed to parse response: {}", e),
            AiErrorKind::Api,
        )
    })?;

    let text = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .ok_or_else(|| AiError::new(provider, "empty_response", "no choices returned", AiErrorKind::Api))?;

    Ok(Completion {
        text,
        total_tokens: response.usage.total_tokens,
    })
}

#[async_trait]
impl AiProvider for OpenAiProvider {
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
            .complete(prompts::TRANSLATION_SYSTEM, &prompt, self.max_tokens)
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
            .complete(prompts::SUMMARY_SYSTEM, &prompt, self.max_tokens)
            .await?;
        Ok(completion.into_summary(&self.name, &self.model, text, max_length, min_length, started))
    }

    async fn is_available(&self) -> bool {
        match self.complete("", "Hello", 10).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!("{} is unavailable: {}", self.name, e);
                false
            }
        }
    }
}
