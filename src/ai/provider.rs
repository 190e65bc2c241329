use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use crate::models::{Language, SummaryResult, TranslateResult, SUPPORTED_LANGUAGES};

/// Coarse category of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiErrorKind {
    Network,
    Api,
    Quota,
    InvalidRequest,
}

impl AiErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AiErrorKind::Network => "network",
            AiErrorKind::Api => "api",
            AiErrorKind::Quota => "quota",
            AiErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("[{provider}] {code}: {message}")]
pub struct AiError {
    pub provider: String,
    pub code: String,
    pub message: String,
    pub kind: AiErrorKind,
}

impl AiError {
    pub fn new(
        provider: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        kind: AiErrorKind,
    ) -> Self {
        Self {
            provider: provider.into(),
            code: code.into(),
            message: message.into(),
            kind,
        }
    }

    pub fn network(provider: &str, err: &reqwest::Error) -> Self {
        let code = if err.is_timeout() { "timeout" } else { "network_error" };
        Self::new(provider, code, err.to_string(), AiErrorKind::Network)
    }
}

/// A translation / summarization backend.
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Provider identifier, used for cost lookup and cache records.
    fn name(&self) -> &str;

    fn model(&self) -> &str;

    /// Translate `text`. An empty `source_lang` asks the provider to detect it.
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslateResult, AiError>;

    /// Summarize `text` in at most `max_length` characters. Inputs shorter
    /// than `min_length` characters are refused with `InvalidRequest`.
    async fn summarize(
        &self,
        text: &str,
        max_length: u32,
        min_length: u32,
    ) -> Result<SummaryResult, AiError>;

    async fn is_available(&self) -> bool;

    fn supported_languages(&self) -> &'static [Language] {
        SUPPORTED_LANGUAGES
    }
}

/// Refuse summaries of inputs below the minimum length.
pub(crate) fn check_summary_input(provider: &str, text: &str, min_length: u32) -> Result<(), AiError> {
    let len = text.chars().count();
    if len < min_length as usize {
        return Err(AiError::new(
            provider,
            "text_too_short",
            format!("text length {} is below the minimum of {}", len, min_length),
            AiErrorKind::InvalidRequest,
        ));
    }
    Ok(())
}

/// Text and token count of one chat completion.
#[derive(Debug)]
pub(crate) struct Completion {
    pub text: String,
    pub total_tokens: i64,
}

impl Completion {
    pub fn into_translation(
        self,
        provider: &str,
        model: &str,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        started: Instant,
    ) -> TranslateResult {
        let source_lang = if source_lang.is_empty() { "auto" } else { source_lang };
        TranslateResult {
            original_text: text.to_string(),
            translated_text: self.text.trim().to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
            provider: provider.to_string(),
            model: model.to_string(),
            tokens_used: self.total_tokens,
            processing_time_ms: started.elapsed().as_millis() as i64,
            created_at: Utc::now(),
        }
    }

    pub fn into_summary(
        self,
        provider: &str,
        model: &str,
        text: &str,
        max_length: u32,
        min_length: u32,
        started: Instant,
    ) -> SummaryResult {
        SummaryResult {
            original_text: text.to_string(),
            summary_text: self.text.trim().to_string(),
            max_length,
            min_length,
            provider: provider.to_string(),
            model: model.to_string(),
            tokens_used: self.total_tokens,
            processing_time_ms: started.elapsed().as_millis() as i64,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AiError::new("openai", "http_500", "boom", AiErrorKind::Api);
        assert_eq!(err.to_string(), "[openai] http_500: boom");
        assert_eq!(err.kind.as_str(), "api");
    }

    #[test]
    fn test_summary_input_counts_characters() {
        // Six characters, eighteen bytes.
        let text = "人工智能新闻";
        assert!(check_summary_input("openai", text, 6).is_ok());
        let err = check_summary_input("openai", text, 7).unwrap_err();
        assert_eq!(err.kind, AiErrorKind::InvalidRequest);
        assert_eq!(err.code, "text_too_short");
    }

    #[test]
    fn test_auto_source_language() {
        let completion = Completion {
            text: "  Hello  ".to_string(),
            total_tokens: 12,
        };
        let result = completion.into_translation("openai", "m", "你好", "", "en", Instant::now());
        assert_eq!(result.source_lang, "auto");
        assert_eq!(result.translated_text, "Hello");
        assert_eq!(result.tokens_used, 12);
    }
}
