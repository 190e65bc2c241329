use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PREFERRED_LANG: &str = "zh-CN";
pub const DEFAULT_MAX_SUMMARY_LENGTH: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiOperation {
    Translate,
    Summarize,
}

impl AiOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            AiOperation::Translate => "translate",
            AiOperation::Summarize => "summarize",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "translate" => Some(AiOperation::Translate),
            "summarize" => Some(AiOperation::Summarize),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language { code: "zh-CN", name: "Simplified Chinese" },
    Language { code: "zh-TW", name: "Traditional Chinese" },
    Language { code: "en", name: "English" },
    Language { code: "ja", name: "Japanese" },
    Language { code: "ko", name: "Korean" },
    Language { code: "es", name: "Spanish" },
    Language { code: "fr", name: "French" },
    Language { code: "de", name: "German" },
    Language { code: "ru", name: "Russian" },
    Language { code: "pt", name: "Portuguese" },
    Language { code: "it", name: "Italian" },
    Language { code: "ar", name: "Arabic" },
    Language { code: "hi", name: "Hindi" },
    Language { code: "th", name: "Thai" },
    Language { code: "vi", name: "Vietnamese" },
];

impl Language {
    pub fn by_code(code: &str) -> Option<&'static Language> {
        SUPPORTED_LANGUAGES.iter().find(|l| l.code == code)
    }

    /// Human-readable name for prompts; unknown codes are passed through.
    pub fn display_name(code: &str) -> &str {
        Self::by_code(code).map(|l| l.name).unwrap_or(code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslateResult {
    pub original_text: String,
    pub translated_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: i64,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl TranslateResult {
    pub fn from_record(record: CacheRecord) -> Self {
        Self {
            original_text: record.original_text,
            translated_text: record.processed_text,
            source_lang: record.source_lang.unwrap_or_default(),
            target_lang: record.target_lang.unwrap_or_default(),
            provider: record.provider,
            model: record.model,
            tokens_used: record.tokens_used,
            processing_time_ms: record.processing_time_ms,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub original_text: String,
    pub summary_text: String,
    pub max_length: u32,
    pub min_length: u32,
    pub provider: String,
    pub model: String,
    pub tokens_used: i64,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl SummaryResult {
    /// Length bounds are part of the cache key, so they are not stored on the row.
    pub fn from_record(record: CacheRecord, max_length: u32, min_length: u32) -> Self {
        Self {
            original_text: record.original_text,
            summary_text: record.processed_text,
            max_length,
            min_length,
            provider: record.provider,
            model: record.model,
            tokens_used: record.tokens_used,
            processing_time_ms: record.processing_time_ms,
            created_at: record.created_at,
        }
    }
}

/// A stored AI result, keyed by its content hash.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub content_hash: String,
    pub operation: AiOperation,
    pub original_text: String,
    pub processed_text: String,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub provider: String,
    pub model: String,
    pub tokens_used: i64,
    pub processing_time_ms: i64,
    pub created_at: DateTime<Utc>,
}

impl CacheRecord {
    pub fn from_translation(content_hash: String, result: &TranslateResult) -> Self {
        Self {
            content_hash,
            operation: AiOperation::Translate,
            original_text: result.original_text.clone(),
            processed_text: result.translated_text.clone(),
            source_lang: Some(result.source_lang.clone()),
            target_lang: Some(result.target_lang.clone()),
            provider: result.provider.clone(),
            model: result.model.clone(),
            tokens_used: result.tokens_used,
            processing_time_ms: result.processing_time_ms,
            created_at: result.created_at,
        }
    }

    pub fn from_summary(content_hash: String, result: &SummaryResult) -> Self {
        Self {
            content_hash,
            operation: AiOperation::Summarize,
            original_text: result.original_text.clone(),
            processed_text: result.summary_text.clone(),
            source_lang: None,
            target_lang: None,
            provider: result.provider.clone(),
            model: result.model.clone(),
            tokens_used: result.tokens_used,
            processing_time_ms: result.processing_time_ms,
            created_at: result.created_at,
        }
    }
}

/// AI usage counters for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageStat {
    pub date: NaiveDate,
    pub translate_count: i64,
    pub summarize_count: i64,
    pub total_tokens: i64,
    pub total_cost: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAiPreferences {
    pub user_id: i64,
    pub auto_translate: bool,
    pub auto_summarize: bool,
    pub preferred_lang: String,
    /// Zero means "use the configured default".
    pub max_summary_length: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAiPreferences {
    pub fn defaults(user_id: i64) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            auto_translate: false,
            auto_summarize: false,
            preferred_lang: DEFAULT_PREFERRED_LANG.to_string(),
            max_summary_length: DEFAULT_MAX_SUMMARY_LENGTH,
            created_at: now,
            updated_at: now,
        }
    }
}
