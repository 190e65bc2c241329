use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Upstream proxy for feed downloads (http, https or socks5 URL).
    pub proxy_url: Option<String>,

    /// Receives an abbreviated copy of every delivered notification.
    pub admin_chat_id: Option<i64>,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_minutes: u32,

    /// Offset used when rendering publication times.
    #[serde(default = "default_utc_offset")]
    pub utc_offset_hours: i32,

    #[serde(default = "default_max_concurrent_feeds")]
    pub max_concurrent_feeds: usize,

    #[serde(default = "default_delivery_concurrency")]
    pub delivery_concurrency: usize,

    /// Wait for the delivery queue to drain before a cycle reports completion.
    #[serde(default = "default_true")]
    pub await_delivery: bool,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub ai: AiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub provider: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Proxy for provider calls only; feed traffic uses the top-level proxy.
    pub proxy_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Bound on a single provider call.
    pub timeout_secs: u64,
    /// Bound on all augmentation work for one notification.
    pub message_timeout_secs: u64,
    /// Cache records older than this are pruned at cycle start. Unset keeps them forever.
    pub cache_retention_days: Option<u32>,
    pub features: AiFeatures,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".to_string(),
            api_key: String::new(),
            base_url: None,
            model: None,
            proxy_url: None,
            max_tokens: 1000,
            temperature: 0.3,
            timeout_secs: 30,
            message_timeout_secs: 30,
            cache_retention_days: None,
            features: AiFeatures::default(),
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn message_timeout(&self) -> Duration {
        Duration::from_secs(self.message_timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AiFeatures {
    pub translation: TranslationFeature,
    pub summarization: SummarizationFeature,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationFeature {
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationFeature {
    pub enabled: bool,
    pub max_length: u32,
    pub min_length: u32,
}

impl Default for SummarizationFeature {
    fn default() -> Self {
        Self {
            enabled: false,
            max_length: 200,
            min_length: 100,
        }
    }
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rss-relay");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("relay.db").to_string_lossy().to_string()
}

fn default_refresh_interval() -> u32 {
    5
}

fn default_utc_offset() -> i32 {
    8
}

fn default_max_concurrent_feeds() -> usize {
    16
}

fn default_delivery_concurrency() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            proxy_url: None,
            admin_chat_id: None,
            refresh_interval_minutes: default_refresh_interval(),
            utc_offset_hours: default_utc_offset(),
            max_concurrent_feeds: default_max_concurrent_feeds(),
            delivery_concurrency: default_delivery_concurrency(),
            await_delivery: true,
            telegram: TelegramConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Read `path`, writing a default file there first if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rss-relay")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_feeds == 0 || self.delivery_concurrency == 0 {
            return Err(AppError::Config(
                "max_concurrent_feeds and delivery_concurrency must be at least 1".to_string(),
            ));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(AppError::Config(format!(
                "utc_offset_hours out of range: {}",
                self.utc_offset_hours
            )));
        }
        if self.ai.enabled && self.ai.api_key.trim().is_empty() {
            return Err(AppError::Config("ai.api_key is required when ai.enabled".to_string()));
        }
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!("utc_offset_hours out of range: {}", self.utc_offset_hours))
        })
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.refresh_interval_minutes.max(1)) * 60)
    }
}
