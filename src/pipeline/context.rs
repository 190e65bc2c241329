use std::sync::Arc;
use std::time::Duration;

use crate::ai::AiOrchestrator;
use crate::config::Config;
use crate::db::Repository;
use crate::delivery::Notifier;
use crate::error::Result;
use crate::feed::{FeedFetcher, FeedSource};
use crate::format::NotificationFormatter;

/// Knobs the pipeline reads on every cycle.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub admin_chat_id: Option<i64>,
    pub translation_enabled: bool,
    pub summarization_enabled: bool,
    pub summary_max_length: u32,
    pub summary_min_length: u32,
    /// Shared by every AI operation on one notification.
    pub message_timeout: Duration,
    pub max_concurrent_feeds: usize,
    pub delivery_concurrency: usize,
    pub await_delivery: bool,
    pub cache_retention_days: Option<u32>,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        let features = &config.ai.features;
        Self {
            admin_chat_id: config.admin_chat_id,
            translation_enabled: features.translation.enabled,
            summarization_enabled: features.summarization.enabled,
            summary_max_length: features.summarization.max_length,
            summary_min_length: features.summarization.min_length,
            message_timeout: config.ai.message_timeout(),
            max_concurrent_feeds: config.max_concurrent_feeds,
            delivery_concurrency: config.delivery_concurrency,
            await_delivery: config.await_delivery,
            cache_retention_days: config.ai.cache_retention_days,
        }
    }
}

/// Everything a cycle needs, passed explicitly to each stage.
pub struct PipelineContext {
    pub repo: Arc<Repository>,
    pub fetcher: FeedFetcher,
    pub ai: Option<AiOrchestrator>,
    pub notifier: Arc<dyn Notifier>,
    pub formatter: NotificationFormatter,
    pub settings: PipelineSettings,
}

impl PipelineContext {
    pub fn new(
        repo: Arc<Repository>,
        source: Arc<dyn FeedSource>,
        ai: Option<AiOrchestrator>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            fetcher: FeedFetcher::new(source, repo.clone()),
            repo,
            ai,
            notifier,
            formatter: NotificationFormatter::new(config.utc_offset()?),
            settings: PipelineSettings::from_config(config),
        })
    }
}
