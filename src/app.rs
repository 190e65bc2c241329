use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::ai::{format_usage_report, AiOrchestrator, AiProvider, ProviderRegistry};
use crate::config::Config;
use crate::db::Repository;
use crate::delivery::Notifier;
use crate::error::{AppError, Result};
use crate::feed::HttpFeedSource;
use crate::http::build_client;
use crate::models::{DeliveryMode, UserAiPreferences};
use crate::pipeline::{CycleCoordinator, CycleReport, PipelineContext};
use crate::services::{ConsoleNotifier, TelegramClient};

const FEED_TIMEOUT_SECS: u64 = 30;

/// Seed file accepted by `--import`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SeedFile {
    pub subscriptions: Vec<SeedSubscription>,
    pub keywords: Vec<SeedKeywords>,
    pub preferences: Vec<SeedPreferences>,
}

#[derive(Debug, Deserialize)]
pub struct SeedSubscription {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub mode: DeliveryMode,
    #[serde(default)]
    pub users: Vec<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SeedKeywords {
    pub user_id: i64,
    pub keywords: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedPreferences {
    pub user_id: i64,
    #[serde(default)]
    pub auto_translate: bool,
    #[serde(default)]
    pub auto_summarize: bool,
    pub preferred_lang: Option<String>,
    pub max_summary_length: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub subscriptions: usize,
    pub keyword_sets: usize,
    pub preferences: usize,
}

pub struct App {
    config: Config,
    repository: Arc<Repository>,
}

impl App {
    pub async fn new(config: Config) -> Result<Self> {
        let repository = Arc::new(Repository::new(&config.db_path).await?);
        Ok(Self { config, repository })
    }

    pub fn with_repository(config: Config, repository: Arc<Repository>) -> Self {
        Self { config, repository }
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    fn resolve_provider(&self) -> Result<Arc<dyn AiProvider>> {
        let ai = &self.config.ai;
        let proxy = ai.proxy_url.as_deref().or(self.config.proxy_url.as_deref());
        let client = build_client(proxy, ai.timeout())?;
        ProviderRegistry::with_builtin().resolve(ai, client)
    }

    fn build_notifier(&self, dry_run: bool) -> Result<Arc<dyn Notifier>> {
        if dry_run {
            return Ok(Arc::new(ConsoleNotifier));
        }
        let telegram = &self.config.telegram;
        let token = telegram
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config("telegram.bot_token is required unless --dry-run is given".to_string())
            })?;
        let client = build_client(self.config.proxy_url.as_deref(), Duration::from_secs(FEED_TIMEOUT_SECS))?;
        Ok(Arc::new(TelegramClient::new(client, &telegram.api_base, token)))
    }

    pub fn build_coordinator(&self, dry_run: bool) -> Result<CycleCoordinator> {
        let feed_client = build_client(
            self.config.proxy_url.as_deref(),
            Duration::from_secs(FEED_TIMEOUT_SECS),
        )?;
        let source = Arc::new(HttpFeedSource::new(feed_client));

        let ai = if self.config.ai.enabled {
            let provider = self.resolve_provider()?;
            tracing::info!("AI enabled: {} ({})", provider.name(), provider.model());
            Some(AiOrchestrator::new(
                provider,
                self.repository.clone(),
                self.config.ai.timeout(),
            ))
        } else {
            None
        };

        let context = PipelineContext::new(
            self.repository.clone(),
            source,
            ai,
            self.build_notifier(dry_run)?,
            &self.config,
        )?;
        Ok(CycleCoordinator::new(Arc::new(context)))
    }

    /// One cycle. Always waits for deliveries, since the process exits next.
    pub async fn run_once(&self, dry_run: bool) -> Result<CycleReport> {
        let mut config = self.config.clone();
        config.await_delivery = true;
        let app = App::with_repository(config, self.repository.clone());
        app.build_coordinator(dry_run)?.run_cycle().await
    }

    /// Run cycles on the configured interval until Ctrl-C.
    pub async fn run_forever(&self, dry_run: bool) -> Result<()> {
        let coordinator = self.build_coordinator(dry_run)?;
        let mut interval = tokio::time::interval(self.config.refresh_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            "Checking feeds every {} minutes",
            self.config.refresh_interval().as_secs() / 60
        );

        // A cycle already running is finished before shutting down.
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = coordinator.run_cycle().await {
                        tracing::error!("Cycle failed: {}", e);
                    }
                }
                _ = &mut shutdown => {
                    tracing::info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }

    pub async fn usage_report(&self, days: u32) -> Result<String> {
        let stats = self.repository.get_usage_stats(days).await?;
        Ok(format_usage_report(&stats))
    }

    pub async fn check_ai(&self) -> Result<bool> {
        if !self.config.ai.enabled {
            return Err(AppError::Config("AI is disabled in the configuration".to_string()));
        }
        let provider = self.resolve_provider()?;
        Ok(provider.is_available().await)
    }

    pub async fn import_seed(&self, path: &Path) -> Result<ImportSummary> {
        let content = std::fs::read_to_string(path)?;
        let seed: SeedFile = toml::from_str(&content)?;
        self.apply_seed(seed).await
    }

    pub async fn apply_seed(&self, seed: SeedFile) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();

        for sub in seed.subscriptions {
            let id = self
                .repository
                .upsert_subscription(&sub.name, &sub.url, sub.mode, &sub.users)
                .await?;
            tracing::info!("Imported subscription {} (#{})", sub.name, id);
            summary.subscriptions += 1;
        }

        for entry in seed.keywords {
            self.repository
                .set_user_keywords(entry.user_id, &entry.keywords)
                .await?;
            summary.keyword_sets += 1;
        }

        for entry in seed.preferences {
            let mut prefs = self
                .repository
                .get_preferences(entry.user_id)
                .await?
                .unwrap_or_else(|| UserAiPreferences::defaults(entry.user_id));
            prefs.auto_translate = entry.auto_translate;
            prefs.auto_summarize = entry.auto_summarize;
            if let Some(lang) = entry.preferred_lang {
                prefs.preferred_lang = lang;
            }
            if let Some(max) = entry.max_summary_length {
                prefs.max_summary_length = max;
            }
            self.repository.upsert_preferences(&prefs).await?;
            summary.preferences += 1;
        }

        Ok(summary)
    }
}
