//! Cache-first front end over an [`AiProvider`].
//!
//! A request is hashed, answered from the content cache when possible, and
//! otherwise forwarded to the provider under the configured timeout. Only
//! successful provider calls are cached and counted toward usage.
//!
//! Concurrent requests for the same digest are serialised: the first caller
//! talks to the provider, the rest wait and then find its result in the cache.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use super::cache::{content_hash, ContentCache};
use super::provider::{AiError, AiErrorKind, AiProvider};
use super::usage::UsageTracker;
use crate::db::Repository;
use crate::models::{AiOperation, CacheRecord, SummaryResult, TranslateResult};

/// Per-digest locks for requests currently talking to the provider.
#[derive(Default)]
struct InFlight {
    slots: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl InFlight {
    async fn enter(&self, hash: &str) -> FlightGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(hash.to_string()).or_default().clone()
        };
        FlightGuard {
            in_flight: self,
            hash: hash.to_string(),
            guard: Some(slot.lock_owned().await),
        }
    }
}

/// Holds a digest's lock; the slot is removed once nobody else wants it.
struct FlightGuard<'a> {
    in_flight: &'a InFlight,
    hash: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self
            .in_flight
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(&self.hash)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.hash);
        }
    }
}

pub struct AiOrchestrator {
    provider: Arc<dyn AiProvider>,
    cache: ContentCache,
    usage: UsageTracker,
    timeout: Duration,
    in_flight: InFlight,
}

impl AiOrchestrator {
    pub fn new(provider: Arc<dyn AiProvider>, repo: Arc<Repository>, timeout: Duration) -> Self {
        Self {
            provider,
            cache: ContentCache::new(repo.clone()),
            usage: UsageTracker::new(repo),
            timeout,
            in_flight: InFlight::default(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn AiProvider> {
        &self.provider
    }

    pub async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<TranslateResult, AiError> {
        let hash = content_hash(AiOperation::Translate, text, &[source_lang, target_lang]);
        if let Some(record) = self.cached(&hash, AiOperation::Translate).await {
            tracing::debug!("Translation cache hit {}", &hash[..12]);
            return Ok(TranslateResult::from_record(record));
        }

        let _flight = self.in_flight.enter(&hash).await;
        if let Some(record) = self.cached(&hash, AiOperation::Translate).await {
            tracing::debug!("Translation finished by a concurrent request {}", &hash[..12]);
            return Ok(TranslateResult::from_record(record));
        }

        let result = self
            .bounded(self.provider.translate(text, source_lang, target_lang))
            .await?;

        self.remember(CacheRecord::from_translation(hash, &result)).await;
        self.account(AiOperation::Translate, result.tokens_used).await;
        Ok(result)
    }

    pub async fn summarize(
        &self,
        text: &str,
        max_length: u32,
        min_length: u32,
    ) -> Result<SummaryResult, AiError> {
        let bounds = format!("{}-{}", max_length, min_length);
        let hash = content_hash(AiOperation::Summarize, text, &[&bounds]);
        if let Some(record) = self.cached(&hash, AiOperation::Summarize).await {
            tracing::debug!("Summary cache hit {}", &hash[..12]);
            return Ok(SummaryResult::from_record(record, max_length, min_length));
        }

        let _flight = self.in_flight.enter(&hash).await;
        if let Some(record) = self.cached(&hash, AiOperation::Summarize).await {
            tracing::debug!("Summary finished by a concurrent request {}", &hash[..12]);
            return Ok(SummaryResult::from_record(record, max_length, min_length));
        }

        let result = self
            .bounded(self.provider.summarize(text, max_length, min_length))
            .await?;

        self.remember(CacheRecord::from_summary(hash, &result)).await;
        self.account(AiOperation::Summarize, result.tokens_used).await;
        Ok(result)
    }

    pub async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, AiError>
    where
        F: std::future::Future<Output = Result<T, AiError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(AiError::new(
                self.provider.name(),
                "timeout",
                format!("no response within {}s", self.timeout.as_secs()),
                AiErrorKind::Network,
            )),
        }
    }

    async fn cached(&self, hash: &str, operation: AiOperation) -> Option<CacheRecord> {
        match self.cache.lookup(hash, operation).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Cache lookup failed: {}", e);
                None
            }
        }
    }

    async fn remember(&self, record: CacheRecord) {
        if let Err(e) = self.cache.store(record).await {
            tracing::warn!("Failed to cache AI result: {}", e);
        }
    }

    async fn account(&self, operation: AiOperation, tokens: i64) {
        if let Err(e) = self.usage.record(operation, self.provider.name(), tokens).await {
            tracing::warn!("Failed to record AI usage: {}", e);
        }
    }
}
