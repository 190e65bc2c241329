use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::context::PipelineContext;
use super::processor::process_subscription;
use crate::delivery::DeliveryQueue;
use crate::error::Result;
use crate::filter::RuleSet;

/// Totals for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub subscriptions: usize,
    pub failures: usize,
    pub new_items: usize,
    pub deliveries: usize,
    /// Only counted when the cycle waits for the delivery queue.
    pub delivered: usize,
    pub delivery_failures: usize,
}

pub struct CycleCoordinator {
    ctx: Arc<PipelineContext>,
}

impl CycleCoordinator {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<PipelineContext> {
        &self.ctx
    }

    /// Process every subscription once.
    ///
    /// Subscriptions and keywords are read once at the start; edits made
    /// while the cycle runs are seen by the next one. Failures inside a
    /// subscription are logged and counted, never returned.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started = Instant::now();
        let ctx = &self.ctx;

        self.prune_cache().await;

        let subscriptions = ctx.repo.get_subscriptions().await?;
        let mut report = CycleReport {
            subscriptions: subscriptions.len(),
            ..CycleReport::default()
        };
        if subscriptions.is_empty() {
            tracing::info!("No subscriptions configured");
            return Ok(report);
        }

        let rules: HashMap<i64, RuleSet> = ctx
            .repo
            .get_user_keywords()
            .await?
            .into_iter()
            .map(|(user_id, keywords)| (user_id, RuleSet::compile(&keywords)))
            .collect();
        let rules = Arc::new(rules);

        let (queue, worker) =
            DeliveryQueue::start(ctx.notifier.clone(), ctx.settings.delivery_concurrency);
        let permits = Arc::new(Semaphore::new(ctx.settings.max_concurrent_feeds.max(1)));

        let mut tasks = JoinSet::new();
        for subscription in subscriptions {
            let ctx = ctx.clone();
            let rules = rules.clone();
            let queue = queue.clone();
            let permits = permits.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let result = process_subscription(&ctx, &subscription, &rules, &queue).await;
                (subscription.name, result)
            });
        }
        drop(queue);

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(outcome))) => {
                    report.new_items += outcome.new_items;
                    report.deliveries += outcome.deliveries;
                }
                Ok((name, Err(e))) => {
                    tracing::error!("Failed to process {}: {}", name, e);
                    report.failures += 1;
                }
                Err(e) => {
                    tracing::error!("Subscription task aborted: {}", e);
                    report.failures += 1;
                }
            }
        }

        if ctx.settings.await_delivery {
            let delivery = worker.finish().await;
            report.delivered = delivery.delivered;
            report.delivery_failures = delivery.failed;
        } else {
            tokio::spawn(async move {
                let delivery = worker.finish().await;
                tracing::info!(
                    "Background delivery finished: {} sent, {} failed",
                    delivery.delivered,
                    delivery.failed
                );
            });
        }

        tracing::info!(
            "Cycle finished in {:.1?}: {} subscriptions ({} failed), {} new items, {} notifications",
            started.elapsed(),
            report.subscriptions,
            report.failures,
            report.new_items,
            report.deliveries
        );
        Ok(report)
    }

    async fn prune_cache(&self) {
        let Some(days) = self.ctx.settings.cache_retention_days else {
            return;
        };
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        match self.ctx.repo.prune_cache(cutoff).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Pruned {} AI cache records older than {} days", n, days),
            Err(e) => tracing::warn!("Failed to prune AI cache: {}", e),
        }
    }
}
