use std::sync::Arc;

use chrono::Local;

use crate::db::Repository;
use crate::error::Result;
use crate::models::{AiOperation, UsageStat};

/// Price per 1K tokens.
pub fn cost_per_thousand(provider: &str) -> f64 {
    match provider {
        "openai" => 0.002,
        "anthropic" | "claude" => 0.003,
        _ => 0.002,
    }
}

pub fn cost_for(provider: &str, tokens: i64) -> f64 {
    tokens as f64 * cost_per_thousand(provider) / 1000.0
}

/// Accumulates per-day usage counters.
#[derive(Clone)]
pub struct UsageTracker {
    repo: Arc<Repository>,
}

impl UsageTracker {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }

    pub async fn record(&self, operation: AiOperation, provider: &str, tokens: i64) -> Result<()> {
        let today = Local::now().date_naive();
        self.repo
            .record_usage(today, operation, tokens, cost_for(provider, tokens))
            .await
    }

    pub async fn history(&self, days: u32) -> Result<Vec<UsageStat>> {
        self.repo.get_usage_stats(days).await
    }
}

pub fn format_usage_report(stats: &[UsageStat]) -> String {
    if stats.is_empty() {
        return "No AI usage recorded.".to_string();
    }

    let mut out = String::from("Date        Translate  Summarize     Tokens      Cost\n");
    let (mut translate, mut summarize, mut tokens, mut cost) = (0_i64, 0_i64, 0_i64, 0.0_f64);
    for stat in stats {
        out.push_str(&format!(
            "{}  {:>9}  {:>9}  {:>9}  ${:>8.4}\n",
            stat.date.format("%Y-%m-%d"),
            stat.translate_count,
            stat.summarize_count,
            stat.total_tokens,
            stat.total_cost
        ));
        translate += stat.translate_count;
        summarize += stat.summarize_count;
        tokens += stat.total_tokens;
        cost += stat.total_cost;
    }
    out.push_str(&format!(
        "Total       {:>9}  {:>9}  {:>9}  ${:>8.4}\n",
        translate, summarize, tokens, cost
    ));
    out
}
