use std::collections::HashMap;
use std::future::Future;

use tokio::time::{timeout_at, Instant};

use super::context::PipelineContext;
use crate::ai::AiError;
use crate::delivery::{Delivery, DeliveryQueue};
use crate::error::Result;
use crate::filter::RuleSet;
use crate::format::{format_keywords, render_text, ProcessedMessage};
use crate::models::{Message, Subscription, UserAiPreferences};

/// Inputs shorter than this are delivered without augmentation.
pub const MIN_AI_INPUT_CHARS: usize = 50;

/// Counts for one subscription in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    pub new_items: usize,
    pub deliveries: usize,
}

/// Fetch new items, match them per subscriber and enqueue notifications.
pub async fn process_subscription(
    ctx: &PipelineContext,
    subscription: &Subscription,
    rules: &HashMap<i64, RuleSet>,
    queue: &DeliveryQueue,
) -> Result<SubscriptionOutcome> {
    let messages = ctx.fetcher.fetch_new(subscription).await?;
    let mut outcome = SubscriptionOutcome {
        new_items: messages.len(),
        deliveries: 0,
    };
    if messages.is_empty() {
        tracing::debug!("{}: no new items", subscription.name);
        return Ok(outcome);
    }

    for message in &messages {
        for &user_id in &subscription.users {
            let Some(user_rules) = rules.get(&user_id).filter(|r| !r.is_empty()) else {
                continue;
            };
            let matched = user_rules.matches(message);
            if matched.is_empty() {
                continue;
            }

            tracing::debug!(
                "[{}] matched for user {}: {}",
                matched.join(", "),
                user_id,
                message.title
            );

            let processed = augment(ctx, user_id, message).await;
            let keywords = format_keywords(&matched);
            let outbound = ctx
                .formatter
                .render(&subscription.name, subscription.mode, &processed, &keywords);
            queue.enqueue(Delivery {
                recipient: user_id,
                source: subscription.name.clone(),
                outbound,
            });
            outcome.deliveries += 1;

            if let Some(admin) = ctx.settings.admin_chat_id {
                let copy = ctx
                    .formatter
                    .render_admin_copy(&subscription.name, subscription.mode, message);
                queue.enqueue(Delivery::text(admin, &subscription.name, copy));
            }
        }
    }

    tracing::info!(
        "{}: {} new items, {} notifications",
        subscription.name,
        outcome.new_items,
        outcome.deliveries
    );
    Ok(outcome)
}

async fn load_preferences(ctx: &PipelineContext, user_id: i64) -> UserAiPreferences {
    match ctx.repo.get_preferences(user_id).await {
        Ok(Some(prefs)) => prefs,
        Ok(None) => UserAiPreferences::defaults(user_id),
        Err(e) => {
            tracing::warn!("Failed to load AI preferences for {}: {}", user_id, e);
            UserAiPreferences::defaults(user_id)
        }
    }
}

/// Run whichever AI operations the user and configuration enable. Each
/// operation that fails or runs past the message deadline is left out.
async fn augment(ctx: &PipelineContext, user_id: i64, message: &Message) -> ProcessedMessage {
    let mut processed = ProcessedMessage::plain(message.clone());
    let Some(ai) = ctx.ai.as_ref() else {
        return processed;
    };

    let settings = &ctx.settings;
    let prefs = load_preferences(ctx, user_id).await;
    let want_translation = prefs.auto_translate && settings.translation_enabled;
    let want_summary = prefs.auto_summarize && settings.summarization_enabled;
    if !want_translation && !want_summary {
        return processed;
    }

    let input = format!("{} {}", message.title, render_text(&message.description));
    let input = input.trim();
    if input.chars().count() < MIN_AI_INPUT_CHARS {
        tracing::debug!("Skipping AI for short item: {}", message.title);
        return processed;
    }

    let deadline = Instant::now() + settings.message_timeout;

    if want_translation {
        processed.translation = run_bounded(
            deadline,
            "translation",
            ai.translate(input, "", &prefs.preferred_lang),
        )
        .await;
    }

    if want_summary {
        let max_length = match prefs.max_summary_length {
            0 => settings.summary_max_length,
            n => n,
        };
        processed.summary = run_bounded(
            deadline,
            "summary",
            ai.summarize(input, max_length, settings.summary_min_length),
        )
        .await;
    }

    processed
}

async fn run_bounded<T>(
    deadline: Instant,
    what: &str,
    call: impl Future<Output = std::result::Result<T, AiError>>,
) -> Option<T> {
    match timeout_at(deadline, call).await {
        Ok(Ok(result)) => Some(result),
        Ok(Err(e)) => {
            tracing::warn!("AI {} failed: {}", what, e);
            None
        }
        Err(_) => {
            tracing::warn!("AI {} timed out", what);
            None
        }
    }
}
