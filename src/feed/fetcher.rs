use std::sync::Arc;

use chrono::Utc;

use super::source::FeedSource;
use crate::db::Repository;
use crate::error::Result;
use crate::models::{Message, Subscription};

/// Computes the new-item set of a feed against its stored cursor.
pub struct FeedFetcher {
    source: Arc<dyn FeedSource>,
    repo: Arc<Repository>,
}

impl FeedFetcher {
    pub fn new(source: Arc<dyn FeedSource>, repo: Arc<Repository>) -> Self {
        Self { source, repo }
    }

    /// Items published after the subscription's cursor, in feed order.
    ///
    /// The first fetch of a feed returns nothing and records the newest item
    /// time as the baseline. The cursor only ever moves forward.
    pub async fn fetch_new(&self, subscription: &Subscription) -> Result<Vec<Message>> {
        let items = self.source.fetch(&subscription.url).await?;
        if items.is_empty() {
            tracing::debug!("{}: feed is empty", subscription.name);
            return Ok(Vec::new());
        }

        let fetched_at = Utc::now();
        let cursor = self.repo.get_cursor(&subscription.name).await?;

        let latest_title = items[0].title.clone();
        let newest = items
            .iter()
            .map(|item| item.effective_time(fetched_at))
            .max()
            .unwrap_or(fetched_at);

        let messages: Vec<Message> = match cursor {
            Some(last) => items
                .into_iter()
                .map(|item| item.into_message(fetched_at))
                .filter(|msg| msg.published > last)
                .collect(),
            None => {
                tracing::info!("{}: first fetch, recording baseline", subscription.name);
                Vec::new()
            }
        };

        if cursor.map_or(true, |last| newest > last) {
            self.repo
                .advance_cursor(&subscription.name, newest, &latest_title)
                .await?;
        }

        Ok(messages)
    }
}
