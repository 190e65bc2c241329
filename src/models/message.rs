use chrono::{DateTime, Utc};

/// One entry as returned by a feed source, before deduplication.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
}

impl FeedItem {
    /// Published time, then updated time, then `fetched_at`.
    pub fn effective_time(&self, fetched_at: DateTime<Utc>) -> DateTime<Utc> {
        self.published.or(self.updated).unwrap_or(fetched_at)
    }

    pub fn into_message(self, fetched_at: DateTime<Utc>) -> Message {
        let published = self.effective_time(fetched_at);
        Message {
            title: self.title,
            description: self.description,
            link: self.link,
            published,
        }
    }
}

/// A new feed item on its way to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published: DateTime<Utc>,
}
