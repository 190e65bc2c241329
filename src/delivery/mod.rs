mod queue;

use async_trait::async_trait;

use crate::error::Result;

pub use queue::{DeliveryQueue, DeliveryReport, DeliveryWorker};

/// Chat transport. Implementations do not retry.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, recipient: i64, body: &str) -> Result<()>;

    async fn send_photo(&self, recipient: i64, image_url: &str, caption: &str) -> Result<()>;
}

/// A rendered notification body.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text { body: String },
    Photo { image_url: String, caption: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub recipient: i64,
    /// Subscription the notification came from, for logging.
    pub source: String,
    pub outbound: Outbound,
}

impl Delivery {
    pub fn text(recipient: i64, source: &str, body: String) -> Self {
        Self {
            recipient,
            source: source.to_string(),
            outbound: Outbound::Text { body },
        }
    }

    pub async fn send(&self, notifier: &dyn Notifier) -> Result<()> {
        match &self.outbound {
            Outbound::Text { body } => notifier.send_text(self.recipient, body).await,
            Outbound::Photo { image_url, caption } => {
                notifier.send_photo(self.recipient, image_url, caption).await
            }
        }
    }
}
