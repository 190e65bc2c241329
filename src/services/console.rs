use async_trait::async_trait;

use crate::delivery::Notifier;
use crate::error::Result;

/// Prints notifications to stdout instead of sending them.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn send_text(&self, recipient: i64, body: &str) -> Result<()> {
        println!("--- to {} ---\n{}\n", recipient, body);
        Ok(())
    }

    async fn send_photo(&self, recipient: i64, image_url: &str, caption: &str) -> Result<()> {
        println!("--- photo to {} ---\n[{}]\n{}\n", recipient, image_url, caption);
        Ok(())
    }
}
