use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::delivery::Notifier;
use crate::error::{AppError, Result};

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: i64,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API sender using HTML parse mode.
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(client: Client, api_base: &str, bot_token: &str) -> Self {
        Self {
            client,
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), bot_token),
        }
    }

    async fn call<T: Serialize + ?Sized>(&self, method: &str, body: &T) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::Delivery(format!("{} request failed: {}", method, e.without_url())))?;

        let status = response.status();
        let text = response.text().await?;

        match serde_json::from_str::<ApiResponse>(&text) {
            Ok(ApiResponse { ok: true, .. }) => Ok(()),
            Ok(ApiResponse { description, .. }) => Err(AppError::Delivery(format!(
                "{} rejected ({}): {}",
                method,
                status,
                description.unwrap_or_default()
            ))),
            Err(_) => Err(AppError::Delivery(format!("{} returned HTTP {}: {}", method, status, text))),
        }
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_text(&self, recipient: i64, body: &str) -> Result<()> {
        let request = SendMessageRequest {
            chat_id: recipient,
            text: body,
            parse_mode: "HTML",
        };
        self.call("sendMessage", &request).await
    }

    async fn send_photo(&self, recipient: i64, image_url: &str, caption: &str) -> Result<()> {
        let request = SendPhotoRequest {
            chat_id: recipient,
            photo: image_url,
            caption,
            parse_mode: "HTML",
        };
        self.call("sendPhoto", &request).await
    }
}
