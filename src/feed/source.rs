use async_trait::async_trait;
use feed_rs::parser;
use futures::{pin_mut, Stream, StreamExt};
use reqwest::Client;

use crate::error::{AppError, Result};
use crate::models::FeedItem;

/// Upper bound on a downloaded feed document.
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// Something that can turn a feed URL into items.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>>;
}

/// Downloads feeds over HTTP and parses them with feed-rs.
pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<FeedItem>> {
        let parsed = url::Url::parse(url).map_err(|e| AppError::Parse(format!("invalid feed URL {}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppError::Parse(format!("unsupported URL scheme: {}", parsed.scheme())));
        }

        let response = self.client.get(parsed).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Network(format!("HTTP {} from {}", response.status(), url)));
        }

        if let Some(length) = response.content_length() {
            if length > MAX_FEED_SIZE {
                return Err(AppError::Network(format!(
                    "feed too large: {} bytes (max {} bytes)",
                    length, MAX_FEED_SIZE
                )));
            }
        }

        let bytes = read_capped(response.bytes_stream(), MAX_FEED_SIZE).await?;
        parse_feed(&bytes)
    }
}

/// Collect a body stream, giving up as soon as it grows past `limit` bytes.
async fn read_capped<S, B>(stream: S, limit: u64) -> Result<Vec<u8>>
where
    S: Stream<Item = reqwest::Result<B>>,
    B: AsRef<[u8]>,
{
    pin_mut!(stream);
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        body.extend_from_slice(chunk.as_ref());
        if body.len() as u64 > limit {
            return Err(AppError::Network(format!(
                "feed too large: more than {} bytes",
                limit
            )));
        }
    }
    Ok(body)
}

/// Parse an RSS/Atom document into items, in document order.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>> {
    let feed = parser::parse(bytes)?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| {
            // Summary maps to RSS <description>; fall back to full content
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            FeedItem {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                description,
                link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
                published: entry.published,
                updated: entry.updated,
            }
        })
        .collect())
}
