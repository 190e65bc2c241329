mod fetcher;
mod source;

pub use fetcher::FeedFetcher;
pub use source::{parse_feed, FeedSource, HttpFeedSource, MAX_FEED_SIZE};
