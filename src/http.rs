use std::time::Duration;

use reqwest::{Client, Proxy};

use crate::error::{AppError, Result};

const USER_AGENT: &str = concat!("rss-relay/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT_SECS: u64 = 10;
const POOL_MAX_IDLE_PER_HOST: usize = 10;
const POOL_IDLE_TIMEOUT_SECS: u64 = 30;

/// Shared HTTP client with a bounded idle pool and an optional upstream proxy.
pub fn build_client(proxy_url: Option<&str>, timeout: Duration) -> Result<Client> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
        .user_agent(USER_AGENT);

    if let Some(proxy) = proxy_url.map(str::trim).filter(|p| !p.is_empty()) {
        let proxy = Proxy::all(proxy)
            .map_err(|e| AppError::Config(format!("invalid proxy URL {}: {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))
}
