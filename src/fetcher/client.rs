//! HTTP client creation and request handling for feeds.

use anyhow::{anyhow, Result};
use reqwest::header;
use std::time::Duration;
use tracing::debug;

use crate::TARGET_WEB_REQUEST;

/// Creates the shared HTTP client used for all feed requests in one run.
/// The timeout applies per request so a single slow feed cannot stall
/// the whole fetch phase.
pub fn create_http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .gzip(true)
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(reqwest::redirect::Policy::default())
        .build()
        .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))
}

/// Fetches a feed and returns its body as text. Non-2xx responses are
/// reported as errors so the caller can record the feed as failed.
pub async fn fetch_feed_body(client: &reqwest::Client, url: &str) -> Result<String> {
    debug!(target: TARGET_WEB_REQUEST, "Requesting feed {}", url);

    let response = client
        .get(url)
        .header(
            header::USER_AGENT,
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        )
        .header(
            header::ACCEPT,
            "application/rss+xml, application/atom+xml, application/xml, text/xml, */*;q=0.9",
        )
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(anyhow!("HTTP status {}", response.status()));
    }

    let body = response.text().await?;
    Ok(body)
}
