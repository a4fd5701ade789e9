//! Parallel feed retrieval and normalization into [`RawArticle`]s.

pub mod client;
pub mod parser;
pub mod util;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::{FeedConfig, PipelineConfig};
use crate::models::{FeedOutcome, RawArticle};
use crate::TARGET_WEB_REQUEST;

/// Fetches every configured feed with bounded concurrency and flattens the
/// results. One slow or broken feed yields an error outcome for that feed
/// only; it never aborts the run.
pub async fn fetch_all_feeds(
    config: &PipelineConfig,
) -> (Vec<RawArticle>, Vec<FeedOutcome>) {
    let client = match client::create_http_client(config.fetch_timeout_secs) {
        Ok(client) => client,
        Err(err) => {
            // Without a client no feed can be fetched; report every feed as failed.
            let outcomes = config
                .feeds
                .iter()
                .map(|feed| FeedOutcome {
                    source: feed.name.clone(),
                    url: feed.url.clone(),
                    articles: 0,
                    error: Some(format!("failed to build HTTP client: {}", err)),
                })
                .collect();
            return (Vec::new(), outcomes);
        }
    };

    let results: Vec<(Vec<RawArticle>, FeedOutcome)> = stream::iter(config.feeds.clone())
        .map(|feed| {
            let client = client.clone();
            let max_age_days = config.max_article_age_days;
            async move { fetch_one_feed(&client, &feed, max_age_days).await }
        })
        .buffer_unordered(config.fetch_concurrency)
        .collect()
        .await;

    let mut articles = Vec::new();
    let mut outcomes = Vec::new();
    for (mut feed_articles, outcome) in results {
        if let Some(err) = &outcome.error {
            warn!(target: TARGET_WEB_REQUEST, "Feed {} failed: {}", outcome.url, err);
        } else {
            debug!(target: TARGET_WEB_REQUEST, "Feed {} yielded {} articles", outcome.url, outcome.articles);
        }
        articles.append(&mut feed_articles);
        outcomes.push(outcome);
    }

    info!(
        target: TARGET_WEB_REQUEST,
        "Fetched {} articles from {} feeds ({} failed)",
        articles.len(),
        outcomes.len(),
        outcomes.iter().filter(|o| !o.succeeded()).count()
    );

    (articles, outcomes)
}

async fn fetch_one_feed(
    client: &reqwest::Client,
    feed: &FeedConfig,
    max_age_days: i64,
) -> (Vec<RawArticle>, FeedOutcome) {
    let mut outcome = FeedOutcome {
        source: feed.name.clone(),
        url: feed.url.clone(),
        articles: 0,
        error: None,
    };

    if !util::is_valid_url(&feed.url) {
        outcome.error = Some("invalid URL".to_string());
        return (Vec::new(), outcome);
    }

    let body = match client::fetch_feed_body(client, &feed.url).await {
        Ok(body) => body,
        Err(err) => {
            outcome.error = Some(err.to_string());
            return (Vec::new(), outcome);
        }
    };

    match parser::parse_feed(&body, &feed.name, max_age_days) {
        Ok(articles) => {
            outcome.articles = articles.len();
            (articles, outcome)
        }
        Err(err) => {
            outcome.error = Some(format!("parse error: {}", err));
            (Vec::new(), outcome)
        }
    }
}
