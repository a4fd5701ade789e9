//! Feed parsing for RSS and Atom, tolerant of malformed XML.

use anyhow::{anyhow, Result};
use chrono::{Duration as ChronoDuration, Utc};
use feed_rs::parser;
use std::io::Cursor;
use tracing::debug;

use super::util::cleanup_xml;
use crate::models::RawArticle;
use crate::TARGET_WEB_REQUEST;

/// Parses a feed body into normalized articles. Falls back to a cleanup
/// pass for feeds with undeclared entities or stray control characters.
/// Articles older than `max_age_days` are dropped at parse time.
pub fn parse_feed(text: &str, source: &str, max_age_days: i64) -> Result<Vec<RawArticle>> {
    let reader = Cursor::new(text);
    match parser::parse(reader) {
        Ok(feed) => Ok(collect_articles(feed, source, max_age_days)),
        Err(first_err) => {
            let cleaned = cleanup_xml(text);
            if cleaned.contains("<rss") || cleaned.contains("<feed") {
                let reader = Cursor::new(&cleaned);
                match parser::parse(reader) {
                    Ok(feed) => {
                        debug!(target: TARGET_WEB_REQUEST, "Feed from {} parsed after XML cleanup", source);
                        Ok(collect_articles(feed, source, max_age_days))
                    }
                    Err(second_err) => Err(anyhow!(
                        "failed to parse feed even after cleanup. First error: {}. Second error: {}",
                        first_err,
                        second_err
                    )),
                }
            } else {
                Err(anyhow!("content is not an RSS or Atom feed: {}", first_err))
            }
        }
    }
}

fn collect_articles(feed: feed_rs::model::Feed, source: &str, max_age_days: i64) -> Vec<RawArticle> {
    let cutoff = Utc::now() - ChronoDuration::days(max_age_days);
    let mut articles = Vec::new();

    for entry in feed.entries {
        let url = match entry.links.first().map(|link| link.href.clone()) {
            Some(url) => url,
            None => continue,
        };
        let title = match entry.title {
            Some(title) => title.content,
            None => continue,
        };
        let summary = entry
            .summary
            .map(|s| s.content)
            .unwrap_or_default();
        let pub_date = entry.published.or(entry.updated);

        // Stale entries are not worth extraction; feeds routinely re-serve
        // their whole archive after a format change.
        if let Some(date) = pub_date {
            if date < cutoff {
                debug!(target: TARGET_WEB_REQUEST, "Skipping old article: {} ({})", url, date);
                continue;
            }
        }

        articles.push(RawArticle {
            title,
            summary,
            url,
            pub_date,
            source: source.to_string(),
        });
    }

    articles
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>World News</title>
    <item>
      <title><![CDATA[Shelling reported near Kharkiv &#8211; officials]]></title>
      <link>https://example.com/a1</link>
      <description><![CDATA[Artillery fire struck the city outskirts.]]></description>
    </item>
    <item>
      <title>Market roundup</title>
      <link>https://example.com/a2</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_cdata_and_entities() {
        let articles = parse_feed(SAMPLE_RSS, "example", 7).unwrap();
        assert_eq!(articles.len(), 2);
        assert!(articles[0].title.contains("Kharkiv"));
        assert_eq!(articles[0].summary, "Artillery fire struck the city outskirts.");
        // Missing description tolerated
        assert_eq!(articles[1].summary, "");
    }

    #[test]
    fn recovers_from_undeclared_entities() {
        let dirty = SAMPLE_RSS.replace("&#8211;", "&ndash;");
        let articles = parse_feed(&dirty, "example", 7).unwrap();
        assert_eq!(articles.len(), 2);
    }

    #[test]
    fn rejects_non_feed_content() {
        assert!(parse_feed("<html><body>not a feed</body></html>", "example", 7).is_err());
    }

    #[test]
    fn drops_articles_past_age_cutoff() {
        let old = r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>
<item><title>old</title><link>https://example.com/old</link>
<pubDate>Mon, 01 Jan 2018 00:00:00 GMT</pubDate></item>
</channel></rss>"#;
        let articles = parse_feed(old, "example", 7).unwrap();
        assert!(articles.is_empty());
    }
}
