//! Extraction prompt construction.

use crate::models::RawArticle;

/// Fixed schema instructions sent as the system message for every batch.
pub const SYSTEM_INSTRUCTIONS: &str = r#"You are an analyst extracting structured conflict events from news articles.

Read the numbered articles and return a JSON array with zero or more event objects. Only include events describing armed conflict, military activity, or political violence. Each object must have exactly these fields:

{
  "title": "original headline of the incident",
  "enhanced_headline": "clear one-line restatement: who did what, where",
  "summary": "2-3 sentence factual summary",
  "country": "country name",
  "region": "state/province/oblast, empty string if unknown",
  "city": "city or town, empty string if unknown",
  "timestamp": "ISO 8601 timestamp of the incident itself",
  "temporal_confidence": 0.0 to 1.0 certainty about the timestamp,
  "severity": "low" | "medium" | "high" | "critical",
  "primary_actors": ["list of involved parties"],
  "casualties_killed": integer or null,
  "casualties_wounded": integer or null,
  "conflict_type": "airstrike, shelling, ambush, clash, etc.",
  "weapons": ["weapon types mentioned"],
  "source_url": "URL of the article the event came from",
  "confidence": 0.0 to 1.0 overall extraction confidence
}

Return [] if no article describes a conflict event. Return only the JSON array, no prose."#;

/// Renders one batch of articles as the user message.
pub fn build_extraction_prompt(batch: &[RawArticle]) -> String {
    let mut prompt = String::with_capacity(batch.len() * 256);
    prompt.push_str(&format!("Articles ({}):\n\n", batch.len()));
    for (index, article) in batch.iter().enumerate() {
        prompt.push_str(&format!(
            "[{}] {}\nURL: {}\nPublished: {}\nSource: {}\n{}\n\n",
            index + 1,
            article.title,
            article.url,
            article
                .pub_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string()),
            article.source,
            article.summary,
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_every_article_url() {
        let batch = vec![
            RawArticle {
                title: "A".to_string(),
                summary: "s1".to_string(),
                url: "https://example.com/1".to_string(),
                pub_date: None,
                source: "wire".to_string(),
            },
            RawArticle {
                title: "B".to_string(),
                summary: "s2".to_string(),
                url: "https://example.com/2".to_string(),
                pub_date: None,
                source: "wire".to_string(),
            },
        ];
        let prompt = build_extraction_prompt(&batch);
        assert!(prompt.contains("https://example.com/1"));
        assert!(prompt.contains("https://example.com/2"));
        assert!(prompt.starts_with("Articles (2):"));
    }
}
