//! LLM-assisted structured event extraction.

pub mod fallback;
pub mod llm;
pub mod prompt;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::{CandidateEvent, Casualties, RawArticle, Severity};
use crate::{LlmParams, TARGET_LLM_REQUEST};

/// Narrow contract with the text-completion service: a batch of articles in,
/// zero or more candidate events out. Any implementation (remote API, local
/// model, test fake) satisfies the same trait.
#[async_trait]
pub trait EventExtractor: Send + Sync {
    async fn extract(&self, batch: &[RawArticle]) -> Result<Vec<CandidateEvent>>;
}

/// Extractor backed by a completion service. Responses are parsed
/// defensively: fenced or partial JSON never aborts the run, it just yields
/// zero events for the batch.
pub struct LlmExtractor {
    params: LlmParams,
    confidence_floor: f64,
    timeout_secs: u64,
}

impl LlmExtractor {
    pub fn new(params: LlmParams, confidence_floor: f64, timeout_secs: u64) -> Self {
        Self {
            params,
            confidence_floor,
            timeout_secs,
        }
    }
}

#[async_trait]
impl EventExtractor for LlmExtractor {
    async fn extract(&self, batch: &[RawArticle]) -> Result<Vec<CandidateEvent>> {
        let prompt = prompt::build_extraction_prompt(batch);
        let response =
            match llm::generate_llm_response(&prompt, &self.params, self.timeout_secs).await {
                Some(response) => response,
                None => {
                    // Service is down or rate limited; degrade to the
                    // pattern-based extractor rather than producing nothing.
                    warn!(target: TARGET_LLM_REQUEST, "LLM path failed for batch of {}, using pattern fallback", batch.len());
                    return Ok(batch
                        .iter()
                        .filter_map(fallback::pattern_extract)
                        .collect());
                }
            };

        Ok(parse_candidates(&response, batch, self.confidence_floor))
    }
}

/// Wire shape the extraction prompt asks for. Every field the model might
/// omit defaults rather than failing the whole array.
#[derive(Debug, Deserialize)]
struct ExtractedEvent {
    title: String,
    #[serde(default)]
    enhanced_headline: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    country: String,
    #[serde(default)]
    region: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    temporal_confidence: f64,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    primary_actors: Vec<String>,
    #[serde(default)]
    casualties_killed: Option<i64>,
    #[serde(default)]
    casualties_wounded: Option<i64>,
    #[serde(default)]
    conflict_type: String,
    #[serde(default)]
    weapons: Vec<String>,
    #[serde(default)]
    source_url: String,
    #[serde(default)]
    confidence: f64,
}

/// Strips Markdown code fences the model may wrap its JSON in.
pub fn strip_code_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parses a completion response into candidate events. Malformed JSON is
/// treated as zero events from this batch; candidates below the confidence
/// floor are dropped.
pub fn parse_candidates(
    response: &str,
    batch: &[RawArticle],
    confidence_floor: f64,
) -> Vec<CandidateEvent> {
    let cleaned = strip_code_fences(response);

    let extracted: Vec<ExtractedEvent> = match serde_json::from_str(cleaned) {
        Ok(events) => events,
        Err(err) => {
            warn!(target: TARGET_LLM_REQUEST, "Unparsable extraction response ({}), treating as zero events", err);
            return Vec::new();
        }
    };

    let mut candidates = Vec::new();
    for event in extracted {
        if event.confidence > 0.0 && event.confidence < confidence_floor {
            debug!(
                target: TARGET_LLM_REQUEST,
                "Dropping low-confidence candidate '{}' ({:.2})", event.title, event.confidence
            );
            continue;
        }
        if event.title.trim().is_empty() {
            continue;
        }

        let timestamp = DateTime::parse_from_rfc3339(&event.timestamp)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| crate::fetcher::util::parse_date(&event.timestamp));
        // Candidates with an unparsable timestamp fall back to the
        // publication date of their source article.
        let source_url = if event.source_url.is_empty() {
            batch.first().map(|a| a.url.clone()).unwrap_or_default()
        } else {
            event.source_url.clone()
        };
        let timestamp = timestamp
            .or_else(|| {
                batch
                    .iter()
                    .find(|a| a.url == source_url)
                    .and_then(|a| a.pub_date)
            })
            .unwrap_or_else(Utc::now);

        let enhanced_headline = if event.enhanced_headline.is_empty() {
            event.title.clone()
        } else {
            event.enhanced_headline
        };

        candidates.push(CandidateEvent {
            title: event.title,
            enhanced_headline,
            summary: event.summary,
            country: event.country,
            region: event.region,
            city: event.city,
            timestamp,
            temporal_confidence: event.temporal_confidence,
            severity: Severity::parse(&event.severity),
            escalation_score: 0,
            primary_actors: event.primary_actors,
            // Negative counts are extraction noise; store them as unknown.
            casualties: Casualties {
                killed: event.casualties_killed.filter(|n| *n >= 0),
                wounded: event.casualties_wounded.filter(|n| *n >= 0),
            },
            conflict_type: event.conflict_type,
            weapons: event.weapons,
            source_urls: vec![source_url],
            confidence: event.confidence,
            embedding: None,
        });
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Vec<RawArticle> {
        vec![RawArticle {
            title: "Strike hits depot".to_string(),
            summary: "".to_string(),
            url: "https://example.com/a1".to_string(),
            pub_date: Some(Utc::now()),
            source: "wire".to_string(),
        }]
    }

    const RESPONSE: &str = r#"[
        {
            "title": "Missile strike on fuel depot",
            "enhanced_headline": "Missile strike destroys fuel depot near Kharkiv",
            "summary": "A missile hit a fuel depot.",
            "country": "Ukraine",
            "city": "Kharkiv",
            "timestamp": "2025-03-01T06:00:00Z",
            "temporal_confidence": 0.9,
            "severity": "high",
            "primary_actors": ["Russian military"],
            "casualties_killed": 3,
            "conflict_type": "airstrike",
            "weapons": ["missile"],
            "source_url": "https://example.com/a1",
            "confidence": 0.92
        },
        {
            "title": "Uncertain skirmish report",
            "country": "Ukraine",
            "confidence": 0.4
        }
    ]"#;

    #[test]
    fn parses_valid_events_and_drops_low_confidence() {
        let candidates = parse_candidates(RESPONSE, &batch(), 0.7);
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.country, "Ukraine");
        assert_eq!(c.severity, Severity::High);
        assert_eq!(c.casualties.killed, Some(3));
        assert_eq!(c.source_urls, vec!["https://example.com/a1".to_string()]);
    }

    #[test]
    fn strips_markdown_fences() {
        let fenced = format!("```json\n{}\n```", RESPONSE);
        let candidates = parse_candidates(&fenced, &batch(), 0.7);
        assert_eq!(candidates.len(), 1);
    }

    #[test]
    fn negative_casualty_counts_become_unknown() {
        let response = r#"[{"title": "Clash at checkpoint", "casualties_killed": -1,
            "casualties_wounded": -3, "source_url": "https://example.com/a1", "confidence": 0.8}]"#;
        let candidates = parse_candidates(response, &batch(), 0.7);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].casualties.killed, None);
        assert_eq!(candidates[0].casualties.wounded, None);
    }

    #[test]
    fn malformed_json_yields_zero_events() {
        assert!(parse_candidates("{not json", &batch(), 0.7).is_empty());
        assert!(parse_candidates("", &batch(), 0.7).is_empty());
    }

    #[test]
    fn unparsable_timestamp_falls_back_to_pub_date() {
        let response = r#"[{"title": "Clash at checkpoint", "timestamp": "yesterday",
            "source_url": "https://example.com/a1", "confidence": 0.8}]"#;
        let candidates = parse_candidates(response, &batch(), 0.7);
        assert_eq!(candidates.len(), 1);
        // Timestamp came from the article, not from the epoch default.
        assert!(Utc::now()
            .signed_duration_since(candidates[0].timestamp)
            .num_minutes()
            .abs()
            < 5);
    }
}
