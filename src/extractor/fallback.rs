//! Pattern-based extraction used when the LLM path fails entirely.
//!
//! Deliberately conservative: it only fires on headlines with an action
//! verb plus a number or named actor, producing a minimal candidate so the
//! pipeline degrades gracefully instead of yielding nothing.

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::{CandidateEvent, Casualties, RawArticle, Severity};

lazy_static! {
    static ref ACTION_PATTERN: Regex = Regex::new(
        r"(?i)\b(kill(?:s|ed|ing)?|wound(?:s|ed)?|injur(?:es|ed)|strike(?:s)?|struck|attack(?:s|ed)?|shell(?:s|ed|ing)?|bomb(?:s|ed|ing)?|clash(?:es|ed)?|ambush(?:es|ed)?)\b"
    )
    .expect("action pattern");
    static ref COUNT_PATTERN: Regex =
        Regex::new(r"(?i)\b(\d+)\s+(?:people|civilians|soldiers|troops|fighters)?\s*(?:killed|dead|wounded|injured)\b")
            .expect("count pattern");
    static ref ACTOR_PATTERN: Regex = Regex::new(
        r"(?i)\b(army|forces|military|militants?|rebels?|insurgents?|troops|police|gunmen)\b"
    )
    .expect("actor pattern");
}

/// Attempts a minimal extraction from a single article. Returns `None`
/// unless both an action verb and a number-or-actor signal are present.
pub fn pattern_extract(article: &RawArticle) -> Option<CandidateEvent> {
    let text = format!("{} {}", article.title, article.summary);

    if !ACTION_PATTERN.is_match(&text) {
        return None;
    }

    let killed = COUNT_PATTERN
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok());
    let has_actor = ACTOR_PATTERN.is_match(&text);

    if killed.is_none() && !has_actor {
        return None;
    }

    let actors = ACTOR_PATTERN
        .find_iter(&text)
        .map(|m| m.as_str().to_lowercase())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    Some(CandidateEvent {
        title: article.title.clone(),
        enhanced_headline: article.title.clone(),
        summary: article.summary.clone(),
        country: String::new(),
        region: String::new(),
        city: String::new(),
        timestamp: article.pub_date.unwrap_or_else(Utc::now),
        temporal_confidence: 0.3,
        severity: Severity::Medium,
        escalation_score: 0,
        primary_actors: actors,
        casualties: Casualties {
            killed,
            wounded: None,
        },
        conflict_type: String::new(),
        weapons: Vec::new(),
        source_urls: vec![article.url.clone()],
        confidence: 0.0,
        embedding: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str) -> RawArticle {
        RawArticle {
            title: title.to_string(),
            summary: String::new(),
            url: "https://example.com/f".to_string(),
            pub_date: None,
            source: "wire".to_string(),
        }
    }

    #[test]
    fn extracts_action_plus_count() {
        let candidate =
            pattern_extract(&article("7 civilians killed in border town shelling")).unwrap();
        assert_eq!(candidate.casualties.killed, Some(7));
    }

    #[test]
    fn extracts_action_plus_actor() {
        let candidate = pattern_extract(&article("Militants attacked an army convoy")).unwrap();
        assert!(candidate.primary_actors.contains(&"militants".to_string()));
    }

    #[test]
    fn ignores_headlines_without_conflict_signal() {
        assert!(pattern_extract(&article("Parliament passes budget bill")).is_none());
        // Action verb without number or actor is not enough
        assert!(pattern_extract(&article("Critics attacked the new policy")).is_none());
    }
}
