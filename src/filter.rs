//! Cheap heuristic relevance scoring, applied before any LLM call.
//!
//! The scorer is a pure function of the article, the trusted-source list,
//! and a reference clock, so it is order-independent and side-effect-free.

use chrono::{DateTime, Duration, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::RawArticle;

/// Keyword hits contribute at most this many points, so keyword-stuffed
/// articles do not drown out the other signals.
const MAX_KEYWORD_POINTS: i32 = 3;

const CONFLICT_KEYWORDS: &[&str] = &[
    "airstrike", "ambush", "armed", "artillery", "assault", "attack", "battle",
    "bomb", "bombardment", "casualties", "ceasefire", "clash", "combat",
    "conflict", "coup", "drone", "explosion", "fighting", "insurgent",
    "invasion", "killed", "militant", "military", "missile", "mortar",
    "offensive", "rebel", "rocket", "shelling", "shooting", "siege", "soldier",
    "strike", "troops", "war", "wounded",
];

const CONFLICT_REGIONS: &[&str] = &[
    "afghanistan", "donbas", "ethiopia", "gaza", "haiti", "iran", "iraq",
    "israel", "lebanon", "libya", "mali", "myanmar", "sahel", "somalia",
    "sudan", "syria", "ukraine", "west bank", "yemen",
];

const NOISE_KEYWORDS: &[&str] = &[
    "album", "box office", "celebrity", "championship", "concert", "festival",
    "league", "movie", "olympics", "playoff", "premiere", "recipe", "season",
    "tournament", "transfer window", "trailer",
];

lazy_static! {
    static ref CASUALTY_NUMBERS: Regex =
        Regex::new(r"(?i)\b\d+\s+(?:people\s+)?(?:killed|dead|wounded|injured|casualties)\b")
            .expect("casualty pattern");
}

/// Additive relevance score for an article. Higher is more likely to
/// describe conflict activity.
pub fn relevance_score(
    article: &RawArticle,
    trusted_sources: &[String],
    now: DateTime<Utc>,
) -> i32 {
    let text = format!("{} {}", article.title, article.summary).to_lowercase();
    let mut score = 0;

    let keyword_hits = CONFLICT_KEYWORDS
        .iter()
        .filter(|kw| text.contains(*kw))
        .count() as i32;
    score += keyword_hits.min(MAX_KEYWORD_POINTS);

    if trusted_sources
        .iter()
        .any(|s| s.eq_ignore_ascii_case(&article.source))
    {
        score += 1;
    }

    if CONFLICT_REGIONS.iter().any(|region| text.contains(region)) {
        score += 1;
    }

    if CASUALTY_NUMBERS.is_match(&text) {
        score += 1;
    }

    if let Some(pub_date) = article.pub_date {
        if now.signed_duration_since(pub_date) < Duration::hours(24) {
            score += 1;
        }
    }

    let noise_hits = NOISE_KEYWORDS
        .iter()
        .filter(|kw| text.contains(*kw))
        .count() as i32;
    if noise_hits > keyword_hits {
        score -= 2;
    }

    score
}

/// Threshold check, inclusive on the pass side: a score exactly at the
/// threshold is retained.
pub fn is_relevant(
    article: &RawArticle,
    trusted_sources: &[String],
    threshold: i32,
    now: DateTime<Utc>,
) -> bool {
    relevance_score(article, trusted_sources, now) >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, summary: &str, source: &str) -> RawArticle {
        RawArticle {
            title: title.to_string(),
            summary: summary.to_string(),
            url: "https://example.com/a".to_string(),
            pub_date: None,
            source: source.to_string(),
        }
    }

    #[test]
    fn conflict_article_scores_above_sports_article() {
        let now = Utc::now();
        let conflict = article(
            "Artillery shelling kills 12 in eastern Ukraine",
            "Military offensive continues near the front line",
            "wire",
        );
        let sports = article(
            "Championship playoff season opens",
            "League transfer window closes next week",
            "wire",
        );
        assert!(relevance_score(&conflict, &[], now) > relevance_score(&sports, &[], now));
    }

    #[test]
    fn keyword_contribution_is_capped() {
        let now = Utc::now();
        let stuffed = article(
            "war war attack bomb missile strike battle combat clash siege",
            "",
            "wire",
        );
        // Keywords alone cannot exceed the cap plus the region bonus.
        assert!(relevance_score(&stuffed, &[], now) <= MAX_KEYWORD_POINTS + 1);
    }

    #[test]
    fn casualty_numbers_add_a_point() {
        let now = Utc::now();
        let without = article("Clash reported at border", "", "wire");
        let with = article("Clash reported at border, 14 killed", "", "wire");
        assert_eq!(
            relevance_score(&with, &[], now),
            relevance_score(&without, &[], now) + 1
        );
    }

    #[test]
    fn trusted_source_and_recency_bonuses() {
        let now = Utc::now();
        let mut art = article("Missile strike hits depot", "", "reuters");
        let base = relevance_score(&art, &[], now);
        assert_eq!(
            relevance_score(&art, &["reuters".to_string()], now),
            base + 1
        );
        art.pub_date = Some(now - Duration::hours(1));
        assert_eq!(
            relevance_score(&art, &["reuters".to_string()], now),
            base + 2
        );
    }

    #[test]
    fn noise_dominated_article_is_penalized() {
        let now = Utc::now();
        let noisy = article(
            "Movie premiere at the festival: concert season trailer",
            "Strike scene thrills the league",
            "wire",
        );
        assert!(relevance_score(&noisy, &[], now) < 1);
    }

    #[test]
    fn threshold_is_inclusive_on_the_pass_side() {
        let now = Utc::now();
        let art = article("Troops clash at checkpoint", "", "wire");
        let score = relevance_score(&art, &[], now);
        assert!(is_relevant(&art, &[], score, now));
        assert!(!is_relevant(&art, &[], score + 1, now));
    }
}
