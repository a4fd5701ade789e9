//! Escalation and reliability scoring.
//!
//! Both scores are pure functions of already-extracted fields; nothing here
//! touches the network or the store.

use crate::models::{CandidateEvent, Casualties};

const WMD_KEYWORDS: &[&str] = &["nuclear", "chemical", "biological"];
const HEAVY_WEAPON_KEYWORDS: &[&str] = &["missile", "rocket", "bomb"];
const CONFLICT_TYPE_KEYWORDS: &[&str] = &[
    "airstrike", "ambush", "artillery", "assault", "bombardment", "clash",
    "insurgency", "invasion", "offensive", "shelling", "siege", "skirmish",
];

/// Deterministic 0-10 escalation score.
///
/// Casualty bands set the base, weapon classes override or floor it, and
/// multi-type incidents get a single bump.
pub fn escalation_score(casualties: &Casualties, weapons: &[String], text: &str) -> u8 {
    // Negative counts from a bad extraction are treated as unknown, not as
    // an overflow into the top band.
    let total = (casualties.killed.unwrap_or(0) + casualties.wounded.unwrap_or(0)).max(0);
    let mut score: u8 = match total {
        0..=10 => 6,
        11..=20 => 7,
        21..=50 => 8,
        51..=100 => 9,
        _ => 10,
    };

    let weapon_text = weapons.join(" ").to_lowercase();
    if WMD_KEYWORDS.iter().any(|kw| weapon_text.contains(kw)) {
        return 10;
    }
    if HEAVY_WEAPON_KEYWORDS.iter().any(|kw| weapon_text.contains(kw)) {
        score = score.max(7);
    }

    let lowered = text.to_lowercase();
    let distinct_types = CONFLICT_TYPE_KEYWORDS
        .iter()
        .filter(|kw| lowered.contains(*kw))
        .count();
    if distinct_types > 2 {
        score = (score + 1).min(10);
    }

    score
}

/// 0-1 reliability score for a candidate event.
///
/// Starts at 0.5, credits allowlisted sources, averages in the extractor's
/// self-reported confidence when present, and credits attribution phrases.
pub fn reliability_score(
    candidate: &CandidateEvent,
    source: &str,
    trusted_sources: &[String],
    article_text: &str,
) -> f64 {
    let mut score: f64 = 0.5;

    if trusted_sources
        .iter()
        .any(|s| s.eq_ignore_ascii_case(source))
    {
        score += 0.2;
    }

    if candidate.confidence > 0.0 {
        score = (score + candidate.confidence) / 2.0;
    }

    let lowered = article_text.to_lowercase();
    if lowered.contains("according to")
        || lowered.contains("officials said")
        || lowered.contains("officials say")
        || lowered.contains("reported by")
    {
        score += 0.1;
    }

    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Severity;
    use chrono::Utc;

    fn candidate(confidence: f64) -> CandidateEvent {
        CandidateEvent {
            title: "t".to_string(),
            enhanced_headline: "t".to_string(),
            summary: "s".to_string(),
            country: "Ukraine".to_string(),
            region: String::new(),
            city: "Kyiv".to_string(),
            timestamp: Utc::now(),
            temporal_confidence: 1.0,
            severity: Severity::Medium,
            escalation_score: 0,
            primary_actors: vec![],
            casualties: Casualties::default(),
            conflict_type: String::new(),
            weapons: vec![],
            source_urls: vec!["https://example.com/a".to_string()],
            confidence,
            embedding: None,
        }
    }

    fn casualties(killed: i64) -> Casualties {
        Casualties {
            killed: Some(killed),
            wounded: None,
        }
    }

    #[test]
    fn casualty_bands() {
        assert_eq!(escalation_score(&casualties(0), &[], ""), 6);
        assert_eq!(escalation_score(&casualties(10), &[], ""), 6);
        assert_eq!(escalation_score(&casualties(11), &[], ""), 7);
        assert_eq!(escalation_score(&casualties(50), &[], ""), 8);
        assert_eq!(escalation_score(&casualties(100), &[], ""), 9);
        assert_eq!(escalation_score(&casualties(101), &[], ""), 10);
    }

    #[test]
    fn negative_counts_score_like_unknown() {
        let negative = Casualties {
            killed: Some(-1),
            wounded: None,
        };
        assert_eq!(
            escalation_score(&negative, &[], ""),
            escalation_score(&casualties(0), &[], "")
        );
        let both_negative = Casualties {
            killed: Some(-5),
            wounded: Some(-2),
        };
        assert_eq!(escalation_score(&both_negative, &[], ""), 6);
    }

    #[test]
    fn escalation_is_monotone_in_casualties() {
        let mut previous = 0;
        for killed in [0, 1, 5, 11, 21, 51, 101, 500] {
            let score = escalation_score(&casualties(killed), &[], "");
            assert!(score >= previous, "score dropped at {} killed", killed);
            previous = score;
        }
    }

    #[test]
    fn wmd_mention_forces_ten() {
        for weapon in ["nuclear warhead", "chemical agent", "biological weapon"] {
            let score = escalation_score(&casualties(0), &[weapon.to_string()], "");
            assert_eq!(score, 10);
        }
        // Regardless of other fields
        let score = escalation_score(&Casualties::default(), &["nuclear".to_string()], "clash");
        assert_eq!(score, 10);
    }

    #[test]
    fn heavy_weapons_floor_at_seven() {
        let score = escalation_score(&casualties(0), &["missile".to_string()], "");
        assert_eq!(score, 7);
        // Does not pull an already-higher score down
        let score = escalation_score(&casualties(60), &["rocket".to_string()], "");
        assert_eq!(score, 9);
    }

    #[test]
    fn multi_type_incident_bumps_score() {
        let text = "artillery shelling followed the airstrike on the position";
        assert_eq!(escalation_score(&casualties(0), &[], text), 7);
    }

    #[test]
    fn reliability_baseline_and_allowlist() {
        let c = candidate(0.0);
        assert!((reliability_score(&c, "blog", &[], "") - 0.5).abs() < 1e-9);
        assert!(
            (reliability_score(&c, "reuters", &["reuters".to_string()], "") - 0.7).abs() < 1e-9
        );
    }

    #[test]
    fn reliability_averages_confidence_and_credits_attribution() {
        let c = candidate(0.9);
        // (0.5 + 0.9) / 2 = 0.7
        assert!((reliability_score(&c, "blog", &[], "") - 0.7).abs() < 1e-9);
        let with_attr = reliability_score(&c, "blog", &[], "According to local officials...");
        assert!((with_attr - 0.8).abs() < 1e-9);
    }

    #[test]
    fn reliability_never_exceeds_one() {
        let c = candidate(1.0);
        let score = reliability_score(
            &c,
            "reuters",
            &["reuters".to_string()],
            "according to officials said",
        );
        assert!(score <= 1.0);
    }
}
