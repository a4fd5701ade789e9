//! Rolling-window duplicate screening on normalized titles.
//!
//! This is a cheap pre-filter ahead of extraction; the merge engine makes
//! the authoritative dedup decision, so false negatives here are fine.

use std::collections::HashSet;

use strsim::jaro_winkler;
use unicode_normalization::UnicodeNormalization;

/// Words shorter than this carry no dedup signal ("the", "near", "in").
const SIGNIFICANT_WORD_LEN: usize = 4;

/// Jaro-Winkler floor for treating two titles as near-identical. Catches
/// typo and pluralization variants the word-overlap test misses.
const NEAR_MATCH_SIMILARITY: f64 = 0.93;

/// Lowercases, strips punctuation, and collapses whitespace.
pub fn normalize_title(title: &str) -> String {
    let lowered: String = title.nfkc().collect::<String>().to_lowercase();
    let stripped: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn significant_words(normalized: &str) -> Vec<&str> {
    normalized
        .split_whitespace()
        .filter(|w| w.len() > SIGNIFICANT_WORD_LEN)
        .collect()
}

/// Tracks normalized titles of recently persisted events and flags incoming
/// articles that are near-repeats of them.
pub struct RecentTitleScreener {
    titles: HashSet<String>,
    word_union: HashSet<String>,
    overlap_threshold: f64,
}

impl RecentTitleScreener {
    pub fn new(recent_titles: impl IntoIterator<Item = String>, overlap_threshold: f64) -> Self {
        let mut titles = HashSet::new();
        let mut word_union = HashSet::new();
        for title in recent_titles {
            let normalized = normalize_title(&title);
            for word in significant_words(&normalized) {
                word_union.insert(word.to_string());
            }
            titles.insert(normalized);
        }
        Self {
            titles,
            word_union,
            overlap_threshold,
        }
    }

    /// True if the title exactly or near-exactly matches a recent title
    /// after normalization, or if enough of its significant words already
    /// appear in the window.
    pub fn is_recent_duplicate(&self, title: &str) -> bool {
        let normalized = normalize_title(title);
        if self.titles.contains(&normalized) {
            return true;
        }
        if self
            .titles
            .iter()
            .any(|recent| jaro_winkler(recent, &normalized) >= NEAR_MATCH_SIMILARITY)
        {
            return true;
        }

        let words = significant_words(&normalized);
        if words.is_empty() {
            return false;
        }
        let hits = words
            .iter()
            .filter(|w| self.word_union.contains(**w))
            .count();
        hits as f64 / words.len() as f64 >= self.overlap_threshold
    }

    /// Adds a title to the window so later articles in the same run are
    /// screened against it too.
    pub fn remember(&mut self, title: &str) {
        let normalized = normalize_title(title);
        for word in significant_words(&normalized) {
            self.word_union.insert(word.to_string());
        }
        self.titles.insert(normalized);
    }
}
