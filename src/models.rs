//! Shared data shapes for the ingestion pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One article as pulled from a feed. Lives only within a single run.
#[derive(Clone, Debug)]
pub struct RawArticle {
    pub title: String,
    pub summary: String,
    pub url: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub source: String,
}

/// Severity band reported by the extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    pub fn parse(value: &str) -> Severity {
        match value.to_lowercase().as_str() {
            "low" => Severity::Low,
            "high" => Severity::High,
            "critical" => Severity::Critical,
            _ => Severity::Medium,
        }
    }
}

/// Casualty counts as extracted; either side may be unknown.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Casualties {
    pub killed: Option<i64>,
    pub wounded: Option<i64>,
}

/// A structured event produced by the extractor, not yet deduplicated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CandidateEvent {
    pub title: String,
    pub enhanced_headline: String,
    pub summary: String,
    pub country: String,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub city: String,
    pub timestamp: DateTime<Utc>,
    /// Extractor's certainty about the temporal placement, 0.0 to 1.0.
    #[serde(default)]
    pub temporal_confidence: f64,
    pub severity: Severity,
    pub escalation_score: u8,
    #[serde(default)]
    pub primary_actors: Vec<String>,
    #[serde(default)]
    pub casualties: Casualties,
    #[serde(default)]
    pub conflict_type: String,
    /// Weapon mentions retained verbatim for escalation scoring.
    #[serde(default)]
    pub weapons: Vec<String>,
    pub source_urls: Vec<String>,
    /// Extractor's overall confidence in this candidate, 0.0 to 1.0.
    #[serde(default)]
    pub confidence: f64,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
}

/// A durable event row. Created on first sighting, refined on every
/// corroborating sighting, soft-deleted but never physically removed.
#[derive(Clone, Debug, Serialize)]
pub struct PersistedEvent {
    pub id: i64,
    pub content_hash: String,
    pub title: String,
    pub enhanced_headline: String,
    pub summary: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub timestamp: DateTime<Utc>,
    pub temporal_confidence: f64,
    pub severity: Severity,
    pub escalation_score: u8,
    pub primary_actors: Vec<String>,
    pub casualties: Casualties,
    pub conflict_type: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub reliability: f64,
    pub discovery_round: String,
    pub source_urls: Vec<String>,
    pub deleted: bool,
    pub deleted_reason: Option<String>,
    pub deleted_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub cluster_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Outcome of fetching a single feed, used for source health bookkeeping
/// and the run summary.
#[derive(Clone, Debug, Serialize)]
pub struct FeedOutcome {
    pub source: String,
    pub url: String,
    pub articles: usize,
    pub error: Option<String>,
}

impl FeedOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Which fetch pass a run represents; retained on events for provenance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Broad,
    Targeted,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Broad => "broad",
            RunMode::Targeted => "targeted",
        }
    }
}

/// Summary returned to the run trigger. Always returned, never thrown,
/// except that fatal configuration errors populate `fatal_error`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub mode: String,
    pub feeds_ok: usize,
    pub feeds_failed: Vec<FeedOutcome>,
    pub articles_fetched: usize,
    pub filtered_out: usize,
    pub screened_out: usize,
    pub events_extracted: usize,
    pub events_inserted: usize,
    pub duplicates_merged: usize,
    pub dropped_soft_deleted: usize,
    pub unresolved_locations: usize,
    pub clusters_built: usize,
    pub errors: Vec<String>,
    pub incomplete: bool,
    pub fatal_error: Option<String>,
}
