//! Deduplication and merge engine.
//!
//! Decides whether a candidate event is the same real-world incident as an
//! already-persisted one, via content-hash equality first and a broader
//! embedding/temporal/geographic similarity test second.

use anyhow::Result;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use urlnorm::UrlNormalizer;

use crate::config::PipelineConfig;
use crate::db::{Database, DbErrorExt, MergeCandidateRow};
use crate::embedding::cosine_similarity;
use crate::models::CandidateEvent;
use crate::screener::normalize_title;
use crate::TARGET_DB;

/// What happened to one candidate event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeOutcome {
    Inserted(i64),
    Merged(i64),
    /// The incident's hash belongs to a soft-deleted row; re-ingestion must
    /// not silently resurrect it.
    DroppedSoftDeleted,
}

/// Deterministic fingerprint of an event: normalized title, country, and
/// city plus the day-granularity date. Case and surrounding whitespace do
/// not change it; the calendar day does.
pub fn content_hash(title: &str, country: &str, city: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!(
        "{}|{}|{}|{}",
        normalize_title(title),
        normalize_title(country),
        normalize_title(city),
        timestamp.format("%Y-%m-%d"),
    );
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const EARTH_RADIUS_KM: f64 = 6371.0;
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
}

/// One qualifying merge target with the fields the tie-break needs.
#[derive(Clone, Debug)]
pub struct MergeMatch {
    pub id: i64,
    pub temporal_delta_secs: i64,
    pub source_count: usize,
}

/// Deterministic tie-break among qualifying merge targets: smallest
/// temporal delta first, then most corroborating sources, then lowest id.
/// Total order, so the result is independent of input order.
pub fn select_merge_target(mut matches: Vec<MergeMatch>) -> Option<MergeMatch> {
    matches.sort_by(|a, b| {
        a.temporal_delta_secs
            .cmp(&b.temporal_delta_secs)
            .then(b.source_count.cmp(&a.source_count))
            .then(a.id.cmp(&b.id))
    });
    matches.into_iter().next()
}

/// Runs the full dedup decision for one candidate and persists the result.
///
/// The store's unique constraint on `content_hash` is the final arbiter:
/// if two candidates race to the same hash within a run, the losing insert
/// falls back to the merge path instead of failing.
pub async fn merge_or_insert(
    db: &Database,
    config: &PipelineConfig,
    candidate: &CandidateEvent,
    latitude: Option<f64>,
    longitude: Option<f64>,
    reliability: f64,
    discovery_round: &str,
) -> Result<MergeOutcome> {
    let hash = content_hash(
        &candidate.title,
        &candidate.country,
        &candidate.city,
        candidate.timestamp,
    );

    // Step 1: exact fingerprint match.
    if let Some((id, deleted)) = db.find_event_by_hash(&hash).await? {
        if deleted {
            info!(target: TARGET_DB, "Hash {} belongs to a soft-deleted event, dropping candidate '{}'", hash, candidate.title);
            return Ok(MergeOutcome::DroppedSoftDeleted);
        }
        merge_into(db, id, candidate, reliability).await?;
        return Ok(MergeOutcome::Merged(id));
    }

    // Step 2: paraphrased reporting of the same incident, caught by
    // embedding similarity within the temporal or geographic window.
    if let Some(embedding) = &candidate.embedding {
        let rows = db.merge_candidates(config.merge_window_hours).await?;
        let matches = similarity_matches(embedding, candidate, latitude, longitude, &rows, config);
        if let Some(target) = select_merge_target(matches) {
            debug!(
                target: TARGET_DB,
                "Similarity merge for '{}' into event {} (delta {}s)",
                candidate.title, target.id, target.temporal_delta_secs
            );
            merge_into(db, target.id, candidate, reliability).await?;
            return Ok(MergeOutcome::Merged(target.id));
        }
    }

    // Step 3: genuinely new incident.
    match db
        .insert_event(candidate, &hash, latitude, longitude, reliability, discovery_round)
        .await
    {
        Ok(id) => Ok(MergeOutcome::Inserted(id)),
        Err(err) if err.is_unique_violation() => {
            // Lost the race: another candidate with the same hash landed
            // first. Merge instead.
            warn!(target: TARGET_DB, "Unique constraint race on hash {}, converting to merge", hash);
            match db.find_event_by_hash(&hash).await? {
                Some((id, false)) => {
                    merge_into(db, id, candidate, reliability).await?;
                    Ok(MergeOutcome::Merged(id))
                }
                Some((_, true)) => Ok(MergeOutcome::DroppedSoftDeleted),
                None => Err(err.into()),
            }
        }
        Err(err) => Err(err.into()),
    }
}

/// Evaluates the similarity-based merge test against the window of recent
/// events. Unresolved-location candidates and targets are excluded from the
/// geographic leg but may still match on the temporal leg.
fn similarity_matches(
    embedding: &[f32],
    candidate: &CandidateEvent,
    latitude: Option<f64>,
    longitude: Option<f64>,
    rows: &[MergeCandidateRow],
    config: &PipelineConfig,
) -> Vec<MergeMatch> {
    let mut matches = Vec::new();
    for row in rows {
        let Some(row_embedding) = &row.embedding else {
            continue;
        };
        let similarity = match cosine_similarity(embedding, row_embedding) {
            Ok(similarity) => similarity,
            Err(_) => continue,
        };
        if similarity < config.cosine_threshold {
            continue;
        }

        let delta = (candidate.timestamp - row.timestamp).num_seconds().abs();
        let within_time = delta <= config.merge_window_hours * 3600;
        let within_distance = match (latitude, longitude, row.latitude, row.longitude) {
            (Some(lat1), Some(lon1), Some(lat2), Some(lon2)) => {
                haversine_km(lat1, lon1, lat2, lon2) <= config.merge_radius_km
            }
            _ => false,
        };

        if within_time || within_distance {
            matches.push(MergeMatch {
                id: row.id,
                temporal_delta_secs: delta,
                source_count: row.source_count,
            });
        }
    }
    matches
}

/// Applies the merge rule: append unseen source URLs, keep the higher
/// reliability, keep the earlier timestamp.
static URL_NORMALIZER: Lazy<UrlNormalizer> = Lazy::new(UrlNormalizer::default);

async fn merge_into(
    db: &Database,
    id: i64,
    candidate: &CandidateEvent,
    reliability: f64,
) -> Result<()> {
    let mut patch = db.load_event_patch(id).await?;

    for url in &candidate.source_urls {
        let already_present = patch.source_urls.iter().any(|existing| {
            existing == url || normalized_url(existing) == normalized_url(url)
        });
        if !already_present {
            patch.source_urls.push(url.clone());
        }
    }

    patch.reliability = patch.reliability.max(reliability);
    patch.timestamp = patch.timestamp.min(candidate.timestamp);

    db.apply_merge(id, &patch).await?;
    Ok(())
}

fn normalized_url(url: &str) -> String {
    url::Url::parse(url)
        .map(|parsed| URL_NORMALIZER.compute_normalization_string(&parsed))
        .unwrap_or_else(|_| url.to_string())
}
