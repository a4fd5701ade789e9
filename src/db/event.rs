use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::Row;
use tracing::{debug, info};

use super::core::Database;
use crate::models::{CandidateEvent, Casualties, PersistedEvent, Severity};
use crate::TARGET_DB;

/// The slice of a persisted event the merge engine needs when evaluating
/// similarity-based merge targets.
#[derive(Clone, Debug)]
pub struct MergeCandidateRow {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub embedding: Option<Vec<f32>>,
    pub source_count: usize,
}

/// The slice needed by the cluster builder.
#[derive(Clone, Debug)]
pub struct ClusterableEvent {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub conflict_type: String,
}

/// Fields refreshed on a corroborating sighting.
#[derive(Clone, Debug)]
pub struct EventPatch {
    pub source_urls: Vec<String>,
    pub reliability: f64,
    pub timestamp: DateTime<Utc>,
}

impl Database {
    /// Inserts a new event row. A unique-constraint violation on
    /// `content_hash` is surfaced to the caller, which converts it into a
    /// merge rather than an error.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_event(
        &self,
        candidate: &CandidateEvent,
        content_hash: &str,
        latitude: Option<f64>,
        longitude: Option<f64>,
        reliability: f64,
        discovery_round: &str,
    ) -> Result<i64, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let actors = serde_json::to_string(&candidate.primary_actors).unwrap_or_else(|_| "[]".into());
        let urls = serde_json::to_string(&candidate.source_urls).unwrap_or_else(|_| "[]".into());
        let embedding = candidate
            .embedding
            .as_ref()
            .and_then(|v| serde_json::to_string(v).ok());

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO events (
                content_hash, title, enhanced_headline, summary, country, region, city,
                timestamp, temporal_confidence, severity, escalation_score, primary_actors,
                casualties_killed, casualties_wounded, conflict_type, latitude, longitude,
                embedding, reliability, discovery_round, source_urls, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)
            RETURNING id
            "#,
        )
        .bind(content_hash)
        .bind(&candidate.title)
        .bind(&candidate.enhanced_headline)
        .bind(&candidate.summary)
        .bind(&candidate.country)
        .bind(&candidate.region)
        .bind(&candidate.city)
        .bind(candidate.timestamp.to_rfc3339())
        .bind(candidate.temporal_confidence)
        .bind(candidate.severity.as_str())
        .bind(candidate.escalation_score as i64)
        .bind(actors)
        .bind(candidate.casualties.killed)
        .bind(candidate.casualties.wounded)
        .bind(&candidate.conflict_type)
        .bind(latitude)
        .bind(longitude)
        .bind(embedding)
        .bind(reliability)
        .bind(discovery_round)
        .bind(urls)
        .bind(&now)
        .bind(&now)
        .fetch_one(self.pool())
        .await?;

        debug!(target: TARGET_DB, "Inserted event {} with hash {}", id, content_hash);
        Ok(id)
    }

    /// Looks up an event by content hash, including soft-deleted rows so the
    /// caller can honor hash reservation.
    pub async fn find_event_by_hash(
        &self,
        content_hash: &str,
    ) -> Result<Option<(i64, bool)>, sqlx::Error> {
        sqlx::query_as::<_, (i64, bool)>(
            "SELECT id, deleted FROM events WHERE content_hash = ?",
        )
        .bind(content_hash)
        .fetch_optional(self.pool())
        .await
    }

    /// Applies a corroborating sighting: the caller has already computed the
    /// merged URL list, the max reliability, and the earlier timestamp.
    pub async fn apply_merge(&self, id: i64, patch: &EventPatch) -> Result<(), sqlx::Error> {
        let urls = serde_json::to_string(&patch.source_urls).unwrap_or_else(|_| "[]".into());
        sqlx::query(
            r#"
            UPDATE events
            SET source_urls = ?1, reliability = ?2, timestamp = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(urls)
        .bind(patch.reliability)
        .bind(patch.timestamp.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(self.pool())
        .await?;
        debug!(target: TARGET_DB, "Merged corroborating sighting into event {}", id);
        Ok(())
    }

    /// Current merge-relevant state of one event.
    pub async fn load_event_patch(&self, id: i64) -> Result<EventPatch, sqlx::Error> {
        let row = sqlx::query("SELECT source_urls, reliability, timestamp FROM events WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await?;
        Ok(EventPatch {
            source_urls: serde_json::from_str(row.get::<String, _>("source_urls").as_str())
                .unwrap_or_default(),
            reliability: row.get("reliability"),
            timestamp: parse_stored_timestamp(&row.get::<String, _>("timestamp")),
        })
    }

    /// Titles of non-deleted events created within the trailing window,
    /// feeding the recent-duplicate screener.
    pub async fn recent_event_titles(&self, window_hours: i64) -> Result<Vec<String>, sqlx::Error> {
        let cutoff = (Utc::now() - ChronoDuration::hours(window_hours)).to_rfc3339();
        sqlx::query_scalar::<_, String>(
            "SELECT title FROM events WHERE deleted = FALSE AND created_at >= ?",
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await
    }

    /// Non-deleted events within the merge window, with the fields the
    /// similarity-based merge test needs.
    pub async fn merge_candidates(
        &self,
        window_hours: i64,
    ) -> Result<Vec<MergeCandidateRow>, sqlx::Error> {
        let cutoff = (Utc::now() - ChronoDuration::hours(window_hours)).to_rfc3339();
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, latitude, longitude, embedding, source_urls
            FROM events
            WHERE deleted = FALSE AND timestamp >= ?
            "#,
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let embedding = row
                    .get::<Option<String>, _>("embedding")
                    .and_then(|text| serde_json::from_str(&text).ok());
                let source_count = serde_json::from_str::<Vec<String>>(
                    row.get::<String, _>("source_urls").as_str(),
                )
                .map(|urls| urls.len())
                .unwrap_or(0);
                MergeCandidateRow {
                    id: row.get("id"),
                    timestamp: parse_stored_timestamp(&row.get::<String, _>("timestamp")),
                    latitude: row.get("latitude"),
                    longitude: row.get("longitude"),
                    embedding,
                    source_count,
                }
            })
            .collect())
    }

    /// Non-deleted, geolocated events within the clustering window.
    pub async fn events_for_clustering(
        &self,
        window_hours: i64,
    ) -> Result<Vec<ClusterableEvent>, sqlx::Error> {
        let cutoff = (Utc::now() - ChronoDuration::hours(window_hours)).to_rfc3339();
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, latitude, longitude, conflict_type
            FROM events
            WHERE deleted = FALSE AND timestamp >= ?
              AND latitude IS NOT NULL AND longitude IS NOT NULL
            "#,
        )
        .bind(cutoff)
        .fetch_all(self.pool())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ClusterableEvent {
                id: row.get("id"),
                timestamp: parse_stored_timestamp(&row.get::<String, _>("timestamp")),
                latitude: row.get("latitude"),
                longitude: row.get("longitude"),
                conflict_type: row.get("conflict_type"),
            })
            .collect())
    }

    /// Marks an event soft-deleted. The row and its content hash stay
    /// behind so the incident cannot silently resurrect on re-ingestion.
    pub async fn soft_delete_event(
        &self,
        id: i64,
        reason: &str,
        actor: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE events
            SET deleted = TRUE, deleted_reason = ?1, deleted_by = ?2, deleted_at = ?3, updated_at = ?3
            WHERE id = ?4
            "#,
        )
        .bind(reason)
        .bind(actor)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(self.pool())
        .await?;
        info!(target: TARGET_DB, "Soft-deleted event {}: {}", id, reason);
        Ok(())
    }

    /// Restores a soft-deleted event, clearing the deletion metadata.
    pub async fn restore_event(&self, id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE events
            SET deleted = FALSE, deleted_reason = NULL, deleted_by = NULL, deleted_at = NULL,
                updated_at = ?1
            WHERE id = ?2
            "#,
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(self.pool())
        .await?;
        info!(target: TARGET_DB, "Restored event {}", id);
        Ok(())
    }

    pub async fn count_live_events(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM events WHERE deleted = FALSE")
            .fetch_one(self.pool())
            .await
    }

    /// Fetches the full persisted form of one event.
    pub async fn get_event(&self, id: i64) -> Result<PersistedEvent, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM events WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool())
            .await?;

        Ok(PersistedEvent {
            id: row.get("id"),
            content_hash: row.get("content_hash"),
            title: row.get("title"),
            enhanced_headline: row.get("enhanced_headline"),
            summary: row.get("summary"),
            country: row.get("country"),
            region: row.get("region"),
            city: row.get("city"),
            timestamp: parse_stored_timestamp(&row.get::<String, _>("timestamp")),
            temporal_confidence: row.get("temporal_confidence"),
            severity: Severity::parse(&row.get::<String, _>("severity")),
            escalation_score: row.get::<i64, _>("escalation_score") as u8,
            primary_actors: serde_json::from_str(row.get::<String, _>("primary_actors").as_str())
                .unwrap_or_default(),
            casualties: Casualties {
                killed: row.get("casualties_killed"),
                wounded: row.get("casualties_wounded"),
            },
            conflict_type: row.get("conflict_type"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            reliability: row.get("reliability"),
            discovery_round: row.get("discovery_round"),
            source_urls: serde_json::from_str(row.get::<String, _>("source_urls").as_str())
                .unwrap_or_default(),
            deleted: row.get("deleted"),
            deleted_reason: row.get("deleted_reason"),
            deleted_by: row.get("deleted_by"),
            deleted_at: row
                .get::<Option<String>, _>("deleted_at")
                .map(|t| parse_stored_timestamp(&t)),
            cluster_id: row.get("cluster_id"),
            created_at: parse_stored_timestamp(&row.get::<String, _>("created_at")),
            updated_at: parse_stored_timestamp(&row.get::<String, _>("updated_at")),
        })
    }
}

fn parse_stored_timestamp(text: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
