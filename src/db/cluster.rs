use chrono::{DateTime, Utc};
use tracing::debug;

use super::core::Database;
use crate::TARGET_DB;

/// A fully computed cluster ready to be written back.
#[derive(Clone, Debug)]
pub struct ClusterRecord {
    pub member_ids: Vec<i64>,
    pub centroid_lat: Option<f64>,
    pub centroid_lon: Option<f64>,
    pub conflict_type: String,
}

impl Database {
    /// Replaces all cluster assignments within the window with the freshly
    /// computed set. Assignments are recomputed wholesale each run, never
    /// patched incrementally, so stale memberships cannot drift.
    pub async fn replace_clusters(
        &self,
        run_id: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        clusters: &[ClusterRecord],
    ) -> Result<Vec<i64>, sqlx::Error> {
        let mut tx = self.pool().begin().await?;

        // Clear previous assignments for events in the window.
        sqlx::query(
            "UPDATE events SET cluster_id = NULL WHERE timestamp >= ?1 AND timestamp <= ?2",
        )
        .bind(window_start.to_rfc3339())
        .bind(window_end.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        let now = Utc::now().to_rfc3339();
        let mut cluster_ids = Vec::with_capacity(clusters.len());

        for cluster in clusters {
            let (cluster_id,): (i64,) = sqlx::query_as(
                r#"
                INSERT INTO clusters (run_id, window_start, window_end, event_count,
                                      centroid_lat, centroid_lon, conflict_type, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                RETURNING id
                "#,
            )
            .bind(run_id)
            .bind(window_start.to_rfc3339())
            .bind(window_end.to_rfc3339())
            .bind(cluster.member_ids.len() as i64)
            .bind(cluster.centroid_lat)
            .bind(cluster.centroid_lon)
            .bind(&cluster.conflict_type)
            .bind(&now)
            .fetch_one(&mut *tx)
            .await?;

            for event_id in &cluster.member_ids {
                sqlx::query("UPDATE events SET cluster_id = ?1 WHERE id = ?2")
                    .bind(cluster_id)
                    .bind(event_id)
                    .execute(&mut *tx)
                    .await?;
            }

            cluster_ids.push(cluster_id);
        }

        tx.commit().await?;
        debug!(target: TARGET_DB, "Wrote {} clusters for run {}", cluster_ids.len(), run_id);
        Ok(cluster_ids)
    }
}
