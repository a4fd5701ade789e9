use chrono::Utc;
use tracing::debug;

use super::core::Database;
use crate::models::FeedOutcome;
use crate::TARGET_DB;

impl Database {
    /// Ensures a source row exists for a configured feed. Seeded scores are
    /// left untouched on re-runs.
    pub async fn seed_source(&self, name: &str, feed_url: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO sources (name, feed_url)
            VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET feed_url = excluded.feed_url
            "#,
        )
        .bind(name)
        .bind(feed_url)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Records one fetch outcome against a source's health metrics. Called
    /// once per feed after the parallel fetch phase, never concurrently.
    pub async fn record_feed_outcome(&self, outcome: &FeedOutcome) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        if outcome.succeeded() {
            sqlx::query(
                r#"
                UPDATE sources
                SET consecutive_failures = 0, last_success_at = ?1
                WHERE name = ?2
                "#,
            )
            .bind(&now)
            .bind(&outcome.source)
            .execute(self.pool())
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE sources
                SET consecutive_failures = consecutive_failures + 1, last_failure_at = ?1
                WHERE name = ?2
                "#,
            )
            .bind(&now)
            .bind(&outcome.source)
            .execute(self.pool())
            .await?;
        }
        debug!(target: TARGET_DB, "Recorded feed outcome for {}: ok={}", outcome.source, outcome.succeeded());
        Ok(())
    }

    pub async fn source_consecutive_failures(&self, name: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT consecutive_failures FROM sources WHERE name = ?")
            .bind(name)
            .fetch_one(self.pool())
            .await
    }
}
