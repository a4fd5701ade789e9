use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                content_hash TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                enhanced_headline TEXT NOT NULL,
                summary TEXT NOT NULL,
                country TEXT NOT NULL,
                region TEXT NOT NULL DEFAULT '',
                city TEXT NOT NULL DEFAULT '',
                timestamp TEXT NOT NULL,
                temporal_confidence REAL NOT NULL DEFAULT 0,
                severity TEXT NOT NULL,
                escalation_score INTEGER NOT NULL,
                primary_actors TEXT NOT NULL DEFAULT '[]',
                casualties_killed INTEGER,
                casualties_wounded INTEGER,
                conflict_type TEXT NOT NULL DEFAULT '',
                latitude REAL,
                longitude REAL,
                embedding TEXT,
                reliability REAL NOT NULL,
                discovery_round TEXT NOT NULL,
                source_urls TEXT NOT NULL,
                deleted BOOLEAN NOT NULL DEFAULT FALSE,
                deleted_reason TEXT,
                deleted_by TEXT,
                deleted_at TEXT,
                cluster_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events (timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_deleted_timestamp ON events (deleted, timestamp);
            CREATE INDEX IF NOT EXISTS idx_events_cluster_id ON events (cluster_id);
            CREATE INDEX IF NOT EXISTS idx_events_created_at ON events (created_at);

            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                feed_url TEXT NOT NULL,
                reliability REAL NOT NULL DEFAULT 0.5,
                factual_score REAL NOT NULL DEFAULT 0.5,
                bias_score REAL NOT NULL DEFAULT 0.0,
                expertise TEXT NOT NULL DEFAULT '{}',
                consecutive_failures INTEGER NOT NULL DEFAULT 0,
                last_success_at TEXT,
                last_failure_at TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_sources_name ON sources (name);

            CREATE TABLE IF NOT EXISTS clusters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id TEXT NOT NULL,
                window_start TEXT NOT NULL,
                window_end TEXT NOT NULL,
                event_count INTEGER NOT NULL,
                centroid_lat REAL,
                centroid_lon REAL,
                conflict_type TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_clusters_run_id ON clusters (run_id);
            "#,
        )
        .execute(&mut *conn)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");

        Ok(())
    }
}
