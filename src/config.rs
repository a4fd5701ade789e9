use std::env;

use anyhow::{anyhow, Result};

/// A configured feed endpoint.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
}

/// All tunable parameters for one pipeline run.
///
/// Every empirically chosen threshold (cosine similarity, geographic radius,
/// temporal window, word overlap) is a field here rather than a hard-coded
/// constant, so deployments and tests can vary them independently.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub database_path: String,
    pub feeds: Vec<FeedConfig>,
    /// Sources whose reporting earns the reliability allowlist bonus.
    pub trusted_sources: Vec<String>,

    // Fetcher
    pub fetch_concurrency: usize,
    pub fetch_timeout_secs: u64,
    pub max_article_age_days: i64,

    // Relevance filter
    pub relevance_threshold: i32,

    // Recent-duplicate screener
    pub screener_window_hours: i64,
    pub screener_word_overlap: f64,

    // Extractor
    pub extraction_batch_size: usize,
    pub extraction_timeout_secs: u64,
    pub extraction_confidence_floor: f64,
    pub inter_batch_delay_secs: u64,

    // Embedding
    pub embedding_endpoint: Option<String>,
    pub embedding_dimensions: usize,

    // Geocoding
    pub geocode_endpoint: String,

    // Dedup/merge
    pub cosine_threshold: f32,
    pub merge_window_hours: i64,
    pub merge_radius_km: f64,

    // Clustering
    pub cluster_window_hours: i64,
    pub cluster_radius_km: f64,
    pub cluster_temporal_hours: i64,
    pub min_cluster_size: usize,

    // Run
    pub run_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: "sitrep.db".to_string(),
            feeds: Vec::new(),
            trusted_sources: Vec::new(),
            fetch_concurrency: 5,
            fetch_timeout_secs: 10,
            max_article_age_days: 7,
            relevance_threshold: 2,
            screener_window_hours: 24,
            screener_word_overlap: 0.6,
            extraction_batch_size: 100,
            extraction_timeout_secs: 300,
            extraction_confidence_floor: 0.7,
            inter_batch_delay_secs: 1,
            embedding_endpoint: None,
            embedding_dimensions: 768,
            geocode_endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            cosine_threshold: 0.85,
            merge_window_hours: 24,
            merge_radius_km: 50.0,
            cluster_window_hours: 24,
            cluster_radius_km: 50.0,
            cluster_temporal_hours: 6,
            min_cluster_size: 3,
            run_timeout_secs: 3600,
        }
    }
}

impl PipelineConfig {
    /// Builds a config from environment variables, falling back to defaults
    /// for anything unset. Feeds are required for a fetch run; the pipeline
    /// treats an empty feed list as a fatal configuration error.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| defaults.database_path.clone()),
            feeds: parse_feeds(&env::var("SITREP_FEEDS").unwrap_or_default()),
            trusted_sources: get_env_var_as_vec("SITREP_TRUSTED_SOURCES", ';'),
            fetch_concurrency: env_parse("SITREP_FETCH_CONCURRENCY", defaults.fetch_concurrency),
            fetch_timeout_secs: env_parse("SITREP_FETCH_TIMEOUT", defaults.fetch_timeout_secs),
            max_article_age_days: env_parse("SITREP_MAX_ARTICLE_AGE_DAYS", defaults.max_article_age_days),
            relevance_threshold: env_parse("SITREP_RELEVANCE_THRESHOLD", defaults.relevance_threshold),
            screener_window_hours: env_parse("SITREP_SCREENER_WINDOW_HOURS", defaults.screener_window_hours),
            screener_word_overlap: env_parse("SITREP_SCREENER_WORD_OVERLAP", defaults.screener_word_overlap),
            extraction_batch_size: env_parse("SITREP_EXTRACTION_BATCH_SIZE", defaults.extraction_batch_size),
            extraction_timeout_secs: env_parse("SITREP_EXTRACTION_TIMEOUT", defaults.extraction_timeout_secs),
            extraction_confidence_floor: env_parse(
                "SITREP_EXTRACTION_CONFIDENCE_FLOOR",
                defaults.extraction_confidence_floor,
            ),
            inter_batch_delay_secs: env_parse("SITREP_INTER_BATCH_DELAY", defaults.inter_batch_delay_secs),
            embedding_endpoint: env::var("SITREP_EMBEDDING_ENDPOINT").ok(),
            embedding_dimensions: env_parse("SITREP_EMBEDDING_DIMENSIONS", defaults.embedding_dimensions),
            geocode_endpoint: env::var("SITREP_GEOCODE_ENDPOINT")
                .unwrap_or_else(|_| defaults.geocode_endpoint.clone()),
            cosine_threshold: env_parse("SITREP_COSINE_THRESHOLD", defaults.cosine_threshold),
            merge_window_hours: env_parse("SITREP_MERGE_WINDOW_HOURS", defaults.merge_window_hours),
            merge_radius_km: env_parse("SITREP_MERGE_RADIUS_KM", defaults.merge_radius_km),
            cluster_window_hours: env_parse("SITREP_CLUSTER_WINDOW_HOURS", defaults.cluster_window_hours),
            cluster_radius_km: env_parse("SITREP_CLUSTER_RADIUS_KM", defaults.cluster_radius_km),
            cluster_temporal_hours: env_parse("SITREP_CLUSTER_TEMPORAL_HOURS", defaults.cluster_temporal_hours),
            min_cluster_size: env_parse("SITREP_MIN_CLUSTER_SIZE", defaults.min_cluster_size),
            run_timeout_secs: env_parse("SITREP_RUN_TIMEOUT", defaults.run_timeout_secs),
        }
    }

    /// Validates the parts of the config a fetch run cannot proceed without.
    pub fn validate_for_run(&self) -> Result<()> {
        if self.feeds.is_empty() {
            return Err(anyhow!(
                "no feeds configured: set SITREP_FEEDS to a ';'-separated list of name=url pairs"
            ));
        }
        if self.embedding_dimensions == 0 {
            return Err(anyhow!("embedding dimensions must be non-zero"));
        }
        Ok(())
    }
}

/// Retrieves an environment variable and splits it into a vector of strings
/// based on a delimiter, dropping empty entries.
pub fn get_env_var_as_vec(var: &str, delimiter: char) -> Vec<String> {
    env::var(var)
        .unwrap_or_default()
        .split(delimiter)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_parse<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses "name=url;name=url" into feed configs. Entries without an '='
/// use the URL host as the source name.
fn parse_feeds(raw: &str) -> Vec<FeedConfig> {
    raw.split(';')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.split_once('=') {
            Some((name, url)) => Some(FeedConfig {
                name: name.trim().to_string(),
                url: url.trim().to_string(),
            }),
            None => url::Url::parse(entry).ok().map(|parsed| FeedConfig {
                name: parsed.host_str().unwrap_or("unknown").to_string(),
                url: entry.to_string(),
            }),
        })
        .collect()
}
