//! End-to-end pipeline orchestration.
//!
//! One call runs fetch, filter, screen, extract, resolve, score, dedup, and
//! cluster in order, and always hands back a run summary. Partial per-feed
//! or per-batch failures are recorded in the summary; only an unreachable
//! store or missing configuration is fatal.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cluster::build_clusters;
use crate::config::PipelineConfig;
use crate::db::Database;
use crate::dedup::{merge_or_insert, MergeOutcome};
use crate::embedding::{embedding_input, Embedder};
use crate::extractor::EventExtractor;
use crate::fetcher::fetch_all_feeds;
use crate::filter::is_relevant;
use crate::geo::{resolve_location, GeocodeCache, Geocoder};
use crate::models::{RawArticle, RunMode, RunSummary};
use crate::scoring::{escalation_score, reliability_score};
use crate::screener::RecentTitleScreener;
use crate::TARGET_DB;

/// External collaborators injected into a run. Production wires real
/// HTTP-backed implementations; tests wire deterministic fakes.
pub struct PipelineDeps {
    pub extractor: Box<dyn EventExtractor>,
    pub embedder: Option<Box<dyn Embedder>>,
    pub geocoder: Box<dyn Geocoder>,
}

/// Opens the store and executes one run. A store that cannot be opened is
/// the one fatal startup condition; it returns a summary with `fatal_error`
/// set rather than propagating an error to the trigger caller.
pub async fn run(
    config: &PipelineConfig,
    deps: &PipelineDeps,
    mode: RunMode,
    limit: Option<usize>,
) -> RunSummary {
    let mut summary = RunSummary {
        run_id: Uuid::new_v4().to_string(),
        mode: mode.as_str().to_string(),
        ..Default::default()
    };

    if let Err(err) = config.validate_for_run() {
        summary.fatal_error = Some(err.to_string());
        return summary;
    }

    let db = match Database::new(&config.database_path).await {
        Ok(db) => db,
        Err(err) => {
            error!(target: TARGET_DB, "Persistence store unreachable: {}", err);
            summary.fatal_error = Some(format!("persistence store unreachable: {}", err));
            return summary;
        }
    };

    run_with_db(&db, config, deps, mode, limit, summary).await
}

/// Executes one run against an already-open store. Split out so tests can
/// inject an in-memory database.
pub async fn run_with_db(
    db: &Database,
    config: &PipelineConfig,
    deps: &PipelineDeps,
    mode: RunMode,
    limit: Option<usize>,
    mut summary: RunSummary,
) -> RunSummary {
    if summary.run_id.is_empty() {
        summary.run_id = Uuid::new_v4().to_string();
        summary.mode = mode.as_str().to_string();
    }
    let started = Instant::now();
    let deadline = Duration::from_secs(config.run_timeout_secs);

    info!("Starting {} run {}", summary.mode, summary.run_id);

    // Seed source rows so health metrics have somewhere to land.
    for feed in &config.feeds {
        if let Err(err) = db.seed_source(&feed.name, &feed.url).await {
            summary.errors.push(format!("seed source {}: {}", feed.name, err));
        }
    }

    // 1. Fetch.
    let (mut articles, outcomes) = fetch_all_feeds(config).await;
    for outcome in &outcomes {
        if let Err(err) = db.record_feed_outcome(outcome).await {
            summary.errors.push(format!("record outcome {}: {}", outcome.source, err));
        }
        if outcome.succeeded() {
            summary.feeds_ok += 1;
        } else {
            summary.feeds_failed.push(outcome.clone());
        }
    }
    summary.articles_fetched = articles.len();

    if let Some(limit) = limit {
        articles.truncate(limit);
    }

    // 2. Relevance filter.
    let now = Utc::now();
    let before = articles.len();
    articles.retain(|article| {
        is_relevant(article, &config.trusted_sources, config.relevance_threshold, now)
    });
    summary.filtered_out = before - articles.len();

    // 3. Recent-duplicate screening.
    let recent_titles = match db.recent_event_titles(config.screener_window_hours).await {
        Ok(titles) => titles,
        Err(err) => {
            summary.errors.push(format!("load recent titles: {}", err));
            Vec::new()
        }
    };
    let mut screener = RecentTitleScreener::new(recent_titles, config.screener_word_overlap);
    let before = articles.len();
    articles.retain(|article| !screener.is_recent_duplicate(&article.title));
    summary.screened_out = before - articles.len();

    let articles_by_url: HashMap<String, RawArticle> = articles
        .iter()
        .map(|article| (article.url.clone(), article.clone()))
        .collect();

    // 4. Batched extraction, sequential to respect external rate limits.
    let mut candidates = Vec::new();
    let batches: Vec<&[RawArticle]> = articles.chunks(config.extraction_batch_size).collect();
    let batch_count = batches.len();
    for (index, batch) in batches.into_iter().enumerate() {
        if started.elapsed() > deadline {
            summary.incomplete = true;
            warn!("Run deadline reached during extraction, stopping early");
            break;
        }
        match deps.extractor.extract(batch).await {
            Ok(mut extracted) => candidates.append(&mut extracted),
            Err(err) => summary.errors.push(format!("extraction batch failed: {}", err)),
        }
        if index + 1 < batch_count {
            sleep(Duration::from_secs(config.inter_batch_delay_secs)).await;
        }
    }
    summary.events_extracted = candidates.len();

    // 5-7. Per-candidate: embed, geolocate, score, dedup/merge.
    let mut geocode_cache = GeocodeCache::new();
    for mut candidate in candidates {
        if started.elapsed() > deadline {
            summary.incomplete = true;
            warn!("Run deadline reached during merge phase, stopping early");
            break;
        }

        if let Some(embedder) = &deps.embedder {
            match embedder.embed(&embedding_input(&candidate)).await {
                Ok(vector) => candidate.embedding = Some(vector),
                Err(err) => {
                    // Transient embedding failure just disables the
                    // similarity leg for this candidate.
                    warn!("Embedding failed for '{}': {}", candidate.title, err);
                }
            }
        }

        let coords = resolve_location(deps.geocoder.as_ref(), &mut geocode_cache, &candidate).await;
        if coords.is_none() {
            summary.unresolved_locations += 1;
        }

        let source_article = candidate
            .source_urls
            .first()
            .and_then(|url| articles_by_url.get(url));
        let article_text = source_article
            .map(|a| format!("{} {}", a.title, a.summary))
            .unwrap_or_else(|| format!("{} {}", candidate.title, candidate.summary));
        let source_name = source_article.map(|a| a.source.as_str()).unwrap_or("");

        candidate.escalation_score =
            escalation_score(&candidate.casualties, &candidate.weapons, &article_text);
        let reliability =
            reliability_score(&candidate, source_name, &config.trusted_sources, &article_text);

        let (latitude, longitude) = match coords {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };

        match merge_or_insert(
            db,
            config,
            &candidate,
            latitude,
            longitude,
            reliability,
            mode.as_str(),
        )
        .await
        {
            Ok(MergeOutcome::Inserted(_)) => {
                summary.events_inserted += 1;
                screener.remember(&candidate.title);
            }
            Ok(MergeOutcome::Merged(_)) => {
                summary.duplicates_merged += 1;
                screener.remember(&candidate.title);
            }
            Ok(MergeOutcome::DroppedSoftDeleted) => summary.dropped_soft_deleted += 1,
            Err(err) => summary.errors.push(format!("merge failed for '{}': {}", candidate.title, err)),
        }
    }

    // 8. Cluster rebuild over the trailing window.
    match rebuild_clusters(db, config, &summary.run_id).await {
        Ok(count) => summary.clusters_built = count,
        Err(err) => summary.errors.push(format!("clustering failed: {}", err)),
    }

    info!(
        "Run {} complete: {} fetched, {} inserted, {} merged, {} clusters",
        summary.run_id,
        summary.articles_fetched,
        summary.events_inserted,
        summary.duplicates_merged,
        summary.clusters_built
    );

    summary
}

/// Recomputes cluster assignments for the trailing window. Also usable on
/// its own for the `cluster` CLI command.
pub async fn rebuild_clusters(
    db: &Database,
    config: &PipelineConfig,
    run_id: &str,
) -> anyhow::Result<usize> {
    let events = db.events_for_clustering(config.cluster_window_hours).await?;
    let clusters = build_clusters(&events, config);
    let window_end = Utc::now();
    let window_start = window_end - ChronoDuration::hours(config.cluster_window_hours);
    db.replace_clusters(run_id, window_start, window_end, &clusters)
        .await?;
    Ok(clusters.len())
}
