//! Free-text location resolution.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::CandidateEvent;
use crate::TARGET_GEOCODE;

/// Narrow contract with the geocoding service. `Ok(None)` means the query
/// was understood but resolved to nothing; errors are transient failures.
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>>;
}

#[derive(Deserialize)]
struct GeocodeResult {
    lat: String,
    lon: String,
}

/// Nominatim-style HTTP geocoder.
pub struct HttpGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGeocoder {
    pub fn new(endpoint: String, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("sitrep-pipeline")
            .build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "geocoding service returned status {}",
                response.status()
            ));
        }

        let results: Vec<GeocodeResult> = response.json().await?;
        let Some(first) = results.first() else {
            return Ok(None);
        };
        let lat: f64 = first.lat.parse()?;
        let lon: f64 = first.lon.parse()?;
        Ok(Some((lat, lon)))
    }
}

/// Per-run cache so repeated mentions of the same place cost one lookup.
pub type GeocodeCache = HashMap<String, Option<(f64, f64)>>;

/// Names that signal the source deliberately withheld the location.
const UNRESOLVABLE_MARKERS: &[&str] = &["undisclosed", "unknown location", "unspecified"];

/// Resolves a candidate's location mentions to coordinates.
///
/// Resolution order: all mentions concatenated (most context first), then
/// the most specific single mention. `None` is a valid outcome; the event
/// is persisted with null coordinates rather than dropped.
pub async fn resolve_location(
    geocoder: &dyn Geocoder,
    cache: &mut GeocodeCache,
    candidate: &CandidateEvent,
) -> Option<(f64, f64)> {
    let mentions: Vec<&str> = [
        candidate.city.as_str(),
        candidate.region.as_str(),
        candidate.country.as_str(),
    ]
    .into_iter()
    .filter(|s| !s.trim().is_empty())
    .collect();

    if mentions.is_empty() {
        return None;
    }
    let combined_lower = mentions.join(" ").to_lowercase();
    if UNRESOLVABLE_MARKERS
        .iter()
        .any(|marker| combined_lower.contains(marker))
    {
        debug!(target: TARGET_GEOCODE, "Location withheld by source: {:?}", mentions);
        return None;
    }

    // Full context first: "Kharkiv, Kharkiv Oblast, Ukraine" disambiguates
    // better than the city alone.
    let full_query = mentions.join(", ");
    if let Some(coords) = geocode_cached(geocoder, cache, &full_query).await {
        return Some(coords);
    }

    // Retry with only the most specific mention.
    let primary = mentions[0];
    if primary != full_query {
        if let Some(coords) = geocode_cached(geocoder, cache, primary).await {
            return Some(coords);
        }
    }

    debug!(target: TARGET_GEOCODE, "Unresolved location for '{}'", candidate.title);
    None
}

async fn geocode_cached(
    geocoder: &dyn Geocoder,
    cache: &mut GeocodeCache,
    query: &str,
) -> Option<(f64, f64)> {
    if let Some(cached) = cache.get(query) {
        return *cached;
    }

    match geocoder.geocode(query).await {
        Ok(result) => {
            cache.insert(query.to_string(), result);
            result
        }
        Err(err) => {
            // Transient failure: do not cache, the retry path may still work.
            warn!(target: TARGET_GEOCODE, "Geocoding '{}' failed: {}", query, err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Casualties, Severity};
    use chrono::Utc;
    use std::sync::Mutex;

    struct FakeGeocoder {
        answers: HashMap<String, (f64, f64)>,
        queries: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, query: &str) -> Result<Option<(f64, f64)>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.answers.get(query).copied())
        }
    }

    fn candidate(city: &str, region: &str, country: &str) -> CandidateEvent {
        CandidateEvent {
            title: "t".to_string(),
            enhanced_headline: "t".to_string(),
            summary: String::new(),
            country: country.to_string(),
            region: region.to_string(),
            city: city.to_string(),
            timestamp: Utc::now(),
            temporal_confidence: 1.0,
            severity: Severity::Medium,
            escalation_score: 0,
            primary_actors: vec![],
            casualties: Casualties::default(),
            conflict_type: String::new(),
            weapons: vec![],
            source_urls: vec!["https://example.com".to_string()],
            confidence: 0.9,
            embedding: None,
        }
    }

    #[tokio::test]
    async fn full_context_query_is_tried_first() {
        let geocoder = FakeGeocoder {
            answers: HashMap::from([(
                "Kyiv, Kyiv Oblast, Ukraine".to_string(),
                (50.45, 30.52),
            )]),
            queries: Mutex::new(vec![]),
        };
        let mut cache = GeocodeCache::new();
        let coords = resolve_location(
            &geocoder,
            &mut cache,
            &candidate("Kyiv", "Kyiv Oblast", "Ukraine"),
        )
        .await;
        assert_eq!(coords, Some((50.45, 30.52)));
        assert_eq!(geocoder.queries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn falls_back_to_primary_mention() {
        let geocoder = FakeGeocoder {
            answers: HashMap::from([("Kyiv".to_string(), (50.45, 30.52))]),
            queries: Mutex::new(vec![]),
        };
        let mut cache = GeocodeCache::new();
        let coords =
            resolve_location(&geocoder, &mut cache, &candidate("Kyiv", "", "Atlantis")).await;
        assert_eq!(coords, Some((50.45, 30.52)));
    }

    #[tokio::test]
    async fn undisclosed_location_stays_unresolved() {
        let geocoder = FakeGeocoder {
            answers: HashMap::new(),
            queries: Mutex::new(vec![]),
        };
        let mut cache = GeocodeCache::new();
        let coords = resolve_location(
            &geocoder,
            &mut cache,
            &candidate("undisclosed location", "", "Ukraine"),
        )
        .await;
        assert_eq!(coords, None);
        // Never even queried the service.
        assert!(geocoder.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cache_prevents_repeat_lookups() {
        let geocoder = FakeGeocoder {
            answers: HashMap::from([("Kyiv, Ukraine".to_string(), (50.45, 30.52))]),
            queries: Mutex::new(vec![]),
        };
        let mut cache = GeocodeCache::new();
        let c = candidate("Kyiv", "", "Ukraine");
        resolve_location(&geocoder, &mut cache, &c).await;
        resolve_location(&geocoder, &mut cache, &c).await;
        assert_eq!(geocoder.queries.lock().unwrap().len(), 1);
    }
}
