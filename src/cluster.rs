//! Density-based incident clustering over a trailing time window.
//!
//! Membership is recomputed from scratch every run; a cluster only exists
//! if enough mutually close events support it, and an event with no close
//! neighbors stays a singleton.

use std::collections::HashMap;

use tracing::info;

use crate::config::PipelineConfig;
use crate::db::cluster::ClusterRecord;
use crate::db::event::ClusterableEvent;
use crate::dedup::haversine_km;
use crate::TARGET_DB;

/// Groups events into incident clusters. Two events are neighbors when
/// their pairwise distance and temporal delta both fall under the
/// configured thresholds and their conflict types overlap; clusters are the
/// connected components of that neighbor graph with at least
/// `min_cluster_size` members.
pub fn build_clusters(events: &[ClusterableEvent], config: &PipelineConfig) -> Vec<ClusterRecord> {
    if events.len() < config.min_cluster_size {
        return Vec::new();
    }

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); events.len()];
    for i in 0..events.len() {
        for j in (i + 1)..events.len() {
            if are_neighbors(&events[i], &events[j], config) {
                adjacency[i].push(j);
                adjacency[j].push(i);
            }
        }
    }

    // Connected components via BFS.
    let mut visited = vec![false; events.len()];
    let mut clusters = Vec::new();
    for start in 0..events.len() {
        if visited[start] {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = vec![start];
        visited[start] = true;
        while let Some(index) = queue.pop() {
            component.push(index);
            for &neighbor in &adjacency[index] {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push(neighbor);
                }
            }
        }

        // Components below the minimum size stay singletons and get no
        // cluster row.
        if component.len() >= config.min_cluster_size {
            clusters.push(make_record(&component, events));
        }
    }

    info!(
        target: TARGET_DB,
        "Clustered {} events into {} clusters ({} singletons)",
        events.len(),
        clusters.len(),
        events.len() - clusters.iter().map(|c| c.member_ids.len()).sum::<usize>()
    );

    clusters
}

fn are_neighbors(a: &ClusterableEvent, b: &ClusterableEvent, config: &PipelineConfig) -> bool {
    let distance = haversine_km(a.latitude, a.longitude, b.latitude, b.longitude);
    if distance > config.cluster_radius_km {
        return false;
    }
    let delta_hours = (a.timestamp - b.timestamp).num_hours().abs();
    if delta_hours > config.cluster_temporal_hours {
        return false;
    }
    conflict_types_overlap(&a.conflict_type, &b.conflict_type)
}

/// An unlabeled conflict type matches anything; otherwise types must agree
/// case-insensitively.
fn conflict_types_overlap(a: &str, b: &str) -> bool {
    a.is_empty() || b.is_empty() || a.eq_ignore_ascii_case(b)
}

fn make_record(component: &[usize], events: &[ClusterableEvent]) -> ClusterRecord {
    let mut member_ids: Vec<i64> = component.iter().map(|&i| events[i].id).collect();
    member_ids.sort_unstable();

    let count = component.len() as f64;
    let centroid_lat = component.iter().map(|&i| events[i].latitude).sum::<f64>() / count;
    let centroid_lon = component.iter().map(|&i| events[i].longitude).sum::<f64>() / count;

    let mut type_counts: HashMap<String, usize> = HashMap::new();
    for &i in component {
        let key = events[i].conflict_type.to_lowercase();
        if !key.is_empty() {
            *type_counts.entry(key).or_insert(0) += 1;
        }
    }
    let conflict_type = type_counts
        .into_iter()
        .max_by_key(|(name, count)| (*count, std::cmp::Reverse(name.clone())))
        .map(|(name, _)| name)
        .unwrap_or_default();

    ClusterRecord {
        member_ids,
        centroid_lat: Some(centroid_lat),
        centroid_lon: Some(centroid_lon),
        conflict_type,
    }
}
