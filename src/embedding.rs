//! Embedding-service contract and vector math.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::models::CandidateEvent;
use crate::TARGET_VECTOR;

/// Narrow contract with the external embedding service: text in, fixed
/// length float vector out. Tests substitute a deterministic fake.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// HTTP implementation posting `{"text": ...}` to an embedding endpoint.
/// The provider's native dimensionality is padded or truncated to the
/// configured size so stored vectors stay comparable.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(endpoint: String, dimensions: usize, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "embedding service returned status {}",
                response.status()
            ));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        debug!(target: TARGET_VECTOR, "Received embedding with {} native dimensions", parsed.embedding.len());
        Ok(pad_or_truncate(parsed.embedding, self.dimensions))
    }
}

/// Pads with zeros or truncates so every stored vector has the same length.
pub fn pad_or_truncate(mut vector: Vec<f32>, dimensions: usize) -> Vec<f32> {
    vector.resize(dimensions, 0.0);
    vector
}

/// Text fed to the embedding service for an event: headline, summary,
/// actors, location, and conflict type concatenated.
pub fn embedding_input(candidate: &CandidateEvent) -> String {
    let mut parts = vec![
        candidate.enhanced_headline.clone(),
        candidate.summary.clone(),
    ];
    if !candidate.primary_actors.is_empty() {
        parts.push(candidate.primary_actors.join(", "));
    }
    let location: Vec<&str> = [
        candidate.city.as_str(),
        candidate.region.as_str(),
        candidate.country.as_str(),
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect();
    if !location.is_empty() {
        parts.push(location.join(", "));
    }
    if !candidate.conflict_type.is_empty() {
        parts.push(candidate.conflict_type.clone());
    }
    parts.join("\n")
}

/// Calculate cosine similarity directly between two vectors.
pub fn cosine_similarity(vec1: &[f32], vec2: &[f32]) -> Result<f32> {
    if vec1.len() != vec2.len() {
        return Err(anyhow!(
            "Vector dimensions don't match: {} vs {}",
            vec1.len(),
            vec2.len()
        ));
    }

    let mag1: f32 = vec1.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag2: f32 = vec2.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag1 < 0.001 || mag2 < 0.001 {
        return Err(anyhow!("Zero magnitude vector detected"));
    }

    let dot_product: f32 = vec1.iter().zip(vec2.iter()).map(|(a, b)| a * b).sum();
    Ok(dot_product / (mag1 * mag2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, -0.2, 0.9];
        assert!((cosine_similarity(&v, &v).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).unwrap().abs() < 1e-6);
    }

    #[test]
    fn cosine_rejects_mismatched_dimensions_and_zero_vectors() {
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).is_err());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_err());
    }

    #[test]
    fn pad_or_truncate_enforces_fixed_length() {
        assert_eq!(pad_or_truncate(vec![1.0, 2.0], 4), vec![1.0, 2.0, 0.0, 0.0]);
        assert_eq!(pad_or_truncate(vec![1.0, 2.0, 3.0], 2), vec![1.0, 2.0]);
    }
}
