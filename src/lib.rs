pub mod cluster;
pub mod config;
pub mod db;
pub mod dedup;
pub mod embedding;
pub mod extractor;
pub mod fetcher;
pub mod filter;
pub mod geo;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod scoring;
pub mod screener;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_VECTOR: &str = "vector";
pub const TARGET_GEOCODE: &str = "geocode";

/// Backing client for the text-completion service used by the extractor.
#[derive(Clone, Debug)]
pub enum LlmClient {
    Ollama(Ollama),
    OpenAI(OpenAIClient<OpenAIConfig>),
}

/// Everything needed to issue one completion request.
#[derive(Clone)]
pub struct LlmParams {
    pub client: LlmClient,
    pub model: String,
    pub temperature: f32,
}
