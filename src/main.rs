use anyhow::Result;
use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use clap::{Parser, Subcommand};
use ollama_rs::Ollama;
use std::env;
use tracing::info;
use uuid::Uuid;

use sitrep::config::PipelineConfig;
use sitrep::db::Database;
use sitrep::embedding::HttpEmbedder;
use sitrep::extractor::LlmExtractor;
use sitrep::geo::HttpGeocoder;
use sitrep::logging::configure_logging;
use sitrep::models::RunMode;
use sitrep::pipeline::{self, PipelineDeps};
use sitrep::{LlmClient, LlmParams};

#[derive(Parser)]
#[command(name = "sitrep", about = "OSINT conflict-event ingestion pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute one full pipeline run and print the run summary as JSON.
    Run {
        /// Which fetch pass this run represents.
        #[arg(long, default_value = "broad")]
        mode: String,
        /// Cap on the number of articles processed after fetching.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Recompute incident clusters over the trailing window without fetching.
    Cluster,
    /// Print the effective configuration.
    ShowConfig,
}

fn build_llm_params() -> LlmParams {
    let model = env::var("SITREP_LLM_MODEL").unwrap_or_else(|_| "llama3".to_string());
    let temperature: f32 = env::var("SITREP_LLM_TEMPERATURE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0.0);

    let client = if let Ok(api_key) = env::var("OPENAI_API_KEY") {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Ok(base) = env::var("OPENAI_API_BASE") {
            openai_config = openai_config.with_api_base(base);
        }
        info!("Using OpenAI-compatible completion endpoint");
        LlmClient::OpenAI(OpenAIClient::with_config(openai_config))
    } else {
        let host = env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".to_string());
        let port: u16 = env::var("OLLAMA_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(11434);
        info!("Connecting to Ollama at {}:{}", host, port);
        LlmClient::Ollama(Ollama::new(host, port))
    };

    LlmParams {
        client,
        model,
        temperature,
    }
}

fn build_deps(config: &PipelineConfig) -> Result<PipelineDeps> {
    let extractor = LlmExtractor::new(
        build_llm_params(),
        config.extraction_confidence_floor,
        config.extraction_timeout_secs,
    );

    let embedder = match &config.embedding_endpoint {
        Some(endpoint) => Some(Box::new(HttpEmbedder::new(
            endpoint.clone(),
            config.embedding_dimensions,
            config.fetch_timeout_secs,
        )?) as Box<dyn sitrep::embedding::Embedder>),
        None => None,
    };

    let geocoder = HttpGeocoder::new(config.geocode_endpoint.clone(), config.fetch_timeout_secs)?;

    Ok(PipelineDeps {
        extractor: Box::new(extractor),
        embedder,
        geocoder: Box::new(geocoder),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();

    match cli.command {
        Command::Run { mode, limit } => {
            let mode = match mode.as_str() {
                "targeted" => RunMode::Targeted,
                _ => RunMode::Broad,
            };
            let deps = build_deps(&config)?;
            let summary = pipeline::run(&config, &deps, mode, limit).await;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Cluster => {
            let db = Database::new(&config.database_path).await?;
            let run_id = Uuid::new_v4().to_string();
            let count = pipeline::rebuild_clusters(&db, &config, &run_id).await?;
            println!("{{\"clusters_built\": {}}}", count);
        }
        Command::ShowConfig => {
            println!("{:#?}", config);
        }
    }

    Ok(())
}
