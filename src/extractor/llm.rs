//! Completion-service plumbing with retries and timeouts.

use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::options::GenerationOptions;
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use super::prompt::SYSTEM_INSTRUCTIONS;
use crate::{LlmClient, LlmParams, TARGET_LLM_REQUEST};

const MAX_RETRIES: usize = 3;

/// Issues one prompt to the configured completion service with retries and
/// exponential backoff. Returns `None` when every attempt failed; the
/// caller decides how to degrade.
pub async fn generate_llm_response(
    prompt: &str,
    params: &LlmParams,
    timeout_secs: u64,
) -> Option<String> {
    let mut backoff = 2;

    for retry_count in 0..MAX_RETRIES {
        let result = timeout(
            Duration::from_secs(timeout_secs),
            generate_once(prompt, params),
        )
        .await;

        match result {
            Ok(Ok(response)) => {
                debug!(target: TARGET_LLM_REQUEST, "LLM response received ({} chars)", response.len());
                return Some(response);
            }
            Ok(Err(e)) => {
                warn!(target: TARGET_LLM_REQUEST, "Error generating response: {}", e);
            }
            Err(_) => {
                warn!(target: TARGET_LLM_REQUEST, "LLM request timed out after {}s", timeout_secs);
            }
        }

        if retry_count < MAX_RETRIES - 1 {
            // Jitter keeps concurrent runs from retrying in lockstep.
            let jitter = rand::rng().random_range(0..500);
            debug!(target: TARGET_LLM_REQUEST, "Backing off for {} seconds before retry {}/{}", backoff, retry_count + 1, MAX_RETRIES);
            sleep(Duration::from_secs(backoff) + Duration::from_millis(jitter)).await;
            backoff *= 2;
        }
    }

    error!(target: TARGET_LLM_REQUEST, "No response generated after {} retries", MAX_RETRIES);
    None
}

async fn generate_once(prompt: &str, params: &LlmParams) -> anyhow::Result<String> {
    match &params.client {
        LlmClient::Ollama(ollama) => {
            let full_prompt = format!("{}\n\n{}", SYSTEM_INSTRUCTIONS, prompt);
            let mut request = GenerationRequest::new(params.model.clone(), full_prompt);
            request.options = Some(GenerationOptions::default().temperature(params.temperature));
            let response = ollama
                .generate(request)
                .await
                .map_err(|e| anyhow::anyhow!("Ollama error: {}", e))?;
            Ok(response.response)
        }
        LlmClient::OpenAI(client) => {
            let request = CreateChatCompletionRequestArgs::default()
                .model(&params.model)
                .temperature(params.temperature)
                .messages(vec![
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(SYSTEM_INSTRUCTIONS)
                        .build()?
                        .into(),
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(prompt)
                        .build()?
                        .into(),
                ])
                .build()?;
            let response = client.chat().create(request).await?;
            let content = response
                .choices
                .first()
                .and_then(|choice| choice.message.content.clone())
                .unwrap_or_default();
            Ok(content)
        }
    }
}
