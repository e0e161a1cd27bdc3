//! Merge Service Client - one generation request per call, no retries
//!
//! Every failure (transport, timeout, non-success status, unexpected response
//! shape) comes back as `MergeError::Transport` so the orchestrator can fall
//! back for the group instead of aborting the run.

use crate::config::MergeConfig;
use crate::error::{MergeError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Longest slice of an error body kept in an error message.
const ERROR_BODY_LIMIT: usize = 2000;

/// Anything that can turn a prompt into raw generated text.
#[async_trait]
pub trait MergeService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    /// Always `false`: the whole answer is wanted in one response.
    pub stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

/// HTTP client for an Ollama-style `/api/generate` endpoint.
#[derive(Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(config: &MergeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| MergeError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl MergeService for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        debug!("POST {} (model {}, {} prompt chars)", self.endpoint, self.model, prompt.len());

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MergeError::Transport(format!("Request timed out after {:?}", self.timeout))
                } else {
                    MergeError::Transport(format!("Request to merge service failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(MergeError::Transport(format!(
                "Merge service returned status {}: {}",
                status,
                truncate_chars(&error_text, ERROR_BODY_LIMIT)
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| MergeError::Transport(format!("Failed to read merge service response: {}", e)))?;

        parse_generate_response(&text)
    }
}

/// Pull the free-text answer out of a response body. Any other shape is a
/// transport failure.
pub fn parse_generate_response(body: &str) -> Result<String> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        MergeError::Transport(format!(
            "Unexpected merge service response ({}): {}",
            e,
            truncate_chars(body, ERROR_BODY_LIMIT)
        ))
    })?;
    Ok(parsed.response)
}

fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
