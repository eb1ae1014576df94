//! Embedding provider chain
//!
//! Generates document embeddings through an ordered list of providers
//! tried in sequence (Ollama-compatible endpoint first, OpenAI second).
//! A total failure degrades to a zero vector of the last-known dimension
//! so a single unreachable provider can never crash clustering.

pub mod namer;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::core::config::ProviderConfig;
use crate::core::error::EmbedError;
use crate::core::types::normalize_dim;

pub use namer::NamingService;

/// Default dimension used before any provider has answered
const DEFAULT_EMBED_DIM: usize = 768;

/// Characters kept when truncating long documents (head + tail)
const MAX_EMBED_CHARS: usize = 20_000;

/// One embedding backend in the fallback chain
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Short provider name for logging
    fn name(&self) -> &str;

    /// Embed one text; the vector length is the provider's native dimension
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Ollama-compatible embedding endpoint
pub struct OllamaEmbedder {
    client: Client,
    host: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(client: Client, host: String, model: String) -> Self {
        Self {
            client,
            host,
            model,
        }
    }
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = format!("{}/api/embed", self.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| request_error(self.name(), e))?;

        let body: OllamaEmbedResponse =
            response
                .json()
                .await
                .map_err(|e| EmbedError::ResponseParseFailed {
                    provider: self.name().to_string(),
                    reason: e.to_string(),
                })?;

        body.embeddings
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbedError::ResponseParseFailed {
                provider: self.name().to_string(),
                reason: "empty embeddings array".to_string(),
            })
    }
}

/// OpenAI-compatible embedding endpoint
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| request_error(self.name(), e))?;

        let body: OpenAiEmbedResponse =
            response
                .json()
                .await
                .map_err(|e| EmbedError::ResponseParseFailed {
                    provider: self.name().to_string(),
                    reason: e.to_string(),
                })?;

        body.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| EmbedError::ResponseParseFailed {
                provider: self.name().to_string(),
                reason: "empty data array".to_string(),
            })
    }
}

fn request_error(provider: &str, e: reqwest::Error) -> EmbedError {
    if e.is_timeout() {
        EmbedError::Timeout {
            provider: provider.to_string(),
            timeout_ms: 0,
        }
    } else {
        EmbedError::RequestFailed {
            provider: provider.to_string(),
            reason: e.to_string(),
        }
    }
}

/// Ordered provider chain with zero-vector degradation
pub struct EmbeddingService {
    providers: Vec<Arc<dyn EmbeddingProvider>>,
    last_known_dim: AtomicUsize,
    max_chars: usize,
}

impl EmbeddingService {
    /// Build the standard chain from configuration. The OpenAI provider
    /// is only added when an API key is present.
    pub fn from_config(config: &ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();

        let mut providers: Vec<Arc<dyn EmbeddingProvider>> = vec![Arc::new(OllamaEmbedder::new(
            client.clone(),
            config.ollama_host.clone(),
            config.ollama_embed_model.clone(),
        ))];

        if !config.openai_api_key.is_empty() {
            providers.push(Arc::new(OpenAiEmbedder::new(
                client,
                config.openai_api_key.clone(),
                config.openai_embed_model.clone(),
            )));
        }

        Self::new(providers)
    }

    pub fn new(providers: Vec<Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            providers,
            last_known_dim: AtomicUsize::new(DEFAULT_EMBED_DIM),
            max_chars: MAX_EMBED_CHARS,
        }
    }

    /// Native dimension of the most recent successful provider call
    pub fn native_dim(&self) -> usize {
        self.last_known_dim.load(Ordering::Relaxed)
    }

    /// Embed a text, walking the provider chain. Never fails: chain
    /// exhaustion yields a zero vector of the last-known dimension.
    pub async fn embed(&self, text: &str) -> Vec<f32> {
        if text.trim().is_empty() {
            return vec![0.0; self.native_dim()];
        }

        let text = self.truncate(text);
        for provider in &self.providers {
            match provider.embed(&text).await {
                Ok(vec) => {
                    self.last_known_dim.store(vec.len(), Ordering::Relaxed);
                    return vec;
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), "Embedding failed: {}", e);
                }
            }
        }

        tracing::error!("All embedding providers failed, using zero vector");
        vec![0.0; self.native_dim()]
    }

    /// Embed a query so its dimension matches stored embeddings:
    /// prefer a provider that natively produces `target_dim`, otherwise
    /// pad/truncate the first successful result.
    pub async fn embed_matching_dim(&self, text: &str, target_dim: usize) -> Vec<f32> {
        if text.trim().is_empty() {
            return vec![0.0; target_dim];
        }

        let text = self.truncate(text);
        let mut first_success: Option<Vec<f32>> = None;
        for provider in &self.providers {
            match provider.embed(&text).await {
                Ok(vec) => {
                    if vec.len() == target_dim {
                        return vec;
                    }
                    tracing::debug!(
                        provider = provider.name(),
                        got = vec.len(),
                        want = target_dim,
                        "Provider dimension mismatch, trying next"
                    );
                    first_success.get_or_insert(vec);
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), "Embedding failed: {}", e);
                }
            }
        }

        match first_success {
            Some(vec) => normalize_dim(&vec, target_dim),
            None => vec![0.0; target_dim],
        }
    }

    /// Keep the head and tail of very long documents so the embedding
    /// sees both introduction and conclusion.
    fn truncate(&self, text: &str) -> String {
        if text.len() <= self.max_chars {
            return text.to_string();
        }
        let half = self.max_chars / 2;
        let head_end = floor_char_boundary(text, half);
        let tail_start = ceil_char_boundary(text, text.len() - half);
        format!("{}\n...\n{}", &text[..head_end], &text[tail_start..])
    }
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
