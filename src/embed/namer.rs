//! Cluster naming and document summaries
//!
//! LLM-backed folder names and short summaries with a keyword-extraction
//! fallback, so naming keeps working with no model reachable.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use crate::core::config::ProviderConfig;
use crate::core::error::EmbedError;

/// Sample texts passed to the namer per cluster
const MAX_SAMPLES: usize = 5;

/// Characters kept per sample snippet
const SNIPPET_CHARS: usize = 500;

/// One chat backend in the naming chain
#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Run one prompt and return the raw completion text
    async fn complete(&self, prompt: &str) -> Result<String, EmbedError>;
}

/// Ollama-compatible chat endpoint
pub struct OllamaChat {
    client: Client,
    host: String,
    model: String,
}

impl OllamaChat {
    pub fn new(client: Client, host: String, model: String) -> Self {
        Self {
            client,
            host,
            model,
        }
    }
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: OllamaChatMessage,
}

#[derive(Deserialize)]
struct OllamaChatMessage {
    content: String,
}

#[async_trait]
impl ChatProvider for OllamaChat {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str) -> Result<String, EmbedError> {
        let url = format!("{}/api/chat", self.host.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "stream": false,
            }))
            .send()
            .await
            .map_err(|e| EmbedError::RequestFailed {
                provider: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let body: OllamaChatResponse =
            response
                .json()
                .await
                .map_err(|e| EmbedError::ResponseParseFailed {
                    provider: self.name().to_string(),
                    reason: e.to_string(),
                })?;
        Ok(body.message.content)
    }
}

/// OpenAI-compatible chat endpoint
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    pub fn new(client: Client, api_key: String, model: String) -> Self {
        Self {
            client,
            api_key,
            model,
        }
    }
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, prompt: &str) -> Result<String, EmbedError> {
        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt }],
                "max_tokens": 100,
                "temperature": 0.3,
            }))
            .send()
            .await
            .map_err(|e| EmbedError::RequestFailed {
                provider: self.name().to_string(),
                reason: e.to_string(),
            })?;

        let body: OpenAiChatResponse =
            response
                .json()
                .await
                .map_err(|e| EmbedError::ResponseParseFailed {
                    provider: self.name().to_string(),
                    reason: e.to_string(),
                })?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| EmbedError::ResponseParseFailed {
                provider: self.name().to_string(),
                reason: "empty choices array".to_string(),
            })
    }
}

/// Naming service with an LLM chain and a keyword fallback
pub struct NamingService {
    providers: Vec<Arc<dyn ChatProvider>>,
}

impl NamingService {
    pub fn from_config(config: &ProviderConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_default();

        let mut providers: Vec<Arc<dyn ChatProvider>> = vec![Arc::new(OllamaChat::new(
            client.clone(),
            config.ollama_host.clone(),
            config.ollama_chat_model.clone(),
        ))];

        if !config.openai_api_key.is_empty() {
            providers.push(Arc::new(OpenAiChat::new(
                client,
                config.openai_api_key.clone(),
                config.openai_chat_model.clone(),
            )));
        }

        Self { providers }
    }

    pub fn new(providers: Vec<Arc<dyn ChatProvider>>) -> Self {
        Self { providers }
    }

    /// Generate a folder name for a cluster from representative texts,
    /// avoiding names already in use. Falls back to keyword extraction.
    pub async fn name_cluster(&self, sample_texts: &[String], existing_names: &[String]) -> String {
        let snippets: Vec<String> = sample_texts
            .iter()
            .take(MAX_SAMPLES)
            .map(|t| snippet(t))
            .filter(|s| !s.is_empty())
            .collect();

        if snippets.is_empty() {
            return "Miscellaneous".to_string();
        }

        let existing = if existing_names.is_empty() {
            "none".to_string()
        } else {
            existing_names.join(", ")
        };

        let prompt = format!(
            "Based on these document excerpts from a folder of related files, \
             generate a short descriptive folder name (2-4 words, use underscores \
             between words, no special characters).\n\n\
             Existing folder names (avoid duplicates): {}\n\n\
             Document excerpts:\n{}\n\n\
             Reply with ONLY the folder name, nothing else. Example: Machine_Learning_Research",
            existing,
            snippets.join("\n---\n"),
        );

        for provider in &self.providers {
            match provider.complete(&prompt).await {
                Ok(raw) => {
                    let name = sanitize_name(&raw);
                    if !name.is_empty() && !existing_names.contains(&name) {
                        return name;
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), "Cluster naming failed: {}", e);
                }
            }
        }

        keyword_name(&snippets)
    }

    /// Summarize a document in one or two sentences; truncation is the
    /// last resort.
    pub async fn summarize(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.len() < 50 {
            return trimmed.to_string();
        }

        let snippet: String = trimmed.chars().take(3000).collect();
        let prompt = format!("Summarize this document in 1-2 sentences:\n\n{}", snippet);

        for provider in &self.providers {
            match provider.complete(&prompt).await {
                Ok(raw) => {
                    let summary: String = raw.trim().chars().take(300).collect();
                    if !summary.is_empty() {
                        return summary;
                    }
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), "Summary failed: {}", e);
                }
            }
        }

        let fallback: String = trimmed.chars().take(200).collect();
        format!("{}...", fallback.trim_end())
    }
}

fn snippet(text: &str) -> String {
    text.chars().take(SNIPPET_CHARS).collect::<String>().trim().to_string()
}

/// Clean a generated name for filesystem use
pub fn sanitize_name(name: &str) -> String {
    let trimmed = name.trim().trim_matches(['"', '\'', '`', '.']);
    let spaced = Regex::new(r"[\s\-]+").unwrap().replace_all(trimmed, "_");
    let cleaned = Regex::new(r"[^a-zA-Z0-9_]").unwrap().replace_all(&spaced, "");
    cleaned
        .chars()
        .take(50)
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "can", "to", "of",
    "in", "for", "on", "with", "at", "by", "from", "as", "into", "through", "during", "before",
    "after", "between", "out", "over", "under", "then", "once", "here", "there", "when", "where",
    "why", "how", "all", "both", "each", "few", "more", "most", "other", "some", "such", "no",
    "nor", "not", "only", "own", "same", "so", "than", "too", "very", "just", "because", "but",
    "and", "or", "if", "while", "this", "that", "these", "those", "it", "its", "i", "me", "my",
    "we", "our", "you", "your", "he", "his", "she", "her", "they", "their", "what", "which",
    "who", "whom",
];

/// Build a folder name from the most frequent content words
pub fn keyword_name(snippets: &[String]) -> String {
    let word_re = Regex::new(r"[a-z]{3,}").unwrap();
    let mut counts: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    for text in snippets {
        let lower = text.to_lowercase();
        for m in word_re.find_iter(&lower) {
            let word = m.as_str();
            if !STOPWORDS.contains(&word) {
                *counts.entry(word.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let top: Vec<String> = ranked
        .into_iter()
        .take(3)
        .map(|(w, _)| capitalize(&w))
        .collect();

    if top.is_empty() {
        "Misc".to_string()
    } else {
        top.join("_")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
