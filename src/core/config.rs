//! Configuration module for semfold
//!
//! Handles application configuration including:
//! - The monitored root folder and database location
//! - Engine tuning (thresholds, debounce/cooldown/settle windows)
//! - Embedding and naming provider settings
//! - HTTP server binding
//!
//! All numeric thresholds and timer windows are configuration defaults,
//! not hard invariants; tests construct scaled-down variants.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{ConfigError, Result};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root folder being organized
    pub root_folder: PathBuf,

    /// Database file path; defaults to `<root_folder>/.semfold.db`
    pub database_path: Option<PathBuf>,

    /// Optional log directory; console-only logging when unset
    pub log_directory: Option<PathBuf>,

    /// Engine tuning
    pub engine: EngineConfig,

    /// Embedding and naming providers
    pub providers: ProviderConfig,

    /// HTTP server settings
    pub server: ServerConfig,
}

/// Engine tuning: thresholds and timer windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Change aggregator debounce window in milliseconds
    pub change_debounce_ms: u64,

    /// Recluster scheduler debounce window in milliseconds
    pub recluster_debounce_ms: u64,

    /// Cooldown after a completed recluster pass in milliseconds
    pub cooldown_ms: u64,

    /// Move-suppression guard TTL in milliseconds
    pub guard_ttl_ms: u64,

    /// Settle delay held by the synchronizer after the last move
    pub settle_ms: u64,

    /// Minimum cosine similarity for a direct cluster attach (inclusive)
    pub attach_threshold: f32,

    /// Minimum cosine similarity for reassigning a noise point
    pub noise_threshold: f32,

    /// Direct attaches tolerated before a full recluster is forced
    pub max_direct_attaches: usize,

    /// Below this many tracked files clustering is not attempted
    pub min_files_for_clustering: usize,

    /// Item count at or below which agglomerative clustering is used
    pub agglomerative_max_items: usize,

    /// Cosine-distance threshold for merging agglomerative clusters
    pub merge_distance_threshold: f32,

    /// Minimum members for a density-based cluster
    pub min_cluster_size: usize,

    /// Half-extent of the 2-D layout display range
    pub layout_range: f32,

    /// Folder name for files that fit no cluster
    pub noise_folder_name: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            change_debounce_ms: 1_500,
            recluster_debounce_ms: 2_000,
            cooldown_ms: 5_000,
            guard_ttl_ms: 5_000,
            settle_ms: 2_500,
            attach_threshold: 0.40,
            noise_threshold: 0.40,
            max_direct_attaches: 5,
            min_files_for_clustering: 3,
            agglomerative_max_items: 25,
            merge_distance_threshold: 0.50,
            min_cluster_size: 2,
            layout_range: 400.0,
            noise_folder_name: "Uncategorised".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn change_debounce(&self) -> Duration {
        Duration::from_millis(self.change_debounce_ms)
    }

    pub fn recluster_debounce(&self) -> Duration {
        Duration::from_millis(self.recluster_debounce_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn guard_ttl(&self) -> Duration {
        Duration::from_millis(self.guard_ttl_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Embedding and naming provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Ollama-compatible endpoint
    pub ollama_host: String,

    /// Ollama embedding model
    pub ollama_embed_model: String,

    /// Ollama chat model used for summaries and folder names
    pub ollama_chat_model: String,

    /// OpenAI API key; the OpenAI providers are skipped when empty
    pub openai_api_key: String,

    /// OpenAI embedding model
    pub openai_embed_model: String,

    /// OpenAI chat model
    pub openai_chat_model: String,

    /// Per-request timeout for provider calls, in seconds
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            ollama_host: "http://localhost:11434".to_string(),
            ollama_embed_model: "nomic-embed-text".to_string(),
            ollama_chat_model: "llama3".to_string(),
            openai_api_key: String::new(),
            openai_embed_model: "text-embedding-3-small".to_string(),
            openai_chat_model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8484,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let root_folder = directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join("semfold_root"))
            .unwrap_or_else(|| PathBuf::from("semfold_root"));

        Self {
            root_folder,
            database_path: None,
            log_directory: None,
            engine: EngineConfig::default(),
            providers: ProviderConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `semfold.toml` (optional) and
    /// `SEMFOLD__`-prefixed environment variables, on top of defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load with an explicit config file path (used by the binary's `--config`)
    pub fn load_from(path: Option<&std::path::Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = match path {
            Some(p) => builder.add_source(config::File::from(p)),
            None => builder.add_source(config::File::with_name("semfold").required(false)),
        };

        let loaded = builder
            .add_source(config::Environment::with_prefix("SEMFOLD").separator("__"))
            .build()
            .map_err(|e| ConfigError::LoadFailed {
                reason: e.to_string(),
            })?;

        let mut cfg: AppConfig =
            loaded
                .try_deserialize()
                .map_err(|e| ConfigError::LoadFailed {
                    reason: e.to_string(),
                })?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolved database path
    pub fn database_path(&self) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| self.root_folder.join(".semfold.db"))
    }

    fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.engine.attach_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "engine.attach_threshold".to_string(),
                value: self.engine.attach_threshold.to_string(),
            }
            .into());
        }
        if !(0.0..=1.0).contains(&self.engine.noise_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "engine.noise_threshold".to_string(),
                value: self.engine.noise_threshold.to_string(),
            }
            .into());
        }
        if self.engine.min_cluster_size < 2 {
            self.engine.min_cluster_size = 2;
        }
        Ok(())
    }
}
