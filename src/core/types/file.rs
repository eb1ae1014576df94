//! File record types
//!
//! Defines the per-document metadata structure stored in the database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cluster id sentinel for files that fit no cluster
pub const NOISE_CLUSTER: i64 = -1;

/// One tracked document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    /// Stable numeric id (SQLite rowid)
    pub id: i64,

    /// Filename as it currently appears on disk
    pub filename: String,

    /// First-seen location; unique per record
    pub original_path: PathBuf,

    /// True on-disk location after the latest completed sync
    pub current_path: PathBuf,

    /// BLAKE3 content hash; identical hash at a new path means a move
    pub content_hash: String,

    /// Embedding vector, empty until the provider has produced one
    pub embedding: Vec<f32>,

    /// Dimension the embedding was produced in
    pub embedding_dim: usize,

    /// Cluster membership; `NOISE_CLUSTER` when unclustered
    pub cluster_id: i64,

    /// 2-D layout coordinates (visualization only, never used for
    /// clustering decisions)
    pub layout_x: f32,
    pub layout_y: f32,

    /// Short LLM-generated summary (may be a truncation fallback)
    pub summary: String,

    /// File type label (lowercased extension)
    pub file_type: String,

    /// Size in bytes at extraction time
    pub size_bytes: u64,

    /// Word count of the extracted text
    pub word_count: u64,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl FileRecord {
    /// Whether this record carries a usable (non-zero) embedding
    pub fn has_embedding(&self) -> bool {
        !self.embedding.is_empty() && self.embedding.iter().any(|v| *v != 0.0)
    }

    /// Whether the record is currently in the noise bucket
    pub fn is_noise(&self) -> bool {
        self.cluster_id == NOISE_CLUSTER
    }
}
