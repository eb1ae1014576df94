//! Cluster record types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One named group of semantically related files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterRecord {
    /// Numeric cluster id; stable for the lifetime of one clustering run
    pub id: i64,

    /// Human-readable derived name, also the folder name
    pub name: String,

    /// Short description
    pub description: String,

    /// Target directory for members of this cluster
    pub folder_path: PathBuf,

    /// Mean embedding of current members, in the native dimension of
    /// the active provider
    pub centroid: Vec<f32>,

    /// Derived member count, kept consistent with file membership
    pub file_count: i64,

    pub created_at: DateTime<Utc>,
}

impl ClusterRecord {
    pub fn new(id: i64, name: String, folder_path: PathBuf, centroid: Vec<f32>, file_count: i64) -> Self {
        Self {
            id,
            description: format!("Cluster of {} semantically related files", file_count),
            name,
            folder_path,
            centroid,
            file_count,
            created_at: Utc::now(),
        }
    }
}
