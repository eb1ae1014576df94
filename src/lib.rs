//! semfold - semantic folder organizer
//!
//! Continuously reorganizes a monitored directory into content-based
//! folders: watches for file changes, extracts text, computes
//! embeddings, clusters files by similarity, names the clusters and
//! relocates files on disk to match, without feeding its own moves
//! back into the watcher.

pub mod cluster;
pub mod core;
pub mod db;
pub mod embed;
pub mod extract;
pub mod logging;
pub mod pipeline;
pub mod reconcile;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod sync;
pub mod watcher;

// Re-export commonly used items
pub use cluster::{AssignmentPolicy, ClusteringEngine};
pub use core::config::AppConfig;
pub use core::error::{EngineError, Result};
pub use pipeline::Pipeline;
pub use scheduler::ReclusterScheduler;
pub use store::MetadataStore;
pub use sync::OsSynchronizer;
pub use watcher::{ChangeAggregator, FileWatcher, MoveSuppressionGuard};
