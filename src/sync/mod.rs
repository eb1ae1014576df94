//! OS Synchronizer
//!
//! Executes the physical moves implied by a clustering result. The guard
//! is armed with every source and destination before the first move so
//! the watcher can discard the notifications these moves generate, and
//! the synchronizer keeps holding it for a settle delay after the last
//! move to absorb OS notification latency.
//!
//! Failure policy: a missing source or a failed rename is recorded
//! per-file and never aborts the rest of the batch.

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::watcher::MoveSuppressionGuard;

/// One file to place into its target folder
#[derive(Debug, Clone)]
pub struct SyncItem {
    pub file_id: i64,
    pub filename: String,
    pub current_path: PathBuf,
    pub original_path: PathBuf,
    /// Folder name under the root, from the cluster's name
    pub target_folder: String,
}

/// The moves implied by one clustering result
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub items: Vec<SyncItem>,
    /// Folder names the clustering result still declares; these survive
    /// the empty-directory cleanup even with zero current members
    pub cluster_folders: Vec<String>,
}

/// A performed move
#[derive(Debug, Clone, PartialEq)]
pub struct MoveRecord {
    pub file_id: i64,
    pub from: PathBuf,
    pub to: PathBuf,
}

/// A file the synchronizer could not place
#[derive(Debug, Clone)]
pub struct SkippedMove {
    pub file_id: i64,
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of one synchronization pass
#[derive(Debug, Clone, Default)]
pub struct MoveReport {
    pub moves: Vec<MoveRecord>,
    pub skipped: Vec<SkippedMove>,
}

impl MoveReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub struct OsSynchronizer {
    root: PathBuf,
    guard: Arc<MoveSuppressionGuard>,
    settle: Duration,
}

impl OsSynchronizer {
    pub fn new(root: PathBuf, guard: Arc<MoveSuppressionGuard>, settle: Duration) -> Self {
        Self {
            root,
            guard,
            settle,
        }
    }

    /// Apply a sync plan: create folders, resolve and perform moves,
    /// clean up emptied directories, then hold the guard through the
    /// settle window.
    pub async fn apply(&self, plan: &SyncPlan) -> MoveReport {
        let mut report = MoveReport::default();

        for folder in &plan.cluster_folders {
            let dir = self.root.join(folder);
            if let Err(e) = tokio::fs::create_dir_all(&dir).await {
                tracing::error!("Failed to create cluster folder {:?}: {}", dir, e);
            }
        }

        // Resolve every move before touching the disk so the guard can
        // be armed with the complete set of paths first
        let mut reserved: HashSet<PathBuf> = HashSet::new();
        let mut resolved: Vec<MoveRecord> = Vec::new();

        for item in &plan.items {
            let source = if item.current_path.exists() {
                item.current_path.clone()
            } else if item.original_path.exists() {
                item.original_path.clone()
            } else {
                report.skipped.push(SkippedMove {
                    file_id: item.file_id,
                    path: item.current_path.clone(),
                    reason: "source file not found".to_string(),
                });
                continue;
            };

            let target_dir = self.root.join(&item.target_folder);
            let destination = resolve_collision(&target_dir, &item.filename, &source, &reserved);

            if source == destination {
                continue; // already in place
            }

            reserved.insert(destination.clone());
            resolved.push(MoveRecord {
                file_id: item.file_id,
                from: source,
                to: destination,
            });
        }

        // Arm before any move so even the earliest OS notification is
        // already suppressed
        let mut armed: Vec<PathBuf> = Vec::with_capacity(resolved.len() * 2);
        for mv in &resolved {
            armed.push(mv.from.clone());
            armed.push(mv.to.clone());
        }
        self.guard.arm(armed);

        for mv in resolved {
            match tokio::fs::rename(&mv.from, &mv.to).await {
                Ok(()) => {
                    tracing::info!("Moved {:?} -> {:?}", mv.from, mv.to);
                    report.moves.push(mv);
                }
                Err(e) => {
                    tracing::error!("Failed to move {:?}: {}", mv.from, e);
                    report.skipped.push(SkippedMove {
                        file_id: mv.file_id,
                        path: mv.from,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.cleanup_empty_dirs(&plan.cluster_folders);

        // Hold through the settle window; late notifications for the
        // moves above still find the guard armed
        tokio::time::sleep(self.settle).await;

        report
    }

    /// Remove now-empty directories under the root. Folders named by the
    /// current clustering result persist even when empty; only folders
    /// with no corresponding cluster go.
    fn cleanup_empty_dirs(&self, keep_names: &[String]) {
        let mut dirs = Vec::new();
        collect_dirs(&self.root, &mut dirs);
        // Deepest first so emptied parents are seen after their children
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));

        for dir in dirs {
            let is_kept_cluster_folder = dir.parent() == Some(self.root.as_path())
                && dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|name| keep_names.iter().any(|k| k == name))
                    .unwrap_or(false);
            if is_kept_cluster_folder {
                continue;
            }

            let is_empty = std::fs::read_dir(&dir)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if is_empty {
                if std::fs::remove_dir(&dir).is_ok() {
                    tracing::info!("Removed empty directory {:?}", dir);
                }
            }
        }
    }
}

/// Pick a free destination name, appending `_1`, `_2`, … when a
/// different file already holds the plain name.
fn resolve_collision(
    target_dir: &Path,
    filename: &str,
    source: &Path,
    reserved: &HashSet<PathBuf>,
) -> PathBuf {
    let plain = target_dir.join(filename);
    if plain == source {
        return plain;
    }
    if !plain.exists() && !reserved.contains(&plain) {
        return plain;
    }

    let (stem, ext) = split_name(filename);
    let mut counter = 1;
    loop {
        let candidate = target_dir.join(match ext {
            Some(ext) => format!("{}_{}.{}", stem, counter, ext),
            None => format!("{}_{}", stem, counter),
        });
        if candidate == source || (!candidate.exists() && !reserved.contains(&candidate)) {
            return candidate;
        }
        counter += 1;
    }
}

fn split_name(filename: &str) -> (&str, Option<&str>) {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    }
}

fn collect_dirs(root: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_dirs(&path, out);
            out.push(path);
        }
    }
}
