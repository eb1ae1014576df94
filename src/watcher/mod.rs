//! File watching and change aggregation
//!
//! Turns raw filesystem events into stable, deduplicated batches. A
//! burst of events on the same path collapses to one entry with the
//! latest kind; the debounce window restarts on every new event so a
//! continuous burst flushes exactly once. Paths armed in the
//! move-suppression guard are dropped before emission; they are the
//! engine's own moves coming back through the OS.

pub mod guard;


use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use uuid::Uuid;

use crate::core::error::{EngineError, Result};
use crate::extract;

pub use guard::MoveSuppressionGuard;

/// Deduplicated change kinds emitted to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// One flushed batch of changes
#[derive(Debug, Clone)]
pub struct ChangeBatch {
    /// Unique batch id
    pub id: Uuid,
    /// Deduplicated (path, kind) pairs; no path appears twice
    pub changes: Vec<(PathBuf, ChangeKind)>,
}

/// Configuration for the change aggregator
#[derive(Debug, Clone)]
pub struct AggregatorConfig {
    /// Debounce window; restarts on every event
    pub debounce: Duration,
    /// Channel buffer for raw events
    pub channel_buffer_size: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(1_500),
            channel_buffer_size: 1_024,
        }
    }
}

/// Collapse a new event kind into the pending kind for a path.
///
/// Rules: create-then-delete collapses to delete; delete-then-create is
/// a path replacement and becomes modify; otherwise the latest kind wins.
fn collapse_kind(prev: ChangeKind, next: ChangeKind) -> ChangeKind {
    match (prev, next) {
        (ChangeKind::Created, ChangeKind::Removed) => ChangeKind::Removed,
        (ChangeKind::Removed, ChangeKind::Created) => ChangeKind::Modified,
        (_, next) => next,
    }
}

/// Paths the watcher never reports: hidden/temp names and formats the
/// extractor does not track
fn should_ignore(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) if !name.is_empty() => name,
        _ => return true, // malformed path
    };
    if name.starts_with('~') {
        return true;
    }
    !extract::is_supported(path)
}

/// Collapses raw filesystem events into debounced, deduplicated batches
#[derive(Clone)]
pub struct ChangeAggregator {
    raw_tx: mpsc::Sender<(PathBuf, ChangeKind)>,
}

impl ChangeAggregator {
    /// Spawn the aggregation loop. Returns the handle used by event
    /// sources and the receiver the pipeline drains.
    pub fn spawn(
        config: AggregatorConfig,
        guard: Arc<MoveSuppressionGuard>,
    ) -> (Self, mpsc::Receiver<ChangeBatch>) {
        let (raw_tx, raw_rx) = mpsc::channel(config.channel_buffer_size);
        let (batch_tx, batch_rx) = mpsc::channel(64);

        tokio::spawn(aggregate_loop(config, guard, raw_rx, batch_tx));

        (Self { raw_tx }, batch_rx)
    }

    /// Feed one raw event. Callable from any thread; a malformed or
    /// ignorable path is dropped here.
    pub fn notify(&self, path: PathBuf, kind: ChangeKind) {
        if should_ignore(&path) {
            tracing::trace!(?path, "Ignoring event for untracked path");
            return;
        }
        if let Err(e) = self.raw_tx.try_send((path, kind)) {
            tracing::warn!("Change aggregator queue full, dropping event: {}", e);
        }
    }
}

async fn aggregate_loop(
    config: AggregatorConfig,
    guard: Arc<MoveSuppressionGuard>,
    mut raw_rx: mpsc::Receiver<(PathBuf, ChangeKind)>,
    batch_tx: mpsc::Sender<ChangeBatch>,
) {
    let mut pending: HashMap<PathBuf, ChangeKind> = HashMap::new();
    let mut deadline: Option<Instant> = None;

    loop {
        // Arbitrary placeholder deadline; the branch is disabled while
        // nothing is pending
        let flush_at = deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600));

        tokio::select! {
            maybe = raw_rx.recv() => {
                match maybe {
                    Some((path, kind)) => {
                        // The engine's own moves never enter the window
                        if guard.is_guarded(&path) {
                            tracing::trace!(?path, "Suppressed self-caused event");
                            continue;
                        }
                        pending
                            .entry(path)
                            .and_modify(|prev| *prev = collapse_kind(*prev, kind))
                            .or_insert(kind);
                        // Every event restarts the window
                        deadline = Some(Instant::now() + config.debounce);
                    }
                    None => {
                        flush(&mut pending, &guard, &batch_tx).await;
                        break;
                    }
                }
            }
            _ = tokio::time::sleep_until(flush_at), if deadline.is_some() => {
                flush(&mut pending, &guard, &batch_tx).await;
                deadline = None;
            }
        }
    }
}

async fn flush(
    pending: &mut HashMap<PathBuf, ChangeKind>,
    guard: &MoveSuppressionGuard,
    batch_tx: &mpsc::Sender<ChangeBatch>,
) {
    if pending.is_empty() {
        return;
    }

    // Guard check repeats at flush time: a path armed after its event
    // landed in the window is still the engine's own doing
    let changes: Vec<(PathBuf, ChangeKind)> = pending
        .drain()
        .filter(|(path, _)| !guard.is_guarded(path))
        .collect();

    if changes.is_empty() {
        return;
    }

    let batch = ChangeBatch {
        id: Uuid::now_v7(),
        changes,
    };
    tracing::debug!(batch_id = %batch.id, count = batch.changes.len(), "Flushing change batch");
    let _ = batch_tx.send(batch).await;
}

/// Watches the root folder and feeds raw events into the aggregator
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Start watching `root` recursively
    pub fn start(root: &Path, aggregator: ChangeAggregator) -> Result<Self> {
        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        for (path, kind) in convert_event(&event) {
                            aggregator.notify(path, kind);
                        }
                    }
                    Err(e) => tracing::warn!("Watcher error: {}", e),
                }
            })
            .map_err(|e| EngineError::Watcher(e.to_string()))?;

        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| EngineError::Watcher(format!("Failed to watch {:?}: {}", root, e)))?;

        tracing::info!("File watcher started on {:?}", root);
        Ok(Self { _watcher: watcher })
    }
}

/// Map a notify event to aggregator inputs. A rename is a delete of the
/// old path plus a create of the new one.
fn convert_event(event: &Event) -> Vec<(PathBuf, ChangeKind)> {
    use notify::event::{ModifyKind, RenameMode};

    match &event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeKind::Created))
            .collect(),
        EventKind::Remove(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeKind::Removed))
            .collect(),
        EventKind::Modify(ModifyKind::Name(mode)) => match mode {
            RenameMode::From => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeKind::Removed))
                .collect(),
            RenameMode::To => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeKind::Created))
                .collect(),
            RenameMode::Both if event.paths.len() == 2 => vec![
                (event.paths[0].clone(), ChangeKind::Removed),
                (event.paths[1].clone(), ChangeKind::Created),
            ],
            _ => event
                .paths
                .iter()
                .map(|p| (p.clone(), ChangeKind::Modified))
                .collect(),
        },
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|p| (p.clone(), ChangeKind::Modified))
            .collect(),
        _ => Vec::new(),
    }
}
