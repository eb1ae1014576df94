//! Move-Suppression Guard
//!
//! Marks paths as engine-caused for a TTL so the change aggregator can
//! tell the synchronizer's own moves apart from external edits. Without
//! it, every physical move the engine performs would look like a user
//! change and re-trigger reclustering forever.
//!
//! The guard is an allow-list with TTL, not a watcher kill-switch:
//! manual edits to unrelated paths during a sync are still observed.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use dashmap::DashMap;

pub struct MoveSuppressionGuard {
    paths: DashMap<PathBuf, Instant>,
    ttl: Duration,
}

impl MoveSuppressionGuard {
    pub fn new(ttl: Duration) -> Self {
        Self {
            paths: DashMap::new(),
            ttl,
        }
    }

    /// Mark a set of paths as engine-caused for the TTL window.
    /// Re-arming an already guarded path restarts its window.
    pub fn arm<I>(&self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let now = Instant::now();
        for path in paths {
            self.paths.insert(path, now);
        }
    }

    /// Whether a path was armed within the TTL window. Expired entries
    /// are pruned lazily on every check.
    pub fn is_guarded(&self, path: &Path) -> bool {
        self.prune();
        self.paths.contains_key(path)
    }

    /// Number of currently guarded paths
    pub fn guarded_count(&self) -> usize {
        self.prune();
        self.paths.len()
    }

    fn prune(&self) {
        let ttl = self.ttl;
        let now = Instant::now();
        self.paths
            .retain(|_, armed_at| now.duration_since(*armed_at) < ttl);
    }
}
