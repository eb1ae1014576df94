//! Record Reconciler
//!
//! Repairs the durable record set after out-of-band filesystem activity:
//! removes records whose file is gone, repoints records whose current
//! path vanished but whose original still exists, and merges records
//! that share a content hash (one physical file tracked twice after a
//! manual move). Sweeping is idempotent: a second pass over the same
//! state produces no further changes.

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::path::PathBuf;

use crate::core::types::FileRecord;

/// Actions a sweep decided on; the caller applies them to the store
#[derive(Debug, Clone, Default)]
pub struct SweepReport {
    /// Records to delete: the file is gone and nothing recovers it
    pub removed: Vec<i64>,
    /// Records whose current path is repaired to the surviving original
    pub repaired: Vec<(i64, PathBuf)>,
    /// Duplicate-hash merges as (kept, dropped) pairs
    pub merged: Vec<(i64, i64)>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.repaired.is_empty() && self.merged.is_empty()
    }
}

pub struct RecordReconciler;

impl RecordReconciler {
    /// Diff tracked records against the live filesystem.
    ///
    /// Duplicate groups keep the record whose path exists on disk,
    /// preferring the most recently modified; every other member is
    /// dropped.
    pub fn sweep(records: &[FileRecord]) -> SweepReport {
        let mut report = SweepReport::default();

        // Pass 1: orphans and repairs
        let mut live: Vec<&FileRecord> = Vec::with_capacity(records.len());
        for record in records {
            if record.current_path.exists() {
                live.push(record);
            } else if record.original_path.exists() {
                report
                    .repaired
                    .push((record.id, record.original_path.clone()));
                live.push(record);
            } else {
                tracing::info!(
                    file_id = record.id,
                    path = %record.current_path.display(),
                    "Removing orphaned record"
                );
                report.removed.push(record.id);
            }
        }

        // Pass 2: duplicate content hashes among the survivors
        let mut by_hash: HashMap<&str, Vec<&FileRecord>> = HashMap::new();
        for record in &live {
            by_hash
                .entry(record.content_hash.as_str())
                .or_default()
                .push(record);
        }

        for (_, group) in by_hash {
            if group.len() < 2 {
                continue;
            }
            let kept = group
                .iter()
                .max_by(|a, b| {
                    let a_exists = a.current_path.exists();
                    let b_exists = b.current_path.exists();
                    a_exists
                        .cmp(&b_exists)
                        .then(a.modified_at.cmp(&b.modified_at))
                        .then(a.id.cmp(&b.id))
                })
                .map(|r| r.id)
                .unwrap_or(group[0].id);

            for record in group {
                if record.id != kept {
                    tracing::info!(kept, dropped = record.id, "Merging duplicate records");
                    report.merged.push((kept, record.id));
                }
            }
        }

        report.removed.sort_unstable();
        report.merged.sort_unstable();
        report
    }
}
