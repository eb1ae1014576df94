//! Tests for the record reconciler

use super::*;
use chrono::{Duration as ChronoDuration, Utc};
use std::fs;
use tempfile::TempDir;

fn record(id: i64, original: PathBuf, current: PathBuf, hash: &str) -> FileRecord {
    FileRecord {
        id,
        filename: current
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        original_path: original,
        current_path: current,
        content_hash: hash.to_string(),
        embedding: vec![0.1; 4],
        embedding_dim: 4,
        cluster_id: 0,
        layout_x: 0.0,
        layout_y: 0.0,
        summary: String::new(),
        file_type: "txt".to_string(),
        size_bytes: 1,
        word_count: 1,
        created_at: Utc::now(),
        modified_at: Utc::now(),
    }
}

#[test]
fn test_intact_records_untouched() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.txt");
    fs::write(&path, "x").unwrap();

    let records = vec![record(1, path.clone(), path, "h1")];
    let report = RecordReconciler::sweep(&records);
    assert!(report.is_empty());
}

#[test]
fn test_orphan_removed_when_no_path_survives() {
    let dir = TempDir::new().unwrap();
    let gone = dir.path().join("gone.txt");

    let records = vec![record(1, gone.clone(), gone, "h1")];
    let report = RecordReconciler::sweep(&records);
    assert_eq!(report.removed, vec![1]);
    assert!(report.repaired.is_empty());
}

#[test]
fn test_current_path_repaired_from_original() {
    let dir = TempDir::new().unwrap();
    let original = dir.path().join("orig.txt");
    fs::write(&original, "x").unwrap();
    let stale = dir.path().join("Cluster/orig.txt");

    let records = vec![record(1, original.clone(), stale, "h1")];
    let report = RecordReconciler::sweep(&records);
    assert!(report.removed.is_empty());
    assert_eq!(report.repaired, vec![(1, original)]);
}

#[test]
fn test_duplicate_hash_keeps_record_on_disk() {
    let dir = TempDir::new().unwrap();
    let on_disk = dir.path().join("kept.txt");
    fs::write(&on_disk, "x").unwrap();
    // The twin keeps a live original so orphan removal does not claim
    // it before the duplicate pass runs
    let stale_original = dir.path().join("stale.txt");
    fs::write(&stale_original, "x").unwrap();

    let records = vec![
        record(1, on_disk.clone(), on_disk, "same"),
        record(
            2,
            stale_original,
            dir.path().join("missing/stale.txt"),
            "same",
        ),
    ];

    let report = RecordReconciler::sweep(&records);
    assert_eq!(report.merged, vec![(1, 2)]);
}

#[test]
fn test_duplicate_hash_prefers_most_recently_modified() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, "x").unwrap();
    fs::write(&b, "x").unwrap();

    let mut older = record(1, a.clone(), a, "same");
    older.modified_at = Utc::now() - ChronoDuration::hours(2);
    let newer = record(2, b.clone(), b, "same");

    let report = RecordReconciler::sweep(&[older, newer]);
    assert_eq!(report.merged, vec![(2, 1)]);
}

#[test]
fn test_sweep_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let kept = dir.path().join("kept.txt");
    fs::write(&kept, "x").unwrap();
    let gone = dir.path().join("gone.txt");

    let records = vec![
        record(1, kept.clone(), kept.clone(), "h1"),
        record(2, gone.clone(), gone, "h2"),
    ];

    let first = RecordReconciler::sweep(&records);
    assert_eq!(first.removed, vec![2]);

    // Apply the first report: drop removed records
    let after: Vec<FileRecord> = records
        .into_iter()
        .filter(|r| !first.removed.contains(&r.id))
        .collect();

    let second = RecordReconciler::sweep(&after);
    assert!(second.is_empty());
}

#[test]
fn test_merge_then_sweep_again_is_stable() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, "x").unwrap();
    fs::write(&b, "x").unwrap();

    let records = vec![record(1, a.clone(), a, "same"), record(2, b.clone(), b, "same")];

    let first = RecordReconciler::sweep(&records);
    assert_eq!(first.merged.len(), 1);
    let (kept, dropped) = first.merged[0];

    let after: Vec<FileRecord> = records.into_iter().filter(|r| r.id != dropped).collect();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].id, kept);

    let second = RecordReconciler::sweep(&after);
    assert!(second.is_empty());
}

#[test]
fn test_distinct_hashes_never_merge() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.txt");
    let b = dir.path().join("b.txt");
    fs::write(&a, "x").unwrap();
    fs::write(&b, "y").unwrap();

    let records = vec![record(1, a.clone(), a, "h1"), record(2, b.clone(), b, "h2")];
    let report = RecordReconciler::sweep(&records);
    assert!(report.merged.is_empty());
}
