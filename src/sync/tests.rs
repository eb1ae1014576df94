//! Tests for the OS synchronizer

use super::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

fn synchronizer(root: &TempDir) -> (OsSynchronizer, Arc<MoveSuppressionGuard>) {
    let guard = Arc::new(MoveSuppressionGuard::new(Duration::from_secs(5)));
    let sync = OsSynchronizer::new(
        root.path().to_path_buf(),
        Arc::clone(&guard),
        Duration::ZERO,
    );
    (sync, guard)
}

fn item(id: i64, path: &Path, folder: &str) -> SyncItem {
    SyncItem {
        file_id: id,
        filename: path.file_name().unwrap().to_str().unwrap().to_string(),
        current_path: path.to_path_buf(),
        original_path: path.to_path_buf(),
        target_folder: folder.to_string(),
    }
}

#[tokio::test]
async fn test_moves_file_into_cluster_folder() {
    let root = TempDir::new().unwrap();
    let src = root.path().join("a.txt");
    fs::write(&src, "content").unwrap();

    let (sync, _) = synchronizer(&root);
    let plan = SyncPlan {
        items: vec![item(1, &src, "Notes")],
        cluster_folders: vec!["Notes".to_string()],
    };

    let report = sync.apply(&plan).await;
    assert_eq!(report.moves.len(), 1);
    assert!(report.is_clean());
    assert!(root.path().join("Notes/a.txt").exists());
    assert!(!src.exists());
}

#[tokio::test]
async fn test_collision_gets_numeric_suffix() {
    let root = TempDir::new().unwrap();
    let dir_a = root.path().join("inbox_a");
    let dir_b = root.path().join("inbox_b");
    fs::create_dir_all(&dir_a).unwrap();
    fs::create_dir_all(&dir_b).unwrap();

    let src_a = dir_a.join("report.pdf");
    let src_b = dir_b.join("report.pdf");
    fs::write(&src_a, "first").unwrap();
    fs::write(&src_b, "second").unwrap();

    let (sync, _) = synchronizer(&root);
    let plan = SyncPlan {
        items: vec![item(1, &src_a, "Reports"), item(2, &src_b, "Reports")],
        cluster_folders: vec!["Reports".to_string()],
    };

    let report = sync.apply(&plan).await;
    assert_eq!(report.moves.len(), 2);
    assert!(root.path().join("Reports/report.pdf").exists());
    assert!(root.path().join("Reports/report_1.pdf").exists());

    // No overwrite: both contents survive
    let a = fs::read_to_string(root.path().join("Reports/report.pdf")).unwrap();
    let b = fs::read_to_string(root.path().join("Reports/report_1.pdf")).unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_missing_source_is_skipped_not_fatal() {
    let root = TempDir::new().unwrap();
    let present = root.path().join("present.txt");
    fs::write(&present, "here").unwrap();
    let missing = root.path().join("missing.txt");

    let (sync, _) = synchronizer(&root);
    let plan = SyncPlan {
        items: vec![item(1, &missing, "Group"), item(2, &present, "Group")],
        cluster_folders: vec!["Group".to_string()],
    };

    let report = sync.apply(&plan).await;
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].file_id, 1);
    // The rest of the batch still moved
    assert_eq!(report.moves.len(), 1);
    assert!(root.path().join("Group/present.txt").exists());
}

#[tokio::test]
async fn test_falls_back_to_original_path() {
    let root = TempDir::new().unwrap();
    let original = root.path().join("orig.txt");
    fs::write(&original, "content").unwrap();

    let (sync, _) = synchronizer(&root);
    let mut it = item(1, &root.path().join("stale/current.txt"), "Group");
    it.original_path = original.clone();
    it.filename = "orig.txt".to_string();

    let plan = SyncPlan {
        items: vec![it],
        cluster_folders: vec!["Group".to_string()],
    };
    let report = sync.apply(&plan).await;
    assert_eq!(report.moves.len(), 1);
    assert_eq!(report.moves[0].from, original);
    assert!(root.path().join("Group/orig.txt").exists());
}

#[tokio::test]
async fn test_file_already_in_place_is_not_moved() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("Group");
    fs::create_dir_all(&dir).unwrap();
    let src = dir.join("a.txt");
    fs::write(&src, "content").unwrap();

    let (sync, _) = synchronizer(&root);
    let plan = SyncPlan {
        items: vec![item(1, &src, "Group")],
        cluster_folders: vec!["Group".to_string()],
    };

    let report = sync.apply(&plan).await;
    assert!(report.moves.is_empty());
    assert!(report.is_clean());
    assert!(src.exists());
}

#[tokio::test]
async fn test_guard_armed_with_sources_and_destinations() {
    let root = TempDir::new().unwrap();
    let src = root.path().join("a.txt");
    fs::write(&src, "content").unwrap();

    let (sync, guard) = synchronizer(&root);
    let plan = SyncPlan {
        items: vec![item(1, &src, "Notes")],
        cluster_folders: vec!["Notes".to_string()],
    };
    sync.apply(&plan).await;

    assert!(guard.is_guarded(&src));
    assert!(guard.is_guarded(&root.path().join("Notes/a.txt")));
}

#[tokio::test]
async fn test_emptied_directories_are_removed() {
    let root = TempDir::new().unwrap();
    let old_dir = root.path().join("Old_Cluster");
    fs::create_dir_all(&old_dir).unwrap();
    let src = old_dir.join("a.txt");
    fs::write(&src, "content").unwrap();

    let (sync, _) = synchronizer(&root);
    let plan = SyncPlan {
        items: vec![item(1, &src, "New_Cluster")],
        cluster_folders: vec!["New_Cluster".to_string()],
    };
    sync.apply(&plan).await;

    // Old folder was emptied by the move and no cluster declares it
    assert!(!old_dir.exists());
    assert!(root.path().join("New_Cluster/a.txt").exists());
}

#[tokio::test]
async fn test_declared_cluster_folder_survives_while_empty() {
    let root = TempDir::new().unwrap();

    let (sync, _) = synchronizer(&root);
    let plan = SyncPlan {
        items: vec![],
        cluster_folders: vec!["Pending_Cluster".to_string()],
    };
    sync.apply(&plan).await;

    // Created empty and kept: it is still declared by the result
    assert!(root.path().join("Pending_Cluster").is_dir());
}

#[tokio::test]
async fn test_nested_empty_directories_cleaned_depth_first() {
    let root = TempDir::new().unwrap();
    let nested = root.path().join("a/b/c");
    fs::create_dir_all(&nested).unwrap();

    let (sync, _) = synchronizer(&root);
    sync.apply(&SyncPlan::default()).await;

    assert!(!root.path().join("a").exists());
}

#[test]
fn test_split_name() {
    assert_eq!(split_name("report.pdf"), ("report", Some("pdf")));
    assert_eq!(split_name("archive.tar.gz"), ("archive.tar", Some("gz")));
    assert_eq!(split_name("Makefile"), ("Makefile", None));
    assert_eq!(split_name(".gitignore"), (".gitignore", None));
}

#[test]
fn test_resolve_collision_suffix_sequence() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("Group");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("a.txt"), "x").unwrap();
    fs::write(dir.join("a_1.txt"), "y").unwrap();

    let reserved = HashSet::new();
    let dest = resolve_collision(&dir, "a.txt", Path::new("/elsewhere/a.txt"), &reserved);
    assert_eq!(dest, dir.join("a_2.txt"));
}
