//! Tests for the metadata store

use super::*;
use crate::core::types::NOISE_CLUSTER;
use crate::db::{create_database_pool, DatabaseConfig};
use tempfile::TempDir;

async fn open_store(dir: &TempDir) -> MetadataStore {
    let config = DatabaseConfig::with_path(dir.path().join("meta.db"));
    let pool = create_database_pool(&config).await.unwrap();
    MetadataStore::open(pool).await.unwrap()
}

fn record(name: &str, hash: &str) -> FileRecord {
    FileRecord {
        id: 0,
        filename: name.to_string(),
        original_path: PathBuf::from(format!("/root/{}", name)),
        current_path: PathBuf::from(format!("/root/{}", name)),
        content_hash: hash.to_string(),
        embedding: vec![0.1, 0.2, 0.3, 0.4],
        embedding_dim: 4,
        cluster_id: NOISE_CLUSTER,
        layout_x: 0.0,
        layout_y: 0.0,
        summary: String::new(),
        file_type: "txt".to_string(),
        size_bytes: 10,
        word_count: 2,
        created_at: Utc::now(),
        modified_at: Utc::now(),
    }
}

#[test]
fn test_embedding_codec_roundtrip() {
    let v = vec![0.5f32, -1.25, 3.75, 0.0];
    assert_eq!(bytes_to_embedding(&embedding_to_bytes(&v)), v);
    assert!(bytes_to_embedding(&[]).is_empty());
}

#[tokio::test]
async fn test_upsert_is_keyed_on_original_path() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let first = store.upsert_file(&record("a.txt", "h1")).await.unwrap();

    let mut updated = record("a.txt", "h2");
    updated.current_path = PathBuf::from("/root/Group/a.txt");
    let second = store.upsert_file(&updated).await.unwrap();

    assert_eq!(first, second);
    let all = store.get_all_files().await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].content_hash, "h2");
    assert_eq!(all[0].current_path, PathBuf::from("/root/Group/a.txt"));
}

#[tokio::test]
async fn test_lookup_by_current_path() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let mut rec = record("b.txt", "h3");
    rec.current_path = PathBuf::from("/root/Notes/b.txt");
    store.upsert_file(&rec).await.unwrap();

    let found = store
        .get_file_by_path(Path::new("/root/Notes/b.txt"))
        .await
        .unwrap();
    assert!(found.is_some());
    assert_eq!(found.unwrap().original_path, PathBuf::from("/root/b.txt"));
}

#[tokio::test]
async fn test_embedding_survives_roundtrip() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let id = store.upsert_file(&record("c.txt", "h4")).await.unwrap();
    let back = store.get_file_by_id(id).await.unwrap().unwrap();
    assert_eq!(back.embedding, vec![0.1, 0.2, 0.3, 0.4]);
    assert_eq!(back.embedding_dim, 4);
}

#[tokio::test]
async fn test_bulk_assignment_update() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let a = store.upsert_file(&record("a.txt", "ha")).await.unwrap();
    let b = store.upsert_file(&record("b.txt", "hb")).await.unwrap();

    store
        .update_assignments(&[(a, 0, 1.5, -2.5), (b, NOISE_CLUSTER, 0.0, 0.0)])
        .await
        .unwrap();

    let rec_a = store.get_file_by_id(a).await.unwrap().unwrap();
    assert_eq!(rec_a.cluster_id, 0);
    assert!((rec_a.layout_x - 1.5).abs() < 1e-6);

    let rec_b = store.get_file_by_id(b).await.unwrap().unwrap();
    assert!(rec_b.is_noise());
}

#[tokio::test]
async fn test_clusters_replaced_on_recluster() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let c0 = ClusterRecord::new(
        0,
        "Old_Name".to_string(),
        PathBuf::from("/root/Old_Name"),
        vec![1.0, 0.0],
        3,
    );
    store.upsert_cluster(&c0).await.unwrap();

    store.clear_clusters().await.unwrap();
    let c1 = ClusterRecord::new(
        0,
        "New_Name".to_string(),
        PathBuf::from("/root/New_Name"),
        vec![0.0, 1.0],
        2,
    );
    store.upsert_cluster(&c1).await.unwrap();

    let clusters = store.get_all_clusters().await.unwrap();
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].name, "New_Name");
    assert_eq!(clusters[0].centroid, vec![0.0, 1.0]);
}

#[tokio::test]
async fn test_event_log_is_append_only_and_ordered() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    store.add_event(Some(1), "file_added", "a.txt").await.unwrap();
    store.add_event(Some(1), "file_removed", "a.txt").await.unwrap();

    let events = store.recent_events(10).await.unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, "file_removed");
    assert_eq!(events[1].event_type, "file_added");
}

#[tokio::test]
async fn test_delete_by_path_matches_either_path() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir).await;

    let mut rec = record("d.txt", "h5");
    rec.current_path = PathBuf::from("/root/Group/d.txt");
    store.upsert_file(&rec).await.unwrap();

    store
        .delete_file_by_path(Path::new("/root/Group/d.txt"))
        .await
        .unwrap();
    assert!(store.get_all_files().await.unwrap().is_empty());
}
