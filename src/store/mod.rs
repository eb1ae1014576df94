//! Metadata store for semfold
//!
//! SQLite persistence for file records, cluster records and the event
//! log. Embeddings and centroids are stored as little-endian f32 BLOBs.

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::core::error::Result;
use crate::core::types::{ClusterRecord, FileRecord};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        filename TEXT NOT NULL,
        original_path TEXT NOT NULL,
        current_path TEXT NOT NULL,
        content_hash TEXT NOT NULL,
        embedding BLOB,
        embedding_dim INTEGER NOT NULL DEFAULT 0,
        layout_x REAL NOT NULL DEFAULT 0.0,
        layout_y REAL NOT NULL DEFAULT 0.0,
        cluster_id INTEGER NOT NULL DEFAULT -1,
        summary TEXT NOT NULL DEFAULT '',
        file_type TEXT NOT NULL DEFAULT '',
        size_bytes INTEGER NOT NULL DEFAULT 0,
        word_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL,
        modified_at TEXT NOT NULL,
        UNIQUE(original_path)
    )",
    "CREATE TABLE IF NOT EXISTS clusters (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        folder_path TEXT NOT NULL DEFAULT '',
        centroid BLOB,
        file_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        file_id INTEGER,
        event_type TEXT NOT NULL,
        detail TEXT NOT NULL DEFAULT '',
        timestamp TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_files_cluster ON files(cluster_id)",
    "CREATE INDEX IF NOT EXISTS idx_files_hash ON files(content_hash)",
    "CREATE INDEX IF NOT EXISTS idx_events_ts ON events(timestamp DESC)",
];

/// Encode an embedding as little-endian f32 bytes
pub fn embedding_to_bytes(v: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(v.len() * 4);
    for x in v {
        out.extend_from_slice(&x.to_le_bytes());
    }
    out
}

/// Decode little-endian f32 bytes back into an embedding
pub fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// One row of the append-only event log
#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
    pub id: i64,
    pub file_id: Option<i64>,
    pub event_type: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

/// Durable metadata store backed by SQLite
#[derive(Clone)]
pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Wrap a pool and create the schema if missing
    pub async fn open(pool: SqlitePool) -> Result<Self> {
        for stmt in SCHEMA {
            sqlx::query(stmt).execute(&pool).await?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ─── File operations ─────────────────────────────────────────

    /// Insert or update a file record keyed on `original_path`.
    /// Returns the record's id.
    pub async fn upsert_file(&self, f: &FileRecord) -> Result<i64> {
        sqlx::query(
            "INSERT INTO files
               (filename, original_path, current_path, content_hash,
                embedding, embedding_dim, layout_x, layout_y, cluster_id,
                summary, file_type, size_bytes, word_count,
                created_at, modified_at)
             VALUES (?,?,?,?,?,?,?,?,?,?,?,?,?,?,?)
             ON CONFLICT(original_path) DO UPDATE SET
               filename=excluded.filename,
               current_path=excluded.current_path,
               content_hash=excluded.content_hash,
               embedding=excluded.embedding,
               embedding_dim=excluded.embedding_dim,
               layout_x=excluded.layout_x,
               layout_y=excluded.layout_y,
               cluster_id=excluded.cluster_id,
               summary=excluded.summary,
               file_type=excluded.file_type,
               size_bytes=excluded.size_bytes,
               word_count=excluded.word_count,
               modified_at=excluded.modified_at",
        )
        .bind(&f.filename)
        .bind(path_str(&f.original_path))
        .bind(path_str(&f.current_path))
        .bind(&f.content_hash)
        .bind(embedding_to_bytes(&f.embedding))
        .bind(f.embedding_dim as i64)
        .bind(f.layout_x as f64)
        .bind(f.layout_y as f64)
        .bind(f.cluster_id)
        .bind(&f.summary)
        .bind(&f.file_type)
        .bind(f.size_bytes as i64)
        .bind(f.word_count as i64)
        .bind(f.created_at.to_rfc3339())
        .bind(f.modified_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query("SELECT id FROM files WHERE original_path = ?")
            .bind(path_str(&f.original_path))
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("id"))
    }

    /// Look a record up by either its original or current path
    pub async fn get_file_by_path(&self, path: &Path) -> Result<Option<FileRecord>> {
        let row = sqlx::query("SELECT * FROM files WHERE original_path = ? OR current_path = ?")
            .bind(path_str(path))
            .bind(path_str(path))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_file(&r)))
    }

    pub async fn get_file_by_id(&self, id: i64) -> Result<Option<FileRecord>> {
        let row = sqlx::query("SELECT * FROM files WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| row_to_file(&r)))
    }

    pub async fn get_all_files(&self) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query("SELECT * FROM files ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_file).collect())
    }

    pub async fn delete_file_by_id(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_file_by_path(&self, path: &Path) -> Result<()> {
        sqlx::query("DELETE FROM files WHERE original_path = ? OR current_path = ?")
            .bind(path_str(path))
            .bind(path_str(path))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the true on-disk location after a completed move
    pub async fn update_file_location(
        &self,
        id: i64,
        current_path: &Path,
        filename: &str,
    ) -> Result<()> {
        sqlx::query("UPDATE files SET current_path = ?, filename = ? WHERE id = ?")
            .bind(path_str(current_path))
            .bind(filename)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_file_cluster(&self, id: i64, cluster_id: i64) -> Result<()> {
        sqlx::query("UPDATE files SET cluster_id = ? WHERE id = ?")
            .bind(cluster_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Bulk-apply assignments and layout coordinates after a full
    /// recluster: (file_id, cluster_id, layout_x, layout_y)
    pub async fn update_assignments(&self, updates: &[(i64, i64, f32, f32)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (file_id, cluster_id, x, y) in updates {
            sqlx::query("UPDATE files SET cluster_id = ?, layout_x = ?, layout_y = ? WHERE id = ?")
                .bind(cluster_id)
                .bind(*x as f64)
                .bind(*y as f64)
                .bind(file_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ─── Cluster operations ──────────────────────────────────────

    pub async fn upsert_cluster(&self, c: &ClusterRecord) -> Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO clusters
               (id, name, description, folder_path, centroid, file_count, created_at)
             VALUES (?,?,?,?,?,?,?)",
        )
        .bind(c.id)
        .bind(&c.name)
        .bind(&c.description)
        .bind(path_str(&c.folder_path))
        .bind(embedding_to_bytes(&c.centroid))
        .bind(c.file_count)
        .bind(c.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_all_clusters(&self) -> Result<Vec<ClusterRecord>> {
        let rows = sqlx::query("SELECT * FROM clusters ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(row_to_cluster).collect())
    }

    /// Drop all cluster records; each full recluster replaces the set
    /// atomically via `clear_clusters` + `upsert_cluster`.
    pub async fn clear_clusters(&self) -> Result<()> {
        sqlx::query("DELETE FROM clusters")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ─── Event log ───────────────────────────────────────────────

    pub async fn add_event(&self, file_id: Option<i64>, event_type: &str, detail: &str) -> Result<()> {
        sqlx::query("INSERT INTO events (file_id, event_type, detail, timestamp) VALUES (?,?,?,?)")
            .bind(file_id)
            .bind(event_type)
            .bind(detail)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn recent_events(&self, limit: i64) -> Result<Vec<StoredEvent>> {
        let rows = sqlx::query("SELECT * FROM events ORDER BY timestamp DESC, id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| StoredEvent {
                id: r.get("id"),
                file_id: r.get("file_id"),
                event_type: r.get("event_type"),
                detail: r.get("detail"),
                timestamp: parse_timestamp(&r.get::<String, _>("timestamp")),
            })
            .collect())
    }
}

fn path_str(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

fn row_to_file(row: &SqliteRow) -> FileRecord {
    let embedding = row
        .get::<Option<Vec<u8>>, _>("embedding")
        .map(|b| bytes_to_embedding(&b))
        .unwrap_or_default();

    FileRecord {
        id: row.get("id"),
        filename: row.get("filename"),
        original_path: PathBuf::from(row.get::<String, _>("original_path")),
        current_path: PathBuf::from(row.get::<String, _>("current_path")),
        content_hash: row.get("content_hash"),
        embedding,
        embedding_dim: row.get::<i64, _>("embedding_dim") as usize,
        cluster_id: row.get("cluster_id"),
        layout_x: row.get::<f64, _>("layout_x") as f32,
        layout_y: row.get::<f64, _>("layout_y") as f32,
        summary: row.get("summary"),
        file_type: row.get("file_type"),
        size_bytes: row.get::<i64, _>("size_bytes") as u64,
        word_count: row.get::<i64, _>("word_count") as u64,
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
        modified_at: parse_timestamp(&row.get::<String, _>("modified_at")),
    }
}

fn row_to_cluster(row: &SqliteRow) -> ClusterRecord {
    let centroid = row
        .get::<Option<Vec<u8>>, _>("centroid")
        .map(|b| bytes_to_embedding(&b))
        .unwrap_or_default();

    ClusterRecord {
        id: row.get("id"),
        name: row.get("name"),
        description: row.get("description"),
        folder_path: PathBuf::from(row.get::<String, _>("folder_path")),
        centroid,
        file_count: row.get("file_count"),
        created_at: parse_timestamp(&row.get::<String, _>("created_at")),
    }
}
