//! Processing pipeline
//!
//! Orchestrates the full flow: change batches from the watcher feed
//! per-file processing (extract -> embed -> summarize -> store), the
//! assignment policy decides between a cheap direct attach and a full
//! recluster, and the recluster pass rebuilds clusters, renames folders,
//! synchronizes the disk and sweeps the record set.
//!
//! No single file or provider failure may stop the loop: errors degrade
//! to logged skips and the engine keeps processing subsequent events.


use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;

use crate::cluster::{AssignmentDecision, AssignmentPolicy, ClusterItem, ClusteringEngine};
use crate::core::config::AppConfig;
use crate::core::error::{Recovery, RecoveryAction, Result};
use crate::core::types::{ClusterRecord, EngineEvent, EventBus, FileRecord, NOISE_CLUSTER};
use crate::embed::{EmbeddingService, NamingService};
use crate::extract::{self, ExtractionResult};
use crate::reconcile::RecordReconciler;
use crate::scheduler::ReclusterScheduler;
use crate::store::MetadataStore;
use crate::sync::{OsSynchronizer, SyncItem, SyncPlan};
use crate::watcher::{ChangeBatch, ChangeKind};

pub struct Pipeline {
    config: AppConfig,
    store: MetadataStore,
    embedder: Arc<EmbeddingService>,
    namer: Arc<NamingService>,
    clustering: ClusteringEngine,
    policy: AssignmentPolicy,
    synchronizer: OsSynchronizer,
    scheduler: Arc<ReclusterScheduler>,
    events: EventBus,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: AppConfig,
        store: MetadataStore,
        embedder: Arc<EmbeddingService>,
        namer: Arc<NamingService>,
        synchronizer: OsSynchronizer,
        scheduler: Arc<ReclusterScheduler>,
        events: EventBus,
    ) -> Self {
        let clustering = ClusteringEngine::new(config.engine.clone());
        let policy = AssignmentPolicy::new(
            config.engine.attach_threshold,
            config.engine.max_direct_attaches,
        );
        Self {
            config,
            store,
            embedder,
            namer,
            clustering,
            policy,
            synchronizer,
            scheduler,
            events,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<EmbeddingService> {
        &self.embedder
    }

    /// Drain one flushed change batch. Individual failures are logged
    /// and never abort the batch.
    pub async fn handle_batch(&self, batch: ChangeBatch) {
        for (path, kind) in batch.changes {
            let result = match kind {
                ChangeKind::Created | ChangeKind::Modified => self.process_change(&path).await,
                ChangeKind::Removed => self.remove_file(&path).await,
            };
            if let Err(e) = result {
                tracing::error!("Failed to handle {:?}: {}", path, e);
            }
        }
    }

    /// Process one created or modified file
    pub async fn process_change(&self, path: &Path) -> Result<()> {
        let Some(extraction) = self.extract_with_recovery(path).await else {
            return Ok(());
        };
        if extraction.text.trim().is_empty() {
            tracing::warn!("No text extracted from {:?}", path);
            return Ok(());
        }

        let existing = self.store.get_file_by_path(path).await?;
        if let Some(ref existing) = existing {
            if existing.content_hash == extraction.content_hash {
                tracing::debug!("File unchanged, skipping {:?}", path);
                return Ok(());
            }
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.events.publish(EngineEvent::ProcessingStart {
            filename: filename.clone(),
        });

        let embedding = self.embedder.embed(&extraction.text).await;
        let summary = self.namer.summarize(&extraction.text).await;

        let record = FileRecord {
            id: existing.as_ref().map(|e| e.id).unwrap_or(0),
            filename: filename.clone(),
            original_path: existing
                .as_ref()
                .map(|e| e.original_path.clone())
                .unwrap_or_else(|| path.to_path_buf()),
            current_path: path.to_path_buf(),
            embedding_dim: embedding.len(),
            embedding,
            content_hash: extraction.content_hash,
            cluster_id: existing.as_ref().map(|e| e.cluster_id).unwrap_or(NOISE_CLUSTER),
            layout_x: existing.as_ref().map(|e| e.layout_x).unwrap_or(0.0),
            layout_y: existing.as_ref().map(|e| e.layout_y).unwrap_or(0.0),
            summary,
            file_type: extraction.file_type,
            size_bytes: extraction.size_bytes,
            word_count: extraction.word_count,
            created_at: existing
                .as_ref()
                .map(|e| e.created_at)
                .unwrap_or_else(Utc::now),
            modified_at: Utc::now(),
        };

        let file_id = self.store.upsert_file(&record).await?;
        let event = if existing.is_some() {
            EngineEvent::FileModified {
                file_id,
                filename: filename.clone(),
            }
        } else {
            EngineEvent::FileAdded {
                file_id,
                filename: filename.clone(),
            }
        };
        let event_name = if existing.is_some() {
            "file_modified"
        } else {
            "file_added"
        };
        self.store.add_event(Some(file_id), event_name, &filename).await?;
        self.events.publish(event);

        tracing::info!(file_id, words = record.word_count, "Processed {:?}", path);

        self.assign_or_schedule(file_id, &record).await
    }

    /// Route a freshly stored file: direct attach when a cluster is
    /// close enough, otherwise a (debounced) full recluster.
    async fn assign_or_schedule(&self, file_id: i64, record: &FileRecord) -> Result<()> {
        let total = self.store.get_all_files().await?.len();
        if total < self.config.engine.min_files_for_clustering {
            // Too few files to justify any grouping yet
            return Ok(());
        }

        if !record.has_embedding() {
            // A zero vector carries no signal; a full pass can still
            // place everything else
            self.scheduler.request();
            return Ok(());
        }

        let clusters = self.store.get_all_clusters().await?;
        let decision =
            self.policy
                .decide(&record.embedding, &clusters, self.embedder.native_dim());

        match decision {
            AssignmentDecision::Attach {
                cluster_id,
                similarity,
            } => {
                tracing::info!(file_id, cluster_id, similarity, "Direct cluster attach");
                let Some(cluster) = clusters.iter().find(|c| c.id == cluster_id) else {
                    self.scheduler.request();
                    return Ok(());
                };

                let (centroid, file_count) = self.policy.apply_attach(cluster, &record.embedding);
                let mut updated = cluster.clone();
                updated.centroid = centroid;
                updated.file_count = file_count;
                updated.description =
                    format!("Cluster of {} semantically related files", file_count);
                self.store.upsert_cluster(&updated).await?;
                self.store.update_file_cluster(file_id, cluster_id).await?;

                // Place the file physically through the same guarded path
                // a full pass uses
                let plan = SyncPlan {
                    items: vec![SyncItem {
                        file_id,
                        filename: record.filename.clone(),
                        current_path: record.current_path.clone(),
                        original_path: record.original_path.clone(),
                        target_folder: updated.name.clone(),
                    }],
                    cluster_folders: clusters.iter().map(|c| c.name.clone()).collect(),
                };
                let report = self.synchronizer.apply(&plan).await;
                self.apply_move_report(&report).await?;
            }
            AssignmentDecision::NeedsRecluster => {
                self.scheduler.request();
            }
        }
        Ok(())
    }

    /// Process a deletion
    pub async fn remove_file(&self, path: &Path) -> Result<()> {
        let Some(existing) = self.store.get_file_by_path(path).await? else {
            return Ok(());
        };

        self.store.delete_file_by_path(path).await?;
        self.store
            .add_event(Some(existing.id), "file_removed", &existing.filename)
            .await?;
        self.events.publish(EngineEvent::FileRemoved {
            file_id: existing.id,
            filename: existing.filename,
        });

        self.scheduler.request();
        Ok(())
    }

    /// One full clustering + synchronization + reconciliation pass.
    /// Only the scheduler's run loop invokes this, which is what makes
    /// the single-flight guarantee hold engine-wide.
    pub async fn run_recluster(&self) -> Result<()> {
        let files = self.store.get_all_files().await?;
        let valid: Vec<&FileRecord> = files.iter().filter(|f| f.has_embedding()).collect();

        if valid.len() < self.config.engine.min_files_for_clustering {
            tracing::info!(
                tracked = files.len(),
                embedded = valid.len(),
                "Not enough files to cluster"
            );
            return Ok(());
        }

        self.events.publish(EngineEvent::ReclusteringStart);

        let items: Vec<ClusterItem> = valid
            .iter()
            .map(|f| ClusterItem {
                id: f.id,
                embedding: f.embedding.clone(),
            })
            .collect();
        let outcome = self.clustering.cluster(&items, self.embedder.native_dim());

        // Name clusters and replace the stored set atomically
        self.store.clear_clusters().await?;
        let mut cluster_names: Vec<(i64, String)> = Vec::new();
        for (cluster_id, centroid) in &outcome.centroids {
            let members: Vec<&&FileRecord> = valid
                .iter()
                .filter(|f| outcome.assignments.get(&f.id) == Some(cluster_id))
                .collect();
            let samples: Vec<String> = members
                .iter()
                .take(5)
                .map(|f| {
                    if f.summary.is_empty() {
                        f.filename.clone()
                    } else {
                        f.summary.clone()
                    }
                })
                .collect();

            let existing_names: Vec<String> =
                cluster_names.iter().map(|(_, n)| n.clone()).collect();
            let name = self.namer.name_cluster(&samples, &existing_names).await;

            let record = ClusterRecord::new(
                *cluster_id,
                name.clone(),
                self.config.root_folder.join(&name),
                centroid.clone(),
                members.len() as i64,
            );
            self.store.upsert_cluster(&record).await?;
            cluster_names.push((*cluster_id, name));
        }

        // Apply assignments and layout to file records
        let updates: Vec<(i64, i64, f32, f32)> = valid
            .iter()
            .map(|f| {
                let cluster = outcome
                    .assignments
                    .get(&f.id)
                    .copied()
                    .unwrap_or(NOISE_CLUSTER);
                let (x, y) = outcome.layout.get(&f.id).copied().unwrap_or((0.0, 0.0));
                (f.id, cluster, x, y)
            })
            .collect();
        self.store.update_assignments(&updates).await?;

        // Synchronize the disk
        let folder_for = |id: i64| -> String {
            cluster_names
                .iter()
                .find(|(cid, _)| *cid == id)
                .map(|(_, name)| name.clone())
                .unwrap_or_else(|| self.config.engine.noise_folder_name.clone())
        };

        let mut plan = SyncPlan {
            items: Vec::new(),
            cluster_folders: cluster_names.iter().map(|(_, n)| n.clone()).collect(),
        };
        let mut has_noise = false;
        for f in &valid {
            let cluster = outcome
                .assignments
                .get(&f.id)
                .copied()
                .unwrap_or(NOISE_CLUSTER);
            if cluster == NOISE_CLUSTER {
                has_noise = true;
            }
            plan.items.push(SyncItem {
                file_id: f.id,
                filename: f.filename.clone(),
                current_path: f.current_path.clone(),
                original_path: f.original_path.clone(),
                target_folder: folder_for(cluster),
            });
        }
        if has_noise {
            plan.cluster_folders
                .push(self.config.engine.noise_folder_name.clone());
        }

        let report = self.synchronizer.apply(&plan).await;
        self.apply_move_report(&report).await?;

        // Repair drift the moves could not explain
        self.sweep_records().await?;

        self.policy.note_full_recluster();

        self.events.publish(EngineEvent::ReclusteringEnd {
            cluster_count: cluster_names.len(),
            files_moved: report.moves.len(),
        });
        self.store
            .add_event(
                None,
                "reclustering_end",
                &format!(
                    "{} clusters, {} files moved, {} skipped",
                    cluster_names.len(),
                    report.moves.len(),
                    report.skipped.len()
                ),
            )
            .await?;

        tracing::info!(
            clusters = cluster_names.len(),
            moved = report.moves.len(),
            skipped = report.skipped.len(),
            "Clustering complete"
        );
        Ok(())
    }

    /// Record the true on-disk locations a completed sync produced
    async fn apply_move_report(&self, report: &crate::sync::MoveReport) -> Result<()> {
        for mv in &report.moves {
            let filename = mv
                .to
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.store
                .update_file_location(mv.file_id, &mv.to, &filename)
                .await?;
        }
        for skip in &report.skipped {
            tracing::warn!(file_id = skip.file_id, "Move skipped: {}", skip.reason);
        }
        Ok(())
    }

    /// Run the reconciler and apply its report to the store
    pub async fn sweep_records(&self) -> Result<()> {
        let records = self.store.get_all_files().await?;
        let report = RecordReconciler::sweep(&records);

        for (id, path) in &report.repaired {
            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            self.store.update_file_location(*id, path, &filename).await?;
        }
        for id in &report.removed {
            self.store.delete_file_by_id(*id).await?;
        }
        for (_, dropped) in &report.merged {
            self.store.delete_file_by_id(*dropped).await?;
        }

        if !report.is_empty() {
            tracing::info!(
                removed = report.removed.len(),
                repaired = report.repaired.len(),
                merged = report.merged.len(),
                "Record sweep applied"
            );
        }
        Ok(())
    }

    /// Scan the root folder, process every supported file, then request
    /// one full recluster for whatever arrived.
    pub async fn full_scan(&self) -> Result<usize> {
        let root = self.config.root_folder.clone();
        tokio::fs::create_dir_all(&root).await?;

        self.events.publish(EngineEvent::ScanStart {
            root: root.display().to_string(),
        });
        tracing::info!("Full scan of {:?}", root);

        let mut paths = Vec::new();
        collect_supported_files(&root, &mut paths);

        let mut count = 0;
        for path in paths {
            match self.process_change(&path).await {
                Ok(()) => count += 1,
                Err(e) => tracing::error!("Scan failed for {:?}: {}", path, e),
            }
        }

        if count > 0 {
            self.scheduler.request();
        }

        self.events
            .publish(EngineEvent::ScanComplete { file_count: count });
        tracing::info!("Scan complete: {} files processed", count);
        Ok(count)
    }

    /// Extract with one retry for transient read failures; everything
    /// else degrades to a logged skip.
    async fn extract_with_recovery(&self, path: &Path) -> Option<ExtractionResult> {
        let owned = path.to_path_buf();
        let first = tokio::task::spawn_blocking(move || extract::extract(&owned))
            .await
            .ok()?;

        match first {
            Ok(result) => Some(result),
            Err(e) => match e.recovery_action() {
                RecoveryAction::Retry => {
                    tracing::warn!("Extraction failed for {:?}, retrying once: {}", path, e);
                    let owned = path.to_path_buf();
                    tokio::task::spawn_blocking(move || extract::extract(&owned))
                        .await
                        .ok()?
                        .map_err(|e| {
                            tracing::warn!("Retry failed for {:?}: {}", path, e);
                            e
                        })
                        .ok()
                }
                _ => {
                    tracing::debug!("Skipping {:?}: {}", path, e);
                    None
                }
            },
        }
    }
}

/// Recursively collect supported files, skipping hidden directories
fn collect_supported_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Failed to read directory {:?}: {}", dir, e);
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if path.is_dir() {
            if !name.starts_with('.') {
                collect_supported_files(&path, out);
            }
        } else if extract::is_supported(&path) {
            out.push(path);
        }
    }
}
