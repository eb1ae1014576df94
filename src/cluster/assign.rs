//! Assignment Policy
//!
//! Decides whether a newly arrived file can be attached to an existing
//! cluster cheaply or must trigger a full recluster. Direct attaches
//! update the cluster centroid as an exact running mean; a bounded
//! number of them is tolerated before a full recluster is forced, which
//! caps the centroid drift incremental updates can accumulate.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::types::{cosine_similarity, normalize_dim, CentroidAccumulator, ClusterRecord};

/// Outcome of an assignment decision
#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentDecision {
    /// Attach to this cluster without reclustering
    Attach { cluster_id: i64, similarity: f32 },
    /// No cluster is close enough (or the attach budget ran out)
    NeedsRecluster,
}

pub struct AssignmentPolicy {
    /// Minimum cosine similarity for a direct attach; the boundary is
    /// inclusive
    attach_threshold: f32,
    /// Direct attaches tolerated since the last full recluster
    max_direct_attaches: usize,
    attaches_since_recluster: AtomicUsize,
}

impl AssignmentPolicy {
    pub fn new(attach_threshold: f32, max_direct_attaches: usize) -> Self {
        Self {
            attach_threshold,
            max_direct_attaches,
            attaches_since_recluster: AtomicUsize::new(0),
        }
    }

    /// Decide for a new file embedding against the current clusters.
    /// The embedding is normalized into `native_dim` before comparing.
    pub fn decide(
        &self,
        embedding: &[f32],
        clusters: &[ClusterRecord],
        native_dim: usize,
    ) -> AssignmentDecision {
        if clusters.is_empty() {
            return AssignmentDecision::NeedsRecluster;
        }
        if self.attaches_since_recluster.load(Ordering::Relaxed) >= self.max_direct_attaches {
            return AssignmentDecision::NeedsRecluster;
        }

        let emb = normalize_dim(embedding, native_dim);
        let mut best: Option<(i64, f32)> = None;
        for cluster in clusters {
            if cluster.centroid.is_empty() {
                continue;
            }
            let centroid = normalize_dim(&cluster.centroid, native_dim);
            let sim = cosine_similarity(&emb, &centroid);
            if best.map(|(_, bs)| sim > bs).unwrap_or(true) {
                best = Some((cluster.id, sim));
            }
        }

        match best {
            Some((cluster_id, similarity)) if similarity >= self.attach_threshold => {
                AssignmentDecision::Attach {
                    cluster_id,
                    similarity,
                }
            }
            _ => AssignmentDecision::NeedsRecluster,
        }
    }

    /// Record a performed attach and return the updated centroid and
    /// member count for the cluster.
    pub fn apply_attach(&self, cluster: &ClusterRecord, embedding: &[f32]) -> (Vec<f32>, i64) {
        self.attaches_since_recluster.fetch_add(1, Ordering::Relaxed);

        let mut acc =
            CentroidAccumulator::from_mean(&cluster.centroid, cluster.file_count.max(0) as usize);
        acc.push(embedding);
        (acc.mean(), acc.count() as i64)
    }

    /// A full recluster resets the attach budget
    pub fn note_full_recluster(&self) {
        self.attaches_since_recluster.store(0, Ordering::Relaxed);
    }

    /// Direct attaches performed since the last full recluster
    pub fn pending_attaches(&self) -> usize {
        self.attaches_since_recluster.load(Ordering::Relaxed)
    }
}
