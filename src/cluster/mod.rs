//! Clustering Engine
//!
//! Groups document embeddings into clusters and produces a 2-D layout
//! for visualization. The pipeline is:
//!
//! 1. Dimension normalization: every embedding is forced into the
//!    active provider's native dimension before any distance is taken.
//! 2. High-dimensional clustering: agglomerative for small sets,
//!    density-based above the method-switch size. Clustering always
//!    runs on the original high-dimensional embeddings; the 2-D layout
//!    is never an input to any grouping decision.
//! 3. Noise reassignment: points the method left unclustered are
//!    pulled into their nearest cluster when similar enough.
//! 4. 2-D projection for display, with a fallback that cannot fail.
//!
//! The engine always returns a result; if every method degenerates the
//! outcome is all-noise, which is a valid terminal state.

pub mod assign;
pub mod layout;


use std::collections::{BTreeMap, HashMap};

use crate::core::config::EngineConfig;
use crate::core::types::{cosine_distance, cosine_similarity, l2_normalize, normalize_dim, NOISE_CLUSTER};

pub use assign::{AssignmentDecision, AssignmentPolicy};

/// One item to cluster
#[derive(Debug, Clone)]
pub struct ClusterItem {
    pub id: i64,
    pub embedding: Vec<f32>,
}

/// Result of one clustering run
#[derive(Debug, Clone, Default)]
pub struct ClusteringOutcome {
    /// id -> cluster index, or `NOISE_CLUSTER`
    pub assignments: HashMap<i64, i64>,
    /// cluster index -> centroid in the native dimension
    pub centroids: BTreeMap<i64, Vec<f32>>,
    /// id -> display coordinates
    pub layout: HashMap<i64, (f32, f32)>,
}

impl ClusteringOutcome {
    /// Number of non-noise clusters
    pub fn cluster_count(&self) -> usize {
        self.centroids.len()
    }

    /// Ids currently labeled noise
    pub fn noise_ids(&self) -> Vec<i64> {
        self.assignments
            .iter()
            .filter(|(_, c)| **c == NOISE_CLUSTER)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Internal failure of one clustering method; triggers the fallback
#[derive(Debug)]
enum MethodError {
    Degenerate(&'static str),
}

pub struct ClusteringEngine {
    config: EngineConfig,
}

impl ClusteringEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Cluster a set of (id, embedding) pairs.
    ///
    /// `native_dim` is the active provider's dimension; 0 lets the
    /// engine infer it from the first non-empty embedding.
    pub fn cluster(&self, items: &[ClusterItem], native_dim: usize) -> ClusteringOutcome {
        let mut outcome = ClusteringOutcome::default();
        if items.is_empty() {
            return outcome;
        }

        let dim = if native_dim > 0 {
            native_dim
        } else {
            items
                .iter()
                .map(|i| i.embedding.len())
                .find(|l| *l > 0)
                .unwrap_or(0)
        };
        if dim == 0 {
            for item in items {
                outcome.assignments.insert(item.id, NOISE_CLUSTER);
                outcome.layout.insert(item.id, (0.0, 0.0));
            }
            return outcome;
        }

        // Step 1: every embedding into the native dimension
        let embeddings: Vec<Vec<f32>> = items
            .iter()
            .map(|i| normalize_dim(&i.embedding, dim))
            .collect();

        // Step 4 runs regardless of how clustering goes
        let coords = layout::project(&embeddings, self.config.layout_range);
        for (item, xy) in items.iter().zip(coords.iter()) {
            outcome.layout.insert(item.id, *xy);
        }

        // Below the minimum there is nothing to group
        if items.len() < self.config.min_files_for_clustering {
            for item in items {
                outcome.assignments.insert(item.id, NOISE_CLUSTER);
            }
            return outcome;
        }

        // Step 2: cluster L2-normalized copies so cosine distance is the
        // working metric for both methods
        let mut unit: Vec<Vec<f32>> = embeddings.clone();
        for v in unit.iter_mut() {
            l2_normalize(v);
        }

        let mut labels = self.cluster_with_fallback(&unit);

        // Step 3: pull near-enough noise points into their nearest cluster
        let mut centroids = compute_centroids(&embeddings, &labels);
        reassign_noise(&embeddings, &mut labels, &centroids, self.config.noise_threshold);
        centroids = compute_centroids(&embeddings, &labels);

        for (item, label) in items.iter().zip(labels.iter()) {
            outcome.assignments.insert(item.id, *label);
        }
        outcome.centroids = centroids;
        outcome
    }

    /// Primary method by size, the alternate on failure, all-noise as
    /// the terminal state.
    fn cluster_with_fallback(&self, unit: &[Vec<f32>]) -> Vec<i64> {
        let n = unit.len();
        let agglomerative_first = n <= self.config.agglomerative_max_items;

        let primary = if agglomerative_first {
            self.agglomerative(unit)
        } else {
            self.density_based(unit)
        };

        match primary {
            Ok(labels) => labels,
            Err(MethodError::Degenerate(reason)) => {
                tracing::warn!("Primary clustering method failed ({}), trying alternate", reason);
                let alternate = if agglomerative_first {
                    self.density_based(unit)
                } else {
                    self.agglomerative(unit)
                };
                match alternate {
                    Ok(labels) => labels,
                    Err(MethodError::Degenerate(reason)) => {
                        tracing::warn!("Alternate clustering method failed ({}), all points noise", reason);
                        vec![NOISE_CLUSTER; n]
                    }
                }
            }
        }
    }

    /// Bottom-up average-linkage clustering with a fixed cosine-distance
    /// merge threshold. Singleton leftovers are noise.
    fn agglomerative(&self, unit: &[Vec<f32>]) -> Result<Vec<i64>, MethodError> {
        let n = unit.len();
        let dist = pairwise_distances(unit)?;

        // Each point starts as its own cluster
        let mut members: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        let mut active: Vec<bool> = vec![true; n];

        loop {
            let mut best: Option<(usize, usize, f32)> = None;
            for i in 0..n {
                if !active[i] {
                    continue;
                }
                for j in (i + 1)..n {
                    if !active[j] {
                        continue;
                    }
                    let d = average_linkage(&members[i], &members[j], &dist, n);
                    if best.map(|(_, _, bd)| d < bd).unwrap_or(true) {
                        best = Some((i, j, d));
                    }
                }
            }

            match best {
                Some((i, j, d)) if d <= self.config.merge_distance_threshold => {
                    let merged = members[j].clone();
                    members[i].extend(merged);
                    active[j] = false;
                }
                _ => break,
            }
        }

        let mut labels = vec![NOISE_CLUSTER; n];
        let mut next = 0i64;
        for (ci, group) in members.iter().enumerate() {
            if !active[ci] || group.len() < self.config.min_cluster_size {
                continue;
            }
            for &p in group {
                labels[p] = next;
            }
            next += 1;
        }
        Ok(labels)
    }

    /// Density-based clustering: a point with enough neighbors within
    /// eps seeds a cluster that expands through other core points.
    /// Sparse points end up as noise.
    fn density_based(&self, unit: &[Vec<f32>]) -> Result<Vec<i64>, MethodError> {
        let n = unit.len();
        let dist = pairwise_distances(unit)?;
        let eps = self.config.merge_distance_threshold;
        let min_pts = self.config.min_cluster_size;

        let neighbors: Vec<Vec<usize>> = (0..n)
            .map(|i| (0..n).filter(|&j| dist[i * n + j] <= eps).collect())
            .collect();

        let mut labels = vec![NOISE_CLUSTER; n];
        let mut visited = vec![false; n];
        let mut next = 0i64;

        for seed in 0..n {
            if visited[seed] || neighbors[seed].len() < min_pts {
                continue;
            }

            let cluster = next;
            next += 1;

            let mut queue = vec![seed];
            visited[seed] = true;
            while let Some(p) = queue.pop() {
                labels[p] = cluster;
                if neighbors[p].len() < min_pts {
                    continue; // border point, do not expand through it
                }
                for &q in &neighbors[p] {
                    if !visited[q] {
                        visited[q] = true;
                        queue.push(q);
                    }
                }
            }
        }

        Ok(labels)
    }
}

/// Flat row-major pairwise cosine-distance matrix; errors on non-finite
/// values so the caller can fall back.
fn pairwise_distances(unit: &[Vec<f32>]) -> Result<Vec<f32>, MethodError> {
    let n = unit.len();
    let mut dist = vec![0.0f32; n * n];
    for i in 0..n {
        for j in (i + 1)..n {
            let d = cosine_distance(&unit[i], &unit[j]);
            if !d.is_finite() {
                return Err(MethodError::Degenerate("non-finite distance"));
            }
            dist[i * n + j] = d;
            dist[j * n + i] = d;
        }
    }
    Ok(dist)
}

fn average_linkage(a: &[usize], b: &[usize], dist: &[f32], n: usize) -> f32 {
    let mut sum = 0.0f32;
    for &i in a {
        for &j in b {
            sum += dist[i * n + j];
        }
    }
    sum / (a.len() * b.len()) as f32
}

/// Mean embedding per cluster label, in the input dimension
fn compute_centroids(embeddings: &[Vec<f32>], labels: &[i64]) -> BTreeMap<i64, Vec<f32>> {
    let mut sums: BTreeMap<i64, (Vec<f32>, usize)> = BTreeMap::new();
    for (emb, &label) in embeddings.iter().zip(labels.iter()) {
        if label == NOISE_CLUSTER {
            continue;
        }
        let entry = sums
            .entry(label)
            .or_insert_with(|| (vec![0.0; emb.len()], 0));
        for (s, x) in entry.0.iter_mut().zip(emb.iter()) {
            *s += x;
        }
        entry.1 += 1;
    }

    sums.into_iter()
        .map(|(label, (sum, count))| {
            let mean = sum.iter().map(|s| s / count as f32).collect();
            (label, mean)
        })
        .collect()
}

/// Reassign noise points whose best centroid similarity clears the
/// threshold; the rest stay noise.
fn reassign_noise(
    embeddings: &[Vec<f32>],
    labels: &mut [i64],
    centroids: &BTreeMap<i64, Vec<f32>>,
    threshold: f32,
) {
    if centroids.is_empty() {
        return;
    }
    for (i, label) in labels.iter_mut().enumerate() {
        if *label != NOISE_CLUSTER {
            continue;
        }
        let mut best: Option<(i64, f32)> = None;
        for (cid, centroid) in centroids {
            let sim = cosine_similarity(&embeddings[i], centroid);
            if best.map(|(_, bs)| sim > bs).unwrap_or(true) {
                best = Some((*cid, sim));
            }
        }
        if let Some((cid, sim)) = best {
            if sim >= threshold {
                *label = cid;
            }
        }
    }
}
