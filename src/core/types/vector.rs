//! Embedding vector math
//!
//! Cosine similarity, L2 normalization, dimension normalization and the
//! exact running-mean centroid accumulator used by incremental attach.

/// Cosine similarity between two vectors of equal length.
/// Returns 0.0 for mismatched lengths or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

/// Cosine distance (1 − cosine similarity)
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// L2-normalize a vector in place; zero vectors are left unchanged
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Force a vector into `dim` components by zero-padding or truncating.
/// Used as the last resort when an embedding comes from a provider with
/// a different native dimension.
pub fn normalize_dim(v: &[f32], dim: usize) -> Vec<f32> {
    let mut out = Vec::with_capacity(dim);
    out.extend(v.iter().take(dim).copied());
    out.resize(dim, 0.0);
    out
}

/// Mean of a non-empty set of equal-length vectors
pub fn mean_vector(vectors: &[&[f32]]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dim = first.len();
    let mut sum = vec![0.0f32; dim];
    for v in vectors {
        if v.len() != dim {
            return None;
        }
        for (s, x) in sum.iter_mut().zip(v.iter()) {
            *s += x;
        }
    }
    let n = vectors.len() as f32;
    for s in sum.iter_mut() {
        *s /= n;
    }
    Some(sum)
}

/// Exact running-mean centroid: an explicit sum vector plus a member
/// count, so repeated incremental attaches stay numerically stable.
#[derive(Debug, Clone)]
pub struct CentroidAccumulator {
    sum: Vec<f32>,
    count: usize,
}

impl CentroidAccumulator {
    /// Start empty with a known dimension
    pub fn new(dim: usize) -> Self {
        Self {
            sum: vec![0.0; dim],
            count: 0,
        }
    }

    /// Reconstruct the accumulator from a stored mean and member count
    pub fn from_mean(mean: &[f32], count: usize) -> Self {
        let sum = mean.iter().map(|x| x * count as f32).collect();
        Self { sum, count }
    }

    /// Add one member, padding or truncating to the accumulator's dimension
    pub fn push(&mut self, embedding: &[f32]) {
        let v = normalize_dim(embedding, self.sum.len());
        for (s, x) in self.sum.iter_mut().zip(v.iter()) {
            *s += x;
        }
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Current mean; zero vector while empty
    pub fn mean(&self) -> Vec<f32> {
        if self.count == 0 {
            return self.sum.clone();
        }
        self.sum.iter().map(|s| s / self.count as f32).collect()
    }
}
