//! 2-D layout projection
//!
//! Projects embeddings into display coordinates. Principal-component
//! projection is the primary method; a deterministic circular
//! arrangement is the fallback, so layout can never fail. The output is
//! for display only and is never an input to clustering.

use ndarray::{Array1, Array2};

/// Power-iteration rounds per principal component
const POWER_ITERATIONS: usize = 60;

/// Project embeddings to 2-D and rescale into `[-range, range]`.
pub fn project(embeddings: &[Vec<f32>], range: f32) -> Vec<(f32, f32)> {
    let n = embeddings.len();
    match n {
        0 => return Vec::new(),
        1 => return vec![(0.0, 0.0)],
        2 => return vec![(-range / 2.0, 0.0), (range / 2.0, 0.0)],
        _ => {}
    }

    let coords = pca_2d(embeddings).unwrap_or_else(|| circle_2d(n));
    rescale(coords, range)
}

/// Principal-component projection via power iteration with deflation.
/// Returns None on degenerate geometry (zero variance, non-finite data).
fn pca_2d(embeddings: &[Vec<f32>]) -> Option<Vec<(f32, f32)>> {
    let n = embeddings.len();
    let dim = embeddings.first()?.len();
    if dim == 0 {
        return None;
    }

    // Center the data
    let mut data = Array2::<f32>::zeros((n, dim));
    for (i, emb) in embeddings.iter().enumerate() {
        for (j, v) in emb.iter().enumerate() {
            data[[i, j]] = *v;
        }
    }
    let mean = data.mean_axis(ndarray::Axis(0))?;
    for mut row in data.rows_mut() {
        row -= &mean;
    }

    let first = principal_component(&data, None)?;
    let second = principal_component(&data, Some(&first))?;

    let xs = data.dot(&first);
    let ys = data.dot(&second);

    let coords: Vec<(f32, f32)> = xs
        .iter()
        .zip(ys.iter())
        .map(|(x, y)| (*x, *y))
        .collect();

    if coords.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return None;
    }
    Some(coords)
}

/// Dominant eigenvector of X^T X by power iteration, deflated against
/// an optional earlier component.
fn principal_component(data: &Array2<f32>, deflate: Option<&Array1<f32>>) -> Option<Array1<f32>> {
    let dim = data.ncols();

    // Deterministic start vector; a constant vector would be orthogonal
    // to some components, so stagger the entries.
    let mut v = Array1::from_iter((0..dim).map(|i| 1.0 + (i % 7) as f32 * 0.1));
    normalize(&mut v)?;

    for _ in 0..POWER_ITERATIONS {
        if let Some(prev) = deflate {
            let proj = v.dot(prev);
            v = &v - &(prev * proj);
        }
        let projected = data.dot(&v);
        v = data.t().dot(&projected);
        normalize(&mut v)?;
    }

    if let Some(prev) = deflate {
        let proj = v.dot(prev);
        v = &v - &(prev * proj);
        normalize(&mut v)?;
    }
    Some(v)
}

fn normalize(v: &mut Array1<f32>) -> Option<()> {
    let norm = v.dot(v).sqrt();
    if !norm.is_finite() || norm < 1e-12 {
        return None;
    }
    *v /= norm;
    Some(())
}

/// Deterministic circular arrangement
fn circle_2d(n: usize) -> Vec<(f32, f32)> {
    (0..n)
        .map(|i| {
            let angle = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
            (angle.cos(), angle.sin())
        })
        .collect()
}

/// Linearly rescale coordinates into `[-range, range]` using one global
/// scale so relative distances survive.
fn rescale(coords: Vec<(f32, f32)>, range: f32) -> Vec<(f32, f32)> {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for (x, y) in &coords {
        min = min.min(*x).min(*y);
        max = max.max(*x).max(*y);
    }
    if !(max - min).is_finite() || (max - min) < 1e-12 {
        return coords;
    }
    let scale = 2.0 * range / (max - min);
    coords
        .into_iter()
        .map(|(x, y)| ((x - min) * scale - range, (y - min) * scale - range))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_tiny_inputs() {
        assert!(project(&[], 400.0).is_empty());
        assert_eq!(project(&[vec![1.0, 2.0]], 400.0), vec![(0.0, 0.0)]);

        let two = project(&[vec![1.0, 0.0], vec![0.0, 1.0]], 400.0);
        assert_eq!(two.len(), 2);
        assert_ne!(two[0], two[1]);
    }

    #[test]
    fn test_projection_separates_distinct_groups() {
        // Two tight groups along different axes must land apart in 2-D
        let mut embeddings = Vec::new();
        for i in 0..5 {
            let jitter = i as f32 * 0.01;
            embeddings.push(vec![1.0 + jitter, 0.0, 0.0, 0.0]);
        }
        for i in 0..5 {
            let jitter = i as f32 * 0.01;
            embeddings.push(vec![0.0, 1.0 + jitter, 0.0, 0.0]);
        }

        let coords = project(&embeddings, 400.0);
        assert_eq!(coords.len(), 10);

        let dist_within = |a: (f32, f32), b: (f32, f32)| ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
        let within = dist_within(coords[0], coords[4]);
        let across = dist_within(coords[0], coords[9]);
        assert!(across > within);
    }

    #[test]
    fn test_coords_within_display_range() {
        let embeddings: Vec<Vec<f32>> = (0..8)
            .map(|i| vec![i as f32, (i * i) as f32, 1.0])
            .collect();
        let range = 400.0;
        for (x, y) in project(&embeddings, range) {
            assert!(x >= -range - 1e-3 && x <= range + 1e-3);
            assert!(y >= -range - 1e-3 && y <= range + 1e-3);
        }
    }

    #[test]
    fn test_identical_vectors_fall_back_without_panicking() {
        // Zero variance breaks PCA; circular fallback takes over
        let embeddings = vec![vec![0.5, 0.5, 0.5]; 6];
        let coords = project(&embeddings, 400.0);
        assert_eq!(coords.len(), 6);
        assert!(coords.iter().all(|(x, y)| x.is_finite() && y.is_finite()));
        // Fallback yields distinct positions
        assert_ne!(coords[0], coords[3]);
    }

    #[test]
    fn test_zero_dimension_falls_back() {
        let embeddings = vec![vec![]; 4];
        let coords = project(&embeddings, 100.0);
        assert_eq!(coords.len(), 4);
    }
}
