use arcs_core::{derive_substream_seed, ArcsError, ErrorInfo, RngHandle};
use serde::{Deserialize, Serialize};

use crate::ClusterOpts;

/// Number of ARCS dimensions per vector.
pub const DIMS: usize = 4;

/// Fixed-width feature vector.
pub type Point = [f64; DIMS];

/// Result of the best k-means restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansFit {
    /// Cluster index per input row.
    pub assignments: Vec<usize>,
    /// Final centroids in the (standardized) input space.
    pub centroids: Vec<Point>,
    /// Within-cluster sum of squared distances.
    pub inertia: f64,
    /// Lloyd iterations used by the winning restart.
    pub iterations: usize,
    /// Index of the winning restart.
    pub restart: usize,
}

/// Standardizes every column to zero mean and unit (population) variance.
///
/// Constant columns map to zero. Fails when every column is constant.
pub fn standardize(rows: &[Point]) -> Result<Vec<Point>, ArcsError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let n = rows.len() as f64;
    let mut means = [0.0; DIMS];
    let mut stds = [0.0; DIMS];
    for col in 0..DIMS {
        let mean = rows.iter().map(|row| row[col]).sum::<f64>() / n;
        let var = rows.iter().map(|row| (row[col] - mean).powi(2)).sum::<f64>() / n;
        means[col] = mean;
        stds[col] = var.sqrt();
    }
    if stds.iter().all(|std| *std < 1e-12) {
        return Err(ArcsError::NumericalDegeneracy(
            ErrorInfo::new("constant-columns", "every ARCS dimension has zero variance")
                .with_context("rows", rows.len().to_string()),
        ));
    }
    Ok(rows
        .iter()
        .map(|row| {
            let mut out = [0.0; DIMS];
            for col in 0..DIMS {
                out[col] = if stds[col] < 1e-12 {
                    0.0
                } else {
                    (row[col] - means[col]) / stds[col]
                };
            }
            out
        })
        .collect())
}

/// Runs `opts.n_init` seeded k-means++ restarts and keeps the lowest inertia.
pub fn fit(points: &[Point], opts: &ClusterOpts) -> Result<KMeansFit, ArcsError> {
    let k = opts.k;
    if k == 0 {
        return Err(ArcsError::Config(ErrorInfo::new(
            "kmeans-k",
            "k must be positive",
        )));
    }
    let distinct = count_distinct(points);
    if distinct < k {
        return Err(ArcsError::NumericalDegeneracy(
            ErrorInfo::new("too-few-distinct", "fewer distinct vectors than clusters")
                .with_context("distinct", distinct.to_string())
                .with_context("k", k.to_string()),
        ));
    }

    let mut best: Option<KMeansFit> = None;
    for restart in 0..opts.n_init.max(1) {
        let mut rng = RngHandle::from_seed(derive_substream_seed(opts.seed, restart as u64));
        let centroids = kmeans_plus_plus(points, k, &mut rng);
        let mut candidate = lloyd(points, centroids, opts);
        candidate.restart = restart;
        if !candidate.inertia.is_finite() {
            continue;
        }
        let better = best
            .as_ref()
            .map_or(true, |current| candidate.inertia < current.inertia);
        if better {
            best = Some(candidate);
        }
    }
    let best = best.ok_or_else(|| {
        ArcsError::NumericalDegeneracy(ErrorInfo::new(
            "kmeans-non-finite",
            "every restart produced a non-finite inertia",
        ))
    })?;

    let mut sizes = vec![0usize; k];
    for &cluster in &best.assignments {
        sizes[cluster] += 1;
    }
    if sizes.iter().any(|&size| size == 0) {
        return Err(ArcsError::NumericalDegeneracy(
            ErrorInfo::new("empty-cluster", "k-means left a cluster without members")
                .with_context("sizes", format!("{sizes:?}")),
        ));
    }
    Ok(best)
}

fn kmeans_plus_plus(points: &[Point], k: usize, rng: &mut RngHandle) -> Vec<Point> {
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.index(points.len())]);
    let mut min_distances: Vec<f64> = points
        .iter()
        .map(|point| squared_distance(point, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = min_distances.iter().sum();
        let next = if total <= 0.0 {
            // every point coincides with a centroid already
            0
        } else {
            let target = rng.unit() * total;
            let mut cumulative = 0.0;
            let mut chosen = points.len() - 1;
            for (idx, dist) in min_distances.iter().enumerate() {
                cumulative += dist;
                if cumulative > target && *dist > 0.0 {
                    chosen = idx;
                    break;
                }
            }
            chosen
        };
        let centroid = points[next];
        for (idx, point) in points.iter().enumerate() {
            let dist = squared_distance(point, &centroid);
            if dist < min_distances[idx] {
                min_distances[idx] = dist;
            }
        }
        centroids.push(centroid);
    }
    centroids
}

fn lloyd(points: &[Point], mut centroids: Vec<Point>, opts: &ClusterOpts) -> KMeansFit {
    let k = centroids.len();
    let mut assignments = vec![usize::MAX; points.len()];
    let mut iterations = 0;

    for iter in 0..opts.max_iterations.max(1) {
        iterations = iter + 1;
        let changed = assign_clusters(points, &centroids, &mut assignments);
        let updated = recompute_centroids(points, &mut assignments, &centroids, k);
        let shift: f64 = centroids
            .iter()
            .zip(updated.iter())
            .map(|(old, new)| squared_distance(old, new))
            .sum();
        centroids = updated;
        if !changed || shift <= opts.tolerance {
            break;
        }
    }
    assign_clusters(points, &centroids, &mut assignments);
    let centroids = recompute_centroids(points, &mut assignments, &centroids, k);
    let inertia = points
        .iter()
        .zip(assignments.iter())
        .map(|(point, &cluster)| squared_distance(point, &centroids[cluster]))
        .sum();

    KMeansFit {
        assignments,
        centroids,
        inertia,
        iterations,
        restart: 0,
    }
}

fn assign_clusters(points: &[Point], centroids: &[Point], assignments: &mut [usize]) -> bool {
    let mut changed = false;
    for (idx, point) in points.iter().enumerate() {
        let mut best = 0usize;
        let mut best_dist = f64::INFINITY;
        for (cluster, centroid) in centroids.iter().enumerate() {
            let dist = squared_distance(point, centroid);
            if dist < best_dist {
                best = cluster;
                best_dist = dist;
            }
        }
        if assignments[idx] != best {
            assignments[idx] = best;
            changed = true;
        }
    }
    changed
}

/// Recomputes centroids as member means. An emptied cluster takes over the
/// point furthest from its own centroid.
fn recompute_centroids(
    points: &[Point],
    assignments: &mut [usize],
    previous: &[Point],
    k: usize,
) -> Vec<Point> {
    let mut counts = vec![0usize; k];
    for &cluster in assignments.iter() {
        counts[cluster] += 1;
    }
    for cluster in 0..k {
        if counts[cluster] > 0 {
            continue;
        }
        let far = points
            .iter()
            .enumerate()
            .filter(|(idx, _)| counts[assignments[*idx]] > 1)
            .map(|(idx, point)| (idx, squared_distance(point, &previous[assignments[idx]])))
            .fold(None::<(usize, f64)>, |best, (idx, dist)| match best {
                Some((_, best_dist)) if best_dist >= dist => best,
                _ => Some((idx, dist)),
            });
        if let Some((idx, _)) = far {
            counts[assignments[idx]] -= 1;
            assignments[idx] = cluster;
            counts[cluster] += 1;
        }
    }

    let mut sums = vec![[0.0; DIMS]; k];
    for (point, &cluster) in points.iter().zip(assignments.iter()) {
        for col in 0..DIMS {
            sums[cluster][col] += point[col];
        }
    }
    sums.into_iter()
        .enumerate()
        .map(|(cluster, mut sum)| {
            if counts[cluster] == 0 {
                return previous[cluster];
            }
            for value in &mut sum {
                *value /= counts[cluster] as f64;
            }
            sum
        })
        .collect()
}

fn count_distinct(points: &[Point]) -> usize {
    let mut seen: Vec<&Point> = Vec::new();
    for point in points {
        if !seen.iter().any(|other| squared_distance(point, other) < 1e-18) {
            seen.push(point);
        }
    }
    seen.len()
}

/// Squared Euclidean distance.
pub fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standardize_centres_columns() {
        let rows = vec![[1.0, 2.0, 3.0, 3.0], [3.0, 4.0, 5.0, 3.0]];
        let scaled = standardize(&rows).unwrap();
        assert!((scaled[0][0] + 1.0).abs() < 1e-12);
        assert!((scaled[1][0] - 1.0).abs() < 1e-12);
        assert_eq!(scaled[0][3], 0.0);
    }

    #[test]
    fn constant_input_is_degenerate() {
        let rows = vec![[2.0; DIMS]; 5];
        assert!(matches!(
            standardize(&rows),
            Err(ArcsError::NumericalDegeneracy(_))
        ));
    }

    #[test]
    fn separated_blobs_are_recovered() {
        let mut points = Vec::new();
        for offset in [0.0, 10.0, 20.0] {
            for jitter in [0.0, 0.1, 0.2] {
                points.push([offset + jitter, offset, offset - jitter, offset]);
            }
        }
        let fit = fit(&points, &ClusterOpts::default()).unwrap();
        for blob in 0..3 {
            let first = fit.assignments[blob * 3];
            assert!(fit.assignments[blob * 3..blob * 3 + 3]
                .iter()
                .all(|&cluster| cluster == first));
        }
        assert!(fit.inertia < 1.0);
    }

    #[test]
    fn too_few_distinct_points_fail() {
        let points = vec![[1.0; DIMS], [1.0; DIMS], [2.0; DIMS]];
        assert!(matches!(
            fit(&points, &ClusterOpts::default()),
            Err(ArcsError::NumericalDegeneracy(_))
        ));
    }
}
