#![deny(missing_docs)]
#![doc = "Labels students High/Medium/Low by clustering their standardized ARCS vectors."]

/// Seeded k-means++ with restarts and column standardization.
pub mod kmeans;

use std::collections::BTreeMap;

use arcs_core::{
    level_distribution, ArcsError, MotivationLevel, MotivationProfile, ProfileStore, StudentId,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kmeans::{Point, DIMS};

/// Options controlling the clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOpts {
    /// Number of clusters. The labelling step requires exactly three.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Number of k-means++ restarts; the lowest inertia wins.
    #[serde(default = "default_n_init")]
    pub n_init: usize,
    /// Maximum Lloyd iterations per restart.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Convergence threshold on the summed squared centroid shift.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Master seed; restart `i` uses substream `i`.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_k() -> usize {
    3
}

fn default_n_init() -> usize {
    10
}

fn default_max_iterations() -> usize {
    300
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_seed() -> u64 {
    42
}

impl Default for ClusterOpts {
    fn default() -> Self {
        Self {
            k: default_k(),
            n_init: default_n_init(),
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            seed: default_seed(),
        }
    }
}

/// Centroid summary for one motivation level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelCentroid {
    /// Mean raw ARCS vector of the members.
    pub centroid: [f64; DIMS],
    /// Fitted centroid in standardized units.
    pub scaled_centroid: [f64; DIMS],
    /// Mean of the standardized centroid components, used for ranking.
    pub centroid_mean: f64,
    /// Number of members.
    pub size: usize,
}

/// Outcome of a successful clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterOutcome {
    /// Number of clusters formed.
    pub clusters_found: usize,
    /// Label counts over the clustered students.
    pub distribution: BTreeMap<MotivationLevel, usize>,
    /// Number of clustered students.
    pub total: usize,
    /// Per-level centroid diagnostics.
    pub centroids: BTreeMap<MotivationLevel, LevelCentroid>,
    /// Inertia of the winning restart, in standardized units.
    pub inertia: f64,
    /// Lloyd iterations of the winning restart.
    pub iterations: usize,
    /// New label per clustered student.
    pub labels: BTreeMap<StudentId, MotivationLevel>,
}

/// Clusters the complete profiles without touching any store.
///
/// Returns `Ok(None)` when fewer than three complete vectors exist or the
/// vectors cannot be separated.
pub fn label_profiles(
    profiles: &[MotivationProfile],
    opts: &ClusterOpts,
) -> Result<Option<ClusterOutcome>, ArcsError> {
    if opts.k != 3 {
        return Err(ArcsError::Config(
            arcs_core::ErrorInfo::new("cluster-k", "motivation labelling needs exactly 3 clusters")
                .with_context("k", opts.k.to_string()),
        ));
    }
    let complete: Vec<(&StudentId, Point)> = profiles
        .iter()
        .filter_map(|profile| {
            profile
                .complete_vector()
                .map(|vector| (&profile.student_id, vector))
        })
        .collect();
    if complete.len() < opts.k {
        debug!(
            complete = complete.len(),
            "not enough complete ARCS vectors to cluster"
        );
        return Ok(None);
    }

    let raw: Vec<Point> = complete.iter().map(|(_, vector)| *vector).collect();
    let fit = match kmeans::standardize(&raw).and_then(|scaled| kmeans::fit(&scaled, opts)) {
        Ok(fit) => fit,
        Err(ArcsError::NumericalDegeneracy(info)) => {
            warn!(code = %info.code, "clustering degenerate, labels left unchanged");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };

    let mut sums = vec![[0.0; DIMS]; opts.k];
    let mut sizes = vec![0usize; opts.k];
    for (vector, &cluster) in raw.iter().zip(fit.assignments.iter()) {
        sizes[cluster] += 1;
        for col in 0..DIMS {
            sums[cluster][col] += vector[col];
        }
    }
    let raw_centroids: Vec<[f64; DIMS]> = sums
        .iter()
        .zip(sizes.iter())
        .map(|(sum, &size)| {
            let mut centroid = *sum;
            for value in &mut centroid {
                *value /= size.max(1) as f64;
            }
            centroid
        })
        .collect();
    let level_of = rank_clusters(&fit.centroids);

    let labels: BTreeMap<StudentId, MotivationLevel> = complete
        .iter()
        .zip(fit.assignments.iter())
        .map(|((student, _), &cluster)| ((*student).clone(), level_of[cluster]))
        .collect();
    let mut distribution = level_distribution(labels.values());
    distribution.remove(&MotivationLevel::Unanalyzed);
    let centroids = raw_centroids
        .iter()
        .enumerate()
        .map(|(cluster, centroid)| {
            (
                level_of[cluster],
                LevelCentroid {
                    centroid: *centroid,
                    scaled_centroid: fit.centroids[cluster],
                    centroid_mean: centroid_mean(&fit.centroids[cluster]),
                    size: sizes[cluster],
                },
            )
        })
        .collect();

    Ok(Some(ClusterOutcome {
        clusters_found: opts.k,
        distribution,
        total: complete.len(),
        centroids,
        inertia: fit.inertia,
        iterations: fit.iterations,
        labels,
    }))
}

/// Re-clusters every complete profile in the store and bulk-saves the labels.
///
/// Incomplete profiles are written back as `Unanalyzed` in the same bulk
/// update. Nothing is written when `None` is returned.
pub fn update_all_motivation_levels<S: ProfileStore + ?Sized>(
    store: &S,
    opts: &ClusterOpts,
) -> Result<Option<ClusterOutcome>, ArcsError> {
    let profiles = store.load_profiles()?;
    let Some(outcome) = label_profiles(&profiles, opts)? else {
        return Ok(None);
    };
    let mut writes = outcome.labels.clone();
    for profile in &profiles {
        if profile.complete_vector().is_none() {
            writes.insert(profile.student_id.clone(), MotivationLevel::Unanalyzed);
        }
    }
    store.save_labels(&writes)?;
    info!(
        clustered = outcome.total,
        high = outcome.distribution.get(&MotivationLevel::High).copied().unwrap_or(0),
        medium = outcome.distribution.get(&MotivationLevel::Medium).copied().unwrap_or(0),
        low = outcome.distribution.get(&MotivationLevel::Low).copied().unwrap_or(0),
        "motivation levels updated"
    );
    Ok(Some(outcome))
}

fn centroid_mean(centroid: &[f64; DIMS]) -> f64 {
    centroid.iter().sum::<f64>() / DIMS as f64
}

/// Maps cluster index to level from the standardized centroids: lowest
/// centroid mean is `Low`, highest is `High`; ties keep the cluster order.
fn rank_clusters(centroids: &[[f64; DIMS]]) -> Vec<MotivationLevel> {
    let mut order: Vec<usize> = (0..centroids.len()).collect();
    order.sort_by(|&a, &b| {
        centroid_mean(&centroids[a])
            .partial_cmp(&centroid_mean(&centroids[b]))
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    let ranked = [
        MotivationLevel::Low,
        MotivationLevel::Medium,
        MotivationLevel::High,
    ];
    let mut level_of = vec![MotivationLevel::Medium; centroids.len()];
    for (rank, cluster) in order.into_iter().enumerate() {
        level_of[cluster] = ranked[rank.min(ranked.len() - 1)];
    }
    level_of
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranking_orders_by_centroid_mean() {
        let centroids = [[3.0; DIMS], [1.0; DIMS], [5.0; DIMS]];
        assert_eq!(
            rank_clusters(&centroids),
            vec![
                MotivationLevel::Medium,
                MotivationLevel::Low,
                MotivationLevel::High
            ]
        );
    }

    #[test]
    fn ranking_ties_follow_cluster_index() {
        let centroids = [[2.0; DIMS], [2.0; DIMS], [4.0; DIMS]];
        assert_eq!(
            rank_clusters(&centroids),
            vec![
                MotivationLevel::Low,
                MotivationLevel::Medium,
                MotivationLevel::High
            ]
        );
    }
}
