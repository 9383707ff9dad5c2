use serde::{Deserialize, Serialize};

use crate::config::{FitnessWeights, PenaltyConfig};
use crate::sizing::variance;

/// Number of analyzed motivation levels.
pub const LEVELS: usize = 3;

/// Breakdown of the fitness terms used by the optimizer and the reporter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitnessBreakdown {
    /// Size score `S`.
    pub size: f64,
    /// Inter-group uniformity `U`.
    pub uniformity: f64,
    /// Intra-group heterogeneity `H`.
    pub heterogeneity: f64,
    /// Weighted total.
    pub total: f64,
}

impl FitnessBreakdown {
    /// Whether every term is a finite number.
    pub fn is_finite(&self) -> bool {
        self.size.is_finite()
            && self.uniformity.is_finite()
            && self.heterogeneity.is_finite()
            && self.total.is_finite()
    }
}

/// Fixed inputs of the fitness function for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct FitnessContext {
    /// Group count.
    pub groups: usize,
    /// Target size per group.
    pub target_sizes: Vec<usize>,
    /// Subscore weights.
    pub weights: FitnessWeights,
    /// Penalty constants.
    pub penalties: PenaltyConfig,
    /// Size above which the oversize penalty applies.
    pub max_size: usize,
}

/// Per-group sizes and level counts of an assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupTally {
    /// Members per group.
    pub sizes: Vec<usize>,
    /// Members per group and level slot.
    pub counts: Vec<[usize; LEVELS]>,
}

impl GroupTally {
    /// Tallies `assignment` where `slots[i]` is member `i`'s level slot.
    ///
    /// Out-of-range group indices are ignored.
    pub fn from_assignment(assignment: &[usize], slots: &[usize], groups: usize) -> Self {
        let mut sizes = vec![0; groups];
        let mut counts = vec![[0; LEVELS]; groups];
        for (&group, &slot) in assignment.iter().zip(slots.iter()) {
            if group < groups && slot < LEVELS {
                sizes[group] += 1;
                counts[group][slot] += 1;
            }
        }
        Self { sizes, counts }
    }

    /// Groups with at least one member.
    pub fn non_empty(&self) -> impl Iterator<Item = (usize, &[usize; LEVELS])> {
        self.sizes
            .iter()
            .zip(self.counts.iter())
            .filter(|(size, _)| **size > 0)
            .map(|(&size, counts)| (size, counts))
    }
}

/// Scores an assignment.
pub fn evaluate(assignment: &[usize], slots: &[usize], ctx: &FitnessContext) -> FitnessBreakdown {
    let tally = GroupTally::from_assignment(assignment, slots, ctx.groups);
    evaluate_tally(&tally, ctx)
}

/// Scores a precomputed tally.
pub fn evaluate_tally(tally: &GroupTally, ctx: &FitnessContext) -> FitnessBreakdown {
    let size = size_score(&tally.sizes, &ctx.target_sizes, &ctx.penalties, ctx.max_size);
    let uniformity = uniformity_score(tally);
    let heterogeneity = heterogeneity_score(tally);
    let w = ctx.weights;
    FitnessBreakdown {
        size,
        uniformity,
        heterogeneity,
        total: w.size * size + w.uniformity * uniformity + w.heterogeneity * heterogeneity,
    }
}

/// `S = max(0, 1 - var(sizes) / max(target)^2 - penalty)`, where the penalty
/// is `oversize_penalty` per member above `max_size`.
pub fn size_score(
    sizes: &[usize],
    target_sizes: &[usize],
    penalties: &PenaltyConfig,
    max_size: usize,
) -> f64 {
    let largest = target_sizes.iter().copied().max().unwrap_or(0).max(1) as f64;
    let normalized = variance(sizes) / (largest * largest);
    let oversize: usize = sizes.iter().map(|&size| size.saturating_sub(max_size)).sum();
    let penalty = penalties.oversize_penalty * oversize as f64;
    (1.0 - normalized - penalty).max(0.0)
}

/// Mean over levels of `1 - var(level share per non-empty group)`.
pub fn uniformity_score(tally: &GroupTally) -> f64 {
    let groups: Vec<(usize, &[usize; LEVELS])> = tally.non_empty().collect();
    if groups.is_empty() {
        return 0.0;
    }
    let len = groups.len() as f64;
    let per_level = (0..LEVELS).map(|slot| {
        let shares: Vec<f64> = groups
            .iter()
            .map(|(size, counts)| counts[slot] as f64 / *size as f64)
            .collect();
        let mean = shares.iter().sum::<f64>() / len;
        let spread = shares.iter().map(|share| (share - mean).powi(2)).sum::<f64>() / len;
        (1.0 - spread).max(0.0)
    });
    per_level.sum::<f64>() / LEVELS as f64
}

/// Mean over non-empty groups of the distinct-label score.
pub fn heterogeneity_score(tally: &GroupTally) -> f64 {
    let mut total = 0.0;
    let mut groups = 0usize;
    for (size, counts) in tally.non_empty() {
        groups += 1;
        if size < 2 {
            continue;
        }
        total += match counts.iter().filter(|&&count| count > 0).count() {
            3 => 1.0,
            2 => 0.6,
            _ => 0.0,
        };
    }
    if groups == 0 {
        0.0
    } else {
        total / groups as f64
    }
}

#[cfg(test)]
mod tests {
    use arcs_core::PriorityMode;

    use super::*;

    fn ctx(targets: Vec<usize>) -> FitnessContext {
        FitnessContext {
            groups: targets.len(),
            target_sizes: targets,
            weights: FitnessWeights::for_mode(PriorityMode::Balanced),
            penalties: PenaltyConfig::default(),
            max_size: 5,
        }
    }

    #[test]
    fn mixed_groups_score_full_heterogeneity() {
        let slots = [0, 1, 2, 0, 1, 2];
        let assignment = [0, 0, 0, 1, 1, 1];
        let fit = evaluate(&assignment, &slots, &ctx(vec![3, 3]));
        assert_eq!(fit.size, 1.0);
        assert_eq!(fit.heterogeneity, 1.0);
        assert!((fit.uniformity - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pure_groups_score_zero_heterogeneity() {
        let slots = [0, 0, 1, 1];
        let assignment = [0, 0, 1, 1];
        let fit = evaluate(&assignment, &slots, &ctx(vec![2, 2]));
        assert_eq!(fit.heterogeneity, 0.0);
        assert!(fit.uniformity < 1.0);
    }

    #[test]
    fn two_labels_score_point_six() {
        let tally = GroupTally::from_assignment(&[0, 0], &[0, 1], 1);
        assert!((heterogeneity_score(&tally) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn singletons_score_zero() {
        let tally = GroupTally::from_assignment(&[0, 1], &[0, 1], 2);
        assert_eq!(heterogeneity_score(&tally), 0.0);
    }

    #[test]
    fn oversize_groups_are_penalized() {
        let penalties = PenaltyConfig::default();
        let s = size_score(&[7, 3], &[5, 5], &penalties, 5);
        // variance 4 / 25 = 0.16, penalty 0.2
        assert!((s - 0.64).abs() < 1e-12);
    }

    #[test]
    fn empty_groups_count_towards_size_variance() {
        let penalties = PenaltyConfig::default();
        let s = size_score(&[4, 4, 0], &[4, 4, 4], &penalties, 5);
        assert!(s < 1.0);
    }
}
