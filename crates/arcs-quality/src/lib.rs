#![deny(missing_docs)]
#![doc = "Quality reports over a formed partition, scored with the optimizer's own subscores."]

use std::collections::BTreeMap;

use arcs_class::normalized_shannon;
use arcs_core::{ArcsError, ErrorInfo, MotivationLevel, PriorityMode};
use arcs_group::fitness::{self, GroupTally, LEVELS};
use arcs_group::{fitness_context, GroupPlan, Member, OptimizerConfig, Partition};
use serde::{Deserialize, Serialize};

/// Summary of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Group index.
    pub index: usize,
    /// Member count.
    pub size: usize,
    /// Members per analyzed level.
    pub distribution: BTreeMap<MotivationLevel, usize>,
    /// Shannon diversity normalized by `ln(min(3, size))`.
    pub diversity: f64,
}

/// Bahasa Indonesia reading of the three headline scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interpretation {
    /// Size balance band.
    pub balance: String,
    /// Within-group diversity band.
    pub heterogeneity: String,
    /// Across-group similarity band.
    pub uniformity: String,
}

/// Scores of a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// One record per group, empty groups included.
    pub groups: Vec<GroupRecord>,
    /// Groups without members.
    pub empty_groups: usize,
    /// Size score as seen by the optimizer.
    pub size_score: f64,
    /// Size score with the empty-group factor applied.
    pub balance: f64,
    /// Variance-form uniformity as seen by the optimizer.
    pub uniformity: f64,
    /// Coefficient-of-variation uniformity over level counts.
    pub legacy_uniformity: f64,
    /// Distinct-label heterogeneity as seen by the optimizer.
    pub heterogeneity: f64,
    /// Weighted fitness for `priority_mode`.
    pub weighted_fitness: f64,
    /// Mode whose weights produced `weighted_fitness`.
    pub priority_mode: PriorityMode,
    /// Textual bands.
    pub interpretation: Interpretation,
}

/// Scores `assignment` (group index per member) against `plan`.
pub fn score(
    members: &[Member],
    assignment: &[usize],
    plan: &GroupPlan,
    priority: PriorityMode,
    config: &OptimizerConfig,
) -> Result<QualityReport, ArcsError> {
    if members.len() != assignment.len() {
        return Err(ArcsError::InvalidInput(
            ErrorInfo::new("assignment-length", "assignment does not cover every member")
                .with_context("members", members.len().to_string())
                .with_context("assignment", assignment.len().to_string()),
        ));
    }
    if let Some(&group) = assignment.iter().find(|&&group| group >= plan.groups) {
        return Err(ArcsError::InvalidInput(
            ErrorInfo::new("group-out-of-range", "assignment names a group outside the plan")
                .with_context("group", group.to_string())
                .with_context("groups", plan.groups.to_string()),
        ));
    }
    let mut slots = Vec::with_capacity(members.len());
    for member in members {
        let slot = member.level.slot().ok_or_else(|| {
            ArcsError::InvalidInput(
                ErrorInfo::new("unanalyzed-member", "only analyzed students can be scored")
                    .with_context("student_id", member.student_id.as_str()),
            )
        })?;
        slots.push(slot);
    }

    let ctx = fitness_context(plan, priority, config);
    let tally = GroupTally::from_assignment(assignment, &slots, plan.groups);
    let fit = fitness::evaluate_tally(&tally, &ctx);

    let empty_groups = tally.sizes.iter().filter(|&&size| size == 0).count();
    let balance = if empty_groups > 0 {
        fit.size * config.penalties.empty_group_balance_factor
    } else {
        fit.size
    }
    .clamp(0.0, 1.0);

    let groups = tally
        .sizes
        .iter()
        .zip(tally.counts.iter())
        .enumerate()
        .map(|(index, (&size, counts))| GroupRecord {
            index,
            size,
            distribution: MotivationLevel::ANALYZED
                .iter()
                .zip(counts.iter())
                .map(|(level, &count)| (*level, count))
                .collect(),
            diversity: normalized_shannon(counts, size.min(LEVELS)),
        })
        .collect();

    Ok(QualityReport {
        groups,
        empty_groups,
        size_score: fit.size,
        balance,
        uniformity: fit.uniformity,
        legacy_uniformity: legacy_uniformity(&tally),
        heterogeneity: fit.heterogeneity,
        weighted_fitness: fit.total,
        priority_mode: priority,
        interpretation: Interpretation {
            balance: band(balance, 0.8, 0.6, "Seimbang"),
            heterogeneity: band(fit.heterogeneity, 0.7, 0.5, "Beragam"),
            uniformity: band(fit.uniformity, 0.7, 0.5, "Seragam"),
        },
    })
}

/// Scores a partition produced by `arcs_group::form_partition`.
pub fn score_partition(
    members: &[Member],
    partition: &Partition,
    config: &OptimizerConfig,
) -> Result<QualityReport, ArcsError> {
    score(
        members,
        &partition.assignment,
        &partition.plan,
        partition.priority,
        config,
    )
}

/// Mean over present levels of `max(0, 1 - cv)`, where `cv` is the
/// coefficient of variation of the level's count across non-empty groups.
pub fn legacy_uniformity(tally: &GroupTally) -> f64 {
    let groups: Vec<&[usize; LEVELS]> = tally.non_empty().map(|(_, counts)| counts).collect();
    if groups.is_empty() {
        return 0.0;
    }
    let len = groups.len() as f64;
    let mut total = 0.0;
    let mut present = 0usize;
    for slot in 0..LEVELS {
        let mean = groups.iter().map(|counts| counts[slot] as f64).sum::<f64>() / len;
        if mean == 0.0 {
            continue;
        }
        let spread = groups
            .iter()
            .map(|counts| (counts[slot] as f64 - mean).powi(2))
            .sum::<f64>()
            / len;
        total += (1.0 - spread.sqrt() / mean).max(0.0);
        present += 1;
    }
    if present == 0 {
        0.0
    } else {
        total / present as f64
    }
}

fn band(value: f64, strong: f64, moderate: f64, noun: &str) -> String {
    let qualifier = if value > strong {
        "Sangat"
    } else if value > moderate {
        "Cukup"
    } else {
        "Kurang"
    };
    format!("{qualifier} {noun}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_follow_thresholds() {
        assert_eq!(band(0.81, 0.8, 0.6, "Seimbang"), "Sangat Seimbang");
        assert_eq!(band(0.8, 0.8, 0.6, "Seimbang"), "Cukup Seimbang");
        assert_eq!(band(0.6, 0.8, 0.6, "Seimbang"), "Kurang Seimbang");
    }

    #[test]
    fn identical_groups_have_full_legacy_uniformity() {
        let tally = GroupTally::from_assignment(&[0, 0, 1, 1], &[0, 1, 0, 1], 2);
        assert!((legacy_uniformity(&tally) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pure_groups_have_low_legacy_uniformity() {
        let tally = GroupTally::from_assignment(&[0, 0, 1, 1], &[0, 0, 1, 1], 2);
        // counts (2, 0) per level: mean 1, std 1
        assert_eq!(legacy_uniformity(&tally), 0.0);
    }
}
