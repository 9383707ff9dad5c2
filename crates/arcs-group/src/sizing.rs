use serde::{Deserialize, Serialize};

use crate::config::SizingConfig;

/// Chosen group count and target sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPlan {
    /// Number of groups `G`.
    pub groups: usize,
    /// Target size per group, non-increasing, summing to `N`.
    pub target_sizes: Vec<usize>,
    /// Rule that produced the plan: 1 uniform, 2 ideal/ideal+1 mix, 3 mixed
    /// within the size band, 4 fallback.
    pub priority: u8,
    /// Population variance of the target sizes.
    pub variance: f64,
}

impl GroupPlan {
    /// Largest target size (0 for an empty plan).
    pub fn max_target(&self) -> usize {
        self.target_sizes.iter().copied().max().unwrap_or(0)
    }

    /// Smallest target size (0 for an empty plan).
    pub fn min_target(&self) -> usize {
        self.target_sizes.iter().copied().min().unwrap_or(0)
    }

    /// Plan holding every student in one group.
    pub fn single(n: usize) -> Self {
        Self::from_sizes(vec![n], 4)
    }

    fn from_sizes(mut target_sizes: Vec<usize>, priority: u8) -> Self {
        target_sizes.sort_unstable_by(|a, b| b.cmp(a));
        Self {
            groups: target_sizes.len(),
            variance: variance(&target_sizes),
            target_sizes,
            priority,
        }
    }
}

/// Picks the group plan for `n` students: lowest rule priority first, then
/// lowest size variance, then fewer groups.
pub fn plan_groups(n: usize, sizing: &SizingConfig) -> GroupPlan {
    if n == 0 {
        return GroupPlan::from_sizes(Vec::new(), 4);
    }
    let ideal = sizing.ideal_size.max(1);

    if n % ideal == 0 {
        return GroupPlan::from_sizes(vec![ideal; n / ideal], 1);
    }

    let group_range = sizing.min_groups..=sizing.max_groups;

    let mixes = group_range.clone().filter_map(|groups| {
        let large = n.checked_sub(ideal * groups)?;
        (large <= groups).then(|| {
            let mut sizes = vec![ideal + 1; large];
            sizes.resize(groups, ideal);
            sizes
        })
    });
    if let Some(plan) = lowest_variance(mixes, 2) {
        return plan;
    }

    let banded = group_range.filter_map(|groups| {
        (sizing.min_size * groups <= n && n <= sizing.max_size * groups)
            .then(|| even_split(n, groups))
    });
    if let Some(plan) = lowest_variance(banded, 3) {
        return plan;
    }

    GroupPlan::from_sizes(even_split(n, n.div_ceil(ideal)), 4)
}

fn lowest_variance(candidates: impl Iterator<Item = Vec<usize>>, priority: u8) -> Option<GroupPlan> {
    let mut best: Option<GroupPlan> = None;
    for sizes in candidates {
        let plan = GroupPlan::from_sizes(sizes, priority);
        let better = match &best {
            None => true,
            Some(current) => {
                plan.variance < current.variance
                    || (plan.variance == current.variance && plan.groups < current.groups)
            }
        };
        if better {
            best = Some(plan);
        }
    }
    best
}

fn even_split(n: usize, groups: usize) -> Vec<usize> {
    let base = n / groups;
    let extra = n % groups;
    (0..groups)
        .map(|idx| if idx < extra { base + 1 } else { base })
        .collect()
}

/// Population variance of a size vector.
pub fn variance(sizes: &[usize]) -> f64 {
    if sizes.is_empty() {
        return 0.0;
    }
    let len = sizes.len() as f64;
    let mean = sizes.iter().sum::<usize>() as f64 / len;
    sizes
        .iter()
        .map(|&size| {
            let delta = size as f64 - mean;
            delta * delta
        })
        .sum::<f64>()
        / len
}
