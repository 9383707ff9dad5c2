use std::collections::VecDeque;

use arcs_core::RngHandle;
use rand::seq::SliceRandom;

use crate::determinism;
use crate::fitness::LEVELS;

/// Heuristic that produced an initial individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedKind {
    /// `i mod G` in input order.
    RoundRobin,
    /// Label strata dealt round-robin with one shared counter.
    Balanced,
    /// Next member goes to the currently smallest group.
    SizeFirst,
    /// Same construction as [`SeedKind::Balanced`].
    UniformityFirst,
    /// One member of each label per group, then round-robin.
    HeterogeneityFirst,
    /// Round-robin over a shuffled member order.
    Shuffled,
}

/// Builds up to `max_seeds` heuristic individuals for the initial population.
pub fn heuristic_seeds(
    slots: &[usize],
    target_sizes: &[usize],
    max_seeds: usize,
    master_seed: u64,
) -> Vec<(SeedKind, Vec<usize>)> {
    let groups = target_sizes.len();
    if groups == 0 || max_seeds == 0 {
        return Vec::new();
    }
    let stratified = balanced(slots, groups);
    let mut seeds = vec![
        (SeedKind::RoundRobin, round_robin(slots.len(), groups)),
        (SeedKind::Balanced, stratified.clone()),
        (SeedKind::SizeFirst, size_first(slots.len(), target_sizes)),
        (SeedKind::UniformityFirst, stratified),
        (SeedKind::HeterogeneityFirst, heterogeneity_first(slots, groups)),
    ];
    seeds.truncate(max_seeds);
    let mut variant = 0;
    while seeds.len() < max_seeds {
        let mut rng = RngHandle::from_seed(determinism::seed_variant_seed(master_seed, variant));
        let mut order: Vec<usize> = (0..slots.len()).collect();
        order.shuffle(rng.inner_mut());
        let mut assignment = vec![0; slots.len()];
        for (position, member) in order.into_iter().enumerate() {
            assignment[member] = position % groups;
        }
        seeds.push((SeedKind::Shuffled, assignment));
        variant += 1;
    }
    seeds
}

/// Member `i` goes to group `i mod groups`.
pub fn round_robin(members: usize, groups: usize) -> Vec<usize> {
    (0..members).map(|idx| idx % groups).collect()
}

/// Deals each label stratum round-robin, continuing one counter across
/// strata so every group receives a near-equal share of each label.
pub fn balanced(slots: &[usize], groups: usize) -> Vec<usize> {
    let mut assignment = vec![0; slots.len()];
    let mut counter = 0;
    for stratum in strata(slots) {
        for member in stratum {
            assignment[member] = counter % groups;
            counter += 1;
        }
    }
    assignment
}

/// Places members in input order into the smallest group so far; ties go
/// to the group with more room left, then the lower index.
pub fn size_first(members: usize, target_sizes: &[usize]) -> Vec<usize> {
    let mut sizes = vec![0usize; target_sizes.len()];
    let mut assignment = Vec::with_capacity(members);
    for _ in 0..members {
        let group = (0..sizes.len())
            .min_by_key(|&g| {
                let room = target_sizes[g].saturating_sub(sizes[g]);
                (sizes[g], std::cmp::Reverse(room), g)
            })
            .unwrap_or(0);
        sizes[group] += 1;
        assignment.push(group);
    }
    assignment
}

/// Gives every group one member of each label while supply lasts, then
/// deals the rest round-robin.
pub fn heterogeneity_first(slots: &[usize], groups: usize) -> Vec<usize> {
    let mut queues: Vec<VecDeque<usize>> = strata(slots).into_iter().map(VecDeque::from).collect();
    let mut assignment = vec![0; slots.len()];
    for group in 0..groups {
        for queue in queues.iter_mut() {
            if let Some(member) = queue.pop_front() {
                assignment[member] = group;
            }
        }
    }
    let mut counter = 0;
    for queue in queues {
        for member in queue {
            assignment[member] = counter % groups;
            counter += 1;
        }
    }
    assignment
}

fn strata(slots: &[usize]) -> Vec<Vec<usize>> {
    let mut strata = vec![Vec::new(); LEVELS];
    for (member, &slot) in slots.iter().enumerate() {
        strata[slot.min(LEVELS - 1)].push(member);
    }
    strata
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group_sizes(assignment: &[usize], groups: usize) -> Vec<usize> {
        let mut sizes = vec![0; groups];
        for &g in assignment {
            sizes[g] += 1;
        }
        sizes
    }

    #[test]
    fn heterogeneity_seed_mixes_every_group() {
        // 4 High, 4 Medium, 2 Low into [5, 5]
        let slots = [0, 0, 0, 0, 1, 1, 1, 1, 2, 2];
        let assignment = heterogeneity_first(&slots, 2);
        assert_eq!(group_sizes(&assignment, 2), vec![5, 5]);
        for group in 0..2 {
            for level in 0..3 {
                assert!(slots
                    .iter()
                    .zip(&assignment)
                    .any(|(&s, &g)| s == level && g == group));
            }
        }
    }

    #[test]
    fn size_first_respects_larger_targets() {
        let assignment = size_first(7, &[4, 3]);
        assert_eq!(group_sizes(&assignment, 2), vec![4, 3]);
    }

    #[test]
    fn seeds_are_capped_and_in_range() {
        let slots = [0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2];
        let seeds = heuristic_seeds(&slots, &[4, 4, 4], 10, 9);
        assert_eq!(seeds.len(), 10);
        assert!(seeds
            .iter()
            .all(|(_, a)| a.len() == slots.len() && a.iter().all(|&g| g < 3)));
        assert_eq!(heuristic_seeds(&slots, &[4, 4, 4], 3, 9).len(), 3);
    }

    #[test]
    fn shuffled_variants_are_reproducible() {
        let slots = [0, 1, 2, 0, 1, 2, 0, 1];
        assert_eq!(
            heuristic_seeds(&slots, &[4, 4], 8, 1),
            heuristic_seeds(&slots, &[4, 4], 8, 1)
        );
    }
}
