use crate::fitness::{self, FitnessContext, GroupTally};

/// Moves members until no group exceeds the largest target size and no
/// non-empty group falls below the smallest one.
///
/// Each move takes the member of the donor group whose relocation scores
/// best. Empty groups only receive members when no non-empty group has
/// room. Returns the number of moves made.
pub fn repair(genes: &mut [usize], slots: &[usize], ctx: &FitnessContext) -> usize {
    let upper = ctx.target_sizes.iter().copied().max().unwrap_or(0);
    let lower = ctx.target_sizes.iter().copied().min().unwrap_or(0);
    let limit = genes.len() * ctx.groups.max(1);
    let mut moves = 0;

    while moves < limit {
        let sizes = GroupTally::from_assignment(genes, slots, ctx.groups).sizes;
        let Some(donor) = largest_where(&sizes, |size| size > upper) else {
            break;
        };
        let receiver = (0..sizes.len())
            .filter(|&g| sizes[g] < upper)
            .min_by_key(|&g| (sizes[g] == 0, sizes[g], g));
        let Some(receiver) = receiver else {
            break;
        };
        move_best(genes, slots, ctx, donor, receiver);
        moves += 1;
    }

    while moves < limit {
        let sizes = GroupTally::from_assignment(genes, slots, ctx.groups).sizes;
        let receiver = (0..sizes.len())
            .filter(|&g| sizes[g] > 0 && sizes[g] < lower)
            .min_by_key(|&g| (sizes[g], g));
        let Some(receiver) = receiver else {
            break;
        };
        let Some(donor) = largest_where(&sizes, |size| size > lower) else {
            break;
        };
        move_best(genes, slots, ctx, donor, receiver);
        moves += 1;
    }
    moves
}

fn largest_where(sizes: &[usize], keep: impl Fn(usize) -> bool) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (group, &size) in sizes.iter().enumerate() {
        if keep(size) && best.map_or(true, |b| size > sizes[b]) {
            best = Some(group);
        }
    }
    best
}

fn move_best(genes: &mut [usize], slots: &[usize], ctx: &FitnessContext, from: usize, to: usize) {
    let mut chosen: Option<(usize, f64)> = None;
    for member in 0..genes.len() {
        if genes[member] != from {
            continue;
        }
        genes[member] = to;
        let total = fitness::evaluate(genes, slots, ctx).total;
        genes[member] = from;
        if chosen.map_or(true, |(_, best)| total > best) {
            chosen = Some((member, total));
        }
    }
    if let Some((member, _)) = chosen {
        genes[member] = to;
    }
}
