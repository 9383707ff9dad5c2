use crate::config::SizingConfig;
use crate::fitness::LEVELS;
use crate::sizing::plan_groups;

/// A group under construction: its members and, while pure, its label slot.
#[derive(Debug, Clone)]
struct Block {
    slot: Option<usize>,
    members: Vec<usize>,
}

/// Builds label-pure groups without search and returns one group index per
/// member.
///
/// Each label is chunked with its own plan. Surplus groups are merged two at
/// a time, smallest same-label pair first, otherwise the two smallest
/// overall. Missing groups are left empty.
///
/// Group sizes are not bounded: a dominant label can end up in one large
/// group, e.g. 13/1/1 over three groups yields sizes 13, 1 and 1.
pub fn homogeneous_assignment(slots: &[usize], groups: usize, sizing: &SizingConfig) -> Vec<usize> {
    let mut blocks = Vec::new();
    for slot in 0..LEVELS {
        let members: Vec<usize> = (0..slots.len()).filter(|&i| slots[i] == slot).collect();
        if members.is_empty() {
            continue;
        }
        let plan = plan_groups(members.len(), sizing);
        let mut rest = members.as_slice();
        for size in plan.target_sizes {
            let (chunk, tail) = rest.split_at(size.min(rest.len()));
            blocks.push(Block {
                slot: Some(slot),
                members: chunk.to_vec(),
            });
            rest = tail;
        }
    }

    while blocks.len() > groups.max(1) {
        let (keep, absorb) = merge_pair(&blocks);
        let absorbed = blocks.remove(absorb);
        let target = &mut blocks[keep];
        if target.slot != absorbed.slot {
            target.slot = None;
        }
        target.members.extend(absorbed.members);
    }

    let mut assignment = vec![0; slots.len()];
    for (group, block) in blocks.iter().enumerate() {
        for &member in &block.members {
            assignment[member] = group;
        }
    }
    assignment
}

/// Indices `(keep, absorb)` with `keep < absorb`.
fn merge_pair(blocks: &[Block]) -> (usize, usize) {
    let mut same_label: Option<(usize, usize, usize)> = None;
    for a in 0..blocks.len() {
        for b in a + 1..blocks.len() {
            let (Some(x), Some(y)) = (blocks[a].slot, blocks[b].slot) else {
                continue;
            };
            if x != y {
                continue;
            }
            let combined = blocks[a].members.len() + blocks[b].members.len();
            if same_label.map_or(true, |(best, _, _)| combined < best) {
                same_label = Some((combined, a, b));
            }
        }
    }
    if let Some((_, a, b)) = same_label {
        return (a, b);
    }

    let mut order: Vec<usize> = (0..blocks.len()).collect();
    order.sort_by_key(|&idx| (blocks[idx].members.len(), idx));
    let (a, b) = (order[0], order[1]);
    (a.min(b), a.max(b))
}
