//! Route search and loss estimation over the node lattice.
//!
//! These are diagnostic queries. The per-step flow never consults them.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use conduit_core::fixed::{Energy, Fixed64, energy_to_fixed};
use conduit_core::position::BlockPos;

use crate::distribution::deliverable_after_loss;

/// Cost of entering a node with the given transfer rate. Faster tiers are
/// cheaper to route through.
pub fn edge_weight(transfer_rate: Energy) -> Fixed64 {
    Fixed64::ONE / energy_to_fixed(transfer_rate.max(1))
}

fn heuristic(pos: BlockPos, end: BlockPos) -> Fixed64 {
    Fixed64::saturating_from_num(pos.manhattan_distance(&end))
}

/// A* from `start` to `end` over positions for which `rate_at` reports a
/// transfer rate. Returns the ordered path including both endpoints, or an
/// empty path if either endpoint is not a node, the target is unreachable,
/// or more than `max_expansions` nodes would need to be expanded.
///
/// Ties in the open set are broken by cost and then by position, so the
/// same topology always yields the same path.
///
/// The Manhattan heuristic counts whole hops while an edge costs at most 1,
/// so it overestimates and the search is not admissible. Fewer hops win over
/// a longer run of faster tiers; the result is a short route, not always the
/// one with the lowest total [`edge_weight`].
pub fn find_path(
    start: BlockPos,
    end: BlockPos,
    rate_at: impl Fn(BlockPos) -> Option<Energy>,
    max_expansions: usize,
) -> Vec<BlockPos> {
    if rate_at(start).is_none() || rate_at(end).is_none() {
        return Vec::new();
    }
    if start == end {
        return vec![start];
    }

    let mut open: BinaryHeap<Reverse<(Fixed64, Fixed64, BlockPos)>> = BinaryHeap::new();
    let mut best: HashMap<BlockPos, Fixed64> = HashMap::new();
    let mut came_from: HashMap<BlockPos, BlockPos> = HashMap::new();
    let mut closed: HashSet<BlockPos> = HashSet::new();

    best.insert(start, Fixed64::ZERO);
    open.push(Reverse((heuristic(start, end), Fixed64::ZERO, start)));

    while let Some(Reverse((_, cost, pos))) = open.pop() {
        if pos == end {
            return reconstruct(&came_from, start, end);
        }
        if !closed.insert(pos) {
            continue;
        }
        if closed.len() > max_expansions {
            break;
        }

        for (_, next) in pos.neighbors() {
            if closed.contains(&next) {
                continue;
            }
            let Some(rate) = rate_at(next) else {
                continue;
            };
            let tentative = cost.saturating_add(edge_weight(rate));
            let improves = best.get(&next).is_none_or(|&known| tentative < known);
            if improves {
                best.insert(next, tentative);
                came_from.insert(next, pos);
                let priority = tentative.saturating_add(heuristic(next, end));
                open.push(Reverse((priority, tentative, next)));
            }
        }
    }

    Vec::new()
}

fn reconstruct(
    came_from: &HashMap<BlockPos, BlockPos>,
    start: BlockPos,
    end: BlockPos,
) -> Vec<BlockPos> {
    let mut path = vec![end];
    let mut current = end;
    while current != start {
        match came_from.get(&current) {
            Some(&prev) => {
                path.push(prev);
                current = prev;
            }
            None => return Vec::new(),
        }
    }
    path.reverse();
    path
}

/// Fraction of energy lost travelling along `path`. Each hop loses the
/// sending node's loss, so the last node contributes nothing. Positions
/// without a known loss are treated as lossless.
pub fn calculate_energy_loss(
    path: &[BlockPos],
    loss_at: impl Fn(BlockPos) -> Option<Fixed64>,
) -> Fixed64 {
    let Some((_, senders)) = path.split_last() else {
        return Fixed64::ZERO;
    };
    let keep = senders.iter().fold(Fixed64::ONE, |keep, &pos| {
        let loss = loss_at(pos)
            .unwrap_or(Fixed64::ZERO)
            .clamp(Fixed64::ZERO, Fixed64::ONE);
        keep.saturating_mul(Fixed64::ONE - loss)
    });
    Fixed64::ONE - keep
}

/// Whole energy arriving at the end of `path` when `amount` enters at its
/// start, rounding down at every hop as real transfers do.
pub fn estimate_delivered(
    amount: Energy,
    path: &[BlockPos],
    loss_at: impl Fn(BlockPos) -> Option<Fixed64>,
) -> Energy {
    let Some((_, senders)) = path.split_last() else {
        return amount;
    };
    senders.iter().fold(amount, |remaining, &pos| {
        deliverable_after_loss(remaining, loss_at(pos).unwrap_or(Fixed64::ZERO))
    })
}
