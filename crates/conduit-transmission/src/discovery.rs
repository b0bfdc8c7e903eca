//! Network discovery: bounded flood fill over adjacent nodes.
//!
//! Networks are transient. A node rediscovers its network when its own
//! network handle is missing or stale, when something changed on one of its
//! faces, or every `network_update_interval` steps as a resync. Rebuilding
//! assigns a fresh [`NetworkId`] to every member and discards the networks
//! those members previously belonged to, so a stale id is simply one that
//! no longer resolves.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use conduit_core::dirty::DirtyTracker;
use conduit_core::fixed::Ticks;
use conduit_core::position::BlockPos;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::node::TransmissionNode;
use crate::path_cache::PathCache;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Opaque network handle: the canonical (smallest) member position plus a
/// generation that changes on every rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetworkId {
    pub anchor: BlockPos,
    pub generation: u64,
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.anchor, self.generation)
    }
}

/// A set of mutually reachable nodes, as of `built_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    pub id: NetworkId,
    /// Every member, the node that triggered the rebuild included.
    pub members: BTreeSet<BlockPos>,
    /// The traversal stopped at the size cap; `members` is incomplete.
    pub truncated: bool,
    pub built_at: Ticks,
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Outcome of one bounded traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Traversal {
    /// Reachable nodes, excluding the start.
    pub reached: BTreeSet<BlockPos>,
    pub truncated: bool,
}

/// Breadth-first search from `start` over positions where `is_node` holds.
///
/// At most `max_size` positions are visited, the start included, so the
/// search terminates on any layout, cyclic or not. Neighbours are expanded
/// in direction order.
pub fn traverse(
    start: BlockPos,
    is_node: impl Fn(BlockPos) -> bool,
    max_size: usize,
) -> Traversal {
    let mut visited = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    let mut truncated = false;

    'search: while let Some(pos) = queue.pop_front() {
        for (_, next) in pos.neighbors() {
            if visited.contains(&next) || !is_node(next) {
                continue;
            }
            if visited.len() >= max_size {
                truncated = true;
                break 'search;
            }
            visited.insert(next);
            queue.push_back(next);
        }
    }

    visited.remove(&start);
    Traversal {
        reached: visited,
        truncated,
    }
}

/// Reachable node positions from `start`, excluding `start` itself.
pub fn discover(
    start: BlockPos,
    is_node: impl Fn(BlockPos) -> bool,
    max_size: usize,
) -> BTreeSet<BlockPos> {
    traverse(start, is_node, max_size).reached
}

// ---------------------------------------------------------------------------
// NetworkDiscovery
// ---------------------------------------------------------------------------

/// Owns the live networks, the topology dirty set and the path cache.
#[derive(Debug, Clone)]
pub struct NetworkDiscovery {
    networks: BTreeMap<NetworkId, Network>,
    next_generation: u64,
    dirty: DirtyTracker,
    paths: PathCache,
}

impl NetworkDiscovery {
    pub fn new(path_cache_capacity: usize) -> Self {
        Self {
            networks: BTreeMap::new(),
            next_generation: 0,
            dirty: DirtyTracker::new(),
            paths: PathCache::new(path_cache_capacity),
        }
    }

    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.networks.get(&id)
    }

    pub fn networks(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Whether `node_network` still resolves to a live network.
    pub fn is_current(&self, node_network: Option<NetworkId>) -> bool {
        node_network.is_some_and(|id| self.networks.contains_key(&id))
    }

    /// Whether a node holding `node_network` must rediscover at `tick`.
    pub fn needs_rebuild(
        &self,
        node_network: Option<NetworkId>,
        tick: Ticks,
        update_interval: Ticks,
    ) -> bool {
        let Some(network) = node_network.and_then(|id| self.networks.get(&id)) else {
            return true;
        };
        let resync = update_interval > 0 && tick % update_interval == 0;
        resync && network.built_at != tick
    }

    /// Rediscover the network containing `start` and stamp every member.
    pub fn rebuild(
        &mut self,
        start: BlockPos,
        nodes: &mut BTreeMap<BlockPos, TransmissionNode>,
        tick: Ticks,
        max_size: usize,
    ) -> NetworkId {
        let traversal = traverse(start, |p| nodes.contains_key(&p), max_size);
        let mut members = traversal.reached;
        members.insert(start);

        for pos in &members {
            if let Some(old) = nodes.get(pos).and_then(|n| n.network_id) {
                self.networks.remove(&old);
            }
        }

        let anchor = members.first().copied().unwrap_or(start);
        let id = NetworkId {
            anchor,
            generation: self.next_generation,
        };
        self.next_generation += 1;

        for pos in &members {
            if let Some(node) = nodes.get_mut(pos) {
                node.network_id = Some(id);
            }
        }

        if traversal.truncated {
            warn!(
                network = %id,
                members = members.len(),
                cap = max_size,
                "network discovery hit the size cap"
            );
        } else {
            debug!(network = %id, members = members.len(), "network rebuilt");
        }

        self.networks.insert(
            id,
            Network {
                id,
                members,
                truncated: traversal.truncated,
                built_at: tick,
            },
        );
        id
    }

    /// Record a structural change at `pos`: the networks of `pos` and its
    /// neighbours are discarded and the path cache is cleared.
    pub fn invalidate_around(
        &mut self,
        pos: BlockPos,
        nodes: &BTreeMap<BlockPos, TransmissionNode>,
    ) {
        self.dirty.mark_with_neighbors(pos);
        let affected = std::iter::once(pos).chain(pos.neighbors().map(|(_, n)| n));
        for p in affected {
            if let Some(id) = nodes.get(&p).and_then(|n| n.network_id) {
                self.networks.remove(&id);
            }
        }
        self.paths.clear();
    }

    /// Forget every network. Used after bulk loads.
    pub fn invalidate_all(&mut self) {
        self.networks.clear();
        self.paths.clear();
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.is_dirty()
    }

    /// Drain the positions whose faces changed since the last call.
    pub fn take_dirty(&mut self) -> BTreeSet<BlockPos> {
        self.dirty.take_positions()
    }

    pub fn paths(&self) -> &PathCache {
        &self.paths
    }

    pub fn paths_mut(&mut self) -> &mut PathCache {
        &mut self.paths
    }
}
