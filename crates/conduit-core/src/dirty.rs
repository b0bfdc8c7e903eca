use crate::position::BlockPos;
use std::collections::BTreeSet;

/// Tracks which positions have changed connectivity since the last rebuild.
///
/// The grid marks a position whenever a node or device appears or vanishes
/// there or on one of its faces. Discovery consults the tracker to decide
/// which nodes must rediscover their network before the next flow pass, and
/// calls [`take_positions`](DirtyTracker::take_positions) once it has done so.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty_positions: BTreeSet<BlockPos>,
    topology_dirty: bool,
}

impl DirtyTracker {
    /// Create a new tracker with nothing dirty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a single position as dirty.
    pub fn mark_position(&mut self, pos: BlockPos) {
        self.dirty_positions.insert(pos);
        self.topology_dirty = true;
    }

    /// Mark a position and its six face neighbours as dirty.
    pub fn mark_with_neighbors(&mut self, pos: BlockPos) {
        self.mark_position(pos);
        for (_, neighbor) in pos.neighbors() {
            self.dirty_positions.insert(neighbor);
        }
    }

    /// Returns `true` if any topology change is pending.
    pub fn is_dirty(&self) -> bool {
        self.topology_dirty
    }

    /// Returns `true` if the given position has been marked dirty.
    pub fn is_position_dirty(&self, pos: BlockPos) -> bool {
        self.dirty_positions.contains(&pos)
    }

    /// Returns the set of all dirty positions.
    pub fn dirty_positions(&self) -> &BTreeSet<BlockPos> {
        &self.dirty_positions
    }

    /// Drain the dirty set, leaving the tracker clean.
    pub fn take_positions(&mut self) -> BTreeSet<BlockPos> {
        self.topology_dirty = false;
        std::mem::take(&mut self.dirty_positions)
    }
}
