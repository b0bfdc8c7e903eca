use std::collections::{HashMap, VecDeque};

use conduit_core::position::BlockPos;

/// Bounded `(start, end) -> path` memo for diagnostic route queries.
///
/// Purely an optimisation: every entry can be recomputed from the current
/// topology, and the owner clears it wholesale whenever topology changes.
/// When full, the oldest inserted entry is evicted.
#[derive(Debug, Clone)]
pub struct PathCache {
    capacity: usize,
    entries: HashMap<(BlockPos, BlockPos), Vec<BlockPos>>,
    order: VecDeque<(BlockPos, BlockPos)>,
    hits: u64,
    misses: u64,
}

impl PathCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up a cached path, counting the hit or miss.
    pub fn lookup(&mut self, start: BlockPos, end: BlockPos) -> Option<Vec<BlockPos>> {
        match self.entries.get(&(start, end)) {
            Some(path) => {
                self.hits += 1;
                Some(path.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn contains(&self, start: BlockPos, end: BlockPos) -> bool {
        self.entries.contains_key(&(start, end))
    }

    pub fn insert(&mut self, start: BlockPos, end: BlockPos, path: Vec<BlockPos>) {
        if self.capacity == 0 {
            return;
        }
        let key = (start, end);
        if self.entries.insert(key, path).is_some() {
            return;
        }
        self.order.push_back(key);
        while self.entries.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    /// Drop every entry. Hit/miss counters survive.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
