//! Lattice positions and the six faces between them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A block position on the 3-D integer lattice. Unique key for nodes and
/// devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const ORIGIN: BlockPos = BlockPos { x: 0, y: 0, z: 0 };

    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The position one step across `dir`.
    pub fn offset(&self, dir: Direction) -> BlockPos {
        let (dx, dy, dz) = dir.offset();
        BlockPos::new(
            self.x.wrapping_add(dx),
            self.y.wrapping_add(dy),
            self.z.wrapping_add(dz),
        )
    }

    /// All six face-adjacent positions, in [`Direction::ALL`] order.
    pub fn neighbors(&self) -> [(Direction, BlockPos); 6] {
        Direction::ALL.map(|dir| (dir, self.offset(dir)))
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &BlockPos) -> u64 {
        u64::from(self.x.abs_diff(other.x))
            + u64::from(self.y.abs_diff(other.y))
            + u64::from(self.z.abs_diff(other.z))
    }

    /// Squared Euclidean distance to another position.
    pub fn distance_squared(&self, other: &BlockPos) -> u64 {
        let dx = u64::from(self.x.abs_diff(other.x));
        let dy = u64::from(self.y.abs_diff(other.y));
        let dz = u64::from(self.z.abs_diff(other.z));
        dx * dx + dy * dy + dz * dz
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

/// The six faces of a block. The declaration order is the fixed
/// enumeration every per-step loop iterates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    Down,
    Up,
    North,
    South,
    West,
    East,
}

impl Direction {
    /// All six directions in iteration order.
    pub const ALL: [Direction; 6] = [
        Direction::Down,
        Direction::Up,
        Direction::North,
        Direction::South,
        Direction::West,
        Direction::East,
    ];

    /// Index into per-face arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Unit offset for this direction.
    pub fn offset(self) -> (i32, i32, i32) {
        match self {
            Direction::Down => (0, -1, 0),
            Direction::Up => (0, 1, 0),
            Direction::North => (0, 0, -1),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::East => (1, 0, 0),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
            Direction::East => Direction::West,
        }
    }
}

/// A fixed-size array indexed by [`Direction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PerFace<T>(pub [T; 6]);

impl<T> PerFace<T> {
    pub fn get(&self, dir: Direction) -> &T {
        &self.0[dir.index()]
    }

    pub fn set(&mut self, dir: Direction, value: T) {
        self.0[dir.index()] = value;
    }

    /// Iterate `(direction, value)` pairs in direction order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.0.iter())
    }
}
