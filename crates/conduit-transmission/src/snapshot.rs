//! Binary snapshots of node state.
//!
//! A snapshot carries a versioned header, the tier table the nodes refer to
//! by name, and every node's persisted fields. Networks, adjacency and the
//! path cache are not stored; they are rebuilt on the first step after
//! loading. Devices belong to the host and are not part of the snapshot.

use conduit_core::fixed::Ticks;
use conduit_core::position::BlockPos;
use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::grid::TransmissionGrid;
use crate::node::NodeState;
use crate::tier::EnergyTier;

/// Magic number identifying a transmission snapshot.
pub const SNAPSHOT_MAGIC: u32 = 0xC0DE_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error(transparent)]
    Grid(#[from] GridError),
}

#[derive(Debug, thiserror::Error)]
pub enum DeserializeError {
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SNAPSHOT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("snapshot from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("snapshot tier '{0}' differs from the registered tier of that name")]
    TierMismatch(String),
    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Header prepended to every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotHeader {
    pub magic: u32,
    pub version: u32,
    /// Step at which the snapshot was taken.
    pub tick: Ticks,
}

impl SnapshotHeader {
    pub fn new(tick: Ticks) -> Self {
        Self {
            magic: SNAPSHOT_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), DeserializeError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(DeserializeError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(DeserializeError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(DeserializeError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

/// Everything a snapshot holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub header: SnapshotHeader,
    pub tiers: Vec<EnergyTier>,
    pub nodes: Vec<(BlockPos, NodeState)>,
}

impl GridSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, SerializeError> {
        bitcode::serialize(self).map_err(|e| SerializeError::Encode(e.to_string()))
    }

    /// Decode and validate the header.
    pub fn decode(data: &[u8]) -> Result<Self, DeserializeError> {
        let snapshot: GridSnapshot =
            bitcode::deserialize(data).map_err(|e| DeserializeError::Decode(e.to_string()))?;
        snapshot.header.validate()?;
        Ok(snapshot)
    }
}

impl TransmissionGrid {
    /// Capture the tiers in use and every node's state.
    pub fn snapshot(&self, tick: Ticks) -> Result<GridSnapshot, GridError> {
        let nodes = self.node_states()?;
        let tiers = self.tiers().iter().map(|(_, t)| t.clone()).collect();
        Ok(GridSnapshot {
            header: SnapshotHeader::new(tick),
            tiers,
            nodes,
        })
    }

    /// Encode the node state as a versioned binary blob.
    pub fn save_nodes(&self, tick: Ticks) -> Result<Vec<u8>, SerializeError> {
        self.snapshot(tick)?.encode()
    }

    /// Replace every node with the contents of a blob from
    /// [`save_nodes`](Self::save_nodes). Tiers missing from this grid are
    /// registered; a tier whose name is known but whose profile differs is
    /// rejected. Returns the tick the snapshot was taken at.
    ///
    /// On error neither the tiers nor the nodes change.
    pub fn load_nodes(&mut self, data: &[u8]) -> Result<Ticks, DeserializeError> {
        let snapshot = GridSnapshot::decode(data)?;
        let mut tiers = self.tiers().clone();
        for tier in &snapshot.tiers {
            match tiers.by_name(&tier.name) {
                Some(known) if known == tier => {}
                Some(_) => return Err(DeserializeError::TierMismatch(tier.name.clone())),
                None => {
                    tiers.register(tier.clone())?;
                }
            }
        }
        self.restore_with_tiers(tiers, &snapshot.nodes)?;
        Ok(snapshot.header.tick)
    }
}
