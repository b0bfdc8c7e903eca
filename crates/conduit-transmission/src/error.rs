use conduit_core::id::TierId;
use conduit_core::position::BlockPos;

/// Errors from structural grid operations (placement, removal, registry).
///
/// Per-step work never produces these: flow and overload handling clamp or
/// absorb instead.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("position {0} already holds a transmission node")]
    NodeOccupied(BlockPos),
    #[error("position {0} already holds a device")]
    DeviceOccupied(BlockPos),
    #[error("no transmission node at {0}")]
    NoNode(BlockPos),
    #[error("no device at {0}")]
    NoDevice(BlockPos),
    #[error("unknown tier '{0}'")]
    UnknownTier(String),
    #[error("unknown tier id {0:?}")]
    UnknownTierId(TierId),
    #[error("duplicate tier name '{0}'")]
    DuplicateTier(String),
    #[error("tier table is full ({0} tiers)")]
    TierTableFull(usize),
}
