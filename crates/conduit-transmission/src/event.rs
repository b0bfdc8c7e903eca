use std::collections::BTreeSet;

use conduit_core::fixed::Ticks;
use conduit_core::position::BlockPos;

use crate::discovery::NetworkId;
use crate::overload::EntityDamage;

/// Something observable that happened during a grid step or structural edit.
///
/// Warnings and explosions carry a human-readable message and the radius
/// within which the host should broadcast it. Delivery is one-way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransmissionEvent {
    NetworkRebuilt {
        network_id: NetworkId,
        members: BTreeSet<BlockPos>,
        truncated: bool,
        tick: Ticks,
    },
    OverloadWarning {
        pos: BlockPos,
        counter: u32,
        notify_radius: u32,
        message: String,
        tick: Ticks,
    },
    NodeExploded {
        pos: BlockPos,
        damage: Vec<EntityDamage>,
        notify_radius: u32,
        message: String,
        tick: Ticks,
    },
    NodeRemoved {
        pos: BlockPos,
        tick: Ticks,
    },
}

impl TransmissionEvent {
    pub fn tick(&self) -> Ticks {
        match self {
            TransmissionEvent::NetworkRebuilt { tick, .. }
            | TransmissionEvent::OverloadWarning { tick, .. }
            | TransmissionEvent::NodeExploded { tick, .. }
            | TransmissionEvent::NodeRemoved { tick, .. } => *tick,
        }
    }

    /// The position the event is about, if it concerns a single node.
    pub fn pos(&self) -> Option<BlockPos> {
        match self {
            TransmissionEvent::NetworkRebuilt { .. } => None,
            TransmissionEvent::OverloadWarning { pos, .. }
            | TransmissionEvent::NodeExploded { pos, .. }
            | TransmissionEvent::NodeRemoved { pos, .. } => Some(*pos),
        }
    }
}

pub(crate) fn warning_message(pos: BlockPos, tier: &str) -> String {
    format!("The {tier} cable at {pos} is overloaded and will explode!")
}

pub(crate) fn explosion_message(pos: BlockPos, tier: &str) -> String {
    format!("The {tier} cable at {pos} exploded from sustained overload.")
}
