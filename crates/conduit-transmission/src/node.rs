//! The transmission node: one cable block on the lattice.

use conduit_core::device::EnergyStorage;
use conduit_core::fixed::{Energy, Fixed64};
use conduit_core::id::{DeviceId, TierId};
use conduit_core::position::{BlockPos, PerFace};
use serde::{Deserialize, Serialize};

use crate::discovery::NetworkId;
use crate::error::GridError;
use crate::overload::OverloadState;
use crate::tier::{EnergyTier, TierRegistry};

/// A single transmission node.
///
/// The node's buffer is only ever mutated through its own step logic or
/// through the [`EnergyStorage`] contract, never by poking fields from
/// another node.
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionNode {
    pos: BlockPos,
    tier: TierId,
    buffer_capacity: Energy,
    stored_energy: Energy,
    /// Faces with something attached (node or device).
    pub connections: PerFace<bool>,
    /// Faces with an external device attached. Never points at a node.
    pub connected_devices: PerFace<Option<DeviceId>>,
    pub network_id: Option<NetworkId>,
    pub overload: OverloadState,
    pub is_transmitting: bool,
    /// Energy moved out this step relative to the tier rate.
    pub current_load: Fixed64,
    /// Energy received since the last overload evaluation.
    pub transferred_window: Energy,
}

impl TransmissionNode {
    pub fn new(pos: BlockPos, tier_id: TierId, tier: &EnergyTier) -> Self {
        Self {
            pos,
            tier: tier_id,
            buffer_capacity: tier.buffer_capacity(),
            stored_energy: 0,
            connections: PerFace::default(),
            connected_devices: PerFace::default(),
            network_id: None,
            overload: OverloadState::new(),
            is_transmitting: false,
            current_load: Fixed64::ZERO,
            transferred_window: 0,
        }
    }

    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    pub fn tier(&self) -> TierId {
        self.tier
    }

    pub fn stored_energy(&self) -> Energy {
        self.stored_energy
    }

    pub fn buffer_capacity(&self) -> Energy {
        self.buffer_capacity
    }

    pub fn headroom(&self) -> Energy {
        self.buffer_capacity - self.stored_energy
    }

    /// Remove energy the node has already committed elsewhere this step.
    pub(crate) fn debit(&mut self, amount: Energy) {
        self.stored_energy = self.stored_energy.saturating_sub(amount);
    }

    /// Take the incoming-flow window for overload evaluation, resetting it.
    pub(crate) fn take_window(&mut self) -> Energy {
        std::mem::take(&mut self.transferred_window)
    }

    /// Snapshot of the persisted fields.
    pub fn to_state(&self, tiers: &TierRegistry) -> Result<NodeState, GridError> {
        let tier = tiers
            .get(self.tier)
            .ok_or(GridError::UnknownTierId(self.tier))?;
        Ok(NodeState {
            tier: tier.name.clone(),
            stored_energy: self.stored_energy,
            connections: self.connections.0,
            overload_counter: self.overload.counter,
            has_warned: self.overload.has_warned,
            is_transmitting: self.is_transmitting,
            current_load: self.current_load,
            transferred_window: self.transferred_window,
            network_id: self.network_id.map(|id| id.to_string()),
        })
    }

    /// Rebuild a node from persisted fields. The network id is informational
    /// only; networks are rediscovered after loading.
    pub fn from_state(
        pos: BlockPos,
        state: &NodeState,
        tiers: &TierRegistry,
    ) -> Result<Self, GridError> {
        let tier_id = tiers
            .id_of(&state.tier)
            .ok_or_else(|| GridError::UnknownTier(state.tier.clone()))?;
        let tier = tiers.get(tier_id).ok_or(GridError::UnknownTierId(tier_id))?;
        let mut node = TransmissionNode::new(pos, tier_id, tier);
        node.stored_energy = state.stored_energy.min(node.buffer_capacity);
        node.connections = PerFace(state.connections);
        node.overload = OverloadState {
            counter: state.overload_counter,
            has_warned: state.has_warned,
            exploded: false,
        };
        node.is_transmitting = state.is_transmitting;
        node.current_load = state.current_load;
        node.transferred_window = state.transferred_window;
        Ok(node)
    }
}

impl EnergyStorage for TransmissionNode {
    fn can_receive(&self) -> bool {
        self.stored_energy < self.buffer_capacity
    }

    fn can_extract(&self) -> bool {
        self.stored_energy > 0
    }

    fn receive_energy(&mut self, amount: Energy, simulate: bool) -> Energy {
        let accepted = amount.min(self.headroom());
        if !simulate {
            self.stored_energy += accepted;
            self.transferred_window = self.transferred_window.saturating_add(accepted);
        }
        accepted
    }

    fn extract_energy(&mut self, amount: Energy, simulate: bool) -> Energy {
        let released = amount.min(self.stored_energy);
        if !simulate {
            self.stored_energy -= released;
        }
        released
    }

    fn energy_stored(&self) -> Energy {
        self.stored_energy
    }

    fn max_energy_stored(&self) -> Energy {
        self.buffer_capacity
    }
}

/// The logical fields of a node that survive save/load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeState {
    pub tier: String,
    pub stored_energy: Energy,
    pub connections: [bool; 6],
    pub overload_counter: u32,
    pub has_warned: bool,
    pub is_transmitting: bool,
    pub current_load: Fixed64,
    pub transferred_window: Energy,
    #[serde(default)]
    pub network_id: Option<String>,
}
