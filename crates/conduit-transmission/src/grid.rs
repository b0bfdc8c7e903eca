//! The transmission grid: nodes, attached devices and the per-step driver.
//!
//! The host calls [`TransmissionGrid::tick`] once per simulation step. Each
//! node, in ascending position order:
//!
//! 1. rediscovers its network if its handle is stale or a resync is due,
//! 2. pulls from adjacent pure producers,
//! 3. splits its buffer evenly over receptive adjacent devices,
//! 4. pushes towards emptier neighbouring nodes (when balancing is enabled),
//! 5. records its load and feeds the overload machine with the energy it
//!    received since its previous evaluation.
//!
//! Cross-node movement goes through the receiving node's
//! [`EnergyStorage`] contract; a node's own buffer is only debited by its
//! own step.

use std::collections::{BTreeMap, BTreeSet};

use conduit_core::device::EnergyStorage;
use conduit_core::fixed::{Energy, Fixed64, Ticks, ratio};
use conduit_core::id::{DeviceId, TierId};
use conduit_core::position::{BlockPos, PerFace};
use slotmap::SlotMap;
use tracing::{debug, info, trace, warn};

use crate::config::TransmissionConfig;
use crate::discovery::{self, Network, NetworkDiscovery, NetworkId};
use crate::distribution::{even_shares, transfer_with_loss};
use crate::error::GridError;
use crate::event::{TransmissionEvent, explosion_message, warning_message};
use crate::node::{NodeState, TransmissionNode};
use crate::overload::{OverloadOutcome, Surroundings, resolve_blast};
use crate::path_cache::PathCache;
use crate::pathfinding;
use crate::tier::{EnergyTier, TierRegistry};

/// Tier values a node needs during its step.
#[derive(Debug, Clone, Copy)]
struct StepLimits {
    rate: Energy,
    loss: Fixed64,
    threshold: Option<Energy>,
}

#[derive(Debug)]
pub struct TransmissionGrid {
    config: TransmissionConfig,
    tiers: TierRegistry,
    nodes: BTreeMap<BlockPos, TransmissionNode>,
    devices: SlotMap<DeviceId, Box<dyn EnergyStorage>>,
    device_positions: BTreeMap<BlockPos, DeviceId>,
    discovery: NetworkDiscovery,
}

impl TransmissionGrid {
    pub fn new(config: TransmissionConfig, tiers: TierRegistry) -> Self {
        let discovery = NetworkDiscovery::new(config.path_cache_capacity);
        Self {
            config,
            tiers,
            nodes: BTreeMap::new(),
            devices: SlotMap::with_key(),
            device_positions: BTreeMap::new(),
            discovery,
        }
    }

    /// Default configuration with the built-in tier table.
    pub fn with_standard_tiers() -> Self {
        Self::new(TransmissionConfig::default(), TierRegistry::standard())
    }

    pub fn config(&self) -> &TransmissionConfig {
        &self.config
    }

    pub fn tiers(&self) -> &TierRegistry {
        &self.tiers
    }

    pub fn register_tier(&mut self, tier: EnergyTier) -> Result<TierId, GridError> {
        self.tiers.register(tier)
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    fn ensure_vacant(&self, pos: BlockPos) -> Result<(), GridError> {
        if self.nodes.contains_key(&pos) {
            return Err(GridError::NodeOccupied(pos));
        }
        if self.device_positions.contains_key(&pos) {
            return Err(GridError::DeviceOccupied(pos));
        }
        Ok(())
    }

    /// Place a node of the given tier. Networks around `pos` are discarded
    /// and the path cache is cleared.
    pub fn place_node(&mut self, pos: BlockPos, tier: TierId) -> Result<(), GridError> {
        self.ensure_vacant(pos)?;
        let profile = self.tiers.get(tier).ok_or(GridError::UnknownTierId(tier))?;
        info!(%pos, tier = %profile.name, "transmission node placed");
        let node = TransmissionNode::new(pos, tier, profile);
        self.discovery.invalidate_around(pos, &self.nodes);
        self.nodes.insert(pos, node);
        Ok(())
    }

    pub fn place_node_named(&mut self, pos: BlockPos, tier: &str) -> Result<(), GridError> {
        let id = self
            .tiers
            .id_of(tier)
            .ok_or_else(|| GridError::UnknownTier(tier.to_owned()))?;
        self.place_node(pos, id)
    }

    /// Remove a node. Its network and every cached path are invalidated.
    pub fn remove_node(&mut self, pos: BlockPos) -> Result<TransmissionNode, GridError> {
        if !self.nodes.contains_key(&pos) {
            return Err(GridError::NoNode(pos));
        }
        self.discovery.invalidate_around(pos, &self.nodes);
        let node = self.nodes.remove(&pos).ok_or(GridError::NoNode(pos))?;
        info!(%pos, stored = node.stored_energy(), "transmission node removed");
        Ok(node)
    }

    /// Attach an external device at `pos`. Adjacent nodes pick it up on the
    /// next step.
    pub fn add_device(
        &mut self,
        pos: BlockPos,
        device: Box<dyn EnergyStorage>,
    ) -> Result<DeviceId, GridError> {
        self.ensure_vacant(pos)?;
        let id = self.devices.insert(device);
        self.device_positions.insert(pos, id);
        self.discovery.invalidate_around(pos, &self.nodes);
        debug!(%pos, "device attached");
        Ok(id)
    }

    pub fn remove_device(&mut self, pos: BlockPos) -> Result<Box<dyn EnergyStorage>, GridError> {
        let id = self
            .device_positions
            .remove(&pos)
            .ok_or(GridError::NoDevice(pos))?;
        self.discovery.invalidate_around(pos, &self.nodes);
        debug!(%pos, "device detached");
        self.devices.remove(id).ok_or(GridError::NoDevice(pos))
    }

    pub fn device_at(&self, pos: BlockPos) -> Option<DeviceId> {
        self.device_positions.get(&pos).copied()
    }

    pub fn device(&self, id: DeviceId) -> Option<&dyn EnergyStorage> {
        self.devices.get(id).map(|d| d.as_ref())
    }

    pub fn device_mut(&mut self, id: DeviceId) -> Option<&mut (dyn EnergyStorage + 'static)> {
        self.devices.get_mut(id).map(|d| d.as_mut())
    }

    pub fn node(&self, pos: BlockPos) -> Option<&TransmissionNode> {
        self.nodes.get(&pos)
    }

    /// All nodes in ascending position order.
    pub fn nodes(&self) -> impl Iterator<Item = &TransmissionNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn tier_of(&self, pos: BlockPos) -> Option<&EnergyTier> {
        self.nodes.get(&pos).and_then(|n| self.tiers.get(n.tier()))
    }

    /// Push energy into the node at `pos` from outside the grid.
    pub fn receive_energy(
        &mut self,
        pos: BlockPos,
        amount: Energy,
        simulate: bool,
    ) -> Result<Energy, GridError> {
        let node = self.nodes.get_mut(&pos).ok_or(GridError::NoNode(pos))?;
        Ok(node.receive_energy(amount, simulate))
    }

    /// Draw energy out of the node at `pos`.
    pub fn extract_energy(
        &mut self,
        pos: BlockPos,
        amount: Energy,
        simulate: bool,
    ) -> Result<Energy, GridError> {
        let node = self.nodes.get_mut(&pos).ok_or(GridError::NoNode(pos))?;
        Ok(node.extract_energy(amount, simulate))
    }

    // -----------------------------------------------------------------------
    // Networks and diagnostics
    // -----------------------------------------------------------------------

    /// Node positions reachable from `start`, excluding `start`.
    pub fn discover(&self, start: BlockPos) -> BTreeSet<BlockPos> {
        discovery::discover(
            start,
            |p| self.nodes.contains_key(&p),
            self.config.max_network_size,
        )
    }

    /// The live network `pos` belongs to, if it has one.
    pub fn network_of(&self, pos: BlockPos) -> Option<&Network> {
        let id = self.nodes.get(&pos)?.network_id?;
        self.discovery.network(id)
    }

    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.discovery.network(id)
    }

    /// Bottleneck transfer rate of a live network.
    pub fn network_transfer_rate(&self, id: NetworkId) -> Energy {
        let Some(network) = self.discovery.network(id) else {
            return 0;
        };
        crate::tier::network_transfer_rate(
            network
                .members
                .iter()
                .filter_map(|pos| self.tier_of(*pos)),
        )
    }

    pub fn path_cache(&self) -> &PathCache {
        self.discovery.paths()
    }

    /// Route between two nodes, served from the path cache when possible.
    /// Empty if there is none. See [`pathfinding::find_path`] for how routes
    /// are ranked.
    pub fn find_optimal_path(&mut self, start: BlockPos, end: BlockPos) -> Vec<BlockPos> {
        if let Some(path) = self.discovery.paths_mut().lookup(start, end) {
            return path;
        }
        let path = self.find_path_uncached(start, end);
        self.discovery.paths_mut().insert(start, end, path.clone());
        path
    }

    /// Route search that neither reads nor fills the cache.
    pub fn find_path_uncached(&self, start: BlockPos, end: BlockPos) -> Vec<BlockPos> {
        pathfinding::find_path(
            start,
            end,
            |p| self.tier_of(p).map(|t| t.transfer_rate),
            self.config.max_network_size,
        )
    }

    /// Fraction of energy lost along `path` given each node's tier.
    pub fn calculate_energy_loss(&self, path: &[BlockPos]) -> Fixed64 {
        pathfinding::calculate_energy_loss(path, |p| self.tier_of(p).map(|t| t.effective_loss()))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    /// Persisted fields of every node, in position order.
    pub fn node_states(&self) -> Result<Vec<(BlockPos, NodeState)>, GridError> {
        self.nodes
            .values()
            .map(|n| Ok((n.pos(), n.to_state(&self.tiers)?)))
            .collect()
    }

    /// Replace every node with the given states. Nothing changes on error.
    /// Networks are rediscovered on the next step.
    pub fn restore_node_states(
        &mut self,
        states: &[(BlockPos, NodeState)],
    ) -> Result<(), GridError> {
        let restored = self.build_nodes(states, &self.tiers)?;
        self.install_nodes(restored);
        Ok(())
    }

    /// Restore nodes resolved against `tiers`, which becomes the grid's
    /// registry only if every node is accepted.
    pub(crate) fn restore_with_tiers(
        &mut self,
        tiers: TierRegistry,
        states: &[(BlockPos, NodeState)],
    ) -> Result<(), GridError> {
        let restored = self.build_nodes(states, &tiers)?;
        self.tiers = tiers;
        self.install_nodes(restored);
        Ok(())
    }

    fn build_nodes(
        &self,
        states: &[(BlockPos, NodeState)],
        tiers: &TierRegistry,
    ) -> Result<BTreeMap<BlockPos, TransmissionNode>, GridError> {
        let mut restored = BTreeMap::new();
        for (pos, state) in states {
            if self.device_positions.contains_key(pos) {
                return Err(GridError::DeviceOccupied(*pos));
            }
            let node = TransmissionNode::from_state(*pos, state, tiers)?;
            if restored.insert(*pos, node).is_some() {
                return Err(GridError::NodeOccupied(*pos));
            }
        }
        Ok(restored)
    }

    fn install_nodes(&mut self, restored: BTreeMap<BlockPos, TransmissionNode>) {
        self.nodes = restored;
        self.discovery.invalidate_all();
        let positions: Vec<BlockPos> = self.nodes.keys().copied().collect();
        for pos in positions {
            self.discovery.invalidate_around(pos, &self.nodes);
        }
        info!(nodes = self.nodes.len(), "node states restored");
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Advance every node by one step.
    pub fn tick(
        &mut self,
        current_tick: Ticks,
        surroundings: &dyn Surroundings,
    ) -> Vec<TransmissionEvent> {
        let mut events = Vec::new();
        self.refresh_adjacency(current_tick);

        let positions: Vec<BlockPos> = self.nodes.keys().copied().collect();
        for pos in positions {
            if !self.nodes.contains_key(&pos) {
                continue;
            }
            self.ensure_network(pos, current_tick, &mut events);
            self.step_node(pos, current_tick, surroundings, &mut events);
        }
        events
    }

    fn refresh_adjacency(&mut self, tick: Ticks) {
        let dirty = self.discovery.take_dirty();
        let interval = self.config.network_update_interval;
        let targets: Vec<BlockPos> = if interval > 0 && tick % interval == 0 {
            self.nodes.keys().copied().collect()
        } else {
            dirty
                .into_iter()
                .filter(|p| self.nodes.contains_key(p))
                .collect()
        };
        for pos in targets {
            self.refresh_faces(pos);
        }
    }

    fn refresh_faces(&mut self, pos: BlockPos) {
        let mut connections = PerFace::<bool>::default();
        let mut devices = PerFace::<Option<DeviceId>>::default();
        for (dir, neighbor) in pos.neighbors() {
            if self.nodes.contains_key(&neighbor) {
                connections.set(dir, true);
            } else if let Some(&id) = self.device_positions.get(&neighbor) {
                connections.set(dir, true);
                devices.set(dir, Some(id));
            }
        }
        if let Some(node) = self.nodes.get_mut(&pos) {
            node.connections = connections;
            node.connected_devices = devices;
        }
    }

    fn ensure_network(&mut self, pos: BlockPos, tick: Ticks, events: &mut Vec<TransmissionEvent>) {
        let current = self.nodes.get(&pos).and_then(|n| n.network_id);
        if !self
            .discovery
            .needs_rebuild(current, tick, self.config.network_update_interval)
        {
            return;
        }
        let id = self
            .discovery
            .rebuild(pos, &mut self.nodes, tick, self.config.max_network_size);
        if let Some(network) = self.discovery.network(id) {
            events.push(TransmissionEvent::NetworkRebuilt {
                network_id: id,
                members: network.members.clone(),
                truncated: network.truncated,
                tick,
            });
        }
    }

    fn step_node(
        &mut self,
        pos: BlockPos,
        tick: Ticks,
        surroundings: &dyn Surroundings,
        events: &mut Vec<TransmissionEvent>,
    ) {
        let Some(node) = self.nodes.get(&pos) else {
            return;
        };
        let Some(tier) = self.tiers.get(node.tier()) else {
            return;
        };
        let limits = StepLimits {
            rate: tier.transfer_rate,
            loss: tier.effective_loss(),
            threshold: tier.explosion_threshold,
        };
        let devices = node.connected_devices;

        self.pull_from_producers(pos, limits, &devices);
        let sent = self.distribute(pos, limits, &devices);
        let balanced = if self.config.balance_between_nodes {
            self.balance_neighbours(pos, limits, limits.rate.saturating_sub(sent))
        } else {
            0
        };
        let moved = sent + balanced;

        let Some(node) = self.nodes.get_mut(&pos) else {
            return;
        };
        node.current_load = ratio(moved, limits.rate);
        node.is_transmitting = moved > 0;
        let window = node.take_window();
        let outcome = node.overload.observe(
            window,
            limits.threshold,
            self.config.overload_warning_ticks,
            self.config.overload_explosion_ticks,
        );

        match outcome {
            OverloadOutcome::Warned { counter } => {
                let tier_name = self.tier_name(pos);
                warn!(%pos, tier = %tier_name, counter, flow = window, "transmission node overloaded");
                events.push(TransmissionEvent::OverloadWarning {
                    pos,
                    counter,
                    notify_radius: self.config.notify_radius,
                    message: warning_message(pos, &tier_name),
                    tick,
                });
            }
            OverloadOutcome::Exploded { .. } => {
                self.explode(pos, tick, surroundings, events);
            }
            OverloadOutcome::Recovered { previous_counter } => {
                debug!(%pos, previous_counter, "transmission node recovered from overload");
            }
            OverloadOutcome::Safe | OverloadOutcome::Overloaded { .. } => {}
        }
    }

    /// Draw from adjacent pure producers, in direction order, up to the
    /// tier rate and the buffer's headroom.
    fn pull_from_producers(
        &mut self,
        pos: BlockPos,
        limits: StepLimits,
        devices: &PerFace<Option<DeviceId>>,
    ) {
        let mut pulled: Energy = 0;
        for (_, slot) in devices.iter() {
            let Some(id) = *slot else {
                continue;
            };
            let Some(device) = self.devices.get_mut(id) else {
                continue;
            };
            if !device.is_pure_producer() {
                continue;
            }
            let Some(node) = self.nodes.get_mut(&pos) else {
                return;
            };
            let budget = limits.rate.saturating_sub(pulled).min(node.headroom());
            if budget == 0 {
                return;
            }
            let offered = device.extract_energy(budget, true);
            let accepted = node.receive_energy(offered, true);
            let released = device.extract_energy(accepted, false);
            pulled += node.receive_energy(released, false);
        }
        if pulled > 0 {
            trace!(%pos, pulled, "pulled from producers");
        }
    }

    /// Split the buffer over receptive devices. Returns the total debited.
    fn distribute(
        &mut self,
        pos: BlockPos,
        limits: StepLimits,
        devices: &PerFace<Option<DeviceId>>,
    ) -> Energy {
        let probe = limits.rate.max(1);
        let receivers: Vec<DeviceId> = devices
            .iter()
            .filter_map(|(_, slot)| *slot)
            .filter(|id| {
                self.devices
                    .get_mut(*id)
                    .is_some_and(|d| d.can_receive() && d.receive_energy(probe, true) > 0)
            })
            .collect();
        if receivers.is_empty() {
            return 0;
        }

        let Some(node) = self.nodes.get_mut(&pos) else {
            return 0;
        };
        let shares = even_shares(node.stored_energy(), receivers.len(), limits.rate);
        let mut debited: Energy = 0;
        for (id, share) in receivers.into_iter().zip(shares) {
            if share == 0 {
                continue;
            }
            let Some(device) = self.devices.get_mut(id) else {
                continue;
            };
            let outcome = transfer_with_loss(device.as_mut(), share, limits.loss);
            node.debit(outcome.debited);
            debited += outcome.debited;
        }
        if debited > 0 {
            trace!(%pos, debited, "distributed to devices");
        }
        debited
    }

    /// Push half the difference to each emptier neighbouring node, within
    /// `budget`. Returns the total debited.
    fn balance_neighbours(&mut self, pos: BlockPos, limits: StepLimits, budget: Energy) -> Energy {
        let mut moved: Energy = 0;
        for (_, neighbor) in pos.neighbors() {
            let remaining = budget.saturating_sub(moved);
            if remaining == 0 {
                break;
            }
            let Some(source) = self.nodes.get(&pos).map(|n| n.stored_energy()) else {
                break;
            };
            let Some(target) = self.nodes.get_mut(&neighbor) else {
                continue;
            };
            if target.stored_energy() >= source {
                continue;
            }
            let attempt = ((source - target.stored_energy()) / 2).min(remaining);
            if attempt == 0 {
                continue;
            }
            let outcome = transfer_with_loss(target, attempt, limits.loss);
            if let Some(node) = self.nodes.get_mut(&pos) {
                node.debit(outcome.debited);
            }
            moved += outcome.debited;
        }
        moved
    }

    fn explode(
        &mut self,
        pos: BlockPos,
        tick: Ticks,
        surroundings: &dyn Surroundings,
        events: &mut Vec<TransmissionEvent>,
    ) {
        let tier_name = self.tier_name(pos);
        let damage = resolve_blast(pos, surroundings, &self.config);
        self.discovery.invalidate_around(pos, &self.nodes);
        self.nodes.remove(&pos);
        info!(%pos, tier = %tier_name, victims = damage.len(), "transmission node exploded");
        events.push(TransmissionEvent::NodeExploded {
            pos,
            damage,
            notify_radius: self.config.notify_radius,
            message: explosion_message(pos, &tier_name),
            tick,
        });
        events.push(TransmissionEvent::NodeRemoved { pos, tick });
    }

    fn tier_name(&self, pos: BlockPos) -> String {
        self.tier_of(pos)
            .map(|t| t.name.clone())
            .unwrap_or_default()
    }
}
