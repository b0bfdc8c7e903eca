//! Tunable constants for the transmission grid.

use conduit_core::fixed::Fixed64;
use serde::{Deserialize, Serialize};

/// Grid-wide configuration. Every field has a default, so partial config
/// files only need to name what they change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransmissionConfig {
    /// Hard cap on nodes visited by one discovery traversal.
    pub max_network_size: usize,
    /// Steps between forced network resyncs. 0 disables the resync.
    pub network_update_interval: u64,
    /// Consecutive overloaded steps before the one-time warning.
    pub overload_warning_ticks: u32,
    /// Consecutive overloaded steps before the node explodes.
    pub overload_explosion_ticks: u32,
    /// Blast radius in blocks.
    pub explosion_radius: u32,
    /// Damage at the epicentre.
    pub explosion_max_damage: Fixed64,
    /// Damage floor for anything inside the radius.
    pub explosion_min_damage: Fixed64,
    /// Radius within which warnings and explosions are announced.
    pub notify_radius: u32,
    /// Entries kept by the path cache.
    pub path_cache_capacity: usize,
    /// Whether nodes push energy to emptier neighbouring nodes.
    pub balance_between_nodes: bool,
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            max_network_size: 1000,
            network_update_interval: 20,
            overload_warning_ticks: 60,
            overload_explosion_ticks: 100,
            explosion_radius: 5,
            explosion_max_damage: Fixed64::from_num(10),
            explosion_min_damage: Fixed64::from_num(2),
            notify_radius: 16,
            path_cache_capacity: 256,
            balance_between_nodes: true,
        }
    }
}
