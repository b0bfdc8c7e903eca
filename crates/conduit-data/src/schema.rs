//! On-disk shapes for tier tables and grid settings.
//!
//! Fractions and damage values are written as plain decimals and converted
//! to fixed-point by the loader.

use serde::Deserialize;

/// One tier entry in `tiers.*`.
#[derive(Debug, Clone, Deserialize)]
pub struct TierData {
    pub name: String,
    pub transfer_rate: u64,
    /// Omit for a tier that can never overload.
    #[serde(default)]
    pub explosion_threshold: Option<u64>,
    pub loss_per_hop: f64,
    /// Also register an `insulated_` variant with half the loss.
    #[serde(default)]
    pub insulated_variant: bool,
}

/// `transmission.*`: every field optional, falling back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransmissionData {
    #[serde(default)]
    pub max_network_size: Option<usize>,
    #[serde(default)]
    pub network_update_interval: Option<u64>,
    #[serde(default)]
    pub overload_warning_ticks: Option<u32>,
    #[serde(default)]
    pub overload_explosion_ticks: Option<u32>,
    #[serde(default)]
    pub explosion_radius: Option<u32>,
    #[serde(default)]
    pub explosion_max_damage: Option<f64>,
    #[serde(default)]
    pub explosion_min_damage: Option<f64>,
    #[serde(default)]
    pub notify_radius: Option<u32>,
    #[serde(default)]
    pub path_cache_capacity: Option<usize>,
    #[serde(default)]
    pub balance_between_nodes: Option<bool>,
}
