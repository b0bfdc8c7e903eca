//! Energy tiers: immutable capability profiles shared by many nodes.
//!
//! A tier is plain data. Everything tier-specific (throughput, buffer size,
//! loss, overload threshold) is a lookup on [`EnergyTier`], and nodes refer
//! to their tier through a [`TierId`] into the [`TierRegistry`].

use std::collections::BTreeMap;

use conduit_core::fixed::{Energy, Fixed64};
use conduit_core::id::TierId;
use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Tier names with this prefix are insulated and lose half as much per hop.
pub const INSULATED_PREFIX: &str = "insulated_";

// ---------------------------------------------------------------------------
// EnergyTier
// ---------------------------------------------------------------------------

/// An immutable tier profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnergyTier {
    /// Unique name. Insulation is derived from it.
    pub name: String,
    /// Maximum energy a node moves to one receiver per step.
    pub transfer_rate: Energy,
    /// Incoming flow per step at or above which overload accrues.
    /// `None` means the tier can never overload.
    pub explosion_threshold: Option<Energy>,
    /// Fraction of each transfer lost in transit, before insulation.
    pub loss_per_hop: Fixed64,
}

impl EnergyTier {
    pub fn new(
        name: impl Into<String>,
        transfer_rate: Energy,
        explosion_threshold: Option<Energy>,
        loss_per_hop: Fixed64,
    ) -> Self {
        Self {
            name: name.into(),
            transfer_rate,
            explosion_threshold,
            loss_per_hop: loss_per_hop.clamp(Fixed64::ZERO, Fixed64::ONE),
        }
    }

    /// Whether this tier is insulated (derived from its name).
    pub fn is_insulated(&self) -> bool {
        self.name.starts_with(INSULATED_PREFIX)
    }

    /// The loss actually applied per transfer: halved when insulated.
    pub fn effective_loss(&self) -> Fixed64 {
        if self.is_insulated() {
            self.loss_per_hop / 2
        } else {
            self.loss_per_hop
        }
    }

    /// Size of a node's internal buffer: twice the transfer rate.
    pub fn buffer_capacity(&self) -> Energy {
        self.transfer_rate.saturating_mul(2)
    }

    /// The insulated variant of this tier. Idempotent.
    pub fn insulated(&self) -> EnergyTier {
        if self.is_insulated() {
            return self.clone();
        }
        EnergyTier {
            name: format!("{INSULATED_PREFIX}{}", self.name),
            ..self.clone()
        }
    }
}

/// Bottleneck throughput across a set of tiers: the smallest transfer rate,
/// or 0 for an empty set.
pub fn network_transfer_rate<'a>(tiers: impl IntoIterator<Item = &'a EnergyTier>) -> Energy {
    tiers
        .into_iter()
        .map(|t| t.transfer_rate)
        .min()
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// TierRegistry
// ---------------------------------------------------------------------------

/// All tiers known to a grid, addressable by [`TierId`] or by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TierRegistry {
    tiers: Vec<EnergyTier>,
    by_name: BTreeMap<String, TierId>,
}

impl TierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in table: copper, gold, diamond and netherite, each with an
    /// insulated variant. Netherite never overloads.
    pub fn standard() -> Self {
        let bare = [
            EnergyTier::new("copper", 128, Some(192), Fixed64::from_num(0.05)),
            EnergyTier::new("gold", 512, Some(768), Fixed64::from_num(0.03)),
            EnergyTier::new("diamond", 2048, Some(3072), Fixed64::from_num(0.02)),
            EnergyTier::new("netherite", 8192, None, Fixed64::from_num(0.01)),
        ];
        let mut registry = Self::new();
        for tier in bare {
            let insulated = tier.insulated();
            // Names in the table are distinct.
            let _ = registry.register(tier);
            let _ = registry.register(insulated);
        }
        registry
    }

    /// Add a tier. Names must be unique.
    pub fn register(&mut self, tier: EnergyTier) -> Result<TierId, GridError> {
        if self.by_name.contains_key(&tier.name) {
            return Err(GridError::DuplicateTier(tier.name));
        }
        let id = u16::try_from(self.tiers.len())
            .map(TierId)
            .map_err(|_| GridError::TierTableFull(self.tiers.len()))?;
        self.by_name.insert(tier.name.clone(), id);
        self.tiers.push(tier);
        Ok(id)
    }

    pub fn get(&self, id: TierId) -> Option<&EnergyTier> {
        self.tiers.get(usize::from(id.0))
    }

    pub fn id_of(&self, name: &str) -> Option<TierId> {
        self.by_name.get(name).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&EnergyTier> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Iterate `(id, tier)` in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TierId, &EnergyTier)> {
        self.tiers
            .iter()
            .enumerate()
            .map(|(i, t)| (TierId(i as u16), t))
    }

    /// Tier ids sorted by transfer rate, ties broken by name.
    pub fn ordered(&self) -> Vec<TierId> {
        let mut ids: Vec<TierId> = self.iter().map(|(id, _)| id).collect();
        ids.sort_by(|a, b| {
            let (ta, tb) = (&self.tiers[usize::from(a.0)], &self.tiers[usize::from(b.0)]);
            ta.transfer_rate
                .cmp(&tb.transfer_rate)
                .then_with(|| ta.name.cmp(&tb.name))
        });
        ids
    }
}
