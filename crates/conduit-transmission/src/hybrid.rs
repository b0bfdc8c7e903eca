//! Dual-denomination energy storage.
//!
//! A [`HybridAccumulator`] holds energy that can be counted in two units: the
//! network's primary unit and a coarser secondary unit worth a fixed number
//! of primary units. Exactly one denomination is authoritative at a time
//! ([`StoredCharge`]); the other is always derived from it by conversion, so
//! the two views cannot drift apart.
//!
//! | mode            | authoritative | accepts / releases |
//! |-----------------|---------------|--------------------|
//! | `PrimaryOnly`   | primary       | primary            |
//! | `SecondaryOnly` | secondary     | secondary          |
//! | `Hybrid`        | primary       | both               |
//!
//! Capacity and per-call rates are configured in primary units. Secondary
//! operations move whole secondary units only.

use conduit_core::device::EnergyStorage;
use conduit_core::fixed::Energy;
use serde::{Deserialize, Serialize};

/// The two denominations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EnergyUnit {
    Primary,
    Secondary,
}

/// Which denominations the accumulator currently deals in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum HybridMode {
    PrimaryOnly,
    SecondaryOnly,
    #[default]
    Hybrid,
}

impl HybridMode {
    pub fn accepts(self, unit: EnergyUnit) -> bool {
        matches!(
            (self, unit),
            (HybridMode::Hybrid, _)
                | (HybridMode::PrimaryOnly, EnergyUnit::Primary)
                | (HybridMode::SecondaryOnly, EnergyUnit::Secondary)
        )
    }

    fn authoritative_unit(self) -> EnergyUnit {
        match self {
            HybridMode::SecondaryOnly => EnergyUnit::Secondary,
            HybridMode::PrimaryOnly | HybridMode::Hybrid => EnergyUnit::Primary,
        }
    }
}

/// The authoritative stored value, tagged with its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoredCharge {
    Primary(Energy),
    Secondary(Energy),
}

/// Primary units per secondary unit. Always at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRatio(u64);

impl ConversionRatio {
    pub fn new(primary_per_secondary: u64) -> Self {
        Self(primary_per_secondary.max(1))
    }

    pub fn get(self) -> u64 {
        self.0
    }

    pub fn to_primary(self, secondary: Energy) -> Energy {
        secondary.saturating_mul(self.0)
    }

    /// Whole secondary units in `primary`, rounding down.
    pub fn to_secondary(self, primary: Energy) -> Energy {
        primary / self.0
    }
}

/// Dual-unit energy store. See the module docs for the mode table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridAccumulator {
    charge: StoredCharge,
    mode: HybridMode,
    ratio: ConversionRatio,
    capacity: Energy,
    max_receive: Energy,
    max_extract: Energy,
}

impl HybridAccumulator {
    /// An empty accumulator in `Hybrid` mode. `capacity` and `max_rate` are
    /// in primary units.
    pub fn new(capacity: Energy, max_rate: Energy, ratio: ConversionRatio) -> Self {
        Self {
            charge: StoredCharge::Primary(0),
            mode: HybridMode::Hybrid,
            ratio,
            capacity,
            max_receive: max_rate,
            max_extract: max_rate,
        }
    }

    pub fn with_mode(mut self, mode: HybridMode) -> Self {
        self.set_mode(mode);
        self
    }

    pub fn mode(&self) -> HybridMode {
        self.mode
    }

    pub fn ratio(&self) -> ConversionRatio {
        self.ratio
    }

    pub fn charge(&self) -> StoredCharge {
        self.charge
    }

    pub fn capacity(&self) -> Energy {
        self.capacity
    }

    /// Stored energy expressed in primary units.
    pub fn stored_primary(&self) -> Energy {
        match self.charge {
            StoredCharge::Primary(a) => a,
            StoredCharge::Secondary(b) => self.ratio.to_primary(b),
        }
    }

    /// Stored energy expressed in whole secondary units.
    pub fn stored_secondary(&self) -> Energy {
        match self.charge {
            StoredCharge::Primary(a) => self.ratio.to_secondary(a),
            StoredCharge::Secondary(b) => b,
        }
    }

    pub fn stored(&self, unit: EnergyUnit) -> Energy {
        match unit {
            EnergyUnit::Primary => self.stored_primary(),
            EnergyUnit::Secondary => self.stored_secondary(),
        }
    }

    /// Switch mode, re-deriving the authoritative value from the current
    /// one. Moving to secondary authority drops any fraction of a secondary
    /// unit.
    pub fn set_mode(&mut self, mode: HybridMode) {
        self.mode = mode;
        self.charge = match mode.authoritative_unit() {
            EnergyUnit::Primary => StoredCharge::Primary(self.stored_primary()),
            EnergyUnit::Secondary => StoredCharge::Secondary(self.stored_secondary()),
        };
    }

    /// Room left, in primary units.
    fn headroom_primary(&self) -> Energy {
        self.capacity.saturating_sub(self.stored_primary())
    }

    /// Offer `amount` of `unit`. Returns the amount accepted, in `unit`.
    pub fn receive(&mut self, unit: EnergyUnit, amount: Energy, simulate: bool) -> Energy {
        if !self.mode.accepts(unit) {
            return 0;
        }
        let room = self.headroom_primary().min(self.max_receive);
        let accepted = match unit {
            EnergyUnit::Primary => amount.min(room),
            EnergyUnit::Secondary => amount.min(self.ratio.to_secondary(room)),
        };
        if !simulate {
            self.apply(unit, accepted, Energy::saturating_add);
        }
        accepted
    }

    /// Request `amount` of `unit`. Returns the amount released, in `unit`.
    pub fn extract(&mut self, unit: EnergyUnit, amount: Energy, simulate: bool) -> Energy {
        if !self.mode.accepts(unit) {
            return 0;
        }
        let available = self.stored_primary().min(self.max_extract);
        let released = match unit {
            EnergyUnit::Primary => amount.min(available),
            EnergyUnit::Secondary => amount.min(self.ratio.to_secondary(available)),
        };
        if !simulate {
            self.apply(unit, released, Energy::saturating_sub);
        }
        released
    }

    fn apply(&mut self, unit: EnergyUnit, amount: Energy, op: fn(Energy, Energy) -> Energy) {
        let ratio = self.ratio;
        self.charge = match (self.charge, unit) {
            (StoredCharge::Primary(a), EnergyUnit::Primary) => StoredCharge::Primary(op(a, amount)),
            (StoredCharge::Primary(a), EnergyUnit::Secondary) => {
                StoredCharge::Primary(op(a, ratio.to_primary(amount)))
            }
            (StoredCharge::Secondary(b), EnergyUnit::Secondary) => {
                StoredCharge::Secondary(op(b, amount))
            }
            // Secondary authority only exists in SecondaryOnly, which never
            // accepts primary units.
            (StoredCharge::Secondary(b), EnergyUnit::Primary) => StoredCharge::Secondary(b),
        };
    }
}

/// The network sees a hybrid accumulator in primary units.
impl EnergyStorage for HybridAccumulator {
    fn can_receive(&self) -> bool {
        self.mode.accepts(EnergyUnit::Primary) && self.max_receive > 0
    }

    fn can_extract(&self) -> bool {
        self.mode.accepts(EnergyUnit::Primary) && self.max_extract > 0
    }

    fn receive_energy(&mut self, amount: Energy, simulate: bool) -> Energy {
        self.receive(EnergyUnit::Primary, amount, simulate)
    }

    fn extract_energy(&mut self, amount: Energy, simulate: bool) -> Energy {
        self.extract(EnergyUnit::Primary, amount, simulate)
    }

    fn energy_stored(&self) -> Energy {
        self.stored_primary()
    }

    fn max_energy_stored(&self) -> Energy {
        self.capacity
    }
}
