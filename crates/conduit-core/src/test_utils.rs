//! Shared test devices for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::device::EnergyStorage;
use crate::fixed::{Energy, Fixed64};

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Devices
// ===========================================================================

/// A plain battery: receives and extracts, rate-limited per call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBattery {
    pub stored: Energy,
    pub capacity: Energy,
    pub max_receive: Energy,
    pub max_extract: Energy,
}

impl TestBattery {
    pub fn new(capacity: Energy, rate: Energy) -> Self {
        Self {
            stored: 0,
            capacity,
            max_receive: rate,
            max_extract: rate,
        }
    }

    pub fn with_stored(mut self, stored: Energy) -> Self {
        self.stored = stored.min(self.capacity);
        self
    }
}

impl EnergyStorage for TestBattery {
    fn can_receive(&self) -> bool {
        self.max_receive > 0
    }

    fn can_extract(&self) -> bool {
        self.max_extract > 0
    }

    fn receive_energy(&mut self, amount: Energy, simulate: bool) -> Energy {
        let accepted = amount
            .min(self.max_receive)
            .min(self.capacity - self.stored);
        if !simulate {
            self.stored += accepted;
        }
        accepted
    }

    fn extract_energy(&mut self, amount: Energy, simulate: bool) -> Energy {
        let released = amount.min(self.max_extract).min(self.stored);
        if !simulate {
            self.stored -= released;
        }
        released
    }

    fn energy_stored(&self) -> Energy {
        self.stored
    }

    fn max_energy_stored(&self) -> Energy {
        self.capacity
    }
}

/// A generator with an internal buffer that only gives energy away.
///
/// Call [`generate`](TestGenerator::generate) between ticks to refill it, or
/// build it with [`endless`](TestGenerator::endless) so every request is
/// served up to `output_per_tick` without draining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestGenerator {
    pub buffer: Energy,
    pub capacity: Energy,
    pub output_per_tick: Energy,
    pub total_extracted: Energy,
    pub endless: bool,
}

impl TestGenerator {
    pub fn new(output_per_tick: Energy) -> Self {
        Self {
            buffer: output_per_tick,
            capacity: output_per_tick,
            output_per_tick,
            total_extracted: 0,
            endless: false,
        }
    }

    pub fn endless(output_per_tick: Energy) -> Self {
        Self {
            endless: true,
            ..Self::new(output_per_tick)
        }
    }

    pub fn generate(&mut self) {
        self.buffer = (self.buffer + self.output_per_tick).min(self.capacity);
    }
}

impl EnergyStorage for TestGenerator {
    fn can_receive(&self) -> bool {
        false
    }

    fn can_extract(&self) -> bool {
        true
    }

    fn receive_energy(&mut self, _amount: Energy, _simulate: bool) -> Energy {
        0
    }

    fn extract_energy(&mut self, amount: Energy, simulate: bool) -> Energy {
        let released = amount.min(self.buffer);
        if !simulate {
            if !self.endless {
                self.buffer -= released;
            }
            self.total_extracted += released;
        }
        released
    }

    fn energy_stored(&self) -> Energy {
        self.buffer
    }

    fn max_energy_stored(&self) -> Energy {
        self.capacity
    }
}

/// A consumer that swallows everything offered, up to an optional per-call
/// limit, and records the total.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSink {
    pub received_total: Energy,
    pub per_call_limit: Option<Energy>,
    pub calls: u32,
}

impl TestSink {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn limited(limit: Energy) -> Self {
        Self {
            per_call_limit: Some(limit),
            ..Self::default()
        }
    }
}

impl EnergyStorage for TestSink {
    fn can_receive(&self) -> bool {
        self.per_call_limit != Some(0)
    }

    fn can_extract(&self) -> bool {
        false
    }

    fn receive_energy(&mut self, amount: Energy, simulate: bool) -> Energy {
        let accepted = match self.per_call_limit {
            Some(limit) => amount.min(limit),
            None => amount,
        };
        if !simulate {
            self.received_total = self.received_total.saturating_add(accepted);
            self.calls += 1;
        }
        accepted
    }

    fn extract_energy(&mut self, _amount: Energy, _simulate: bool) -> Energy {
        0
    }

    fn energy_stored(&self) -> Energy {
        self.received_total
    }

    fn max_energy_stored(&self) -> Energy {
        Energy::MAX
    }
}
