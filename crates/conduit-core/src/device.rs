//! The device capability boundary.
//!
//! Anything the transmission network moves energy into or out of (machines,
//! batteries, generators, and other transmission nodes) is reached only
//! through [`EnergyStorage`]. The network never inspects a device's
//! internals.

use crate::fixed::Energy;

/// Energy capability exposed by a device on one of its faces.
///
/// `receive_energy` and `extract_energy` return the amount actually
/// accepted or released. Both must clamp rather than fail, and a call with
/// `simulate = true` must not change any observable state.
pub trait EnergyStorage: std::fmt::Debug {
    /// Whether this device currently accepts energy at all.
    fn can_receive(&self) -> bool;

    /// Whether this device currently releases energy at all.
    fn can_extract(&self) -> bool;

    /// Offer `amount`; returns how much was accepted.
    fn receive_energy(&mut self, amount: Energy, simulate: bool) -> Energy;

    /// Request `amount`; returns how much was released.
    fn extract_energy(&mut self, amount: Energy, simulate: bool) -> Energy;

    fn energy_stored(&self) -> Energy;

    fn max_energy_stored(&self) -> Energy;

    /// A device that only ever gives energy away.
    fn is_pure_producer(&self) -> bool {
        self.can_extract() && !self.can_receive()
    }
}
