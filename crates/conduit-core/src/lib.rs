//! Conduit Core -- shared primitives for the energy transport network.
//!
//! This crate holds the small, dependency-light pieces every other Conduit
//! crate builds on:
//!
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point for deterministic loss and
//!   load arithmetic. Energy itself is integral ([`fixed::Energy`]).
//! - [`position::BlockPos`] and [`position::Direction`] -- the 3-D lattice
//!   nodes live on and the six faces they connect through.
//! - [`device::EnergyStorage`] -- the capability boundary every external
//!   machine or battery exposes to the transmission network.
//! - [`dirty::DirtyTracker`] -- records which positions changed topology
//!   since the last rebuild.
//!
//! With the `test-utils` feature, [`test_utils`] provides simple devices
//! (batteries, generators, sinks) for tests and benchmarks.

pub mod device;
pub mod dirty;
pub mod fixed;
pub mod id;
pub mod position;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
