//! Conduit Transmission -- the energy transport network.
//!
//! Transmission nodes ("cables") sit on a 3-D lattice, discover the
//! networks they form, and move integral energy between producers, storage
//! and consumers once per simulation step.
//!
//! # Overview
//!
//! - [`tier`] -- immutable capability profiles: transfer rate, loss per hop,
//!   overload threshold, insulation.
//! - [`node`] -- one cable block with its buffer and persisted state.
//! - [`discovery`] -- bounded flood fill, network identity, invalidation.
//! - [`distribution`] -- lossy transfer arithmetic and the even split.
//! - [`overload`] -- the warning/explosion state machine and blast damage.
//! - [`pathfinding`] / [`path_cache`] -- diagnostic route and loss queries.
//! - [`hybrid`] -- dual-denomination storage.
//! - [`grid`] -- owns nodes and devices and drives each step.
//! - [`snapshot`] -- versioned binary save/load of node state.
//!
//! # Example
//!
//! ```
//! use conduit_core::position::BlockPos;
//! use conduit_transmission::grid::TransmissionGrid;
//! use conduit_transmission::overload::EmptySurroundings;
//!
//! let mut grid = TransmissionGrid::with_standard_tiers();
//! grid.place_node_named(BlockPos::new(0, 0, 0), "copper").unwrap();
//! grid.place_node_named(BlockPos::new(1, 0, 0), "copper").unwrap();
//! grid.receive_energy(BlockPos::new(0, 0, 0), 200, false).unwrap();
//!
//! grid.tick(1, &EmptySurroundings);
//! assert!(grid.node(BlockPos::new(1, 0, 0)).unwrap().stored_energy() > 0);
//! ```

pub mod config;
pub mod discovery;
pub mod distribution;
pub mod error;
pub mod event;
pub mod grid;
pub mod hybrid;
pub mod node;
pub mod overload;
pub mod path_cache;
pub mod pathfinding;
pub mod snapshot;
pub mod tier;

pub use config::TransmissionConfig;
pub use error::GridError;
pub use event::TransmissionEvent;
pub use grid::TransmissionGrid;
pub use tier::{EnergyTier, TierRegistry};
