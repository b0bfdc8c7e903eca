//! Data-driven configuration for the transmission network.
//!
//! A data directory may hold `tiers.{ron,toml,json}` and
//! `transmission.{ron,toml,json}`. Both are optional: without a tier file
//! the built-in table is used, and without a transmission file every
//! setting keeps its default.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, GridData, load_grid_data};
