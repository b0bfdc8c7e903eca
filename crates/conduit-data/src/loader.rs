//! Reads tier tables and grid settings from a data directory.
//!
//! Format is detected from the file extension (RON, TOML or JSON). Two files
//! with the same base name in different formats are rejected rather than
//! silently preferring one.

use std::path::{Path, PathBuf};

use conduit_core::fixed::{Fixed64, f64_to_fixed64};
use conduit_transmission::{EnergyTier, GridError, TierRegistry, TransmissionConfig, TransmissionGrid};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::schema::{TierData, TransmissionData};

/// Base name of the tier table.
pub const TIERS_FILE: &str = "tiers";
/// Base name of the grid settings.
pub const TRANSMISSION_FILE: &str = "transmission";

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A field parsed but holds a value the grid cannot use.
    #[error("invalid {field} in {file}: {detail}")]
    InvalidValue {
        file: PathBuf,
        field: &'static str,
        detail: String,
    },

    /// Two tiers share a name, possibly through an insulated variant.
    #[error("duplicate tier '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection and file discovery
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

/// Find `{base_name}.ron|toml|json` in `dir`. `Ok(None)` when absent.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;
    for ext in ["ron", "toml", "json"] {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if !candidate.exists() {
            continue;
        }
        if let Some(existing) = found.take() {
            return Err(DataLoadError::ConflictingFormats {
                a: existing,
                b: candidate,
            });
        }
        found = Some(candidate);
    }
    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, detail: impl ToString) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: detail.to_string(),
    }
}

pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| parse_error(path, e)),
    }
}

/// Deserialize a list. TOML has no top-level arrays, so there the list is
/// read from the array under `toml_key`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    if detect_format(path)? != Format::Toml {
        return deserialize_file(path);
    }
    let content = std::fs::read_to_string(path)?;
    let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
    let array = table
        .get(toml_key)
        .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
        .clone();
    array
        .try_into()
        .map_err(|e: toml::de::Error| parse_error(path, e))
}

// ===========================================================================
// Resolution
// ===========================================================================

fn fraction(value: f64, file: &Path, field: &'static str) -> Result<Fixed64, DataLoadError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            field,
            detail: format!("{value} is outside 0..=1"),
        });
    }
    Ok(f64_to_fixed64(value))
}

fn non_negative(value: f64, file: &Path, field: &'static str) -> Result<Fixed64, DataLoadError> {
    if !value.is_finite() || value < 0.0 || value > f64::from(i32::MAX) {
        return Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            field,
            detail: format!("{value} is not a usable amount"),
        });
    }
    Ok(f64_to_fixed64(value))
}

/// Build a registry from tier entries, in file order.
pub fn build_tiers(entries: Vec<TierData>, file: &Path) -> Result<TierRegistry, DataLoadError> {
    let mut registry = TierRegistry::new();
    for entry in entries {
        if entry.transfer_rate == 0 {
            return Err(DataLoadError::InvalidValue {
                file: file.to_path_buf(),
                field: "transfer_rate",
                detail: format!("tier '{}' has a zero transfer rate", entry.name),
            });
        }
        let loss = fraction(entry.loss_per_hop, file, "loss_per_hop")?;
        let tier = EnergyTier::new(entry.name, entry.transfer_rate, entry.explosion_threshold, loss);
        let insulated = entry.insulated_variant.then(|| tier.insulated());
        for tier in std::iter::once(tier).chain(insulated) {
            registry.register(tier).map_err(|e| match e {
                GridError::DuplicateTier(name) => DataLoadError::DuplicateName {
                    file: file.to_path_buf(),
                    name,
                },
                other => parse_error(file, other),
            })?;
        }
    }
    Ok(registry)
}

/// Overlay file settings onto the defaults.
pub fn apply_settings(
    data: TransmissionData,
    file: &Path,
) -> Result<TransmissionConfig, DataLoadError> {
    let mut config = TransmissionConfig::default();
    if let Some(v) = data.max_network_size {
        config.max_network_size = v;
    }
    if let Some(v) = data.network_update_interval {
        config.network_update_interval = v;
    }
    if let Some(v) = data.overload_warning_ticks {
        config.overload_warning_ticks = v;
    }
    if let Some(v) = data.overload_explosion_ticks {
        config.overload_explosion_ticks = v;
    }
    if let Some(v) = data.explosion_radius {
        config.explosion_radius = v;
    }
    if let Some(v) = data.explosion_max_damage {
        config.explosion_max_damage = non_negative(v, file, "explosion_max_damage")?;
    }
    if let Some(v) = data.explosion_min_damage {
        config.explosion_min_damage = non_negative(v, file, "explosion_min_damage")?;
    }
    if let Some(v) = data.notify_radius {
        config.notify_radius = v;
    }
    if let Some(v) = data.path_cache_capacity {
        config.path_cache_capacity = v;
    }
    if let Some(v) = data.balance_between_nodes {
        config.balance_between_nodes = v;
    }

    if config.max_network_size == 0 {
        return Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            field: "max_network_size",
            detail: "must be at least 1".into(),
        });
    }
    if config.overload_explosion_ticks == 0 {
        return Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            field: "overload_explosion_ticks",
            detail: "must be at least 1".into(),
        });
    }
    if config.explosion_min_damage > config.explosion_max_damage {
        return Err(DataLoadError::InvalidValue {
            file: file.to_path_buf(),
            field: "explosion_min_damage",
            detail: "exceeds explosion_max_damage".into(),
        });
    }
    Ok(config)
}

/// Tiers and settings resolved from a data directory.
#[derive(Debug, Clone)]
pub struct GridData {
    pub tiers: TierRegistry,
    pub config: TransmissionConfig,
}

impl GridData {
    pub fn into_grid(self) -> TransmissionGrid {
        TransmissionGrid::new(self.config, self.tiers)
    }
}

/// Load `tiers.*` and `transmission.*` from `dir`.
pub fn load_grid_data(dir: &Path) -> Result<GridData, DataLoadError> {
    let tiers = match find_data_file(dir, TIERS_FILE)? {
        Some(path) => {
            let entries: Vec<TierData> = deserialize_list(&path, "tiers")?;
            let registry = build_tiers(entries, &path)?;
            debug!(file = %path.display(), tiers = registry.len(), "loaded tier table");
            registry
        }
        None => TierRegistry::standard(),
    };

    let config = match find_data_file(dir, TRANSMISSION_FILE)? {
        Some(path) => {
            let data: TransmissionData = deserialize_file(&path)?;
            apply_settings(data, &path)?
        }
        None => TransmissionConfig::default(),
    };

    info!(dir = %dir.display(), tiers = tiers.len(), "grid data loaded");
    Ok(GridData { tiers, config })
}

// ===========================================================================
// Tests
// ===========================================================================
