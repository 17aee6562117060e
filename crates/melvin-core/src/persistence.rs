//! Save/Load functionality for persisting simulation state
//!
//! Uses bincode for a compact binary snapshot of the satellite, the objective
//! registry and the clock. Zone overlay handles are not saved; the engine
//! re-marks every zone after loading.

use std::io::{Read, Write};

use chrono::{DateTime, Utc};
use melvin_logic::config::SimConfig;
use melvin_logic::registry::ObjectiveRegistry;
use melvin_logic::satellite::Satellite;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version number for save file format (increment when format changes)
pub const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the simulation state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Simulated time at tick 0
    pub epoch: DateTime<Utc>,
    pub ticks: u64,
    pub time_scale: f64,
    pub satellite: Satellite,
    pub registry: ObjectiveRegistry,
}

/// Errors that can occur during save/load
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),

    #[error("Save version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Tick count {0} is past the representable simulated time")]
    TickOutOfRange(u64),

    #[error("Saved satellite state is not valid for this configuration")]
    InvalidSatellite,

    #[error("Saved objective ids do not match the stored objectives")]
    InvalidRegistry,
}

impl SaveData {
    /// Snapshot tagged with the current [`SAVE_VERSION`].
    pub fn new(
        epoch: DateTime<Utc>,
        ticks: u64,
        time_scale: f64,
        satellite: Satellite,
        registry: ObjectiveRegistry,
    ) -> Self {
        Self {
            version: SAVE_VERSION,
            epoch,
            ticks,
            time_scale,
            satellite,
            registry,
        }
    }

    /// Reject snapshots no running simulation under `config` could produce.
    pub fn check(&self, config: &SimConfig) -> Result<(), SaveError> {
        if !self.satellite.is_consistent(config) {
            return Err(SaveError::InvalidSatellite);
        }
        if !self.registry.is_consistent(config.id_space) {
            return Err(SaveError::InvalidRegistry);
        }
        Ok(())
    }
}

/// Write a snapshot to a writer
pub fn save_simulation<W: Write>(writer: W, data: &SaveData) -> Result<(), SaveError> {
    bincode::serialize_into(writer, data)?;
    Ok(())
}

/// Read a snapshot, rejecting other format versions.
pub fn load_simulation<R: Read>(reader: R) -> Result<SaveData, SaveError> {
    let data: SaveData = bincode::deserialize_from(reader)?;
    if data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: data.version,
        });
    }
    Ok(data)
}
