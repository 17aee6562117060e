//! Error types for satellite commands and objective management.
//!
//! Both are validation failures: the request is rejected and nothing is
//! mutated. Unknown beacons and exhausted guesses are regular outcomes of
//! [`crate::registry::ObjectiveRegistry::guess_beacon`], not errors.

use thiserror::Error;

use crate::state::SatState;

/// Why a state or control command was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("unknown satellite state '{0}'")]
    UnknownState(String),

    #[error("unknown camera angle '{0}'")]
    UnknownCameraAngle(String),

    #[error("{0} cannot be requested as a target state")]
    DisallowedTarget(SatState),

    #[error("target state cannot be set during transition")]
    MidTransition,

    #[error("velocity and camera angle can only be set during acquisition")]
    NotInAcquisition,

    #[error("velocity components must be finite numbers")]
    NonFiniteVelocity,

    #[error("velocity out of bounds: speed {speed:.3} is not within [{min}, {max}]")]
    SpeedOutOfBounds { speed: f64, min: f64, max: f64 },

    #[error("turn angle {angle:.1} degrees reaches the limit of {max} degrees")]
    TurnAngleExceeded { angle: f64, max: f64 },

    #[error("no fuel left for a velocity change")]
    FuelExhausted,
}

/// Why an objective could not be created.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObjectiveError {
    #[error("objective id {0} is already in use")]
    DuplicateId(u32),

    #[error("objective id {0} is outside 1..={1}")]
    IdOutOfRange(u32, u32),

    #[error("all {0} objective ids are in use")]
    IdSpaceExhausted(u32),

    #[error("objective window must end after it starts")]
    InvalidWindow,

    #[error("coordinates ({0}, {1}) lie outside the map")]
    OutOfBounds(f64, f64),

    #[error("coverage must be within [0, 1], got {0}")]
    InvalidCoverage(f64),

    #[error("no objectives submitted or requested")]
    NothingCreated,
}
