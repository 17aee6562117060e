//! Tunable simulation parameters.
//!
//! Every field defaults to the matching value in [`crate::constants`], so an
//! empty JSON object is a complete configuration:
//!
//! ```
//! use melvin_logic::config::{SimConfig, validate_config};
//!
//! let config = SimConfig::from_json_str(r#"{ "tick_seconds": 1.0 }"#).unwrap();
//! assert_eq!(config.tick_seconds, 1.0);
//! assert_eq!(config.map_width, 21600.0);
//! assert!(validate_config(&config).is_empty());
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{self, beacon, objectives, transition_times};
use crate::geometry::{MapSize, Vec2};

/// Simulation parameters shared by the satellite, the planner and the
/// objective registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub map_width: f64,
    pub map_height: f64,
    pub start_position: Vec2,
    pub start_velocity: Vec2,
    pub start_battery: f64,
    pub start_fuel: f64,
    /// Simulated seconds advanced per tick.
    pub tick_seconds: f64,
    /// Total acceleration magnitude per tick.
    pub accel_per_tick: f64,
    pub min_velocity: f64,
    pub max_velocity: f64,
    /// Turn angle in degrees a velocity change must stay below.
    pub max_turn_angle: f64,
    pub fuel_cost_per_tick: f64,
    pub burn_battery_cost_per_tick: f64,
    pub transition_standard_secs: f64,
    pub transition_from_safe_secs: f64,
    pub transition_to_safe_secs: f64,
    pub beacon_detect_range: f64,
    pub beacon_guess_tolerance: f64,
    pub max_guess_attempts: u32,
    /// Objective ids are drawn from `1..=id_space`.
    pub id_space: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            map_width: constants::MAP_WIDTH,
            map_height: constants::MAP_HEIGHT,
            start_position: Vec2::new(constants::START_POS_X, constants::START_POS_Y),
            start_velocity: Vec2::new(constants::START_VEL_X, constants::START_VEL_Y),
            start_battery: constants::START_BATTERY,
            start_fuel: constants::START_FUEL,
            tick_seconds: constants::SIM_STEP_SECONDS,
            accel_per_tick: constants::ACC_PER_TICK,
            min_velocity: constants::MIN_ALLOWED_VEL,
            max_velocity: constants::MAX_ALLOWED_VEL,
            max_turn_angle: constants::MAX_ALLOWED_VEL_ANGLE,
            fuel_cost_per_tick: constants::FUEL_COST_PER_TICK,
            burn_battery_cost_per_tick: constants::BURN_BATTERY_COST_PER_TICK,
            transition_standard_secs: transition_times::STANDARD,
            transition_from_safe_secs: transition_times::FROM_SAFE,
            transition_to_safe_secs: transition_times::TO_SAFE,
            beacon_detect_range: beacon::MAX_DETECT_RANGE,
            beacon_guess_tolerance: beacon::GUESS_TOLERANCE,
            max_guess_attempts: beacon::MAX_GUESS_ATTEMPTS,
            id_space: objectives::ID_SPACE,
        }
    }
}

impl SimConfig {
    pub fn map(&self) -> MapSize {
        MapSize::new(self.map_width, self.map_height)
    }

    /// Parse a config from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigLoadError> {
        let config: SimConfig = serde_json::from_str(json)?;
        let errors = validate_config(&config);
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(ConfigLoadError::Invalid(errors))
        }
    }

    /// Read and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigLoadError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// A single problem with a [`SimConfig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("map dimensions must be positive, got {0}x{1}")]
    InvalidMapSize(f64, f64),
    #[error("tick duration must be positive, got {0}")]
    InvalidTick(f64),
    #[error("acceleration per tick must be positive, got {0}")]
    InvalidAcceleration(f64),
    #[error("velocity bounds must satisfy 0 <= min < max, got [{0}, {1}]")]
    InvalidVelocityBounds(f64, f64),
    #[error("max turn angle must be in (0, 180], got {0}")]
    InvalidTurnAngle(f64),
    #[error("start position {0:?} lies outside the map")]
    StartOutOfBounds(Vec2),
    #[error("start battery must be in [0, 100], got {0}")]
    InvalidStartBattery(f64),
    #[error("transition durations must be non-negative")]
    NegativeTransitionTime,
    #[error("beacon tolerance and detection range must be positive")]
    InvalidBeaconRange,
    #[error("id space must hold at least one id")]
    EmptyIdSpace,
}

/// Errors from loading a config file.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0:?}")]
    Invalid(Vec<ConfigError>),
}

/// Validate a config, returning all errors found.
pub fn validate_config(config: &SimConfig) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    if config.map_width <= 0.0 || config.map_height <= 0.0 {
        errors.push(ConfigError::InvalidMapSize(config.map_width, config.map_height));
    } else if !config.map().contains(config.start_position) {
        errors.push(ConfigError::StartOutOfBounds(config.start_position));
    }
    if config.tick_seconds <= 0.0 {
        errors.push(ConfigError::InvalidTick(config.tick_seconds));
    }
    if config.accel_per_tick <= 0.0 {
        errors.push(ConfigError::InvalidAcceleration(config.accel_per_tick));
    }
    if config.min_velocity < 0.0 || config.min_velocity >= config.max_velocity {
        errors.push(ConfigError::InvalidVelocityBounds(
            config.min_velocity,
            config.max_velocity,
        ));
    }
    if config.max_turn_angle <= 0.0 || config.max_turn_angle > 180.0 {
        errors.push(ConfigError::InvalidTurnAngle(config.max_turn_angle));
    }
    if !(0.0..=constants::MAX_BATTERY).contains(&config.start_battery) {
        errors.push(ConfigError::InvalidStartBattery(config.start_battery));
    }
    if config.transition_standard_secs < 0.0
        || config.transition_from_safe_secs < 0.0
        || config.transition_to_safe_secs < 0.0
    {
        errors.push(ConfigError::NegativeTransitionTime);
    }
    if config.beacon_guess_tolerance <= 0.0 || config.beacon_detect_range <= 0.0 {
        errors.push(ConfigError::InvalidBeaconRange);
    }
    if config.id_space == 0 {
        errors.push(ConfigError::EmptyIdSpace);
    }

    errors
}
