//! Battery and fuel model.
//!
//! Each state charges or drains the battery at a fixed per-second rate.
//! Consuming a velocity-plan step costs an additional fixed amount of battery
//! and fuel per tick.

use crate::config::SimConfig;
use crate::constants::MAX_BATTERY;
use crate::state::SatState;

/// Battery change per simulated second in `state` (positive = charging).
pub fn battery_rate(state: SatState) -> f64 {
    match state {
        SatState::Deployment => -0.025,
        SatState::Acquisition => -0.05,
        SatState::Charge => 0.05,
        SatState::Transition => 0.0,
        SatState::Safe => 0.0125,
        SatState::Comms => -0.004,
    }
}

pub fn clamp_battery(battery: f64) -> f64 {
    battery.clamp(0.0, MAX_BATTERY)
}

/// Battery and fuel after one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerUpdate {
    pub battery: f64,
    pub fuel: f64,
}

/// Apply one tick of the power model.
///
/// `burning` is true when a velocity-plan step is consumed this tick.
pub fn apply_tick(
    battery: f64,
    fuel: f64,
    state: SatState,
    burning: bool,
    config: &SimConfig,
) -> PowerUpdate {
    let mut battery = battery + config.tick_seconds * battery_rate(state);
    let mut fuel = fuel;
    if burning {
        battery += config.burn_battery_cost_per_tick;
        fuel = (fuel - config.fuel_cost_per_tick).max(0.0);
    }
    PowerUpdate {
        battery: clamp_battery(battery),
        fuel,
    }
}

/// True when the battery is empty and the satellite must go to SAFE.
pub fn requires_safe_mode(battery: f64) -> bool {
    battery <= 0.0
}
