//! Simulation constants: map size, start conditions, limits and rates.
//!
//! These are the defaults baked into [`crate::config::SimConfig`]. Code that
//! needs to be tunable reads the config; the constants are used directly only
//! where a value is fixed by the game rules.

/// Map width in pixels (x wraps at this value).
pub const MAP_WIDTH: f64 = 21600.0;
/// Map height in pixels (y wraps at this value).
pub const MAP_HEIGHT: f64 = 10800.0;

pub const START_POS_X: f64 = 7638.0;
pub const START_POS_Y: f64 = 5089.0;

pub const START_VEL_X: f64 = 4.35;
pub const START_VEL_Y: f64 = 5.49;

pub const START_BATTERY: f64 = 100.0;
pub const START_FUEL: f64 = 100.0;
pub const MAX_BATTERY: f64 = 100.0;

/// Absolute speed bounds once the satellite has left deployment.
pub const MIN_ALLOWED_VEL: f64 = 3.0;
pub const MAX_ALLOWED_VEL: f64 = 71.0;
/// Turn angle (degrees) a velocity change must stay below.
pub const MAX_ALLOWED_VEL_ANGLE: f64 = 170.0;

/// Total acceleration magnitude available per tick.
pub const ACC_PER_TICK: f64 = 0.01;
/// Per-axis tolerance at which a velocity ramp counts as arrived.
pub const VEL_EPSILON: f64 = 1e-3;

/// Fuel burned per tick while a velocity plan is consumed.
pub const FUEL_COST_PER_TICK: f64 = 0.015;
/// Extra battery drain per tick while a velocity plan is consumed.
pub const BURN_BATTERY_COST_PER_TICK: f64 = -0.025;

/// Simulated seconds per tick.
pub const SIM_STEP_SECONDS: f64 = 0.5;

pub mod transition_times {
    //! Transition durations in seconds.

    /// Between two non-SAFE states. One second short of three minutes so the
    /// completing tick lands on the three-minute mark.
    pub const STANDARD: f64 = (3 * 60 - 1) as f64;
    /// Leaving SAFE.
    pub const FROM_SAFE: f64 = (20 * 60) as f64;
    /// Entering SAFE.
    pub const TO_SAFE: f64 = 60.0;
}

pub mod beacon {
    pub const MAX_DETECT_RANGE: f64 = 2000.0;
    pub const GUESS_TOLERANCE: f64 = 75.0;
    pub const MAX_GUESS_ATTEMPTS: u32 = 3;
    pub const DECREASE_RATE: f64 = 0.99;
    /// Fixed activity window length of a randomized beacon, hours.
    pub const WINDOW_HOURS: i64 = 4;
}

pub mod objectives {
    /// Random start offset from "now", seconds (1h..=3h).
    pub const START_OFFSET_MIN_SECS: i64 = 3600;
    pub const START_OFFSET_MAX_SECS: i64 = 3 * 3600;
    /// Random zoned window length, seconds (2h..=6h).
    pub const ZONED_WINDOW_MIN_SECS: i64 = 2 * 3600;
    pub const ZONED_WINDOW_MAX_SECS: i64 = 6 * 3600;
    pub const MIN_COVERAGE: f64 = 0.6;
    pub const MAX_COVERAGE: f64 = 1.0;
    /// Upper bound of the footprint multiplier applied to one zone axis.
    pub const MAX_ZONE_STRETCH: u32 = 4;
    /// Ids are drawn from `1..=ID_SPACE`.
    pub const ID_SPACE: u32 = 9999;
    /// Random draws tried before falling back to scanning unused ids.
    pub const ID_RANDOM_ATTEMPTS: u32 = 32;
}
