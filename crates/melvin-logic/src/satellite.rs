//! The satellite aggregate: position, velocity, power, camera and state.
//!
//! [`Satellite::tick`] is the only place physics, power and the state machine
//! advance. The `request_*` methods are the command boundary: they validate
//! everything first and mutate nothing on rejection.
//!
//! Tick order:
//! 1. An empty battery forces the target to SAFE
//! 2. The state machine advances (starting a transition drops the velocity plan)
//! 3. Power is applied for the resulting state, plus burn costs if a plan step is used
//! 4. One plan step becomes the new velocity
//! 5. Position moves by `velocity * dt` and is wrapped onto the map

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::constants::{MAX_BATTERY, VEL_EPSILON};
use crate::error::CommandError;
use crate::geometry::Vec2;
use crate::power;
use crate::state::{CameraAngle, SatState, StateEvent, StateMachine};
use crate::velocity::{plan_velocity_change, validate_speed, VelocityPlan};

/// Snapshot of the satellite as reported to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub state: SatState,
    pub angle: CameraAngle,
    pub width_x: i64,
    pub height_y: i64,
    pub vx: f64,
    pub vy: f64,
    pub battery: f64,
    pub max_battery: f64,
    pub fuel: f64,
    pub distance_covered: f64,
    pub timestamp: DateTime<Utc>,
}

/// Result of an accepted control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    /// Velocity already matched; only the camera angle was applied.
    Unchanged,
    /// A new ramp of `steps` ticks replaced any previous plan.
    Planned { steps: usize },
}

/// What happened during one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickReport {
    /// Battery was empty and the target was forced to SAFE.
    pub forced_safe: bool,
    pub state_event: Option<StateEvent>,
    /// A plan step was consumed.
    pub burned: bool,
    /// The last plan step was consumed this tick.
    pub plan_finished: bool,
    /// Fuel hit zero and the remaining plan was dropped.
    pub fuel_ran_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Satellite {
    position: Vec2,
    velocity: Vec2,
    battery: f64,
    fuel: f64,
    machine: StateMachine,
    camera_angle: CameraAngle,
    plan: VelocityPlan,
    distance_covered: f64,
    ticks: u64,
}

impl Satellite {
    /// Satellite at the configured start conditions, in DEPLOYMENT.
    pub fn new(config: &SimConfig) -> Self {
        Self {
            position: config.start_position,
            velocity: config.start_velocity,
            battery: config.start_battery,
            fuel: config.start_fuel,
            machine: StateMachine::new(),
            camera_angle: CameraAngle::Normal,
            plan: VelocityPlan::new(),
            distance_covered: 0.0,
            ticks: 0,
        }
    }

    pub fn reset(&mut self, config: &SimConfig) {
        *self = Self::new(config);
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn battery(&self) -> f64 {
        self.battery
    }

    pub fn fuel(&self) -> f64 {
        self.fuel
    }

    pub fn state(&self) -> SatState {
        self.machine.state()
    }

    pub fn target_state(&self) -> Option<SatState> {
        self.machine.target()
    }

    pub fn transition_remaining(&self) -> f64 {
        self.machine.transition_remaining()
    }

    pub fn camera_angle(&self) -> CameraAngle {
        self.camera_angle
    }

    pub fn plan(&self) -> &VelocityPlan {
        &self.plan
    }

    pub fn distance_covered(&self) -> f64 {
        self.distance_covered
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Whether this state could have been reached under `config`: on the
    /// map, finite velocity, battery within capacity, fuel not negative.
    pub fn is_consistent(&self, config: &SimConfig) -> bool {
        config.map().contains(self.position)
            && self.velocity.x.is_finite()
            && self.velocity.y.is_finite()
            && (0.0..=MAX_BATTERY).contains(&self.battery)
            && self.fuel.is_finite()
            && self.fuel >= 0.0
    }

    pub fn observe(&self, timestamp: DateTime<Utc>) -> Observation {
        Observation {
            state: self.state(),
            angle: self.camera_angle,
            width_x: self.position.x.round() as i64,
            height_y: self.position.y.round() as i64,
            vx: self.velocity.x,
            vy: self.velocity.y,
            battery: self.battery,
            max_battery: MAX_BATTERY,
            fuel: self.fuel,
            distance_covered: self.distance_covered,
            timestamp,
        }
    }

    /// Ask for a new operational state; it is entered on a later tick.
    pub fn request_state(&mut self, target: SatState) -> Result<(), CommandError> {
        self.machine.request(target)?;
        log::debug!("Target state set to {}", target);
        Ok(())
    }

    /// Set camera angle and target velocity.
    ///
    /// Only accepted in ACQUISITION. A velocity equal to the current one (or
    /// to the end of the ramp already in flight) leaves the plan untouched.
    pub fn request_control(
        &mut self,
        velocity: Vec2,
        camera_angle: CameraAngle,
        config: &SimConfig,
    ) -> Result<ControlOutcome, CommandError> {
        if self.state() != SatState::Acquisition {
            return Err(CommandError::NotInAcquisition);
        }
        validate_speed(velocity, config)?;

        let heading_to = self.plan.target().unwrap_or(self.velocity);
        if velocity.approx_eq(&heading_to, VEL_EPSILON) {
            self.camera_angle = camera_angle;
            return Ok(ControlOutcome::Unchanged);
        }
        if self.fuel <= 0.0 {
            return Err(CommandError::FuelExhausted);
        }

        let plan = plan_velocity_change(self.velocity, velocity, config)?;
        let steps = plan.len();
        self.plan = plan;
        self.camera_angle = camera_angle;
        log::debug!(
            "Velocity ramp to ({:.2}, {:.2}) planned over {} ticks",
            velocity.x,
            velocity.y,
            steps
        );
        Ok(ControlOutcome::Planned { steps })
    }

    /// Advance one tick of `config.tick_seconds`.
    pub fn tick(&mut self, config: &SimConfig) -> TickReport {
        let dt = config.tick_seconds;
        let mut report = TickReport::default();

        if power::requires_safe_mode(self.battery) && self.machine.force_safe() {
            report.forced_safe = true;
            log::warn!("Battery depleted, forcing safe mode");
        }

        report.state_event = self.machine.advance(dt, config);
        match report.state_event {
            Some(StateEvent::TransitionStarted { from, to, duration }) => {
                self.plan.clear();
                log::info!("Transition {} -> {} started ({:.0}s)", from, to, duration);
            }
            Some(StateEvent::TransitionCompleted(state)) => {
                log::info!("Transition completed, now in {}", state);
            }
            None => {}
        }

        if self.fuel <= 0.0 && !self.plan.is_empty() {
            self.plan.clear();
        }
        let burning = !self.plan.is_empty();

        let update = power::apply_tick(self.battery, self.fuel, self.state(), burning, config);
        self.battery = update.battery;
        self.fuel = update.fuel;

        if burning {
            if let Some(velocity) = self.plan.next_step() {
                self.velocity = velocity;
            }
            report.burned = true;
            if self.plan.is_empty() {
                report.plan_finished = true;
                log::info!(
                    "Velocity ramp finished at ({:.2}, {:.2})",
                    self.velocity.x,
                    self.velocity.y
                );
            } else if self.fuel <= 0.0 {
                self.plan.clear();
                report.fuel_ran_out = true;
                log::warn!("Fuel exhausted, velocity ramp aborted");
            }
        }

        let delta = self.velocity * dt;
        self.distance_covered += delta.length();
        self.position = config.map().wrap(self.position + delta);
        self.ticks += 1;

        report
    }
}
