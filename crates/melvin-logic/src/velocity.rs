//! Velocity ramp planner.
//!
//! A velocity change is never applied at once. The planner walks from the
//! current velocity toward the target in per-tick increments whose magnitude
//! is bounded by the acceleration budget, and the satellite applies one
//! increment per tick.
//!
//! Algorithm, per step:
//! 1. `dv = target - current`; stop once both axes are within `1e-3`
//! 2. Split the budget `A` over the axes in the ratio of `dv`
//!    (`ax² + ay² = A²`, `ax / ay = dv.x / dv.y`)
//! 3. Clamp each axis so it cannot overshoot `dv`
//! 4. Check turn angle and speed bounds, then queue `current + step`
//!
//! Any violated limit rejects the whole change; a partial plan is never
//! returned.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::constants::VEL_EPSILON;
use crate::error::CommandError;
use crate::geometry::{angle_between, Vec2};

/// Queued velocities, one per tick, ending at `target`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityPlan {
    steps: VecDeque<Vec2>,
    target: Option<Vec2>,
}

impl VelocityPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Final velocity of the plan, if any steps remain.
    pub fn target(&self) -> Option<Vec2> {
        if self.steps.is_empty() {
            None
        } else {
            self.target
        }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Take the velocity for the next tick.
    pub fn next_step(&mut self) -> Option<Vec2> {
        self.steps.pop_front()
    }

    pub fn steps(&self) -> impl Iterator<Item = &Vec2> {
        self.steps.iter()
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.target = None;
    }
}

/// Check a requested velocity against the speed bounds.
pub fn validate_speed(velocity: Vec2, config: &SimConfig) -> Result<(), CommandError> {
    if !velocity.x.is_finite() || !velocity.y.is_finite() {
        return Err(CommandError::NonFiniteVelocity);
    }
    let speed = velocity.length();
    if speed < config.min_velocity || speed > config.max_velocity {
        return Err(CommandError::SpeedOutOfBounds {
            speed,
            min: config.min_velocity,
            max: config.max_velocity,
        });
    }
    Ok(())
}

/// Largest per-axis increment toward `dv` within the acceleration budget.
fn accel_step(dv: Vec2, budget: f64) -> Vec2 {
    let norm = dv.length();
    let ax = budget * dv.x.abs() / norm;
    let ay = budget * dv.y.abs() / norm;
    Vec2::new(
        dv.x.signum() * ax.min(dv.x.abs()),
        dv.y.signum() * ay.min(dv.y.abs()),
    )
}

/// Plan the ramp from `current` to `target`.
///
/// Returns an empty plan when the two already match.
pub fn plan_velocity_change(
    current: Vec2,
    target: Vec2,
    config: &SimConfig,
) -> Result<VelocityPlan, CommandError> {
    validate_speed(target, config)?;

    let turn = angle_between(current, target);
    if turn >= config.max_turn_angle {
        return Err(CommandError::TurnAngleExceeded {
            angle: turn,
            max: config.max_turn_angle,
        });
    }

    let mut steps = VecDeque::new();
    let mut previous = current;
    loop {
        let dv = target - previous;
        if dv.x.abs() < VEL_EPSILON && dv.y.abs() < VEL_EPSILON {
            break;
        }

        let next = previous + accel_step(dv, config.accel_per_tick);

        let turn = angle_between(previous, next);
        if turn >= config.max_turn_angle {
            return Err(CommandError::TurnAngleExceeded {
                angle: turn,
                max: config.max_turn_angle,
            });
        }
        let speed = next.length();
        if speed < config.min_velocity || speed > config.max_velocity {
            return Err(CommandError::SpeedOutOfBounds {
                speed,
                min: config.min_velocity,
                max: config.max_velocity,
            });
        }

        steps.push_back(next);
        previous = next;
    }

    Ok(VelocityPlan {
        steps,
        target: Some(target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SimConfig {
        SimConfig::default()
    }

    #[test]
    fn test_plan_reaches_target() {
        let c = config();
        let start = Vec2::new(4.35, 5.49);
        let target = Vec2::new(10.0, 3.0);
        let plan = plan_velocity_change(start, target, &c).unwrap();
        assert!(!plan.is_empty());
        let last = *plan.steps().last().unwrap();
        assert!(last.approx_eq(&target, VEL_EPSILON));
        assert_eq!(plan.target(), Some(target));
    }

    #[test]
    fn test_steps_respect_budget() {
        let c = config();
        let start = Vec2::new(4.35, 5.49);
        let plan = plan_velocity_change(start, Vec2::new(20.0, 30.0), &c).unwrap();
        let mut previous = start;
        for &step in plan.steps() {
            assert!((step - previous).length() <= c.accel_per_tick + 1e-9);
            previous = step;
        }
        // ~|dv| / A steps
        let expected = ((Vec2::new(20.0, 30.0) - start).length() / c.accel_per_tick).ceil();
        assert!((plan.len() as f64 - expected).abs() <= 1.0);
    }

    #[test]
    fn test_single_axis_change() {
        let c = config();
        let plan = plan_velocity_change(Vec2::new(5.0, 5.0), Vec2::new(5.0, 5.05), &c).unwrap();
        assert_eq!(plan.len(), 5);
        for step in plan.steps() {
            assert_eq!(step.x, 5.0);
        }
    }

    #[test]
    fn test_unchanged_velocity_gives_empty_plan() {
        let c = config();
        let v = Vec2::new(4.35, 5.49);
        let plan = plan_velocity_change(v, v, &c).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.target(), None);
    }

    #[test]
    fn test_reversal_rejected() {
        let c = config();
        let result = plan_velocity_change(Vec2::new(4.35, 5.49), Vec2::new(-4.35, -5.49), &c);
        assert!(matches!(result, Err(CommandError::TurnAngleExceeded { .. })));
    }

    #[test]
    fn test_target_speed_bounds() {
        let c = config();
        let v = Vec2::new(4.35, 5.49);
        assert!(matches!(
            plan_velocity_change(v, Vec2::new(1.0, 1.0), &c),
            Err(CommandError::SpeedOutOfBounds { .. })
        ));
        assert!(matches!(
            plan_velocity_change(v, Vec2::new(60.0, 60.0), &c),
            Err(CommandError::SpeedOutOfBounds { .. })
        ));
        assert_eq!(
            plan_velocity_change(v, Vec2::new(f64::NAN, 5.0), &c),
            Err(CommandError::NonFiniteVelocity)
        );
    }

    #[test]
    fn test_ramp_dipping_below_min_speed_rejected() {
        let c = config();
        // 160 degree turn: the straight ramp passes close to zero speed
        let start = Vec2::new(5.0, 0.0);
        let angle = 160f64.to_radians();
        let target = Vec2::new(5.0 * angle.cos(), 5.0 * angle.sin());
        assert!(matches!(
            plan_velocity_change(start, target, &c),
            Err(CommandError::SpeedOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_plan_consumption() {
        let c = config();
        let mut plan =
            plan_velocity_change(Vec2::new(5.0, 5.0), Vec2::new(5.02, 5.0), &c).unwrap();
        assert_eq!(plan.len(), 2);
        plan.next_step();
        plan.next_step();
        assert!(plan.next_step().is_none());
        assert_eq!(plan.target(), None);
    }
}
