//! Operational states, camera settings and the transition state machine.
//!
//! The satellite is always in exactly one [`SatState`]. Moving between two
//! stable states passes through `Transition` for a duration that depends on
//! where it comes from and where it goes:
//!
//! | From → To | Duration |
//! |-----------|----------|
//! | SAFE → any | 20 min |
//! | any → SAFE | 1 min |
//! | otherwise | 3 min |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::CommandError;

/// Operational state of the satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SatState {
    Deployment,
    Acquisition,
    Charge,
    Comms,
    Safe,
    Transition,
}

impl SatState {
    pub const ALL: [SatState; 6] = [
        Self::Deployment,
        Self::Acquisition,
        Self::Charge,
        Self::Comms,
        Self::Safe,
        Self::Transition,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deployment => "deployment",
            Self::Acquisition => "acquisition",
            Self::Charge => "charge",
            Self::Comms => "comms",
            Self::Safe => "safe",
            Self::Transition => "transition",
        }
    }

    /// Whether a client may ask for this state.
    pub fn is_requestable(&self) -> bool {
        !matches!(self, Self::Deployment | Self::Transition)
    }
}

impl fmt::Display for SatState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SatState {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| CommandError::UnknownState(s.to_string()))
    }
}

/// Camera field of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraAngle {
    Narrow,
    Normal,
    Wide,
}

impl CameraAngle {
    pub const ALL: [CameraAngle; 3] = [Self::Narrow, Self::Normal, Self::Wide];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Narrow => "narrow",
            Self::Normal => "normal",
            Self::Wide => "wide",
        }
    }

    /// Side length in pixels of the square image taken with this angle.
    pub fn side_length(&self) -> u32 {
        match self {
            Self::Narrow => 600,
            Self::Normal => 800,
            Self::Wide => 1000,
        }
    }
}

impl fmt::Display for CameraAngle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraAngle {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|angle| angle.as_str() == s)
            .ok_or_else(|| CommandError::UnknownCameraAngle(s.to_string()))
    }
}

/// Seconds needed to move from `from` to `to`.
///
/// Entering CHARGE uses the standard duration.
pub fn transition_time(from: SatState, to: SatState, config: &SimConfig) -> f64 {
    if from == SatState::Safe {
        config.transition_from_safe_secs
    } else if to == SatState::Safe {
        config.transition_to_safe_secs
    } else {
        config.transition_standard_secs
    }
}

/// Something the state machine did during one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StateEvent {
    /// Entered TRANSITION on the way to `to`.
    TransitionStarted {
        from: SatState,
        to: SatState,
        duration: f64,
    },
    /// Left TRANSITION and settled in `0`.
    TransitionCompleted(SatState),
}

/// State, pending target and transition timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateMachine {
    state: SatState,
    target: Option<SatState>,
    transition_remaining: f64,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: SatState::Deployment,
            target: None,
            transition_remaining: 0.0,
        }
    }

    pub fn state(&self) -> SatState {
        self.state
    }

    pub fn target(&self) -> Option<SatState> {
        self.target
    }

    pub fn transition_remaining(&self) -> f64 {
        self.transition_remaining
    }

    /// Set a new target state, validating it at the command boundary.
    pub fn request(&mut self, target: SatState) -> Result<(), CommandError> {
        if !target.is_requestable() {
            return Err(CommandError::DisallowedTarget(target));
        }
        if self.state == SatState::Transition {
            return Err(CommandError::MidTransition);
        }
        self.target = Some(target);
        Ok(())
    }

    /// Point the machine at SAFE, overriding any other pending target.
    ///
    /// Returns false if it was already SAFE or heading there.
    pub fn force_safe(&mut self) -> bool {
        let safe_bound = self.target == Some(SatState::Safe)
            || (self.state == SatState::Safe && self.target.is_none());
        if safe_bound {
            return false;
        }
        self.target = Some(SatState::Safe);
        true
    }

    /// Advance timers by `dt` seconds and start a pending transition.
    pub fn advance(&mut self, dt: f64, config: &SimConfig) -> Option<StateEvent> {
        if self.state == SatState::Transition {
            self.transition_remaining -= dt;
            if self.transition_remaining <= 0.0 {
                self.transition_remaining = 0.0;
                if let Some(target) = self.target.take() {
                    self.state = target;
                    return Some(StateEvent::TransitionCompleted(target));
                }
            }
            return None;
        }

        let target = self.target?;
        if target == self.state {
            self.target = None;
            return None;
        }

        let from = self.state;
        let duration = transition_time(from, target, config);
        self.state = SatState::Transition;
        self.transition_remaining = duration;
        Some(StateEvent::TransitionStarted {
            from,
            to: target,
            duration,
        })
    }
}
