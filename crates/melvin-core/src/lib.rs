//! MELVIN Core - Satellite Simulation Engine
//!
//! Runs the rules from `melvin-logic` on a shared, thread-safe engine: one
//! satellite, one objective registry, a simulation clock and a background
//! tick driver.
//!
//! # Architecture
//!
//! - **Engine**: satellite and registry each behind their own lock; all
//!   commands, observations and ticks go through [`engine::SimulationEngine`]
//! - **Driver**: a thread stepping the engine at absolute deadlines
//! - **Collaborators**: beacon ping subscribers and a zone overlay sink
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use melvin_core::prelude::*;
//!
//! let engine = Arc::new(SimulationEngine::new(SimConfig::default()).unwrap());
//! let _driver = TickDriver::start(Arc::clone(&engine)).unwrap();
//!
//! engine.request_state(SatState::Acquisition).unwrap();
//! println!("{:?}", engine.observe());
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod clock;
pub mod driver;
pub mod engine;
pub mod overlay;
pub mod persistence;
pub mod ping;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::clock::SimulationClock;
    pub use crate::driver::TickDriver;
    pub use crate::engine::{ControlRequest, ControlResponse, SimulationEngine};
    pub use crate::overlay::{NullOverlay, OverlayId, RecordingOverlay, ZoneOverlay};
    pub use crate::persistence::SaveError;
    pub use crate::ping::BeaconPing;
    pub use melvin_logic::config::SimConfig;
    pub use melvin_logic::geometry::Vec2;
    pub use melvin_logic::objectives::{CreateObjectivesRequest, ObjectiveListing};
    pub use melvin_logic::registry::GuessOutcome;
    pub use melvin_logic::state::{CameraAngle, SatState};
}

/// Lock a mutex, recovering the data if another thread panicked while
/// holding it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
