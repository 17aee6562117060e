//! Pure simulation logic for the MELVIN satellite.
//!
//! This crate contains all rules of the simulation that are independent of
//! threads, clocks and I/O. Functions take plain data and return results,
//! making them unit-testable and reusable by the engine, the headless
//! harness and any future front end.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Tunable simulation parameters, JSON loading and validation |
//! | [`constants`] | Map size, start conditions, limits and rates |
//! | [`error`] | Command and objective validation errors |
//! | [`geometry`] | Toroidal map arithmetic: wrap, shortest vector, zone tiles |
//! | [`objectives`] | Beacon and zoned objectives, client views, random generation |
//! | [`power`] | Battery drain/charge per state and burn costs |
//! | [`registry`] | Objective storage, id allocation, guessing and expiry |
//! | [`satellite`] | The satellite aggregate and its per-tick update |
//! | [`state`] | Operational states, camera angles, transition state machine |
//! | [`velocity`] | Acceleration-limited velocity ramp planning |

pub mod config;
pub mod constants;
pub mod error;
pub mod geometry;
pub mod objectives;
pub mod power;
pub mod registry;
pub mod satellite;
pub mod state;
pub mod velocity;
