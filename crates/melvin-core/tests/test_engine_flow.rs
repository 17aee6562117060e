//! End-to-end tests through the public engine API.
//!
//! Everything runs on a fixed epoch and seed; ticks are driven by hand
//! except in the driver test.

use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use melvin_core::prelude::*;
use melvin_logic::error::CommandError;
use melvin_logic::objectives::BeaconSpec;

// ── Helpers ────────────────────────────────────────────────────────────

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 25, 8, 0, 0).unwrap()
}

fn engine(seed: u64) -> SimulationEngine {
    SimulationEngine::with_seed(SimConfig::default(), epoch(), seed).unwrap()
}

fn settle(engine: &SimulationEngine, state: SatState) {
    for _ in 0..10_000 {
        if engine.observe().state == state {
            return;
        }
        engine.step();
    }
    panic!("never reached {state}");
}

// ── Reset ──────────────────────────────────────────────────────────────

#[test]
fn reset_restores_start_conditions() {
    let engine = engine(1);
    engine.request_state(SatState::Acquisition).unwrap();
    settle(&engine, SatState::Acquisition);
    engine
        .request_control(10.0, 10.0, CameraAngle::Narrow)
        .unwrap();
    for _ in 0..500 {
        engine.step();
    }
    engine
        .create_objectives(CreateObjectivesRequest {
            num_random_beacon: 2,
            ..Default::default()
        })
        .unwrap();

    engine.reset();
    let obs = engine.observe();
    assert_eq!((obs.width_x, obs.height_y), (7638, 5089));
    assert_eq!((obs.vx, obs.vy), (4.35, 5.49));
    assert_eq!(obs.state, SatState::Deployment);
    assert_eq!(obs.angle, CameraAngle::Normal);
    assert_eq!(obs.battery, 100.0);
    assert_eq!(obs.fuel, 100.0);
    assert!(engine.list_objectives().is_empty());
}

// ── Beacons ────────────────────────────────────────────────────────────

#[test]
fn random_beacon_guessed_at_exact_position() {
    let engine = engine(2);
    let listing = engine
        .create_objectives(CreateObjectivesRequest {
            num_random_beacon: 1,
            ..Default::default()
        })
        .unwrap();
    let info = &listing.beacon_objectives[0];
    assert_eq!(info.attempts_made, 0);

    // the listing never reveals the position; recover it through a save
    let mut buffer = Vec::new();
    engine.save(&mut buffer).unwrap();
    let data = melvin_core::persistence::load_simulation(&buffer[..]).unwrap();
    let position = data.registry.beacon_by_id(info.id).unwrap().position;

    assert!(matches!(
        engine.guess_beacon(info.id, position),
        GuessOutcome::Success { distance, guesses_used: 1 } if distance == 0.0
    ));
    assert!(engine.list_objectives().beacon_objectives.is_empty());
}

#[test]
fn fourth_guess_is_exhausted() {
    let engine = engine(3);
    let start = engine.now();
    engine
        .create_objectives(CreateObjectivesRequest {
            beacon_objectives: vec![BeaconSpec {
                id: Some(12),
                name: "EBT 12".into(),
                start,
                end: start + Duration::hours(4),
                decrease_rate: 0.99,
                description: String::new(),
                width: 100.0,
                height: 100.0,
            }],
            ..Default::default()
        })
        .unwrap();

    let far = Vec2::new(10_000.0, 5_000.0);
    for _ in 0..3 {
        assert!(matches!(
            engine.guess_beacon(12, far),
            GuessOutcome::Failure { .. }
        ));
    }
    assert_eq!(
        engine.guess_beacon(12, Vec2::new(100.0, 100.0)),
        GuessOutcome::AttemptsExhausted { guesses_used: 3 }
    );
    assert_eq!(engine.guess_beacon(99, far), GuessOutcome::NotFound);
}

// ── Commands ───────────────────────────────────────────────────────────

#[test]
fn turn_angle_rejection_keeps_velocity() {
    let engine = engine(4);
    engine.request_state(SatState::Acquisition).unwrap();
    settle(&engine, SatState::Acquisition);

    let before = engine.observe();
    let result = engine.request_control(-4.35, -5.49, CameraAngle::Wide);
    assert!(matches!(result, Err(CommandError::TurnAngleExceeded { .. })));

    engine.step();
    let after = engine.observe();
    assert_eq!((after.vx, after.vy), (before.vx, before.vy));
    assert_eq!(after.angle, before.angle);
}

#[test]
fn state_commands_validated() {
    let engine = engine(5);
    assert_eq!(
        engine.request_state(SatState::Transition),
        Err(CommandError::DisallowedTarget(SatState::Transition))
    );
    engine.request_state(SatState::Charge).unwrap();
    engine.step();
    assert_eq!(engine.observe().state, SatState::Transition);
    assert_eq!(
        engine.request_state(SatState::Comms),
        Err(CommandError::MidTransition)
    );
}

// ── Persistence ────────────────────────────────────────────────────────

#[test]
fn save_load_roundtrip() {
    let engine = engine(6);
    engine.request_state(SatState::Comms).unwrap();
    for _ in 0..1000 {
        engine.step();
    }
    engine
        .create_objectives(CreateObjectivesRequest {
            num_random_beacon: 2,
            num_random_zoned: 2,
            ..Default::default()
        })
        .unwrap();

    let mut buffer = Vec::new();
    engine.save(&mut buffer).expect("Save failed");

    let restored = self::engine(6);
    let recorder = RecordingOverlay::new();
    restored.set_overlay(Box::new(recorder.clone()));
    restored.load(&buffer[..]).expect("Load failed");

    assert_eq!(restored.observe(), engine.observe());
    assert_eq!(restored.list_objectives(), engine.list_objectives());
    assert_eq!(recorder.marked().len(), 2);
}

// ── Driver ─────────────────────────────────────────────────────────────

#[test]
fn driver_runs_and_stops() {
    let engine = Arc::new(self::engine(7));
    engine.set_time_scale(200.0);
    let mut driver = TickDriver::start(Arc::clone(&engine)).unwrap();
    thread::sleep(StdDuration::from_millis(150));
    driver.stop();

    let ticks = engine.clock().ticks();
    assert!(ticks > 0);
    let obs = engine.observe();
    assert_eq!(obs.timestamp, epoch() + Duration::milliseconds(500 * ticks as i64));
    assert!((0..=21600).contains(&obs.width_x));
}
