//! Integration tests for a full mission flow across the logic modules.
//!
//! Exercises: Satellite (deploy → acquisition → ramp → comms) together with
//! ObjectiveRegistry (creation → ping ranging → guessing → expiry).
//!
//! All tests are pure logic: no threads, no wall clock.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;

use melvin_logic::config::SimConfig;
use melvin_logic::geometry::{in_bounds, unwrapped_distance, Vec2};
use melvin_logic::objectives::{noisy_distance, BeaconSpec, CreateObjectivesRequest};
use melvin_logic::registry::{GuessOutcome, ObjectiveRegistry};
use melvin_logic::satellite::{ControlOutcome, Satellite};
use melvin_logic::state::{CameraAngle, SatState};

// ── Helpers ────────────────────────────────────────────────────────────

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn settle(sat: &mut Satellite, config: &SimConfig, state: SatState) -> u64 {
    let start = sat.ticks();
    while sat.state() != state || sat.target_state().is_some() {
        sat.tick(config);
        assert!(sat.ticks() - start < 100_000, "never reached {state}");
    }
    sat.ticks() - start
}

// ── Satellite flow ─────────────────────────────────────────────────────

#[test]
fn deploy_to_acquisition_then_ramp() {
    let config = SimConfig::default();
    let mut sat = Satellite::new(&config);
    sat.request_state(SatState::Acquisition).unwrap();
    let ticks = settle(&mut sat, &config, SatState::Acquisition);
    // one tick to start, 358 ticks of 0.5s to finish 179s
    assert_eq!(ticks, 359);

    let target = Vec2::new(8.0, 6.0);
    let outcome = sat
        .request_control(target, CameraAngle::Wide, &config)
        .unwrap();
    let ControlOutcome::Planned { steps } = outcome else {
        panic!("expected a ramp, got {outcome:?}");
    };
    for _ in 0..steps {
        sat.tick(&config);
    }
    assert!(sat.velocity().approx_eq(&target, 1e-3));
    assert_eq!(sat.camera_angle(), CameraAngle::Wide);
    assert!(in_bounds(sat.position(), config.map()));
}

#[test]
fn transitions_follow_duration_table() {
    let config = SimConfig::default();
    let mut sat = Satellite::new(&config);

    sat.request_state(SatState::Safe).unwrap();
    assert_eq!(settle(&mut sat, &config, SatState::Safe), 1 + 120);

    sat.request_state(SatState::Charge).unwrap();
    assert_eq!(settle(&mut sat, &config, SatState::Charge), 1 + 2400);

    sat.request_state(SatState::Comms).unwrap();
    assert_eq!(settle(&mut sat, &config, SatState::Comms), 1 + 358);
}

#[test]
fn charge_refills_battery() {
    let config = SimConfig {
        start_battery: 10.0,
        ..SimConfig::default()
    };
    let mut sat = Satellite::new(&config);
    sat.request_state(SatState::Charge).unwrap();
    settle(&mut sat, &config, SatState::Charge);
    let before = sat.battery();
    for _ in 0..200 {
        sat.tick(&config);
    }
    assert!((sat.battery() - (before + 200.0 * 0.025)).abs() < 1e-6);
}

// ── Beacon ranging and guessing ────────────────────────────────────────

#[test]
fn noisy_pings_bracket_true_position() {
    let config = SimConfig::default();
    let mut rng = StdRng::seed_from_u64(21);
    let mut registry = ObjectiveRegistry::new();
    let request = CreateObjectivesRequest {
        beacon_objectives: vec![BeaconSpec {
            id: Some(77),
            name: "EBT 77".into(),
            start: epoch(),
            end: epoch() + Duration::hours(4),
            decrease_rate: 0.99,
            description: String::new(),
            width: 7900.0,
            height: 5300.0,
        }],
        ..Default::default()
    };
    registry
        .create_objectives(request, epoch(), &config, &mut rng)
        .unwrap();

    let observer = Vec2::new(7638.0, 5089.0);
    let hits = registry.beacons_in_range(epoch(), observer, &config);
    assert_eq!(hits.len(), 1);
    let (id, d) = hits[0];
    assert_eq!(id, 77);
    let exact = unwrapped_distance(observer, Vec2::new(7900.0, 5300.0), config.map());
    assert!((d - exact).abs() < 1e-9);

    let spread = 3.0 * config.beacon_guess_tolerance + 0.1 * (d + 1.0);
    for _ in 0..50 {
        let reading = noisy_distance(d, config.beacon_guess_tolerance, &mut rng);
        assert!((reading - d).abs() <= spread);
    }

    assert!(matches!(
        registry.guess_beacon(77, Vec2::new(7890.0, 5310.0), &config),
        GuessOutcome::Success { guesses_used: 1, .. }
    ));
    assert!(registry.is_empty());
}

#[test]
fn random_objectives_expire_after_window() {
    let config = SimConfig::default();
    let mut rng = StdRng::seed_from_u64(4);
    let mut registry = ObjectiveRegistry::new();
    let request = CreateObjectivesRequest {
        num_random_beacon: 5,
        num_random_zoned: 5,
        ..Default::default()
    };
    let listing = registry
        .create_objectives(request, epoch(), &config, &mut rng)
        .unwrap();
    assert_eq!(listing.len(), 10);

    // latest possible end: 3h start offset + 6h window
    assert!(registry.expire(epoch() + Duration::hours(1)).is_empty());
    let removed = registry.expire(epoch() + Duration::hours(9) + Duration::seconds(1));
    assert_eq!(removed.len(), 10);
    assert!(registry.listing().is_empty());
}
