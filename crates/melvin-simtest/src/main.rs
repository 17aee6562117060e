//! MELVIN Headless Simulation Harness
//!
//! Validates the simulation rules and the engine without a network API.
//! Runs entirely in-process: no HTTP, no map rendering.
//!
//! Usage:
//!   cargo run -p melvin-simtest
//!   cargo run -p melvin-simtest -- --verbose --seed 42

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use melvin_core::prelude::*;
use melvin_logic::config::validate_config;
use melvin_logic::geometry::{in_bounds, unwrapped_distance, wrap, wrapped_rect_tiles};
use melvin_logic::registry::ObjectiveRegistry;
use melvin_logic::satellite::Satellite;
use melvin_logic::state::{transition_time, StateMachine};
use melvin_logic::velocity::plan_velocity_change;

// ── Simulation config (same JSON a deployment would load) ──────────────
const CONFIG_JSON: &str = include_str!("../../../data/sim_config.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "--verbose");
    let seed = args
        .windows(2)
        .find(|w| w[0] == "--seed")
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(42u64);

    let filter = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    println!("=== MELVIN Simulation Harness (seed {seed}) ===\n");

    let config = match SimConfig::from_json_str(CONFIG_JSON) {
        Ok(c) => c,
        Err(e) => {
            println!("  ✗ config_parse: {e}");
            std::process::exit(1);
        }
    };

    let mut results = Vec::new();

    // 1. Config validation
    results.extend(validate_configuration(&config));

    // 2. Toroidal geometry sweep
    results.extend(validate_geometry(&config, seed));

    // 3. Velocity planner sweep
    results.extend(validate_planner(&config, seed, verbose));

    // 4. State machine timings
    results.extend(validate_state_machine(&config));

    // 5. Long satellite run with random commands
    results.extend(validate_satellite_run(&config, seed, verbose));

    // 6. Objective lifecycle
    results.extend(validate_objectives(&config, seed));

    // 7. Engine end-to-end
    results.extend(validate_engine(&config, seed, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── 1. Configuration ────────────────────────────────────────────────────

fn validate_configuration(config: &SimConfig) -> Vec<TestResult> {
    println!("--- Configuration ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "config_matches_defaults".into(),
        passed: *config == SimConfig::default(),
        detail: "bundled JSON equals built-in defaults".into(),
    });

    let broken = SimConfig {
        tick_seconds: -1.0,
        min_velocity: 80.0,
        id_space: 0,
        ..config.clone()
    };
    let errors = validate_config(&broken);
    results.push(TestResult {
        name: "config_reports_all_errors".into(),
        passed: errors.len() == 3,
        detail: format!("{} errors: {:?}", errors.len(), errors),
    });

    results
}

// ── 2. Geometry ─────────────────────────────────────────────────────────

fn validate_geometry(config: &SimConfig, seed: u64) -> Vec<TestResult> {
    println!("--- Toroidal Geometry ---");
    let mut results = Vec::new();
    let map = config.map();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut bad_wrap = 0;
    for _ in 0..10_000 {
        let v = rng.gen_range(-100_000.0..100_000.0);
        let once = wrap(v, map.width);
        if wrap(once, map.width) != once || !(0.0..map.width).contains(&once) {
            bad_wrap += 1;
        }
    }
    results.push(TestResult {
        name: "geometry_wrap_idempotent".into(),
        passed: bad_wrap == 0,
        detail: format!("{bad_wrap} of 10000 samples misbehaved"),
    });

    let mut asymmetric = 0;
    let mut too_long = 0;
    let half_diagonal = (map.width / 2.0).hypot(map.height / 2.0);
    for _ in 0..10_000 {
        let a = Vec2::new(rng.gen_range(0.0..map.width), rng.gen_range(0.0..map.height));
        let b = Vec2::new(rng.gen_range(0.0..map.width), rng.gen_range(0.0..map.height));
        let ab = unwrapped_distance(a, b, map);
        if (ab - unwrapped_distance(b, a, map)).abs() > 1e-9 {
            asymmetric += 1;
        }
        if ab > half_diagonal + 1e-9 {
            too_long += 1;
        }
    }
    results.push(TestResult {
        name: "geometry_distance_symmetric".into(),
        passed: asymmetric == 0,
        detail: format!("{asymmetric} asymmetric pairs"),
    });
    results.push(TestResult {
        name: "geometry_distance_bounded".into(),
        passed: too_long == 0,
        detail: format!("{too_long} distances beyond half the map diagonal"),
    });

    let edge = unwrapped_distance(Vec2::new(0.0, 5.0), Vec2::new(map.width - 1.0, 5.0), map);
    results.push(TestResult {
        name: "geometry_edge_distance".into(),
        passed: (edge - 1.0).abs() < 1e-9,
        detail: format!("(0,5)-(W-1,5) distance {edge}"),
    });

    let corner = wrapped_rect_tiles([map.width - 300.0, map.height - 300.0, 300.0, 300.0], map);
    let area: f64 = corner.iter().map(|t| t.width * t.height).sum();
    results.push(TestResult {
        name: "geometry_corner_zone_tiles".into(),
        passed: corner.len() == 4 && (area - 360_000.0).abs() < 1e-6,
        detail: format!("{} tiles, area {area}", corner.len()),
    });

    results
}

// ── 3. Velocity Planner ─────────────────────────────────────────────────

fn validate_planner(config: &SimConfig, seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Velocity Planner ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5eed);

    let mut planned = 0;
    let mut rejected = 0;
    let mut budget_violations = 0;
    let mut missed_targets = 0;
    let mut longest = 0;
    for _ in 0..500 {
        let current = random_velocity(&mut rng, config);
        let target = random_velocity(&mut rng, config);
        match plan_velocity_change(current, target, config) {
            Ok(plan) => {
                planned += 1;
                longest = longest.max(plan.len());
                let mut previous = current;
                for &step in plan.steps() {
                    if (step - previous).length() > config.accel_per_tick + 1e-9 {
                        budget_violations += 1;
                    }
                    previous = step;
                }
                if !previous.approx_eq(&target, 1e-3) {
                    missed_targets += 1;
                }
            }
            Err(_) => rejected += 1,
        }
    }
    if verbose {
        println!("  {planned} planned, {rejected} rejected, longest ramp {longest} ticks");
    }

    results.push(TestResult {
        name: "planner_budget_respected".into(),
        passed: budget_violations == 0,
        detail: format!("{budget_violations} steps above {}", config.accel_per_tick),
    });
    results.push(TestResult {
        name: "planner_reaches_target".into(),
        passed: missed_targets == 0 && planned > 0,
        detail: format!("{missed_targets} of {planned} plans ended off target"),
    });

    let reversal = plan_velocity_change(Vec2::new(10.0, 0.0), Vec2::new(-10.0, 0.0), config);
    results.push(TestResult {
        name: "planner_rejects_reversal".into(),
        passed: reversal.is_err(),
        detail: format!("{:?}", reversal.err()),
    });

    results
}

fn random_velocity(rng: &mut StdRng, config: &SimConfig) -> Vec2 {
    let speed = rng.gen_range(config.min_velocity..=config.max_velocity);
    let heading = rng.gen_range(0.0..std::f64::consts::TAU);
    Vec2::new(speed * heading.cos(), speed * heading.sin())
}

// ── 4. State Machine ────────────────────────────────────────────────────

fn validate_state_machine(config: &SimConfig) -> Vec<TestResult> {
    println!("--- State Machine ---");
    let mut results = Vec::new();

    for (from, to, expected) in [
        (SatState::Safe, SatState::Acquisition, 1200.0),
        (SatState::Acquisition, SatState::Safe, 60.0),
        (SatState::Comms, SatState::Charge, 179.0),
    ] {
        let secs = transition_time(from, to, config);
        results.push(TestResult {
            name: format!("transition_{from}_to_{to}"),
            passed: secs == expected,
            detail: format!("{secs}s (expected {expected}s)"),
        });
    }

    let mut machine = StateMachine::new();
    let disallowed = [SatState::Deployment, SatState::Transition]
        .into_iter()
        .all(|s| machine.request(s).is_err());
    results.push(TestResult {
        name: "transition_disallowed_targets".into(),
        passed: disallowed,
        detail: "deployment and transition cannot be requested".into(),
    });

    results
}

// ── 5. Satellite Run ────────────────────────────────────────────────────

fn validate_satellite_run(config: &SimConfig, seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Satellite Run ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(5));
    let map = config.map();
    let mut sat = Satellite::new(config);

    let requestable = [
        SatState::Acquisition,
        SatState::Charge,
        SatState::Comms,
        SatState::Safe,
    ];
    let mut out_of_bounds = 0;
    let mut bad_battery = 0;
    let mut negative_fuel = 0;
    let mut bad_turns = 0;
    let mut forced_safe = 0;
    let mut accepted = 0;

    for tick in 0..100_000u32 {
        if tick % 500 == 0 {
            let target = requestable[rng.gen_range(0..requestable.len())];
            let _ = sat.request_state(target);
        }
        if tick % 97 == 0 && sat.state() == SatState::Acquisition {
            let before = sat.velocity();
            let target = random_velocity(&mut rng, config);
            let angle = CameraAngle::ALL[rng.gen_range(0..CameraAngle::ALL.len())];
            match sat.request_control(target, angle, config) {
                Ok(_) => accepted += 1,
                Err(_) if sat.velocity() != before => bad_turns += 1,
                Err(_) => {}
            }
        }

        let report = sat.tick(config);
        if report.forced_safe {
            forced_safe += 1;
        }
        if !in_bounds(sat.position(), map) {
            out_of_bounds += 1;
        }
        if !(0.0..=100.0).contains(&sat.battery()) {
            bad_battery += 1;
        }
        if sat.fuel() < 0.0 {
            negative_fuel += 1;
        }
    }
    if verbose {
        println!(
            "  {accepted} control commands accepted, {forced_safe} forced safe, fuel left {:.2}",
            sat.fuel()
        );
    }

    results.push(TestResult {
        name: "satellite_position_in_bounds".into(),
        passed: out_of_bounds == 0,
        detail: format!("{out_of_bounds} ticks out of bounds"),
    });
    results.push(TestResult {
        name: "satellite_battery_in_range".into(),
        passed: bad_battery == 0,
        detail: format!("{bad_battery} ticks with battery outside [0, 100]"),
    });
    results.push(TestResult {
        name: "satellite_fuel_non_negative".into(),
        passed: negative_fuel == 0,
        detail: format!("{negative_fuel} ticks with negative fuel"),
    });
    results.push(TestResult {
        name: "satellite_rejections_mutate_nothing".into(),
        passed: bad_turns == 0,
        detail: format!("{bad_turns} rejected commands changed velocity"),
    });

    let mut drained = Satellite::new(&SimConfig {
        start_battery: 0.0,
        ..config.clone()
    });
    let report = drained.tick(config);
    results.push(TestResult {
        name: "satellite_empty_battery_forces_safe".into(),
        passed: report.forced_safe && drained.target_state() == Some(SatState::Safe),
        detail: format!("target after one tick: {:?}", drained.target_state()),
    });

    results
}

// ── 6. Objectives ───────────────────────────────────────────────────────

fn validate_objectives(config: &SimConfig, seed: u64) -> Vec<TestResult> {
    println!("--- Objectives ---");
    let mut results = Vec::new();
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(6));
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let mut registry = ObjectiveRegistry::new();

    let created = registry
        .create_objectives(
            CreateObjectivesRequest {
                num_random_beacon: 200,
                num_random_zoned: 200,
                ..Default::default()
            },
            now,
            config,
            &mut rng,
        )
        .map(|listing| listing.len());
    results.push(TestResult {
        name: "objectives_bulk_creation".into(),
        passed: created == Ok(400) && registry.len() == 400,
        detail: format!("{created:?} created, {} live ids", registry.len()),
    });

    let bad_windows = registry
        .beacons()
        .iter()
        .filter(|b| b.end <= b.start)
        .count()
        + registry.zoned().iter().filter(|z| z.end <= z.start).count();
    results.push(TestResult {
        name: "objectives_windows_valid".into(),
        passed: bad_windows == 0,
        detail: format!("{bad_windows} objectives end before they start"),
    });

    let beacon = registry.beacons()[0].clone();
    let far = Vec2::new(
        wrap(beacon.position.x + 5000.0, config.map_width),
        beacon.position.y,
    );
    let mut outcomes = Vec::new();
    for _ in 0..4 {
        outcomes.push(registry.guess_beacon(beacon.id, far, config));
    }
    results.push(TestResult {
        name: "objectives_guess_limit".into(),
        passed: matches!(
            outcomes[3],
            GuessOutcome::AttemptsExhausted { guesses_used: 3 }
        ),
        detail: format!("4th guess: {:?}", outcomes[3]),
    });

    let second = registry.beacons()[1].clone();
    let hit = registry.guess_beacon(second.id, second.position, config);
    results.push(TestResult {
        name: "objectives_exact_guess_succeeds".into(),
        passed: matches!(hit, GuessOutcome::Success { .. }) && !registry.contains(second.id),
        detail: format!("{hit:?}"),
    });

    let expired = registry.expire(now + Duration::hours(10));
    results.push(TestResult {
        name: "objectives_expire".into(),
        passed: registry.is_empty() && expired.len() == 399,
        detail: format!("{} expired, {} left", expired.len(), registry.len()),
    });

    let zone = wrapped_rect_tiles([21_000.0, 100.0, 400.0, 700.0], config.map());
    results.push(TestResult {
        name: "objectives_wrapped_zone".into(),
        passed: zone.len() == 2,
        detail: format!("{} tiles", zone.len()),
    });

    results
}

// ── 7. Engine ───────────────────────────────────────────────────────────

fn validate_engine(config: &SimConfig, seed: u64, verbose: bool) -> Vec<TestResult> {
    println!("--- Engine ---");
    let mut results = Vec::new();
    let epoch = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let engine = match SimulationEngine::with_seed(config.clone(), epoch, seed) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            results.push(TestResult {
                name: "engine_create".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };
    let overlay = RecordingOverlay::new();
    engine.set_overlay(Box::new(overlay.clone()));
    let pings = engine.subscribe_pings();

    // beacon right on the start position so comms pings it immediately
    let listing = engine.create_objectives(CreateObjectivesRequest {
        beacon_objectives: vec![melvin_logic::objectives::BeaconSpec {
            id: None,
            name: "EBT harness".into(),
            start: epoch,
            end: epoch + Duration::hours(4),
            decrease_rate: 0.99,
            description: String::new(),
            width: config.start_position.x,
            height: config.start_position.y,
        }],
        num_random_zoned: 5,
        ..Default::default()
    });
    results.push(TestResult {
        name: "engine_create_objectives".into(),
        passed: listing.is_ok() && overlay.marked().len() == 5,
        detail: format!("{} zones marked", overlay.marked().len()),
    });

    if let Err(e) = engine.request_state(SatState::Comms) {
        results.push(TestResult {
            name: "engine_request_comms".into(),
            passed: false,
            detail: e.to_string(),
        });
        return results;
    }
    engine.set_time_scale(1000.0);
    let mut driver = match TickDriver::start(Arc::clone(&engine)) {
        Ok(d) => d,
        Err(e) => {
            results.push(TestResult {
                name: "engine_driver_start".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };
    std::thread::sleep(StdDuration::from_millis(1500));
    driver.stop();

    let ticks = engine.clock().ticks();
    let received: Vec<BeaconPing> = pings.try_iter().collect();
    if verbose {
        for ping in received.iter().take(5) {
            println!("  {ping}");
        }
    }
    results.push(TestResult {
        name: "engine_driver_ticks".into(),
        passed: ticks > 600,
        detail: format!("{ticks} ticks in 1.5s at 1000x"),
    });
    results.push(TestResult {
        name: "engine_comms_pings".into(),
        passed: !received.is_empty(),
        detail: format!("{} pings received", received.len()),
    });

    let mut buffer = Vec::new();
    let saved = engine.save(&mut buffer);
    let restored = SimulationEngine::with_seed(config.clone(), epoch, seed)
        .map_err(|e| e.to_string())
        .and_then(|r| {
            r.load(&buffer[..]).map_err(|e| e.to_string())?;
            Ok(r)
        });
    let roundtrip = match (&saved, &restored) {
        (Ok(()), Ok(r)) => r.observe() == engine.observe(),
        _ => false,
    };
    results.push(TestResult {
        name: "engine_save_load".into(),
        passed: roundtrip,
        detail: format!("{} bytes, restored={}", buffer.len(), restored.is_ok()),
    });

    engine.reset();
    let obs = engine.observe();
    results.push(TestResult {
        name: "engine_reset".into(),
        passed: obs.state == SatState::Deployment
            && (obs.width_x, obs.height_y) == (7638, 5089)
            && overlay.marked().is_empty(),
        detail: format!("state {} at ({}, {})", obs.state, obs.width_x, obs.height_y),
    });

    results
}
