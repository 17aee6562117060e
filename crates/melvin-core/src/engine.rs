//! Simulation engine - main entry point for running the simulation
//!
//! The engine owns the satellite and the objective registry, each behind its
//! own lock, plus the clock, the ping feed and the zone overlay. It is meant
//! to be shared in an `Arc` between the tick driver and whatever serves
//! clients; every method takes `&self`.
//!
//! No method holds the satellite lock and the registry lock at the same
//! time. The tick counter only moves while the satellite lock is held, so a
//! reader holding that lock sees position and simulated time from the same
//! tick.

use std::io::{Read, Write};
use std::sync::mpsc::Receiver;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use melvin_logic::config::{validate_config, ConfigLoadError, SimConfig};
use melvin_logic::error::{CommandError, ObjectiveError};
use melvin_logic::geometry::{wrapped_rect_tiles, Vec2};
use melvin_logic::objectives::{
    noisy_distance, CreateObjectivesRequest, Objective, ObjectiveListing,
};
use melvin_logic::registry::{GuessOutcome, ObjectiveRegistry};
use melvin_logic::satellite::{ControlOutcome, Observation, Satellite, TickReport};
use melvin_logic::state::{CameraAngle, SatState};

use crate::clock::SimulationClock;
use crate::lock;
use crate::overlay::{NullOverlay, OverlayId, ZoneOverlay};
use crate::persistence::{load_simulation, save_simulation, SaveData, SaveError};
use crate::ping::{BeaconPing, PingFeed};

/// Simulated seconds between objective maintenance passes.
const MAINTENANCE_INTERVAL_SECS: f64 = 60.0;

/// Combined state + control command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlRequest {
    pub vel_x: f64,
    pub vel_y: f64,
    pub camera_angle: String,
    pub state: String,
}

/// Outcome of [`SimulationEngine::apply_control`].
///
/// Both halves of the command are attempted; `message` lists what succeeded
/// and `error` holds the last failure, if any.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Main simulation engine
pub struct SimulationEngine {
    config: SimConfig,
    clock: SimulationClock,
    satellite: Mutex<Satellite>,
    registry: Mutex<ObjectiveRegistry>,
    overlay: Mutex<Box<dyn ZoneOverlay>>,
    pings: PingFeed,
    rng: Mutex<StdRng>,
    ticks_per_maintenance: u64,
}

impl SimulationEngine {
    /// Engine starting at the current wall-clock time with an entropy-seeded
    /// random source.
    pub fn new(config: SimConfig) -> Result<Self, ConfigLoadError> {
        Self::with_seed(config, Utc::now(), rand::random())
    }

    /// Deterministic engine: fixed start time and random seed.
    pub fn with_seed(
        config: SimConfig,
        epoch: DateTime<Utc>,
        seed: u64,
    ) -> Result<Self, ConfigLoadError> {
        let errors = validate_config(&config);
        if !errors.is_empty() {
            return Err(ConfigLoadError::Invalid(errors));
        }
        Ok(Self::build(config, epoch, StdRng::seed_from_u64(seed)))
    }

    fn build(config: SimConfig, epoch: DateTime<Utc>, rng: StdRng) -> Self {
        let ticks_per_maintenance = (MAINTENANCE_INTERVAL_SECS / config.tick_seconds)
            .round()
            .max(1.0) as u64;
        Self {
            clock: SimulationClock::new(epoch, config.tick_seconds),
            satellite: Mutex::new(Satellite::new(&config)),
            registry: Mutex::new(ObjectiveRegistry::new()),
            overlay: Mutex::new(Box::new(NullOverlay::default())),
            pings: PingFeed::new(),
            rng: Mutex::new(rng),
            ticks_per_maintenance,
            config,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Current simulated time.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, 0.0 = paused)
    pub fn set_time_scale(&self, scale: f64) {
        self.clock.set_time_scale(scale);
        log::info!("Time scale set to {}", self.clock.time_scale());
    }

    pub fn time_scale(&self) -> f64 {
        self.clock.time_scale()
    }

    /// Replace the zone overlay and mark every current zone on it.
    pub fn set_overlay(&self, overlay: Box<dyn ZoneOverlay>) {
        *lock(&self.overlay) = overlay;
        let zones: Vec<(u32, [f64; 4])> = lock(&self.registry)
            .zoned()
            .iter()
            .map(|z| (z.id, z.zone_f64()))
            .collect();
        self.mark_zones(zones);
    }

    /// Advance the simulation by one tick.
    ///
    /// Once per simulated minute, expired objectives are removed and, while
    /// the satellite is in COMMS, beacon pings are published.
    pub fn step(&self) -> TickReport {
        let (report, tick, now, position, state) = {
            let mut satellite = lock(&self.satellite);
            let report = satellite.tick(&self.config);
            let tick = self.clock.advance();
            (
                report,
                tick,
                self.clock.now(),
                satellite.position(),
                satellite.state(),
            )
        };
        if tick % self.ticks_per_maintenance == 0 {
            self.maintain_objectives(now, position, state);
        }
        report
    }

    fn maintain_objectives(&self, now: DateTime<Utc>, position: Vec2, state: SatState) {
        let (expired, in_range) = {
            let mut registry = lock(&self.registry);
            let expired = registry.expire(now);
            let in_range = if state == SatState::Comms {
                registry.beacons_in_range(now, position, &self.config)
            } else {
                Vec::new()
            };
            (expired, in_range)
        };
        self.unmark_removed(&expired);

        if in_range.is_empty() {
            return;
        }
        let mut rng = lock(&self.rng);
        for (id, distance) in in_range {
            let distance =
                noisy_distance(distance, self.config.beacon_guess_tolerance, &mut *rng);
            self.pings.publish(BeaconPing {
                id,
                distance,
                timestamp: now,
            });
        }
    }

    /// Snapshot of the satellite, stamped with the time of its last tick.
    pub fn observe(&self) -> Observation {
        let satellite = lock(&self.satellite);
        satellite.observe(self.clock.now())
    }

    /// Ask for a new operational state; it is entered on a later tick.
    pub fn request_state(&self, target: SatState) -> Result<(), CommandError> {
        lock(&self.satellite).request_state(target)
    }

    /// Set target velocity and camera angle (ACQUISITION only).
    pub fn request_control(
        &self,
        vel_x: f64,
        vel_y: f64,
        camera_angle: CameraAngle,
    ) -> Result<ControlOutcome, CommandError> {
        lock(&self.satellite).request_control(Vec2::new(vel_x, vel_y), camera_angle, &self.config)
    }

    /// State request followed by a control request, as one command.
    ///
    /// The state half is skipped when `state` names the current state.
    pub fn apply_control(&self, request: &ControlRequest) -> ControlResponse {
        let mut response = ControlResponse::default();
        let mut satellite = lock(&self.satellite);

        if satellite.state().as_str() != request.state {
            match request
                .state
                .parse::<SatState>()
                .and_then(|target| satellite.request_state(target))
            {
                Ok(()) => response.message.push_str("Target state updated successfully."),
                Err(e) => response.error = Some(e.to_string()),
            }
        }

        let control = request.camera_angle.parse::<CameraAngle>().and_then(|angle| {
            satellite.request_control(Vec2::new(request.vel_x, request.vel_y), angle, &self.config)
        });
        match control {
            Ok(_) => response.message.push_str("Control values updated successfully."),
            Err(e) => response.error = Some(e.to_string()),
        }
        response
    }

    /// Restore the satellite to its start conditions and drop all objectives.
    pub fn reset(&self) {
        lock(&self.satellite).reset(&self.config);
        let removed: Vec<OverlayId> = {
            let mut registry = lock(&self.registry);
            let handles = registry.zoned().iter().filter_map(|z| z.overlay).collect();
            registry.clear();
            handles
        };
        let mut overlay = lock(&self.overlay);
        for handle in removed {
            overlay.unmark(handle);
        }
        log::info!("Simulation reset");
    }

    pub fn list_objectives(&self) -> ObjectiveListing {
        lock(&self.registry).listing()
    }

    /// Create objectives and mark new zones on the overlay.
    pub fn create_objectives(
        &self,
        request: CreateObjectivesRequest,
    ) -> Result<ObjectiveListing, ObjectiveError> {
        let now = self.clock.now();
        let (listing, zones) = {
            let mut registry = lock(&self.registry);
            let mut rng = lock(&self.rng);
            let listing = registry.create_objectives(request, now, &self.config, &mut *rng)?;
            let zones: Vec<(u32, [f64; 4])> = listing
                .zoned_objectives
                .iter()
                .filter_map(|info| registry.zoned_by_id(info.id))
                .map(|z| (z.id, z.zone_f64()))
                .collect();
            (listing, zones)
        };
        self.mark_zones(zones);
        Ok(listing)
    }

    /// Remove an objective of either kind. Returns false for unknown ids.
    pub fn delete_objective(&self, id: u32) -> bool {
        let removed = lock(&self.registry).remove(id);
        match removed {
            Some(objective) => {
                log::info!("Objective {} ({}) deleted", objective.id(), objective.name());
                self.unmark_removed(std::slice::from_ref(&objective));
                true
            }
            None => false,
        }
    }

    /// Guess a beacon position (`x` = width, `y` = height).
    pub fn guess_beacon(&self, id: u32, position: Vec2) -> GuessOutcome {
        lock(&self.registry).guess_beacon(id, position, &self.config)
    }

    pub fn subscribe_pings(&self) -> Receiver<BeaconPing> {
        self.pings.subscribe()
    }

    /// Save simulation state to a writer
    pub fn save<W: Write>(&self, writer: W) -> Result<(), SaveError> {
        let (satellite, ticks) = {
            let satellite = lock(&self.satellite);
            (satellite.clone(), self.clock.ticks())
        };
        let registry = lock(&self.registry).clone();
        let data = SaveData::new(
            self.clock.epoch(),
            ticks,
            self.clock.time_scale(),
            satellite,
            registry,
        );
        save_simulation(writer, &data)
    }

    /// Load simulation state from a reader
    ///
    /// The clock epoch of the save must match this engine's; only the tick
    /// count and time scale are restored. Zones are re-marked on the overlay.
    ///
    /// A snapshot that fails validation leaves the engine untouched.
    pub fn load<R: Read>(&self, reader: R) -> Result<(), SaveError> {
        let data = load_simulation(reader)?;
        if self.clock.at_tick(data.ticks).is_none() {
            return Err(SaveError::TickOutOfRange(data.ticks));
        }
        data.check(&self.config)?;

        {
            let mut satellite = lock(&self.satellite);
            *satellite = data.satellite;
            self.clock.set_ticks(data.ticks);
        }
        let (stale, zones) = {
            let mut registry = lock(&self.registry);
            let stale: Vec<OverlayId> = registry.zoned().iter().filter_map(|z| z.overlay).collect();
            *registry = data.registry;
            let zones: Vec<(u32, [f64; 4])> = registry
                .zoned()
                .iter()
                .map(|z| (z.id, z.zone_f64()))
                .collect();
            (stale, zones)
        };
        {
            let mut overlay = lock(&self.overlay);
            for handle in stale {
                overlay.unmark(handle);
            }
        }
        self.mark_zones(zones);

        if data.epoch != self.clock.epoch() {
            log::warn!(
                "Save epoch {} differs from engine epoch {}",
                data.epoch,
                self.clock.epoch()
            );
        }
        self.clock.set_time_scale(data.time_scale);
        log::info!("Loaded simulation at tick {}", data.ticks);
        Ok(())
    }

    fn mark_zones(&self, zones: Vec<(u32, [f64; 4])>) {
        if zones.is_empty() {
            return;
        }
        let map = self.config.map();
        let marked: Vec<(u32, OverlayId)> = {
            let mut overlay = lock(&self.overlay);
            zones
                .into_iter()
                .map(|(id, zone)| (id, overlay.mark(id, &wrapped_rect_tiles(zone, map))))
                .collect()
        };

        let mut orphaned = Vec::new();
        {
            let mut registry = lock(&self.registry);
            for (id, handle) in marked {
                match registry.zoned_by_id_mut(id) {
                    Some(zoned) => zoned.overlay = Some(handle),
                    None => orphaned.push(handle),
                }
            }
        }
        if !orphaned.is_empty() {
            let mut overlay = lock(&self.overlay);
            for handle in orphaned {
                overlay.unmark(handle);
            }
        }
    }

    fn unmark_removed(&self, removed: &[Objective]) {
        let handles: Vec<OverlayId> = removed
            .iter()
            .filter_map(|objective| match objective {
                Objective::Zoned(z) => z.overlay,
                Objective::Beacon(_) => None,
            })
            .collect();
        if handles.is_empty() {
            return;
        }
        let mut overlay = lock(&self.overlay);
        for handle in handles {
            overlay.unmark(handle);
        }
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::build(SimConfig::default(), Utc::now(), StdRng::from_entropy())
    }
}
