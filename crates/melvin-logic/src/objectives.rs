//! Objective types, client-facing views and randomized generation.
//!
//! Two kinds of timed tasks exist:
//! - **Beacon**: a hidden map position the client must guess within a
//!   tolerance, helped by noisy distance pings.
//! - **Zoned**: a rectangle (possibly wrapping the map edges) that must be
//!   imaged with a given camera angle and coverage.
//!
//! Both are active between `start` and `end` inclusive. Storage and id
//! management live in [`crate::registry`].

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{beacon, objectives};
use crate::error::ObjectiveError;
use crate::geometry::{wrap, MapSize, Vec2};
use crate::state::CameraAngle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconObjective {
    pub id: u32,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub decrease_rate: f64,
    pub attempts_made: u32,
    pub description: String,
    /// Hidden true position (x = width, y = height).
    pub position: Vec2,
}

impl BeaconObjective {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    /// Client view; never includes the position.
    pub fn info(&self) -> BeaconInfo {
        BeaconInfo {
            id: self.id,
            name: self.name.clone(),
            start: self.start,
            end: self.end,
            decrease_rate: self.decrease_rate,
            attempts_made: self.attempts_made,
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonedObjective {
    pub id: u32,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub decrease_rate: f64,
    /// `[x1, y1, x2, y2]`; `x2 < x1` or `y2 < y1` means the zone wraps.
    pub zone: [u32; 4],
    pub optic_required: CameraAngle,
    pub coverage_required: f64,
    pub description: String,
    pub secret: bool,
    /// Handle of the map marker drawn for this zone, if any.
    #[serde(skip)]
    pub overlay: Option<u64>,
}

impl ZonedObjective {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.start <= now && now <= self.end
    }

    pub fn zone_f64(&self) -> [f64; 4] {
        self.zone.map(f64::from)
    }

    /// Client view; secret objectives hide their zone.
    pub fn info(&self) -> ZonedInfo {
        ZonedInfo {
            id: self.id,
            name: self.name.clone(),
            start: self.start,
            end: self.end,
            zone: if self.secret { None } else { Some(self.zone) },
            decrease_rate: self.decrease_rate,
            optic_required: self.optic_required,
            coverage_required: self.coverage_required,
            description: self.description.clone(),
            secret: self.secret,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconInfo {
    pub id: u32,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub decrease_rate: f64,
    pub attempts_made: u32,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonedInfo {
    pub id: u32,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<[u32; 4]>,
    pub decrease_rate: f64,
    pub optic_required: CameraAngle,
    pub coverage_required: f64,
    pub description: String,
    pub secret: bool,
}

/// Both objective lists as returned to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveListing {
    pub zoned_objectives: Vec<ZonedInfo>,
    pub beacon_objectives: Vec<BeaconInfo>,
}

impl ObjectiveListing {
    pub fn is_empty(&self) -> bool {
        self.zoned_objectives.is_empty() && self.beacon_objectives.is_empty()
    }

    pub fn len(&self) -> usize {
        self.zoned_objectives.len() + self.beacon_objectives.len()
    }
}

/// An objective removed from the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Objective {
    Zoned(ZonedObjective),
    Beacon(BeaconObjective),
}

impl Objective {
    pub fn id(&self) -> u32 {
        match self {
            Self::Zoned(z) => z.id,
            Self::Beacon(b) => b.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Zoned(z) => &z.name,
            Self::Beacon(b) => &b.name,
        }
    }
}

fn default_decrease_rate() -> f64 {
    beacon::DECREASE_RATE
}

/// Client-submitted beacon. A missing id is drawn from the free pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeaconSpec {
    #[serde(default)]
    pub id: Option<u32>,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_decrease_rate")]
    pub decrease_rate: f64,
    #[serde(default)]
    pub description: String,
    pub width: f64,
    pub height: f64,
}

impl BeaconSpec {
    pub fn into_objective(self, id: u32, map: MapSize) -> Result<BeaconObjective, ObjectiveError> {
        if self.end <= self.start {
            return Err(ObjectiveError::InvalidWindow);
        }
        let position = Vec2::new(self.width, self.height);
        if !map.contains(position) {
            return Err(ObjectiveError::OutOfBounds(self.width, self.height));
        }
        Ok(BeaconObjective {
            id,
            name: self.name,
            start: self.start,
            end: self.end,
            decrease_rate: self.decrease_rate,
            attempts_made: 0,
            description: self.description,
            position,
        })
    }
}

/// Client-submitted zoned objective. A missing id is drawn from the free pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZonedSpec {
    #[serde(default)]
    pub id: Option<u32>,
    pub name: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default = "default_decrease_rate")]
    pub decrease_rate: f64,
    pub zone: [u32; 4],
    pub optic_required: CameraAngle,
    pub coverage_required: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub secret: bool,
}

impl ZonedSpec {
    pub fn into_objective(self, id: u32, map: MapSize) -> Result<ZonedObjective, ObjectiveError> {
        if self.end <= self.start {
            return Err(ObjectiveError::InvalidWindow);
        }
        let [x1, y1, x2, y2] = self.zone.map(f64::from);
        for corner in [Vec2::new(x1, y1), Vec2::new(x2, y2)] {
            if !map.contains(corner) {
                return Err(ObjectiveError::OutOfBounds(corner.x, corner.y));
            }
        }
        if !(0.0..=1.0).contains(&self.coverage_required) {
            return Err(ObjectiveError::InvalidCoverage(self.coverage_required));
        }
        Ok(ZonedObjective {
            id,
            name: self.name,
            start: self.start,
            end: self.end,
            decrease_rate: self.decrease_rate,
            zone: self.zone,
            optic_required: self.optic_required,
            coverage_required: self.coverage_required,
            description: self.description,
            secret: self.secret,
            overlay: None,
        })
    }
}

/// Body of a "create objectives" request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateObjectivesRequest {
    pub zoned_objectives: Vec<ZonedSpec>,
    pub beacon_objectives: Vec<BeaconSpec>,
    pub num_random_zoned: usize,
    pub num_random_beacon: usize,
}

fn random_start<R: Rng>(now: DateTime<Utc>, rng: &mut R) -> DateTime<Utc> {
    let offset =
        rng.gen_range(objectives::START_OFFSET_MIN_SECS..=objectives::START_OFFSET_MAX_SECS);
    now + Duration::seconds(offset)
}

/// Beacon at a uniform random whole-pixel position, starting 1–3h from
/// `now` and lasting 4h.
pub fn random_beacon<R: Rng>(
    id: u32,
    now: DateTime<Utc>,
    map: MapSize,
    rng: &mut R,
) -> BeaconObjective {
    let start = random_start(now, rng);
    let position = Vec2::new(
        rng.gen_range(0.0..map.width).floor(),
        rng.gen_range(0.0..map.height).floor(),
    );
    BeaconObjective {
        id,
        name: format!("EBT {id}"),
        start,
        end: start + Duration::hours(beacon::WINDOW_HOURS),
        decrease_rate: beacon::DECREASE_RATE,
        attempts_made: 0,
        description: "Emergency beacon tracker active. Locate it from its distance pings."
            .to_string(),
        position,
    }
}

/// Zoned objective on a random anchor.
///
/// The zone is the footprint of a random camera angle, stretched by 1–4x
/// along one random axis, with the far corner wrapped onto the map.
pub fn random_zoned<R: Rng>(
    id: u32,
    now: DateTime<Utc>,
    map: MapSize,
    rng: &mut R,
) -> ZonedObjective {
    let angle = CameraAngle::ALL[rng.gen_range(0..CameraAngle::ALL.len())];
    let side = angle.side_length();
    let stretch = rng.gen_range(1..=objectives::MAX_ZONE_STRETCH);
    let (w, h) = if rng.gen_bool(0.5) {
        (side * stretch, side)
    } else {
        (side, side * stretch)
    };

    let x1 = rng.gen_range(0.0..map.width).floor();
    let y1 = rng.gen_range(0.0..map.height).floor();
    let x2 = wrap(x1 + f64::from(w), map.width);
    let y2 = wrap(y1 + f64::from(h), map.height);

    let start = random_start(now, rng);
    let window =
        rng.gen_range(objectives::ZONED_WINDOW_MIN_SECS..=objectives::ZONED_WINDOW_MAX_SECS);
    ZonedObjective {
        id,
        name: format!("Precise Picture {id}"),
        start,
        end: start + Duration::seconds(window),
        decrease_rate: beacon::DECREASE_RATE,
        zone: [x1 as u32, y1 as u32, x2 as u32, y2 as u32],
        optic_required: angle,
        coverage_required: rng.gen_range(objectives::MIN_COVERAGE..=objectives::MAX_COVERAGE),
        description: format!("Capture this area with the {angle} lens."),
        secret: false,
        overlay: None,
    }
}

/// Distance reading with noise that grows with range.
///
/// `d + U(-1, 1) * (3 * tolerance + 0.1 * (d + 1))`
pub fn noisy_distance<R: Rng>(true_distance: f64, tolerance: f64, rng: &mut R) -> f64 {
    let spread = 3.0 * tolerance + 0.1 * (true_distance + 1.0);
    true_distance + rng.gen_range(-1.0..=1.0) * spread
}
