//! Objective registry: storage, id allocation, the beacon guess protocol and
//! expiry.
//!
//! Ids are unique across both kinds. Creation requests are all-or-nothing:
//! if one entry fails validation, everything added by that request is rolled
//! back.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::constants::objectives::ID_RANDOM_ATTEMPTS;
use crate::error::ObjectiveError;
use crate::geometry::{unwrapped_distance, Vec2};
use crate::objectives::{
    random_beacon, random_zoned, BeaconObjective, CreateObjectivesRequest, Objective,
    ObjectiveListing, ZonedObjective,
};

/// Result of a beacon guess.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GuessOutcome {
    /// Within tolerance; the beacon has been removed.
    Success { distance: f64, guesses_used: u32 },
    Failure { distance: f64, guesses_used: u32 },
    /// No beacon with that id.
    NotFound,
    /// All attempts already spent; nothing was counted.
    AttemptsExhausted { guesses_used: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveRegistry {
    zoned: Vec<ZonedObjective>,
    beacons: Vec<BeaconObjective>,
    ids: BTreeSet<u32>,
}

impl ObjectiveRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zoned(&self) -> &[ZonedObjective] {
        &self.zoned
    }

    pub fn beacons(&self) -> &[BeaconObjective] {
        &self.beacons
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.ids.contains(&id)
    }

    pub fn zoned_by_id(&self, id: u32) -> Option<&ZonedObjective> {
        self.zoned.iter().find(|z| z.id == id)
    }

    pub fn zoned_by_id_mut(&mut self, id: u32) -> Option<&mut ZonedObjective> {
        self.zoned.iter_mut().find(|z| z.id == id)
    }

    pub fn beacon_by_id(&self, id: u32) -> Option<&BeaconObjective> {
        self.beacons.iter().find(|b| b.id == id)
    }

    /// Draw an unused id from `1..=id_space`.
    ///
    /// A few random draws are tried first; after that the unused ids are
    /// collected and one is picked, so allocation always terminates.
    pub fn allocate_id<R: Rng>(&self, id_space: u32, rng: &mut R) -> Result<u32, ObjectiveError> {
        if self.ids.len() >= id_space as usize {
            return Err(ObjectiveError::IdSpaceExhausted(id_space));
        }
        for _ in 0..ID_RANDOM_ATTEMPTS {
            let id = rng.gen_range(1..=id_space);
            if !self.ids.contains(&id) {
                return Ok(id);
            }
        }
        let free: Vec<u32> = (1..=id_space).filter(|id| !self.ids.contains(id)).collect();
        free.choose(rng)
            .copied()
            .ok_or(ObjectiveError::IdSpaceExhausted(id_space))
    }

    fn claim_id<R: Rng>(
        &self,
        requested: Option<u32>,
        id_space: u32,
        rng: &mut R,
    ) -> Result<u32, ObjectiveError> {
        match requested {
            Some(id) if id == 0 || id > id_space => Err(ObjectiveError::IdOutOfRange(id, id_space)),
            Some(id) if self.ids.contains(&id) => Err(ObjectiveError::DuplicateId(id)),
            Some(id) => Ok(id),
            None => self.allocate_id(id_space, rng),
        }
    }

    pub fn add_beacon(&mut self, beacon: BeaconObjective) -> Result<(), ObjectiveError> {
        if !self.ids.insert(beacon.id) {
            return Err(ObjectiveError::DuplicateId(beacon.id));
        }
        log::info!("Added beacon objective {} ({})", beacon.id, beacon.name);
        self.beacons.push(beacon);
        Ok(())
    }

    pub fn add_zoned(&mut self, zoned: ZonedObjective) -> Result<(), ObjectiveError> {
        if !self.ids.insert(zoned.id) {
            return Err(ObjectiveError::DuplicateId(zoned.id));
        }
        log::info!("Added zoned objective {} ({})", zoned.id, zoned.name);
        self.zoned.push(zoned);
        Ok(())
    }

    /// Add `count` randomized beacons.
    pub fn create_random_beacons<R: Rng>(
        &mut self,
        count: usize,
        now: DateTime<Utc>,
        config: &SimConfig,
        rng: &mut R,
    ) -> Result<Vec<u32>, ObjectiveError> {
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.allocate_id(config.id_space, rng)?;
            self.add_beacon(random_beacon(id, now, config.map(), rng))?;
            created.push(id);
        }
        Ok(created)
    }

    /// Add `count` randomized zoned objectives.
    pub fn create_random_zoned<R: Rng>(
        &mut self,
        count: usize,
        now: DateTime<Utc>,
        config: &SimConfig,
        rng: &mut R,
    ) -> Result<Vec<u32>, ObjectiveError> {
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.allocate_id(config.id_space, rng)?;
            self.add_zoned(random_zoned(id, now, config.map(), rng))?;
            created.push(id);
        }
        Ok(created)
    }

    /// Apply a creation request and list what it created.
    ///
    /// Manual entries are added before randomized ones. On any error the
    /// registry is left as it was.
    pub fn create_objectives<R: Rng>(
        &mut self,
        request: CreateObjectivesRequest,
        now: DateTime<Utc>,
        config: &SimConfig,
        rng: &mut R,
    ) -> Result<ObjectiveListing, ObjectiveError> {
        let mut created = Vec::new();
        match self.apply_request(request, now, config, rng, &mut created) {
            Ok(()) if created.is_empty() => Err(ObjectiveError::NothingCreated),
            Ok(()) => Ok(self.listing_of(&created)),
            Err(e) => {
                for id in created {
                    self.remove(id);
                }
                Err(e)
            }
        }
    }

    fn apply_request<R: Rng>(
        &mut self,
        request: CreateObjectivesRequest,
        now: DateTime<Utc>,
        config: &SimConfig,
        rng: &mut R,
        created: &mut Vec<u32>,
    ) -> Result<(), ObjectiveError> {
        let map = config.map();
        for spec in request.zoned_objectives {
            let id = self.claim_id(spec.id, config.id_space, rng)?;
            self.add_zoned(spec.into_objective(id, map)?)?;
            created.push(id);
        }
        for spec in request.beacon_objectives {
            let id = self.claim_id(spec.id, config.id_space, rng)?;
            self.add_beacon(spec.into_objective(id, map)?)?;
            created.push(id);
        }
        for _ in 0..request.num_random_zoned {
            let id = self.allocate_id(config.id_space, rng)?;
            self.add_zoned(random_zoned(id, now, map, rng))?;
            created.push(id);
        }
        for _ in 0..request.num_random_beacon {
            let id = self.allocate_id(config.id_space, rng)?;
            self.add_beacon(random_beacon(id, now, map, rng))?;
            created.push(id);
        }
        Ok(())
    }

    /// Remove an objective of either kind.
    pub fn remove(&mut self, id: u32) -> Option<Objective> {
        if !self.ids.remove(&id) {
            return None;
        }
        if let Some(idx) = self.zoned.iter().position(|z| z.id == id) {
            return Some(Objective::Zoned(self.zoned.remove(idx)));
        }
        if let Some(idx) = self.beacons.iter().position(|b| b.id == id) {
            return Some(Objective::Beacon(self.beacons.remove(idx)));
        }
        None
    }

    /// Score a guess of a beacon's position.
    ///
    /// Every counted guess increments `attempts_made`; a successful one also
    /// removes the beacon. Once all attempts are spent further guesses are
    /// not counted and the beacon stays listed.
    pub fn guess_beacon(&mut self, id: u32, guess: Vec2, config: &SimConfig) -> GuessOutcome {
        let Some(idx) = self.beacons.iter().position(|b| b.id == id) else {
            return GuessOutcome::NotFound;
        };
        let beacon = &mut self.beacons[idx];
        if beacon.attempts_made >= config.max_guess_attempts {
            return GuessOutcome::AttemptsExhausted {
                guesses_used: beacon.attempts_made,
            };
        }

        beacon.attempts_made += 1;
        let guesses_used = beacon.attempts_made;
        let distance = unwrapped_distance(beacon.position, guess, config.map());
        if distance <= config.beacon_guess_tolerance {
            log::info!("Beacon {id} found after {guesses_used} guess(es)");
            self.beacons.remove(idx);
            self.ids.remove(&id);
            GuessOutcome::Success {
                distance,
                guesses_used,
            }
        } else {
            log::info!("Beacon {id} missed by {distance:.1} (guess {guesses_used})");
            GuessOutcome::Failure {
                distance,
                guesses_used,
            }
        }
    }

    /// Remove objectives whose window closed before `now`.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Vec<Objective> {
        let mut removed = Vec::new();
        self.zoned.retain(|z| {
            if z.end < now {
                removed.push(Objective::Zoned(z.clone()));
                false
            } else {
                true
            }
        });
        self.beacons.retain(|b| {
            if b.end < now {
                removed.push(Objective::Beacon(b.clone()));
                false
            } else {
                true
            }
        });
        for objective in &removed {
            self.ids.remove(&objective.id());
            log::info!("Objective {} ({}) expired", objective.id(), objective.name());
        }
        removed
    }

    /// Active beacons within detection range of `position`, with their true
    /// distance.
    pub fn beacons_in_range(
        &self,
        now: DateTime<Utc>,
        position: Vec2,
        config: &SimConfig,
    ) -> Vec<(u32, f64)> {
        let map = config.map();
        self.beacons
            .iter()
            .filter(|b| b.is_active(now))
            .filter_map(|b| {
                let d = unwrapped_distance(b.position, position, map);
                (d <= config.beacon_detect_range).then_some((b.id, d))
            })
            .collect()
    }

    pub fn listing(&self) -> ObjectiveListing {
        ObjectiveListing {
            zoned_objectives: self.zoned.iter().map(ZonedObjective::info).collect(),
            beacon_objectives: self.beacons.iter().map(BeaconObjective::info).collect(),
        }
    }

    fn listing_of(&self, ids: &[u32]) -> ObjectiveListing {
        ObjectiveListing {
            zoned_objectives: self
                .zoned
                .iter()
                .filter(|z| ids.contains(&z.id))
                .map(ZonedObjective::info)
                .collect(),
            beacon_objectives: self
                .beacons
                .iter()
                .filter(|b| ids.contains(&b.id))
                .map(BeaconObjective::info)
                .collect(),
        }
    }

    pub fn clear(&mut self) {
        self.zoned.clear();
        self.beacons.clear();
        self.ids.clear();
    }

    /// Whether the id index matches the stored objectives exactly, with no
    /// id used twice and none outside `1..=id_space`.
    pub fn is_consistent(&self, id_space: u32) -> bool {
        let stored: BTreeSet<u32> = self
            .zoned
            .iter()
            .map(|z| z.id)
            .chain(self.beacons.iter().map(|b| b.id))
            .collect();
        stored.len() == self.zoned.len() + self.beacons.len()
            && stored == self.ids
            && stored.iter().all(|&id| (1..=id_space).contains(&id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objectives::{BeaconSpec, ZonedSpec};
    use crate::state::CameraAngle;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 25, 11, 30, 0).unwrap()
    }

    fn beacon_at(id: u32, x: f64, y: f64) -> BeaconObjective {
        BeaconObjective {
            id,
            name: format!("EBT {id}"),
            start: now(),
            end: now() + Duration::hours(4),
            decrease_rate: 0.99,
            attempts_made: 0,
            description: String::new(),
            position: Vec2::new(x, y),
        }
    }

    fn beacon_spec(id: Option<u32>) -> BeaconSpec {
        BeaconSpec {
            id,
            name: "EBT manual".into(),
            start: now(),
            end: now() + Duration::hours(1),
            decrease_rate: 0.99,
            description: String::new(),
            width: 500.0,
            height: 500.0,
        }
    }

    #[test]
    fn test_random_creation_unique_ids() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let mut reg = ObjectiveRegistry::new();
        let mut ids = reg.create_random_beacons(50, now(), &config, &mut rng).unwrap();
        ids.extend(reg.create_random_zoned(50, now(), &config, &mut rng).unwrap());
        let unique: BTreeSet<u32> = ids.iter().copied().collect();
        assert_eq!(unique.len(), 100);
        assert_eq!(reg.len(), 100);
        assert!(ids.iter().all(|id| (1..=config.id_space).contains(id)));
    }

    #[test]
    fn test_allocation_fills_small_space() {
        let config = SimConfig {
            id_space: 5,
            ..SimConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let mut reg = ObjectiveRegistry::new();
        let mut ids = reg.create_random_beacons(5, now(), &config, &mut rng).unwrap();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            reg.allocate_id(config.id_space, &mut rng),
            Err(ObjectiveError::IdSpaceExhausted(5))
        );
    }

    #[test]
    fn test_guess_success_removes_beacon() {
        let config = SimConfig::default();
        let mut reg = ObjectiveRegistry::new();
        reg.add_beacon(beacon_at(7, 1000.0, 2000.0)).unwrap();
        let outcome = reg.guess_beacon(7, Vec2::new(1050.0, 2000.0), &config);
        assert_eq!(
            outcome,
            GuessOutcome::Success {
                distance: 50.0,
                guesses_used: 1
            }
        );
        assert!(reg.beacons().is_empty());
        assert!(!reg.contains(7));
        assert_eq!(reg.guess_beacon(7, Vec2::ZERO, &config), GuessOutcome::NotFound);
    }

    #[test]
    fn test_guess_across_edge() {
        let config = SimConfig::default();
        let mut reg = ObjectiveRegistry::new();
        reg.add_beacon(beacon_at(3, 10.0, 10.0)).unwrap();
        let outcome = reg.guess_beacon(3, Vec2::new(21590.0, 10.0), &config);
        assert!(matches!(outcome, GuessOutcome::Success { .. }));
    }

    #[test]
    fn test_guesses_exhaust() {
        let config = SimConfig::default();
        let mut reg = ObjectiveRegistry::new();
        reg.add_beacon(beacon_at(4, 1000.0, 1000.0)).unwrap();
        for n in 1..=3 {
            let outcome = reg.guess_beacon(4, Vec2::new(5000.0, 5000.0), &config);
            assert!(
                matches!(outcome, GuessOutcome::Failure { guesses_used, .. } if guesses_used == n)
            );
        }
        assert_eq!(
            reg.guess_beacon(4, Vec2::new(1000.0, 1000.0), &config),
            GuessOutcome::AttemptsExhausted { guesses_used: 3 }
        );
        assert_eq!(reg.beacon_by_id(4).map(|b| b.attempts_made), Some(3));
        assert_eq!(reg.listing().beacon_objectives.len(), 1);
    }

    #[test]
    fn test_manual_duplicate_and_range() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        let mut reg = ObjectiveRegistry::new();
        let request = CreateObjectivesRequest {
            beacon_objectives: vec![beacon_spec(Some(42))],
            ..Default::default()
        };
        let listing = reg
            .create_objectives(request.clone(), now(), &config, &mut rng)
            .unwrap();
        assert_eq!(listing.beacon_objectives[0].id, 42);
        assert_eq!(
            reg.create_objectives(request, now(), &config, &mut rng),
            Err(ObjectiveError::DuplicateId(42))
        );

        let request = CreateObjectivesRequest {
            beacon_objectives: vec![beacon_spec(Some(config.id_space + 1))],
            ..Default::default()
        };
        assert_eq!(
            reg.create_objectives(request, now(), &config, &mut rng),
            Err(ObjectiveError::IdOutOfRange(config.id_space + 1, config.id_space))
        );
    }

    #[test]
    fn test_failed_request_rolls_back() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(6);
        let mut reg = ObjectiveRegistry::new();
        let zone = ZonedSpec {
            id: None,
            name: "Precise Picture manual".into(),
            start: now(),
            end: now() + Duration::hours(2),
            decrease_rate: 0.99,
            zone: [21300, 0, 300, 600],
            optic_required: CameraAngle::Narrow,
            coverage_required: 1.0,
            description: String::new(),
            secret: true,
        };
        let bad_beacon = BeaconSpec {
            end: now(),
            ..beacon_spec(None)
        };
        let request = CreateObjectivesRequest {
            zoned_objectives: vec![zone],
            beacon_objectives: vec![beacon_spec(None), bad_beacon],
            num_random_beacon: 3,
            ..Default::default()
        };
        assert_eq!(
            reg.create_objectives(request, now(), &config, &mut rng),
            Err(ObjectiveError::InvalidWindow)
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn test_empty_request() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(8);
        let mut reg = ObjectiveRegistry::new();
        assert_eq!(
            reg.create_objectives(CreateObjectivesRequest::default(), now(), &config, &mut rng),
            Err(ObjectiveError::NothingCreated)
        );
    }

    #[test]
    fn test_expiry() {
        let mut reg = ObjectiveRegistry::new();
        reg.add_beacon(beacon_at(1, 0.0, 0.0)).unwrap();
        let mut late = beacon_at(2, 0.0, 0.0);
        late.end = now() + Duration::hours(10);
        reg.add_beacon(late).unwrap();

        assert!(reg.expire(now() + Duration::hours(4)).is_empty());
        let removed = reg.expire(now() + Duration::hours(5));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].id(), 1);
        assert!(!reg.contains(1));
        assert!(reg.contains(2));
    }

    #[test]
    fn test_beacons_in_range() {
        let config = SimConfig::default();
        let mut reg = ObjectiveRegistry::new();
        reg.add_beacon(beacon_at(1, 100.0, 100.0)).unwrap();
        reg.add_beacon(beacon_at(2, 9000.0, 100.0)).unwrap();
        let mut future = beacon_at(3, 120.0, 100.0);
        future.start = now() + Duration::hours(1);
        reg.add_beacon(future).unwrap();

        let hits = reg.beacons_in_range(now(), Vec2::new(21500.0, 100.0), &config);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, 1);
        assert!((hits[0].1 - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_either_kind() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(9);
        let mut reg = ObjectiveRegistry::new();
        let zoned = reg.create_random_zoned(1, now(), &config, &mut rng).unwrap();
        reg.add_beacon(beacon_at(10_000, 0.0, 0.0)).unwrap();
        assert!(matches!(reg.remove(zoned[0]), Some(Objective::Zoned(_))));
        assert!(matches!(reg.remove(10_000), Some(Objective::Beacon(_))));
        assert!(reg.remove(10_000).is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_consistency_check() {
        let config = SimConfig::default();
        let mut rng = StdRng::seed_from_u64(12);
        let mut reg = ObjectiveRegistry::new();
        reg.create_random_zoned(2, now(), &config, &mut rng).unwrap();
        reg.add_beacon(beacon_at(7, 0.0, 0.0)).unwrap();
        assert!(reg.is_consistent(config.id_space));

        let mut stray_id = reg.clone();
        stray_id.ids.insert(config.id_space);
        assert!(!stray_id.is_consistent(config.id_space));

        let mut duplicate = reg.clone();
        duplicate.beacons.push(beacon_at(7, 10.0, 10.0));
        assert!(!duplicate.is_consistent(config.id_space));

        assert!(!reg.is_consistent(6));
    }
}
