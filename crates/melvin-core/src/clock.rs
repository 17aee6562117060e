//! Simulation clock.
//!
//! Simulated time is `epoch + ticks * step`. The tick counter is the only
//! source of simulated time, so every reader agrees on "now" regardless of
//! how fast the driver is actually running.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};

#[derive(Debug)]
pub struct SimulationClock {
    epoch: DateTime<Utc>,
    step_millis: i64,
    ticks: AtomicU64,
    /// `f64` bits of the real-time speed multiplier.
    time_scale: AtomicU64,
}

impl SimulationClock {
    /// Clock starting at `epoch`, advancing `step_seconds` per tick.
    pub fn new(epoch: DateTime<Utc>, step_seconds: f64) -> Self {
        Self {
            epoch,
            step_millis: (step_seconds * 1000.0).round() as i64,
            ticks: AtomicU64::new(0),
            time_scale: AtomicU64::new(1.0f64.to_bits()),
        }
    }

    pub fn epoch(&self) -> DateTime<Utc> {
        self.epoch
    }

    pub fn step(&self) -> Duration {
        Duration::milliseconds(self.step_millis)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Current simulated time, pinned to the latest representable instant
    /// if the counter ever runs past it.
    pub fn now(&self) -> DateTime<Utc> {
        self.at_tick(self.ticks()).unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Simulated time at `tick`, `None` if it is not representable.
    pub fn at_tick(&self, tick: u64) -> Option<DateTime<Utc>> {
        let elapsed = i64::try_from(tick).ok()?.checked_mul(self.step_millis)?;
        self.epoch.checked_add_signed(Duration::try_milliseconds(elapsed)?)
    }

    /// Count one tick and return the new tick number.
    pub fn advance(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Restore the tick counter (used when loading a save).
    pub fn set_ticks(&self, ticks: u64) {
        self.ticks.store(ticks, Ordering::Release);
    }

    /// Simulated seconds per real second. Negative values clamp to 0.
    pub fn set_time_scale(&self, scale: f64) {
        let scale = if scale.is_finite() { scale.max(0.0) } else { 1.0 };
        self.time_scale.store(scale.to_bits(), Ordering::Release);
    }

    pub fn time_scale(&self) -> f64 {
        f64::from_bits(self.time_scale.load(Ordering::Acquire))
    }

    /// Real time between ticks at the current scale, `None` when paused.
    pub fn real_period(&self) -> Option<std::time::Duration> {
        let scale = self.time_scale();
        if scale <= 0.0 {
            return None;
        }
        let secs = self.step_millis as f64 / 1000.0 / scale;
        std::time::Duration::try_from_secs_f64(secs).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn clock() -> SimulationClock {
        SimulationClock::new(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(), 0.5)
    }

    #[test]
    fn test_clock_advances_by_step() {
        let c = clock();
        assert_eq!(c.now(), c.epoch());
        for _ in 0..120 {
            c.advance();
        }
        assert_eq!(c.ticks(), 120);
        assert_eq!(c.now() - c.epoch(), Duration::minutes(1));
    }

    #[test]
    fn test_unrepresentable_tick() {
        let c = clock();
        assert_eq!(c.at_tick(7200), Some(c.epoch() + Duration::hours(1)));
        assert_eq!(c.at_tick(u64::MAX / 2), None);
        assert_eq!(c.at_tick(u64::MAX), None);

        c.set_ticks(u64::MAX / 2);
        assert_eq!(c.now(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_time_scale() {
        let c = clock();
        assert_eq!(c.real_period(), Some(std::time::Duration::from_millis(500)));
        c.set_time_scale(10.0);
        assert_eq!(c.real_period(), Some(std::time::Duration::from_millis(50)));
        c.set_time_scale(-3.0);
        assert_eq!(c.time_scale(), 0.0);
        assert_eq!(c.real_period(), None);
    }

    #[test]
    fn test_set_ticks() {
        let c = clock();
        c.set_ticks(7200);
        assert_eq!(c.now() - c.epoch(), Duration::hours(1));
    }
}
