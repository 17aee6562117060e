//! Tick driver thread.
//!
//! Calls [`SimulationEngine::step`] at absolute deadlines: each deadline is
//! the previous one plus the real tick period, so time spent inside a step
//! does not accumulate as drift. If the driver falls more than a few periods
//! behind it logs the overrun and resynchronises instead of bursting.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::SimulationEngine;

/// Poll interval while the time scale is 0.
const PAUSED_POLL: Duration = Duration::from_millis(50);
/// Periods of lag tolerated before the schedule is reset.
const MAX_LAG_PERIODS: u32 = 4;

pub struct TickDriver {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TickDriver {
    /// Spawn the driver thread for `engine`.
    pub fn start(engine: Arc<SimulationEngine>) -> io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("melvin-tick".into())
            .spawn(move || run(&engine, &flag))?;
        log::info!("Tick driver started");
        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                log::error!("Tick driver thread panicked");
            }
            log::info!("Tick driver stopped");
        }
    }
}

impl Drop for TickDriver {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(engine: &SimulationEngine, running: &AtomicBool) {
    let mut next = Instant::now();
    while running.load(Ordering::Acquire) {
        let Some(period) = engine.clock().real_period() else {
            thread::park_timeout(PAUSED_POLL);
            next = Instant::now();
            continue;
        };

        engine.step();
        next += period;

        let now = Instant::now();
        if now > next + period * MAX_LAG_PERIODS {
            log::warn!(
                "Tick driver overran by {:?}, resynchronising",
                now.duration_since(next)
            );
            next = now;
        }
        wait_until(next, running);
    }
}

/// Park until `deadline` or until stopped.
fn wait_until(deadline: Instant, running: &AtomicBool) {
    loop {
        let now = Instant::now();
        if now >= deadline || !running.load(Ordering::Acquire) {
            return;
        }
        thread::park_timeout(deadline - now);
    }
}
