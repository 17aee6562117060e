//! Beacon ping feed.
//!
//! While the satellite is in COMMS, the engine publishes one noisy distance
//! reading per active beacon in range, once per simulated minute. Subscribers
//! receive pings over `std::sync::mpsc` channels; a dropped receiver is
//! pruned on the next publish.

use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lock;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeaconPing {
    pub id: u32,
    /// Noisy distance reading.
    pub distance: f64,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for BeaconPing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID_{} DISTANCE_{:.2}", self.id, self.distance)
    }
}

#[derive(Debug, Default)]
pub struct PingFeed {
    subscribers: Mutex<Vec<Sender<BeaconPing>>>,
}

impl PingFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<BeaconPing> {
        let (tx, rx) = channel();
        lock(&self.subscribers).push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    /// Send `ping` to every live subscriber.
    pub fn publish(&self, ping: BeaconPing) {
        log::debug!("Ping {ping}");
        lock(&self.subscribers).retain(|tx| tx.send(ping).is_ok());
    }
}
