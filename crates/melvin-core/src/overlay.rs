//! Zone overlay sink.
//!
//! Zoned objectives are drawn onto a map by some external renderer. The
//! engine tells it which in-bounds tiles to mark when a zone is created and
//! which marker to remove when the zone goes away. Tiles are already split
//! at the map edges, so the renderer never deals with wrapping.

use std::sync::{Arc, Mutex};

use melvin_logic::geometry::MapRect;

use crate::lock;

/// Handle of a drawn zone marker.
pub type OverlayId = u64;

pub trait ZoneOverlay: Send {
    /// Draw the tiles of objective `objective_id`.
    fn mark(&mut self, objective_id: u32, tiles: &[MapRect]) -> OverlayId;
    /// Remove a marker returned by [`ZoneOverlay::mark`].
    fn unmark(&mut self, overlay: OverlayId);
}

/// Overlay that draws nothing but still hands out distinct handles.
#[derive(Debug, Default)]
pub struct NullOverlay {
    next: OverlayId,
}

impl ZoneOverlay for NullOverlay {
    fn mark(&mut self, _objective_id: u32, _tiles: &[MapRect]) -> OverlayId {
        self.next += 1;
        self.next
    }

    fn unmark(&mut self, _overlay: OverlayId) {}
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkedZone {
    pub overlay: OverlayId,
    pub objective_id: u32,
    pub tiles: Vec<MapRect>,
}

/// Overlay keeping the live markers in memory.
///
/// Clones share the same state, so a caller can hand one clone to the engine
/// and inspect the other.
#[derive(Debug, Clone, Default)]
pub struct RecordingOverlay {
    inner: Arc<Mutex<RecordingState>>,
}

#[derive(Debug, Default)]
struct RecordingState {
    next: OverlayId,
    marked: Vec<MarkedZone>,
    unmarked: Vec<OverlayId>,
}

impl RecordingOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Markers currently drawn.
    pub fn marked(&self) -> Vec<MarkedZone> {
        lock(&self.inner).marked.clone()
    }

    /// Handles removed so far, in order.
    pub fn unmarked(&self) -> Vec<OverlayId> {
        lock(&self.inner).unmarked.clone()
    }

    pub fn marker_for(&self, objective_id: u32) -> Option<MarkedZone> {
        lock(&self.inner)
            .marked
            .iter()
            .find(|m| m.objective_id == objective_id)
            .cloned()
    }
}

impl ZoneOverlay for RecordingOverlay {
    fn mark(&mut self, objective_id: u32, tiles: &[MapRect]) -> OverlayId {
        let mut state = lock(&self.inner);
        state.next += 1;
        let overlay = state.next;
        state.marked.push(MarkedZone {
            overlay,
            objective_id,
            tiles: tiles.to_vec(),
        });
        overlay
    }

    fn unmark(&mut self, overlay: OverlayId) {
        let mut state = lock(&self.inner);
        state.marked.retain(|m| m.overlay != overlay);
        state.unmarked.push(overlay);
    }
}
