//! Toroidal map geometry.
//!
//! The map wraps at both edges: leaving on the right re-enters on the left,
//! leaving at the bottom re-enters at the top. Distances are therefore taken
//! along the shortest wrapped vector, so a satellite at the right edge and a
//! beacon at the left edge can be neighbours.
//!
//! Pure functions over plain values, no state.

use serde::{Deserialize, Serialize};

/// 2D vector in map coordinates (x = width axis, y = height axis).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// True if both axes differ by less than `eps`.
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        (self.x - other.x).abs() < eps && (self.y - other.y).abs() < eps
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

/// Size of the toroidal map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapSize {
    pub width: f64,
    pub height: f64,
}

impl MapSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Wrap a point onto the map.
    pub fn wrap(&self, p: Vec2) -> Vec2 {
        Vec2::new(wrap(p.x, self.width), wrap(p.y, self.height))
    }

    pub fn contains(&self, p: Vec2) -> bool {
        in_bounds(p, *self)
    }
}

/// `((v mod max) + max) mod max`, always in `[0, max)`.
pub fn wrap(v: f64, max: f64) -> f64 {
    if (0.0..max).contains(&v) {
        return v;
    }
    let w = ((v % max) + max) % max;
    // -tiny % max + max can round up to exactly max
    if w >= max {
        0.0
    } else {
        w
    }
}

/// Shortest vector from `a` to `b` on the torus.
///
/// Checks the nine images of `b` shifted by `(W·sx, H·sy)`, `sx, sy ∈ {-1, 0, 1}`.
pub fn shortest_vector(a: Vec2, b: Vec2, map: MapSize) -> Vec2 {
    let mut best = b - a;
    let mut best_len = best.length();
    for sx in [-1.0, 0.0, 1.0] {
        for sy in [-1.0, 0.0, 1.0] {
            let candidate = Vec2::new(b.x + map.width * sx, b.y + map.height * sy) - a;
            let len = candidate.length();
            if len < best_len {
                best = candidate;
                best_len = len;
            }
        }
    }
    best
}

/// Euclidean length of [`shortest_vector`].
pub fn unwrapped_distance(a: Vec2, b: Vec2, map: MapSize) -> f64 {
    shortest_vector(a, b, map).length()
}

/// Angle between two vectors in degrees, `[0, 180]`.
///
/// Degenerate (zero-length) vectors give 0.
pub fn angle_between(a: Vec2, b: Vec2) -> f64 {
    let denom = a.length() * b.length();
    if denom == 0.0 {
        return 0.0;
    }
    (a.dot(&b) / denom).clamp(-1.0, 1.0).acos().to_degrees()
}

pub fn in_bounds(p: Vec2, map: MapSize) -> bool {
    p.x >= 0.0 && p.x < map.width && p.y >= 0.0 && p.y < map.height
}

/// Axis-aligned rectangle fully inside the map, half-open on the far edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Split a rectangle given by its wrapped corners `[x1, y1, x2, y2]` into the
/// in-bounds pieces it covers.
///
/// A rectangle with `x2 < x1` wraps across the right edge, `y2 < y1` across
/// the bottom edge, so the result has one, two or four tiles.
pub fn wrapped_rect_tiles(zone: [f64; 4], map: MapSize) -> Vec<MapRect> {
    let [x1, y1, x2, y2] = zone;
    let spans = |lo: f64, hi: f64, max: f64| -> Vec<(f64, f64)> {
        if hi >= lo {
            vec![(lo, hi - lo)]
        } else {
            vec![(lo, max - lo), (0.0, hi)]
        }
    };

    let mut tiles = Vec::new();
    for (x, w) in spans(x1, x2, map.width) {
        for (y, h) in spans(y1, y2, map.height) {
            if w > 0.0 && h > 0.0 {
                tiles.push(MapRect {
                    x,
                    y,
                    width: w,
                    height: h,
                });
            }
        }
    }
    tiles
}
