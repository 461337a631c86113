//! The hit-test contract presented by listener collaborators.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique listener identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(u64);

impl TargetId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "target#{}", self.0)
    }
}

/// A hit-testable listener.
///
/// Implementations are queried from the tick thread only, but are shared
/// with application threads, hence `Send + Sync`.
pub trait Target: Send + Sync {
    /// Whether the point lies inside the target.
    fn contains_point(&self, x: f32, y: f32) -> bool;

    /// Squared distance from the point to the target (0 when inside).
    fn square_distance(&self, x: f32, y: f32) -> f32;
}

/// Axis-aligned rectangle target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectTarget {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectTarget {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

impl Target for RectTarget {
    fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    fn square_distance(&self, x: f32, y: f32) -> f32 {
        let dx = (self.x - x).max(0.0).max(x - (self.x + self.width));
        let dy = (self.y - y).max(0.0).max(y - (self.y + self.height));
        dx * dx + dy * dy
    }
}
