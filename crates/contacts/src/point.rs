//! Contact samples and the per-tick ingestion batch.

use serde::{Deserialize, Serialize};

/// Transport-assigned contact (session) id.
///
/// Stable for the lifetime of one physical contact as seen by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(pub u64);

impl std::fmt::Display for PointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "point#{}", self.0)
    }
}

/// Lifecycle tag of a sample.
///
/// `Reset` never comes from the transport: it marks the first sample of a
/// resurrected trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Added,
    Updated,
    Removed,
    Reset,
}

impl Lifecycle {
    pub fn is_alive(&self) -> bool {
        !matches!(self, Lifecycle::Removed)
    }
}

/// One raw contact sample as delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContactSample {
    pub id: PointId,
    pub x: f32,
    pub y: f32,
    pub timestamp_ms: u64,
}

impl ContactSample {
    pub fn new(id: u64, x: f32, y: f32, timestamp_ms: u64) -> Self {
        Self {
            id: PointId(id),
            x,
            y,
            timestamp_ms,
        }
    }
}

/// Everything the transport saw during one refresh, partitioned by lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactBatch {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub added: Vec<ContactSample>,
    #[serde(default)]
    pub updated: Vec<ContactSample>,
    #[serde(default)]
    pub removed: Vec<ContactSample>,
}

impl ContactBatch {
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            ..Default::default()
        }
    }

    /// Add a new contact sampled at the batch timestamp.
    pub fn add(mut self, id: u64, x: f32, y: f32) -> Self {
        self.added
            .push(ContactSample::new(id, x, y, self.timestamp_ms));
        self
    }

    pub fn update(mut self, id: u64, x: f32, y: f32) -> Self {
        self.updated
            .push(ContactSample::new(id, x, y, self.timestamp_ms));
        self
    }

    pub fn remove(mut self, id: u64, x: f32, y: f32) -> Self {
        self.removed
            .push(ContactSample::new(id, x, y, self.timestamp_ms));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.updated.len() + self.removed.len()
    }
}

/// One sample of a trace, with kinematics derived from the previous sample.
///
/// Velocities are in units per millisecond; acceleration is the change of
/// speed per millisecond. All derived fields are zero on a trace's first
/// sample and whenever two samples share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub id: PointId,
    pub x: f32,
    pub y: f32,
    pub timestamp_ms: u64,
    pub x_vel: f32,
    pub y_vel: f32,
    pub speed: f32,
    pub accel: f32,
    pub lifecycle: Lifecycle,
}

impl Point {
    /// First sample of a trace.
    pub fn first(sample: &ContactSample, lifecycle: Lifecycle) -> Self {
        Self {
            id: sample.id,
            x: sample.x,
            y: sample.y,
            timestamp_ms: sample.timestamp_ms,
            x_vel: 0.0,
            y_vel: 0.0,
            speed: 0.0,
            accel: 0.0,
            lifecycle,
        }
    }

    /// Sample following `prev` on the same trace.
    pub fn following(prev: &Point, sample: &ContactSample, lifecycle: Lifecycle) -> Self {
        let dt = sample.timestamp_ms.saturating_sub(prev.timestamp_ms) as f32;
        let mut point = Self::first(sample, lifecycle);
        if dt > 0.0 {
            point.x_vel = (sample.x - prev.x) / dt;
            point.y_vel = (sample.y - prev.y) / dt;
            point.speed = point.x_vel.hypot(point.y_vel);
            point.accel = (point.speed - prev.speed) / dt;
        }
        point
    }

    pub fn square_distance(&self, x: f32, y: f32) -> f32 {
        let dx = self.x - x;
        let dy = self.y - y;
        dx * dx + dy * dy
    }
}
