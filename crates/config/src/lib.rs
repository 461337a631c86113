//! Surface settings.
//!
//! Numeric thresholds that drive contact clustering and trace resurrection,
//! plus the process-wide aggregation mode used when per-trace target lists
//! are combined into group-level lists.
//!
//! Settings are supplied once at startup and never change afterwards. The
//! aggregation mode has no default: callers must choose it explicitly, either
//! through [`Settings::new`] or through the `aggregation` field of a settings
//! document.

mod error;

pub use error::{ConfigError, Result};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Maximum distance between a new contact and a group for it to join the group.
pub const DEFAULT_GROUPING_SPACE: f32 = 0.2;

/// Window (ms) within which traces starting or ending count as simultaneous.
pub const DEFAULT_GROUPING_SYNCH_TIME_MS: u64 = 200;

/// Maximum distance between a lifted contact and a new one for resurrection.
pub const DEFAULT_TRACE_SPACE_GAP: f32 = 0.1;

/// Maximum time (ms) a dead trace or group stays resurrectable.
pub const DEFAULT_TRACE_TIME_GAP_MS: u64 = 500;

/// How per-trace target lists combine into group lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    /// A target belongs to the group as soon as any trace is over it.
    Union,
    /// A target belongs to the group only while every live trace is over it.
    Intersection,
}

impl Aggregation {
    pub fn label(&self) -> &'static str {
        match self {
            Aggregation::Union => "union",
            Aggregation::Intersection => "intersection",
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Aggregation {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "union" => Ok(Aggregation::Union),
            "intersection" => Ok(Aggregation::Intersection),
            other => Err(ConfigError::UnknownAggregation(other.to_string())),
        }
    }
}

fn default_grouping_space() -> f32 {
    DEFAULT_GROUPING_SPACE
}

fn default_grouping_synch_time_ms() -> u64 {
    DEFAULT_GROUPING_SYNCH_TIME_MS
}

fn default_trace_space_gap() -> f32 {
    DEFAULT_TRACE_SPACE_GAP
}

fn default_trace_time_gap_ms() -> u64 {
    DEFAULT_TRACE_TIME_GAP_MS
}

/// Clustering and resurrection thresholds.
///
/// Distances are in surface units (normalized coordinates for most
/// transports), times in milliseconds on the transport clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_grouping_space")]
    pub grouping_space: f32,

    #[serde(default = "default_grouping_synch_time_ms")]
    pub grouping_synch_time_ms: u64,

    #[serde(default = "default_trace_space_gap")]
    pub trace_space_gap: f32,

    #[serde(default = "default_trace_time_gap_ms")]
    pub trace_time_gap_ms: u64,

    /// Required, no serde default.
    pub aggregation: Aggregation,
}

impl Settings {
    /// Default thresholds with an explicit aggregation mode.
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            grouping_space: DEFAULT_GROUPING_SPACE,
            grouping_synch_time_ms: DEFAULT_GROUPING_SYNCH_TIME_MS,
            trace_space_gap: DEFAULT_TRACE_SPACE_GAP,
            trace_time_gap_ms: DEFAULT_TRACE_TIME_GAP_MS,
            aggregation,
        }
    }

    /// Parse and validate a JSON settings document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse, and validate a JSON settings file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_json_str(&json)?;
        tracing::debug!(
            path = %path.display(),
            aggregation = %settings.aggregation,
            grouping_space = settings.grouping_space,
            trace_time_gap_ms = settings.trace_time_gap_ms,
            "Loaded surface settings"
        );
        Ok(settings)
    }

    /// Check that every threshold is finite and strictly positive.
    pub fn validate(&self) -> Result<()> {
        check_distance("grouping_space", self.grouping_space)?;
        check_distance("trace_space_gap", self.trace_space_gap)?;
        check_duration("grouping_synch_time_ms", self.grouping_synch_time_ms)?;
        check_duration("trace_time_gap_ms", self.trace_time_gap_ms)?;
        Ok(())
    }

    pub fn grouping_space_sq(&self) -> f32 {
        self.grouping_space * self.grouping_space
    }

    pub fn trace_space_gap_sq(&self) -> f32 {
        self.trace_space_gap * self.trace_space_gap
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }
}

fn check_distance(field: &'static str, value: f32) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold {
            field,
            value: value as f64,
        })
    }
}

fn check_duration(field: &'static str, value: u64) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidThreshold { field, value: 0.0 })
    }
}
