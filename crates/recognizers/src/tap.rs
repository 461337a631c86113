//! Tap: every finger of the group lands and lifts quickly without moving.

use crate::last_centroid;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tactus_contacts::Trace;
use tactus_recognition::{Context, GestureEvent, Recognizer};
use tactus_targets::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapEvent {
    Tap,
}

impl GestureEvent for TapEvent {
    const ALL: &'static [Self] = &[TapEvent::Tap];

    fn code(&self) -> u16 {
        0
    }

    fn name(&self) -> &'static str {
        "tap"
    }

    fn role(&self) -> Role {
        Role::Final
    }
}

/// Thresholds for [`TapRecognizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapConfig {
    /// Longest time between the first touch and the last lift.
    pub max_duration_ms: u64,
    /// Farthest any finger may travel from where it landed.
    pub max_travel: f32,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: 300,
            max_travel: 0.02,
        }
    }
}

const EXPIRY: u64 = 0;

/// Global recognizer delivering `Tap` to the group's final listeners.
#[derive(Debug)]
pub struct TapRecognizer {
    config: TapConfig,
    started_ms: Option<u64>,
}

impl Recognizer for TapRecognizer {
    type Event = TapEvent;
    type Config = TapConfig;

    const NAME: &'static str = "tap";

    fn new(config: TapConfig) -> Self {
        Self {
            config,
            started_ms: None,
        }
    }

    fn process(&mut self, cx: &mut Context<'_, '_, TapEvent>, _traces: &[&Trace]) {
        if !cx.is_recognizing() {
            return;
        }
        let traces = cx.group_traces();
        let started_ms = match self.started_ms {
            Some(started) => started,
            None => {
                let started = traces
                    .iter()
                    .map(|t| t.started_ms())
                    .min()
                    .unwrap_or_else(|| cx.now_ms());
                self.started_ms = Some(started);
                cx.schedule_timer(self.config.max_duration_ms.saturating_add(1), EXPIRY);
                started
            }
        };

        let duration_ms = cx.now_ms().saturating_sub(started_ms);
        if duration_ms > self.config.max_duration_ms {
            tracing::trace!(duration_ms, "Tap too slow");
            cx.declare_result(false, 0.0);
            return;
        }
        if traces.iter().any(|t| t.max_travel() > self.config.max_travel) {
            tracing::trace!("Tap moved too far");
            cx.declare_result(false, 0.0);
            return;
        }
        if cx.group().is_alive() {
            return;
        }

        let (x, y) = last_centroid(&traces);
        cx.declare_result(true, 1.0);
        cx.emit(
            TapEvent::Tap,
            json!({ "x": x, "y": y, "fingers": traces.len(), "duration_ms": duration_ms }),
        );
        cx.terminate();
    }

    fn timer_expired(&mut self, cx: &mut Context<'_, '_, TapEvent>, token: u64) {
        if token == EXPIRY && cx.is_recognizing() {
            cx.declare_result(false, 0.0);
        }
    }
}
