//! Hold: fingers stay down and still for a while.

use crate::last_centroid;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tactus_contacts::Trace;
use tactus_recognition::{Context, GestureEvent, Recognizer};
use tactus_targets::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HoldEvent {
    Hold,
}

impl GestureEvent for HoldEvent {
    const ALL: &'static [Self] = &[HoldEvent::Hold];

    fn code(&self) -> u16 {
        0
    }

    fn name(&self) -> &'static str {
        "hold"
    }

    fn role(&self) -> Role {
        Role::Current
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HoldConfig {
    pub hold_ms: u64,
    pub max_travel: f32,
}

impl Default for HoldConfig {
    fn default() -> Self {
        Self {
            hold_ms: 500,
            max_travel: 0.02,
        }
    }
}

const HELD: u64 = 0;

/// Global recognizer delivering `Hold` to the listeners currently under the group.
#[derive(Debug)]
pub struct HoldRecognizer {
    config: HoldConfig,
    scheduled: bool,
}

impl Recognizer for HoldRecognizer {
    type Event = HoldEvent;
    type Config = HoldConfig;

    const NAME: &'static str = "hold";

    fn new(config: HoldConfig) -> Self {
        Self {
            config,
            scheduled: false,
        }
    }

    fn process(&mut self, cx: &mut Context<'_, '_, HoldEvent>, traces: &[&Trace]) {
        if !cx.is_recognizing() {
            return;
        }
        if !self.scheduled {
            self.scheduled = true;
            cx.schedule_timer(self.config.hold_ms, HELD);
        }
        let lifted = traces.iter().any(|t| !t.is_alive());
        let moved = traces.iter().any(|t| t.max_travel() > self.config.max_travel);
        if lifted || moved {
            tracing::trace!(lifted, moved, "Hold broken");
            cx.declare_result(false, 0.0);
        }
    }

    fn timer_expired(&mut self, cx: &mut Context<'_, '_, HoldEvent>, token: u64) {
        if token != HELD || !cx.is_recognizing() {
            return;
        }
        if !cx.group().is_alive() {
            cx.declare_result(false, 0.0);
            return;
        }
        let traces = cx.group_traces();
        let (x, y) = last_centroid(&traces);
        cx.declare_result(true, 1.0);
        cx.emit(
            HoldEvent::Hold,
            json!({ "x": x, "y": y, "fingers": traces.len(), "held_ms": self.config.hold_ms }),
        );
        cx.terminate();
    }
}
