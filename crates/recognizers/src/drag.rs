//! Drag: a target is pressed and moved.
//!
//! Register with a local role that does not shrink as the fingers move, e.g.
//! `Configuration::new(DragConfig::default()).with_local_role(Role::Initial)`;
//! with the default intersection role the instance is dropped as soon as a
//! finger leaves its target.

use crate::last_centroid;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tactus_contacts::Trace;
use tactus_recognition::{Context, GestureEvent, Recognizer, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DragEvent {
    DragStart,
    Drag,
    DragEnd,
}

impl GestureEvent for DragEvent {
    const ALL: &'static [Self] = &[DragEvent::DragStart, DragEvent::Drag, DragEvent::DragEnd];

    fn code(&self) -> u16 {
        *self as u16
    }

    fn name(&self) -> &'static str {
        match self {
            DragEvent::DragStart => "drag_start",
            DragEvent::Drag => "drag",
            DragEvent::DragEnd => "drag_end",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragConfig {
    /// Travel needed before the drag is recognized.
    pub min_travel: f32,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self { min_travel: 0.03 }
    }
}

/// Local recognizer: one instance per pressed target.
#[derive(Debug)]
pub struct DragRecognizer {
    config: DragConfig,
    origin: Option<(f32, f32)>,
    last: (f32, f32),
}

impl DragRecognizer {
    fn offsets(&self, x: f32, y: f32) -> serde_json::Value {
        let (ox, oy) = self.origin.unwrap_or((x, y));
        json!({
            "x": x,
            "y": y,
            "dx": x - self.last.0,
            "dy": y - self.last.1,
            "total_dx": x - ox,
            "total_dy": y - oy,
        })
    }
}

impl Recognizer for DragRecognizer {
    type Event = DragEvent;
    type Config = DragConfig;

    const NAME: &'static str = "drag";
    const SCOPE: Scope = Scope::Local;

    fn new(config: DragConfig) -> Self {
        Self {
            config,
            origin: None,
            last: (0.0, 0.0),
        }
    }

    fn process(&mut self, cx: &mut Context<'_, '_, DragEvent>, _traces: &[&Trace]) {
        let traces = cx.group_traces();
        let (x, y) = last_centroid(&traces);

        if cx.is_recognizing() {
            if self.origin.is_none() {
                let first: Vec<(f32, f32)> =
                    traces.iter().map(|t| (t.first().x, t.first().y)).collect();
                let n = first.len().max(1) as f32;
                let (sx, sy) = first
                    .iter()
                    .fold((0.0_f32, 0.0_f32), |(ax, ay), &(fx, fy)| (ax + fx, ay + fy));
                self.origin = Some((sx / n, sy / n));
                self.last = (sx / n, sy / n);
            }
            if !cx.group().is_alive() {
                cx.declare_result(false, 0.0);
                return;
            }
            if traces.iter().all(|t| t.max_travel() < self.config.min_travel) {
                return;
            }
            cx.declare_result(true, 1.0);
            let payload = self.offsets(x, y);
            cx.emit(DragEvent::DragStart, payload);
            self.last = (x, y);
            return;
        }

        let payload = self.offsets(x, y);
        self.last = (x, y);
        if cx.group().is_alive() {
            cx.emit(DragEvent::Drag, payload);
        } else {
            cx.emit(DragEvent::DragEnd, payload);
            cx.terminate();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_codes_follow_declaration_order() {
        let names: Vec<_> = DragEvent::ALL.iter().map(|e| (e.code(), e.name())).collect();
        assert_eq!(names, vec![(0, "drag_start"), (1, "drag"), (2, "drag_end")]);
    }

    #[test]
    fn test_offsets_are_relative_to_last_and_origin() {
        let mut drag = DragRecognizer::new(DragConfig::default());
        drag.origin = Some((0.0, 0.0));
        drag.last = (0.1, 0.0);
        let payload = drag.offsets(0.25, 0.5);
        assert_eq!(payload["total_dx"], json!(0.25));
        assert_eq!(payload["dy"], json!(0.5));
    }
}
