//! Reference recognizers built on the public recognizer contract.
//!
//! ```text
//! tap.rs  - TapRecognizer  (Global, Tap -> final listeners)
//! hold.rs - HoldRecognizer (Global, Hold -> current listeners, timer driven)
//! drag.rs - DragRecognizer (Local, DragStart / Drag / DragEnd -> own target)
//! ```

mod drag;
mod hold;
mod tap;

pub use drag::{DragConfig, DragEvent, DragRecognizer};
pub use hold::{HoldConfig, HoldEvent, HoldRecognizer};
pub use tap::{TapConfig, TapEvent, TapRecognizer};

use tactus_contacts::Trace;

/// Mean position of the latest sample of each trace.
pub(crate) fn last_centroid(traces: &[&Trace]) -> (f32, f32) {
    if traces.is_empty() {
        return (0.0, 0.0);
    }
    let (sx, sy) = traces
        .iter()
        .fold((0.0_f32, 0.0_f32), |(x, y), t| (x + t.last().x, y + t.last().y));
    let n = traces.len() as f32;
    (sx / n, sy / n)
}
