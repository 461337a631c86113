//! Touch surface: contact clustering and per-tick recognition.
//!
//! # Layout
//!
//! ```text
//! clusterer.rs - Clusterer: samples -> traces -> groups, resurrection, garbage collection
//! group.rs     - Group: GroupState plus its GroupArbiter
//! timer.rs     - TimerQueue: recognizer timer deadlines
//! surface.rs   - Surface: the tick driver
//! runner.rs    - SurfaceRunner: a Surface on its own thread
//! ```
//!
//! # Tick
//!
//! ```text
//! ContactBatch ─▶ registry updates ─▶ due timers ─▶ Clusterer::ingest
//!                                                        │
//!              garbage collection ◀─ timers queued ◀─ Group::process (touched groups)
//! ```

mod clusterer;
mod error;
mod group;
mod runner;
mod surface;
mod timer;

pub use clusterer::Clusterer;
pub use error::{Result, SurfaceError};
pub use group::Group;
pub use runner::{
    Clock, ManualClock, MonotonicClock, SurfaceInput, SurfaceRunner, IDLE_POLL_INTERVAL,
};
pub use surface::{Surface, TickSummary};
pub use timer::{TimerEntry, TimerQueue};
