//! Gesture recognition core: recognizers, their registry, and arbitration.
//!
//! # Layout
//!
//! ```text
//! event.rs      - GestureEvent trait, Emission, Gesture / RawGesture notifications
//! config.rs     - Configuration: recognizer payload, exclusivity, local role
//! recognizer.rs - Recognizer trait, Context, type erasure (RecognizerType, RecognizerKey)
//! runtime.rs    - RecognizerRuntime: result state machine, buffer-until-armed, subscriptions
//! registry.rs   - RecognitionRegistry: listener registrations, priorities, update stream
//! arbiter.rs    - GroupArbiter: priority-tier competition for one group
//! view.rs       - GroupView: what a recognizer can see of its group
//! ```
//!
//! # Flow
//!
//! ```text
//! Surface tick ─▶ GroupArbiter::process ─▶ RecognizerRuntime ─▶ Recognizer::process
//!                        │                                         │ emit / declare_result
//!                        ◀──────────── outcome, buffered events ───┘
//!                        └─▶ winners armed ─▶ RecognitionRegistry::dispatch ─▶ listener callbacks
//! ```

mod arbiter;
mod config;
mod error;
mod event;
mod recognizer;
mod registry;
mod runtime;
mod view;

pub use arbiter::{GroupArbiter, ScheduledTimer};
pub use config::{ConfigId, Configuration};
pub use error::{RegistryError, Result};
pub use event::{Emission, Gesture, GestureEvent, RawGesture};
pub use recognizer::{Context, Recognizer, RecognizerKey, RecognizerType, Scope};
pub use registry::{Binding, RecognitionRegistry, RegistryUpdate, DEFAULT_PRIORITY};
pub use runtime::{Outcome, RecognizerRuntime, RuntimeId, RuntimeState, TimerRequest};
pub use view::GroupView;
