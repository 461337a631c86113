//! The recognizer contract.
//!
//! A recognizer watches the traces of one group and decides whether its
//! gesture is happening. It never delivers anything itself: it declares a
//! result and emits events through its [`Context`], and the group's arbiter
//! decides whether those events ever reach a listener.

use crate::config::{ConfigId, Configuration};
use crate::event::{Emission, GestureEvent};
use crate::runtime::{RuntimeState, TimerRequest};
use crate::view::GroupView;
use std::any::TypeId;
use std::marker::PhantomData;
use tactus_contacts::{GroupState, Trace};
use tactus_targets::{Role, TargetId, TargetTable};

/// How a recognizer type binds to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// One instance per group; events reach listeners through group roles.
    Global,
    /// One instance per (group, target); events reach that target only.
    Local,
}

/// A gesture recognition policy.
pub trait Recognizer: Send + 'static {
    type Event: GestureEvent;
    type Config: Default + Clone + Send + Sync + 'static;

    const NAME: &'static str;
    const SCOPE: Scope = Scope::Global;

    fn new(config: Self::Config) -> Self;

    /// Called once per tick with the traces that changed in that tick.
    fn process(&mut self, cx: &mut Context<'_, '_, Self::Event>, traces: &[&Trace]);

    /// Called when a timer scheduled through [`Context::schedule_timer`] expires.
    fn timer_expired(&mut self, _cx: &mut Context<'_, '_, Self::Event>, _token: u64) {}
}

/// Handle a recognizer uses to report results and emit events.
pub struct Context<'c, 'v, E> {
    state: &'c mut RuntimeState,
    view: &'c GroupView<'v>,
    target: Option<TargetId>,
    _event: PhantomData<fn(E)>,
}

impl<'c, 'v, E: GestureEvent> Context<'c, 'v, E> {
    pub(crate) fn new(
        state: &'c mut RuntimeState,
        view: &'c GroupView<'v>,
        target: Option<TargetId>,
    ) -> Self {
        Self {
            state,
            view,
            target,
            _event: PhantomData,
        }
    }

    /// Settle the recognition result. Later calls are ignored.
    ///
    /// Failure also stops processing: the instance will not be called again.
    pub fn declare_result(&mut self, successful: bool, probability: f32) {
        self.state.declare_result(successful, probability);
    }

    /// Emit an event. Held back until the arbiter arms this instance.
    pub fn emit(&mut self, event: E, payload: serde_json::Value) {
        self.state.emit(Emission {
            code: event.code(),
            name: event.name(),
            timestamp_ms: self.view.now_ms,
            payload,
        });
    }

    /// Stop receiving ticks. A succeeded instance leaves the interpreting set.
    pub fn terminate(&mut self) {
        self.state.processing = false;
    }

    /// Ask for [`Recognizer::timer_expired`] to be called after `delay_ms`.
    pub fn schedule_timer(&mut self, delay_ms: u64, token: u64) {
        self.state.timers.push(TimerRequest { delay_ms, token });
    }

    pub fn is_recognizing(&self) -> bool {
        self.state.recognizing
    }

    pub fn is_armed(&self) -> bool {
        self.state.armed
    }

    /// Target of a Local instance; `None` for Global ones.
    pub fn target(&self) -> Option<TargetId> {
        self.target
    }

    pub fn group(&self) -> &GroupState {
        self.view.state
    }

    /// Every trace of the group, not only the ones that changed this tick.
    pub fn group_traces(&self) -> Vec<&'v Trace> {
        self.view.group_traces()
    }

    pub fn table(&self) -> &TargetTable {
        self.view.table
    }

    pub fn now_ms(&self) -> u64 {
        self.view.now_ms
    }
}

/// Object-safe face of a [`Recognizer`].
pub(crate) trait DynRecognizer: Send {
    fn process(
        &mut self,
        state: &mut RuntimeState,
        view: &GroupView<'_>,
        target: Option<TargetId>,
        traces: &[&Trace],
    );

    fn timer_expired(
        &mut self,
        state: &mut RuntimeState,
        view: &GroupView<'_>,
        target: Option<TargetId>,
        token: u64,
    );
}

struct Adapter<R>(R);

impl<R: Recognizer> DynRecognizer for Adapter<R> {
    fn process(
        &mut self,
        state: &mut RuntimeState,
        view: &GroupView<'_>,
        target: Option<TargetId>,
        traces: &[&Trace],
    ) {
        let mut cx = Context::<R::Event>::new(state, view, target);
        self.0.process(&mut cx, traces);
    }

    fn timer_expired(
        &mut self,
        state: &mut RuntimeState,
        view: &GroupView<'_>,
        target: Option<TargetId>,
        token: u64,
    ) {
        let mut cx = Context::<R::Event>::new(state, view, target);
        self.0.timer_expired(&mut cx, token);
    }
}

fn build<R: Recognizer>(configuration: &Configuration) -> Box<dyn DynRecognizer> {
    let config = match configuration.payload::<R::Config>() {
        Some(config) => config.clone(),
        None => {
            tracing::warn!(
                recognizer = R::NAME,
                config = %configuration.id(),
                "Configuration has the wrong type, using defaults"
            );
            R::Config::default()
        }
    };
    Box::new(Adapter(R::new(config)))
}

fn role_of<R: Recognizer>(code: u16) -> Option<Role> {
    R::Event::from_code(code).map(|event| event.role())
}

fn codes<R: Recognizer>() -> Vec<u16> {
    R::Event::ALL.iter().map(|event| event.code()).collect()
}

/// Type-erased descriptor of a recognizer type.
#[derive(Clone, Copy)]
pub struct RecognizerType {
    id: TypeId,
    name: &'static str,
    scope: Scope,
    build: fn(&Configuration) -> Box<dyn DynRecognizer>,
    role_of: fn(u16) -> Option<Role>,
    codes: fn() -> Vec<u16>,
}

impl RecognizerType {
    pub fn of<R: Recognizer>() -> Self {
        Self {
            id: TypeId::of::<R>(),
            name: R::NAME,
            scope: R::SCOPE,
            build: build::<R>,
            role_of: role_of::<R>,
            codes: codes::<R>,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn role_of(&self, code: u16) -> Option<Role> {
        (self.role_of)(code)
    }

    pub fn codes(&self) -> Vec<u16> {
        (self.codes)()
    }

    pub(crate) fn build(&self, configuration: &Configuration) -> Box<dyn DynRecognizer> {
        (self.build)(configuration)
    }
}

impl PartialEq for RecognizerType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecognizerType {}

impl std::fmt::Debug for RecognizerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerType")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .finish()
    }
}

/// `(recognizer type, configuration)` pair that instances and priorities hang off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecognizerKey {
    recognizer: TypeId,
    config: ConfigId,
}

impl RecognizerKey {
    pub fn new(kind: &RecognizerType, configuration: &Configuration) -> Self {
        Self {
            recognizer: kind.id,
            config: configuration.id(),
        }
    }

    pub fn of<R: Recognizer>(configuration: &Configuration) -> Self {
        Self {
            recognizer: TypeId::of::<R>(),
            config: configuration.id(),
        }
    }

    pub fn config(&self) -> ConfigId {
        self.config
    }
}
