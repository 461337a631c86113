//! Per-instance recognizer state machine.
//!
//! ```text
//! recognizing ──declare_result(true, p)──▶ succeeded(p)
//!      │
//!      └──────declare_result(false, _)──▶ failed (processing stops)
//!
//! processing ──terminate()──▶ terminated
//! unarmed ──arm() by the arbiter──▶ armed
//! ```
//!
//! Emissions made while unarmed are buffered and only reach listeners if the
//! arbiter later arms the instance.

use crate::config::Configuration;
use crate::event::Emission;
use crate::recognizer::{DynRecognizer, RecognizerKey, RecognizerType, Scope};
use crate::view::GroupView;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tactus_contacts::{RoleChanges, Trace};
use tactus_targets::{Role, TargetId, TargetList};

static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of one recognizer instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuntimeId(u64);

impl RuntimeId {
    fn next() -> Self {
        Self(NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for RuntimeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "recognizer#{}", self.0)
    }
}

/// Resolution of an instance as seen by the arbiter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// No result declared yet and still processing.
    Recognizing,
    Succeeded(f32),
    /// Declared failure, or stopped processing without declaring success.
    Failed,
}

/// Timer requested by a recognizer, relative to the tick that requested it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub delay_ms: u64,
    pub token: u64,
}

/// Mutable state shared between a recognizer and its arbiter.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    pub(crate) recognizing: bool,
    pub(crate) successful: bool,
    pub(crate) probability: f32,
    pub(crate) processing: bool,
    pub(crate) armed: bool,
    pub(crate) buffer: Vec<Emission>,
    pub(crate) outbox: Vec<Emission>,
    pub(crate) timers: Vec<TimerRequest>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            recognizing: true,
            successful: false,
            probability: 0.0,
            processing: true,
            armed: false,
            buffer: Vec::new(),
            outbox: Vec::new(),
            timers: Vec::new(),
        }
    }
}

impl RuntimeState {
    /// Settle the recognition result. Only the first call has any effect.
    pub(crate) fn declare_result(&mut self, successful: bool, probability: f32) -> bool {
        if !self.recognizing {
            return false;
        }
        self.recognizing = false;
        self.successful = successful;
        self.probability = probability.clamp(0.0, 1.0);
        if !successful {
            self.processing = false;
        }
        true
    }

    pub(crate) fn emit(&mut self, emission: Emission) {
        if self.armed {
            self.outbox.push(emission);
        } else {
            self.buffer.push(emission);
        }
    }

    /// Make emissions deliverable, flushing the buffer in emission order.
    pub(crate) fn arm(&mut self) {
        if self.armed {
            return;
        }
        self.armed = true;
        let buffered = std::mem::take(&mut self.buffer);
        self.outbox.extend(buffered);
    }

    pub fn outcome(&self) -> Outcome {
        match (self.recognizing, self.successful) {
            (true, _) if self.processing => Outcome::Recognizing,
            (true, _) => Outcome::Failed,
            (false, true) => Outcome::Succeeded(self.probability),
            (false, false) => Outcome::Failed,
        }
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

/// One live recognizer instance bound to a group.
pub struct RecognizerRuntime {
    id: RuntimeId,
    seq: u64,
    key: RecognizerKey,
    kind: RecognizerType,
    configuration: Configuration,
    priority: i32,
    target: Option<TargetId>,
    recognizer: Box<dyn DynRecognizer>,
    state: RuntimeState,
    subscriptions: BTreeMap<u16, TargetList>,
}

impl RecognizerRuntime {
    pub(crate) fn new(
        kind: RecognizerType,
        configuration: Configuration,
        priority: i32,
        target: Option<TargetId>,
        seq: u64,
    ) -> Self {
        let recognizer = kind.build(&configuration);
        Self {
            id: RuntimeId::next(),
            seq,
            key: RecognizerKey::new(&kind, &configuration),
            kind,
            configuration,
            priority,
            target,
            recognizer,
            state: RuntimeState::default(),
            subscriptions: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> RuntimeId {
        self.id
    }

    /// Creation order within the owning arbiter.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn key(&self) -> RecognizerKey {
        self.key
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn scope(&self) -> Scope {
        self.kind.scope()
    }

    pub fn is_local(&self) -> bool {
        self.kind.scope() == Scope::Local
    }

    pub fn is_exclusive(&self) -> bool {
        self.configuration.is_exclusive()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn set_priority(&mut self, priority: i32) {
        self.priority = priority;
    }

    /// Bound target of a Local instance.
    pub fn target(&self) -> Option<TargetId> {
        self.target
    }

    pub fn state(&self) -> &RuntimeState {
        &self.state
    }

    pub fn outcome(&self) -> Outcome {
        self.state.outcome()
    }

    /// Current listeners of a Global instance's event.
    pub fn subscribers(&self, code: u16) -> TargetList {
        self.subscriptions.get(&code).cloned().unwrap_or_default()
    }

    pub(crate) fn process(&mut self, view: &GroupView<'_>, traces: &[&Trace]) {
        if !self.state.processing {
            return;
        }
        self.recognizer
            .process(&mut self.state, view, self.target, traces);
    }

    pub(crate) fn timer_expired(&mut self, view: &GroupView<'_>, token: u64) {
        if !self.state.processing {
            return;
        }
        self.recognizer
            .timer_expired(&mut self.state, view, self.target, token);
    }

    pub(crate) fn arm(&mut self) {
        self.state.arm();
        tracing::debug!(
            recognizer = self.name(),
            runtime = %self.id,
            flushed = self.state.outbox.len(),
            "Recognizer armed"
        );
    }

    pub(crate) fn take_outbox(&mut self) -> Vec<Emission> {
        std::mem::take(&mut self.state.outbox)
    }

    pub(crate) fn take_timers(&mut self) -> Vec<TimerRequest> {
        std::mem::take(&mut self.state.timers)
    }

    /// Rebind a Global instance's events to the group's role lists.
    ///
    /// `registered(code)` yields the listeners registered for the event;
    /// roles not in `changes` keep their bindings (pass `None` to rebind all).
    pub(crate) fn resubscribe(
        &mut self,
        view: &GroupView<'_>,
        changes: Option<RoleChanges>,
        registered: impl Fn(u16) -> TargetList,
    ) {
        if self.is_local() {
            return;
        }
        for code in self.kind.codes() {
            let role = self.kind.role_of(code).unwrap_or(Role::Default);
            let due = match changes {
                None => true,
                Some(changes) => role == Role::Default || changes.changed(role),
            };
            if !due {
                continue;
            }
            let registered = registered(code);
            let next = match role {
                Role::Default => registered,
                role => view.role(role).intersection(&registered),
            };
            let previous = self.subscriptions.insert(code, next.clone()).unwrap_or_default();
            if previous != next {
                tracing::trace!(
                    recognizer = self.name(),
                    runtime = %self.id,
                    code,
                    role = %role,
                    added = next.difference(&previous).len(),
                    removed = previous.difference(&next).len(),
                    "Subscriptions updated"
                );
            }
        }
    }

    pub(crate) fn forget_target(&mut self, target: TargetId) {
        for list in self.subscriptions.values_mut() {
            list.remove(target);
        }
    }
}

impl std::fmt::Debug for RecognizerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognizerRuntime")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("priority", &self.priority)
            .field("target", &self.target)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emission(name: &'static str) -> Emission {
        Emission {
            code: 0,
            name,
            timestamp_ms: 0,
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_initial_state() {
        let state = RuntimeState::default();
        assert_eq!(state.outcome(), Outcome::Recognizing);
        assert!(state.is_processing());
        assert!(!state.is_armed());
    }

    #[test]
    fn test_failure_stops_processing() {
        let mut state = RuntimeState::default();
        assert!(state.declare_result(false, 0.9));
        assert_eq!(state.outcome(), Outcome::Failed);
        assert!(!state.is_processing());
    }

    #[test]
    fn test_result_is_declared_once() {
        let mut state = RuntimeState::default();
        assert!(state.declare_result(true, 0.7));
        assert!(!state.declare_result(false, 0.0));
        assert_eq!(state.outcome(), Outcome::Succeeded(0.7));
        assert!(state.is_processing());
    }

    #[test]
    fn test_terminating_undecided_counts_as_failure() {
        let mut state = RuntimeState::default();
        state.processing = false;
        assert_eq!(state.outcome(), Outcome::Failed);
    }

    #[test]
    fn test_emissions_buffer_until_armed() {
        let mut state = RuntimeState::default();
        state.emit(emission("a"));
        state.emit(emission("b"));
        assert_eq!(state.buffered(), 2);
        assert!(state.outbox.is_empty());

        state.arm();
        state.emit(emission("c"));
        let names: Vec<_> = state.outbox.iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(state.buffered(), 0);
    }
}
