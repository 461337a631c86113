//! Priority-tier competition among the recognizers of one group.
//!
//! Pending instances are ordered by `(priority, Local before Global, creation
//! order)`. Each call resolves tiers lowest priority first:
//!
//! ```text
//! feed tier ─▶ drop failures (and every pending Local sibling of a failed Local)
//!           ─▶ arm winners in tier order, flush their buffered events
//!           ─▶ exclusive winner? clear everything still pending, stop
//!           ─▶ anyone undecided? stop for this tick
//!           ─▶ otherwise next tier, same tick
//! ```
//!
//! Winners that keep processing move to the interpreting set and are fed
//! every following tick until they terminate.

use crate::event::{Emission, RawGesture};
use crate::recognizer::{RecognizerKey, Scope};
use crate::registry::{Binding, RecognitionRegistry};
use crate::runtime::{Outcome, RecognizerRuntime, RuntimeId, TimerRequest};
use crate::view::GroupView;
use std::collections::{HashMap, HashSet};
use tactus_contacts::{GroupId, RoleChanges, Trace};
use tactus_targets::{TargetId, TargetList};

/// Timer a recognizer of this group asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTimer {
    pub runtime: RuntimeId,
    pub delay_ms: u64,
    pub token: u64,
}

/// Runs the recognizer competition of one group.
#[derive(Debug)]
pub struct GroupArbiter {
    group: GroupId,
    runtimes: HashMap<RuntimeId, RecognizerRuntime>,
    pending: Vec<RuntimeId>,
    interpreting: Vec<RuntimeId>,
    created: HashSet<(RecognizerKey, Option<TargetId>)>,
    exclusive_won: bool,
    exclusive_target: Option<TargetId>,
    timers: Vec<ScheduledTimer>,
    next_seq: u64,
}

impl GroupArbiter {
    pub fn new(group: GroupId) -> Self {
        Self {
            group,
            runtimes: HashMap::new(),
            pending: Vec::new(),
            interpreting: Vec::new(),
            created: HashSet::new(),
            exclusive_won: false,
            exclusive_target: None,
            timers: Vec::new(),
            next_seq: 0,
        }
    }

    /// Instantiate recognizers for registrations this group does not have yet.
    ///
    /// Global instances are created once per group; Local instances once per
    /// registered target that is a member of the configuration's local role.
    /// Local instances whose target left that role are destroyed. Dead groups
    /// and groups with an exclusive winner get no new instances.
    pub fn sync_instances(&mut self, view: &GroupView<'_>, registry: &RecognitionRegistry) {
        let bindings = registry.bindings();
        self.drop_stale_locals(view, &bindings);
        if !view.state.is_alive() || self.exclusive_won {
            return;
        }

        let mut added = false;
        for binding in &bindings {
            let key = binding.key();
            match binding.kind.scope() {
                Scope::Global => {
                    if self.created.insert((key, None)) {
                        self.spawn(binding, None);
                        added = true;
                    }
                }
                Scope::Local => {
                    let members = view.role(binding.configuration.local_role());
                    for target in binding.targets.intersection(&members).iter() {
                        if self.created.insert((key, Some(target))) {
                            self.spawn(binding, Some(target));
                            added = true;
                        }
                    }
                }
            }
        }
        if added {
            self.sort_pending();
            self.resubscribe(view, None, registry);
        }
    }

    fn spawn(&mut self, binding: &Binding, target: Option<TargetId>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let runtime = RecognizerRuntime::new(
            binding.kind,
            binding.configuration.clone(),
            binding.priority,
            target,
            seq,
        );
        tracing::debug!(
            group = %self.group,
            recognizer = runtime.name(),
            runtime = %runtime.id(),
            priority = runtime.priority(),
            target_id = ?target,
            "Recognizer instantiated"
        );
        self.pending.push(runtime.id());
        self.runtimes.insert(runtime.id(), runtime);
    }

    fn drop_stale_locals(&mut self, view: &GroupView<'_>, bindings: &[Binding]) {
        let stale: Vec<RuntimeId> = self
            .runtimes
            .values()
            .filter(|runtime| runtime.is_local())
            .filter(|runtime| {
                let Some(target) = runtime.target() else {
                    return false;
                };
                match bindings.iter().find(|b| b.key() == runtime.key()) {
                    Some(binding) => {
                        !binding.targets.contains(target)
                            || !view.role(binding.configuration.local_role()).contains(target)
                    }
                    None => true,
                }
            })
            .map(|runtime| runtime.id())
            .collect();
        for id in stale {
            tracing::debug!(group = %self.group, runtime = %id, "Local recognizer left its role");
            self.destroy(id, true);
        }
    }

    /// Remove an instance from every set. `forget` allows it to be created again.
    fn destroy(&mut self, id: RuntimeId, forget: bool) {
        self.pending.retain(|p| *p != id);
        self.interpreting.retain(|p| *p != id);
        self.timers.retain(|t| t.runtime != id);
        if let Some(runtime) = self.runtimes.remove(&id) {
            if forget {
                self.created.remove(&(runtime.key(), runtime.target()));
            }
        }
    }

    fn sort_pending(&mut self) {
        let runtimes = &self.runtimes;
        self.pending.sort_by_key(|id| match runtimes.get(id) {
            Some(r) => (r.priority(), !r.is_local(), r.seq()),
            None => (i32::MAX, true, u64::MAX),
        });
    }

    /// Rebind Global instances after role or registration changes.
    pub fn resubscribe(
        &mut self,
        view: &GroupView<'_>,
        changes: Option<RoleChanges>,
        registry: &RecognitionRegistry,
    ) {
        if matches!(changes, Some(c) if !c.any()) {
            return;
        }
        for runtime in self.runtimes.values_mut() {
            let key = runtime.key();
            runtime.resubscribe(view, changes, |code| registry.targets_for(key, code));
        }
    }

    /// Apply a priority set after instances were created.
    pub fn apply_priority(&mut self, key: RecognizerKey, priority: i32) {
        let mut touched = false;
        for runtime in self.runtimes.values_mut() {
            if runtime.key() == key {
                runtime.set_priority(priority);
                touched = true;
            }
        }
        if touched {
            self.sort_pending();
        }
    }

    /// Forget a listener: destroys its Local instances and Global subscriptions.
    pub fn remove_target(&mut self, target: TargetId) {
        let locals: Vec<RuntimeId> = self
            .runtimes
            .values()
            .filter(|r| r.target() == Some(target))
            .map(|r| r.id())
            .collect();
        for id in locals {
            self.destroy(id, true);
        }
        for runtime in self.runtimes.values_mut() {
            runtime.forget_target(target);
        }
        if self.exclusive_target == Some(target) {
            self.exclusive_target = None;
        }
    }

    /// Drive one tick. `traces` are the group's traces that changed this tick.
    ///
    /// Returns `true` when no recognizer work remains.
    pub fn process(
        &mut self,
        view: &GroupView<'_>,
        traces: &[&Trace],
        registry: &RecognitionRegistry,
    ) -> bool {
        for id in self.interpreting.clone() {
            self.feed(id, view, Some(traces), registry);
            let done = self
                .runtimes
                .get(&id)
                .map_or(true, |r| !r.state().is_processing());
            if done {
                tracing::debug!(group = %self.group, runtime = %id, "Recognizer finished interpreting");
                self.destroy(id, false);
            }
        }
        self.resolve(view, Some(traces), registry);
        self.is_done()
    }

    /// Deliver an expired timer, then re-resolve tiers without new traces.
    pub fn timer_expired(
        &mut self,
        view: &GroupView<'_>,
        runtime: RuntimeId,
        token: u64,
        registry: &RecognitionRegistry,
    ) -> bool {
        let live = self
            .runtimes
            .get(&runtime)
            .is_some_and(|r| r.state().is_processing());
        if !live {
            tracing::trace!(group = %self.group, runtime = %runtime, token, "Discarding timer of finished recognizer");
            return self.is_done();
        }
        if let Some(r) = self.runtimes.get_mut(&runtime) {
            r.timer_expired(view, token);
        }
        self.flush_output(runtime, registry);
        if self.interpreting.contains(&runtime) {
            let done = self
                .runtimes
                .get(&runtime)
                .map_or(true, |r| !r.state().is_processing());
            if done {
                self.destroy(runtime, false);
            }
        }
        self.resolve(view, None, registry);
        self.is_done()
    }

    fn resolve(
        &mut self,
        view: &GroupView<'_>,
        traces: Option<&[&Trace]>,
        registry: &RecognitionRegistry,
    ) {
        while !self.pending.is_empty() && !self.exclusive_won {
            let tier = self.next_tier(view);
            if tier.is_empty() {
                break;
            }
            for id in &tier {
                self.feed(*id, view, traces, registry);
            }

            let mut winners = Vec::new();
            let mut failed_locals = Vec::new();
            for id in &tier {
                let Some(runtime) = self.runtimes.get(id) else {
                    continue;
                };
                match runtime.outcome() {
                    Outcome::Recognizing => {}
                    Outcome::Succeeded(probability) => winners.push((*id, probability)),
                    Outcome::Failed => {
                        tracing::debug!(
                            group = %self.group,
                            recognizer = runtime.name(),
                            runtime = %id,
                            "Recognizer failed"
                        );
                        if runtime.is_local() {
                            failed_locals.push(runtime.key());
                        }
                        self.destroy(*id, false);
                    }
                }
            }

            for key in &failed_locals {
                let siblings: Vec<RuntimeId> = self
                    .pending
                    .iter()
                    .copied()
                    .filter(|id| self.runtimes.get(id).is_some_and(|r| r.key() == *key))
                    .collect();
                for id in siblings {
                    tracing::debug!(group = %self.group, runtime = %id, "Dropping sibling of failed local recognizer");
                    self.destroy(id, false);
                }
            }
            winners.retain(|(id, _)| self.pending.contains(id));
            let undecided = tier.iter().any(|id| {
                self.pending.contains(id)
                    && self
                        .runtimes
                        .get(id)
                        .is_some_and(|r| r.outcome() == Outcome::Recognizing)
            });

            for (id, probability) in winners {
                if self.arm(id, probability, registry) {
                    break;
                }
            }

            if self.exclusive_won || undecided {
                break;
            }
        }
    }

    /// Arm a tier winner. Returns whether it was exclusive.
    fn arm(&mut self, id: RuntimeId, probability: f32, registry: &RecognitionRegistry) -> bool {
        let Some(runtime) = self.runtimes.get_mut(&id) else {
            return false;
        };
        runtime.arm();
        let exclusive = runtime.is_exclusive();
        let processing = runtime.state().is_processing();
        let target = runtime.target();
        tracing::debug!(
            group = %self.group,
            recognizer = runtime.name(),
            runtime = %id,
            probability,
            exclusive,
            "Recognizer won its tier"
        );
        self.deliver(id, registry);

        self.pending.retain(|p| *p != id);
        if processing {
            self.interpreting.push(id);
        } else {
            self.destroy(id, false);
        }

        if exclusive {
            for loser in std::mem::take(&mut self.pending) {
                self.destroy(loser, false);
            }
            self.exclusive_won = true;
            if target.is_some() {
                self.exclusive_target = target;
            }
            tracing::debug!(group = %self.group, runtime = %id, target_id = ?target, "Exclusive recognizer won");
        }
        exclusive
    }

    /// Pending instances sharing the lowest priority, in evaluation order.
    fn next_tier(&self, view: &GroupView<'_>) -> Vec<RuntimeId> {
        let Some(priority) = self
            .pending
            .first()
            .and_then(|id| self.runtimes.get(id))
            .map(|r| r.priority())
        else {
            return Vec::new();
        };
        let members: Vec<&RecognizerRuntime> = self
            .pending
            .iter()
            .filter_map(|id| self.runtimes.get(id))
            .filter(|r| r.priority() == priority)
            .collect();

        let mut locals: Vec<(&RecognizerRuntime, f32)> = members
            .iter()
            .filter(|r| r.is_local())
            .map(|r| (*r, r.target().map_or(f32::INFINITY, |t| view.distance_to(t))))
            .collect();
        locals.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.seq().cmp(&b.0.seq())));

        let mut globals: Vec<&RecognizerRuntime> =
            members.iter().copied().filter(|r| !r.is_local()).collect();
        globals.sort_by_key(|r| r.seq());

        locals
            .into_iter()
            .map(|(r, _)| r.id())
            .chain(globals.into_iter().map(|r| r.id()))
            .collect()
    }

    fn feed(
        &mut self,
        id: RuntimeId,
        view: &GroupView<'_>,
        traces: Option<&[&Trace]>,
        registry: &RecognitionRegistry,
    ) {
        let Some(traces) = traces else {
            return;
        };
        if let Some(runtime) = self.runtimes.get_mut(&id) {
            runtime.process(view, traces);
        }
        self.flush_output(id, registry);
    }

    /// Deliver whatever the instance emitted and queue the timers it asked for.
    fn flush_output(&mut self, id: RuntimeId, registry: &RecognitionRegistry) {
        let requests: Vec<TimerRequest> = self
            .runtimes
            .get_mut(&id)
            .map(|r| r.take_timers())
            .unwrap_or_default();
        self.timers
            .extend(requests.into_iter().map(|request| ScheduledTimer {
                runtime: id,
                delay_ms: request.delay_ms,
                token: request.token,
            }));
        self.deliver(id, registry);
    }

    fn deliver(&mut self, id: RuntimeId, registry: &RecognitionRegistry) {
        let Some(runtime) = self.runtimes.get_mut(&id) else {
            return;
        };
        let emissions = runtime.take_outbox();
        if emissions.is_empty() {
            return;
        }
        let key = runtime.key();
        let name = runtime.name();
        for emission in emissions {
            let targets = recipients(runtime, &emission, registry);
            for target in targets.iter() {
                let gesture = RawGesture {
                    code: emission.code,
                    event: emission.name,
                    recognizer: name,
                    group: self.group,
                    target,
                    timestamp_ms: emission.timestamp_ms,
                    payload: emission.payload.clone(),
                };
                let handled = registry.dispatch(key, &gesture);
                tracing::trace!(
                    group = %self.group,
                    recognizer = name,
                    event = emission.name,
                    target_id = %target,
                    handled,
                    "Gesture delivered"
                );
            }
        }
    }

    /// Timers requested since the last drain.
    pub fn drain_timers(&mut self) -> Vec<ScheduledTimer> {
        std::mem::take(&mut self.timers)
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn interpreting_len(&self) -> usize {
        self.interpreting.len()
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty() && self.interpreting.is_empty()
    }

    pub fn exclusive_won(&self) -> bool {
        self.exclusive_won
    }

    pub fn exclusive_target(&self) -> Option<TargetId> {
        self.exclusive_target
    }

    pub fn runtime(&self, id: RuntimeId) -> Option<&RecognizerRuntime> {
        self.runtimes.get(&id)
    }

    /// Pending instances in evaluation order.
    pub fn pending(&self) -> impl Iterator<Item = &RecognizerRuntime> + '_ {
        self.pending.iter().filter_map(|id| self.runtimes.get(id))
    }

    pub fn interpreting(&self) -> impl Iterator<Item = &RecognizerRuntime> + '_ {
        self.interpreting.iter().filter_map(|id| self.runtimes.get(id))
    }
}

fn recipients(
    runtime: &RecognizerRuntime,
    emission: &Emission,
    registry: &RecognitionRegistry,
) -> TargetList {
    match runtime.target() {
        Some(target) => {
            let registered = registry.targets_for(runtime.key(), emission.code);
            if registered.contains(target) {
                TargetList::from(Some(target))
            } else {
                TargetList::new()
            }
        }
        None => runtime.subscribers(emission.code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::event::tests::Signal;
    use crate::event::GestureEvent;
    use crate::recognizer::{Context, Recognizer};
    use std::sync::{Arc, Mutex};
    use tactus_config::{Aggregation, Settings};
    use tactus_contacts::{Arena, ContactSample, GroupState, TraceId};
    use tactus_targets::{RectTarget, Role, TargetTable};

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Step {
        Emit,
        Succeed,
        Fail,
        Done,
        Timer(u64),
    }

    #[derive(Clone, Default)]
    struct Script {
        label: &'static str,
        ticks: Vec<Vec<Step>>,
        per_target: Vec<(TargetId, Vec<Vec<Step>>)>,
        on_timer: Vec<Step>,
        log: Log,
    }

    impl Script {
        fn new(label: &'static str, log: &Log, ticks: Vec<Vec<Step>>) -> Self {
            Self {
                label,
                ticks,
                log: Arc::clone(log),
                ..Default::default()
            }
        }

        fn on_timer(mut self, steps: Vec<Step>) -> Self {
            self.on_timer = steps;
            self
        }

        fn for_target(mut self, target: TargetId, ticks: Vec<Vec<Step>>) -> Self {
            self.per_target.push((target, ticks));
            self
        }
    }

    struct Scripted {
        script: Script,
        tick: usize,
    }

    impl Scripted {
        fn label(&self, cx: &Context<'_, '_, Signal>) -> String {
            match cx.target() {
                Some(target) => format!("{}@{}", self.script.label, target.raw()),
                None => self.script.label.to_string(),
            }
        }

        fn run(&mut self, cx: &mut Context<'_, '_, Signal>, steps: &[Step]) {
            let label = self.label(cx);
            for step in steps {
                match step {
                    Step::Emit => cx.emit(
                        Signal::Began,
                        serde_json::json!({ "by": label, "tick": self.tick }),
                    ),
                    Step::Succeed => cx.declare_result(true, 1.0),
                    Step::Fail => cx.declare_result(false, 0.0),
                    Step::Done => cx.terminate(),
                    Step::Timer(delay) => cx.schedule_timer(*delay, 7),
                }
            }
        }

        fn step(&mut self, cx: &mut Context<'_, '_, Signal>) {
            let label = self.label(cx);
            self.script.log.lock().unwrap().push(format!("process {label}"));
            let plan = cx
                .target()
                .and_then(|t| self.script.per_target.iter().find(|(id, _)| *id == t))
                .map(|(_, ticks)| ticks.clone())
                .unwrap_or_else(|| self.script.ticks.clone());
            let steps = plan.get(self.tick).cloned().unwrap_or_default();
            self.run(cx, &steps);
            self.tick += 1;
        }

        fn timer(&mut self, cx: &mut Context<'_, '_, Signal>, token: u64) {
            let label = self.label(cx);
            self.script
                .log
                .lock()
                .unwrap()
                .push(format!("timer {label} {token}"));
            let steps = self.script.on_timer.clone();
            self.run(cx, &steps);
        }
    }

    impl Recognizer for Scripted {
        type Event = Signal;
        type Config = Script;
        const NAME: &'static str = "scripted";

        fn new(script: Script) -> Self {
            Self { script, tick: 0 }
        }

        fn process(&mut self, cx: &mut Context<'_, '_, Signal>, _traces: &[&Trace]) {
            self.step(cx);
        }

        fn timer_expired(&mut self, cx: &mut Context<'_, '_, Signal>, token: u64) {
            self.timer(cx, token);
        }
    }

    struct LocalScripted(Scripted);

    impl Recognizer for LocalScripted {
        type Event = Signal;
        type Config = Script;
        const NAME: &'static str = "local_scripted";
        const SCOPE: Scope = Scope::Local;

        fn new(script: Script) -> Self {
            Self(Scripted { script, tick: 0 })
        }

        fn process(&mut self, cx: &mut Context<'_, '_, Signal>, _traces: &[&Trace]) {
            self.0.step(cx);
        }
    }

    struct Fixture {
        traces: Arena<TraceId, Trace>,
        state: GroupState,
        table: TargetTable,
        settings: Settings,
        registry: RecognitionRegistry,
        arbiter: GroupArbiter,
        log: Log,
        delivered: Log,
    }

    impl Fixture {
        fn new() -> Self {
            let mut groups: Arena<GroupId, ()> = Arena::new();
            let id = groups.insert(());
            Self {
                traces: Arena::new(),
                state: GroupState::new(id, 0),
                table: TargetTable::new(),
                settings: Settings::new(Aggregation::Union),
                registry: RecognitionRegistry::new(),
                arbiter: GroupArbiter::new(id),
                log: Log::default(),
                delivered: Log::default(),
            }
        }

        /// One contact over a single full-surface pad.
        fn with_pad() -> (Self, TargetId) {
            let mut fx = Self::new();
            let pad = fx.target(0.0, 0.0, 1.0, 1.0);
            fx.touch(0.5, 0.5);
            (fx, pad)
        }

        fn target(&mut self, x: f32, y: f32, w: f32, h: f32) -> TargetId {
            self.table.add(Arc::new(RectTarget::new(x, y, w, h)))
        }

        fn touch(&mut self, x: f32, y: f32) {
            let group = self.state.id();
            let sample = ContactSample::new(self.traces.len() as u64 + 1, x, y, 0);
            let table = &self.table;
            let id = self
                .traces
                .insert_with(|id| Trace::new(id, group, &sample, table));
            self.state.attach(id);
        }

        fn script(&self, label: &'static str, ticks: Vec<Vec<Step>>) -> Script {
            Script::new(label, &self.log, ticks)
        }

        fn register<R: Recognizer<Event = Signal>>(&self, config: &Configuration, target: TargetId) {
            let delivered = Arc::clone(&self.delivered);
            self.registry
                .register::<R, _>(config, Signal::Began, target, move |g| {
                    let by = g.payload["by"].as_str().unwrap_or_default().to_string();
                    delivered
                        .lock()
                        .unwrap()
                        .push(format!("{by}:{}", g.payload["tick"]));
                });
        }

        fn global(&self, script: Script, priority: i32, target: TargetId) -> Configuration {
            let config = Configuration::new(script);
            self.registry
                .set_priority::<Scripted>(&config, priority)
                .unwrap();
            self.register::<Scripted>(&config, target);
            config
        }

        fn tick(&mut self, now: u64) -> bool {
            let members: Vec<&Trace> = self
                .state
                .traces()
                .iter()
                .filter_map(|id| self.traces.get(*id))
                .collect();
            let changes = self
                .state
                .update(now, &members, &self.table, &self.settings);
            let view = GroupView::new(&self.state, &self.traces, &self.table, now);
            self.arbiter.sync_instances(&view, &self.registry);
            self.arbiter
                .resubscribe(&view, Some(changes), &self.registry);
            self.arbiter.process(&view, &members, &self.registry)
        }

        fn fire_timers(&mut self, now: u64) -> bool {
            let view = GroupView::new(&self.state, &self.traces, &self.table, now);
            let mut done = self.arbiter.is_done();
            for timer in self.arbiter.drain_timers() {
                done = self
                    .arbiter
                    .timer_expired(&view, timer.runtime, timer.token, &self.registry);
            }
            done
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }

        fn delivered(&self) -> Vec<String> {
            self.delivered.lock().unwrap().clone()
        }
    }

    use Step::*;

    #[test]
    fn test_undecided_tier_blocks_higher_tiers() {
        let (mut fx, pad) = Fixture::with_pad();
        fx.global(fx.script("a", vec![vec![], vec![Succeed]]), 0, pad);
        fx.global(fx.script("b", vec![vec![Emit, Succeed, Done]]), 1, pad);

        assert!(!fx.tick(0));
        assert_eq!(fx.log(), vec!["process a"]);
        assert_eq!(fx.arbiter.pending_len(), 2);

        assert!(!fx.tick(10));
        assert_eq!(fx.log(), vec!["process a", "process a", "process b"]);
        assert_eq!(fx.delivered(), vec!["b:0"]);
        assert_eq!(fx.arbiter.pending_len(), 0);
        assert_eq!(fx.arbiter.interpreting_len(), 1);
    }

    #[test]
    fn test_failed_tier_lets_next_tier_run_in_same_tick() {
        let (mut fx, pad) = Fixture::with_pad();
        fx.global(fx.script("a", vec![vec![Emit, Fail]]), 0, pad);
        fx.global(fx.script("b", vec![vec![Emit, Succeed, Done]]), 1, pad);

        assert!(fx.tick(0));
        assert_eq!(fx.log(), vec!["process a", "process b"]);
        assert_eq!(fx.delivered(), vec!["b:0"]);
    }

    #[test]
    fn test_winner_flushes_buffer_in_order_and_loser_stays_silent() {
        let (mut fx, pad) = Fixture::with_pad();
        fx.global(fx.script("loser", vec![vec![Emit], vec![Emit, Fail]]), 0, pad);
        fx.global(fx.script("winner", vec![vec![Emit], vec![Emit, Succeed]]), 0, pad);

        fx.tick(0);
        assert!(fx.delivered().is_empty());

        fx.tick(10);
        assert_eq!(fx.delivered(), vec!["winner:0", "winner:1"]);

        fx.tick(20);
        assert_eq!(fx.arbiter.interpreting_len(), 1);
        assert!(fx.delivered().iter().all(|d| d.starts_with("winner")));
    }

    #[test]
    fn test_same_tier_globals_run_in_registration_order() {
        let (mut fx, pad) = Fixture::with_pad();
        fx.global(fx.script("first", vec![vec![Emit, Succeed, Done]]), 0, pad);
        fx.global(fx.script("second", vec![vec![Emit, Succeed, Done]]), 0, pad);

        assert!(fx.tick(0));
        assert_eq!(fx.log(), vec!["process first", "process second"]);
        assert_eq!(fx.delivered(), vec!["first:0", "second:0"]);
    }

    #[test]
    fn test_exclusive_winner_suppresses_everyone_else() {
        let (mut fx, pad) = Fixture::with_pad();
        let exclusive = Configuration::new(fx.script("a", vec![vec![Succeed]])).exclusive();
        fx.register::<Scripted>(&exclusive, pad);
        fx.global(fx.script("b", vec![vec![]]), 0, pad);
        fx.global(fx.script("c", vec![vec![Succeed]]), 1, pad);

        fx.tick(0);
        assert!(fx.arbiter.exclusive_won());
        assert_eq!(fx.arbiter.pending_len(), 0);
        assert_eq!(fx.arbiter.exclusive_target(), None);

        fx.global(fx.script("late", vec![vec![Succeed]]), 0, pad);
        fx.tick(10);
        assert_eq!(fx.log(), vec!["process a", "process b", "process a"]);
    }

    #[test]
    fn test_locals_run_before_globals_nearest_first() {
        let mut fx = Fixture::new();
        let left = fx.target(0.0, 0.0, 0.2, 1.0);
        let right = fx.target(0.25, 0.0, 0.1, 1.0);
        fx.touch(0.1, 0.5);
        fx.touch(0.3, 0.5);

        fx.global(fx.script("global", vec![vec![]]), 0, left);
        let local = Configuration::new(fx.script("local", vec![vec![]]))
            .with_local_role(Role::Current);
        fx.register::<LocalScripted>(&local, right);
        fx.register::<LocalScripted>(&local, left);

        fx.tick(0);
        assert_eq!(
            fx.log(),
            vec![
                format!("process local@{}", left.raw()),
                format!("process local@{}", right.raw()),
                "process global".to_string(),
            ]
        );
        assert_eq!(fx.arbiter.pending_len(), 3);
    }

    #[test]
    fn test_failed_local_drops_undecided_siblings() {
        let mut fx = Fixture::new();
        let left = fx.target(0.0, 0.0, 0.2, 1.0);
        let right = fx.target(0.25, 0.0, 0.1, 1.0);
        fx.touch(0.1, 0.5);
        fx.touch(0.3, 0.5);

        fx.global(fx.script("global", vec![vec![]]), 0, left);
        let script = fx
            .script("local", vec![vec![]])
            .for_target(left, vec![vec![Fail]]);
        let local = Configuration::new(script).with_local_role(Role::Current);
        fx.register::<LocalScripted>(&local, left);
        fx.register::<LocalScripted>(&local, right);

        fx.tick(0);
        assert_eq!(fx.arbiter.pending_len(), 1);
        assert_eq!(fx.arbiter.pending().next().map(|r| r.name()), Some("scripted"));
    }

    #[test]
    fn test_failed_local_drops_sibling_that_succeeded_in_same_tier() {
        let mut fx = Fixture::new();
        let left = fx.target(0.0, 0.0, 0.2, 1.0);
        let right = fx.target(0.25, 0.0, 0.1, 1.0);
        fx.touch(0.1, 0.5);
        fx.touch(0.3, 0.5);

        let script = fx
            .script("local", vec![vec![]])
            .for_target(left, vec![vec![Fail]])
            .for_target(right, vec![vec![Emit, Succeed]]);
        let local = Configuration::new(script).with_local_role(Role::Current);
        fx.register::<LocalScripted>(&local, left);
        fx.register::<LocalScripted>(&local, right);

        assert!(fx.tick(0));
        assert_eq!(
            fx.log(),
            vec![
                format!("process local@{}", left.raw()),
                format!("process local@{}", right.raw()),
            ]
        );
        assert!(fx.delivered().is_empty());
        assert_eq!(fx.arbiter.pending_len(), 0);
        assert_eq!(fx.arbiter.interpreting_len(), 0);
    }

    #[test]
    fn test_exclusive_local_binds_group_target() {
        let mut fx = Fixture::new();
        let left = fx.target(0.0, 0.0, 0.2, 1.0);
        let right = fx.target(0.25, 0.0, 0.1, 1.0);
        fx.touch(0.1, 0.5);
        fx.touch(0.3, 0.5);

        let script = fx
            .script("local", vec![vec![]])
            .for_target(left, vec![vec![Emit, Succeed]]);
        let local = Configuration::new(script)
            .with_local_role(Role::Current)
            .exclusive();
        fx.register::<LocalScripted>(&local, left);
        fx.register::<LocalScripted>(&local, right);

        fx.tick(0);
        assert_eq!(fx.arbiter.exclusive_target(), Some(left));
        assert_eq!(fx.arbiter.pending_len(), 0);
        assert_eq!(fx.delivered(), vec![format!("local@{}:0", left.raw())]);
    }

    #[test]
    fn test_timer_expiry_resolves_without_new_traces() {
        let (mut fx, pad) = Fixture::with_pad();
        let held = fx
            .script("hold", vec![vec![Timer(100)]])
            .on_timer(vec![Emit, Succeed, Done]);
        fx.global(held, 0, pad);
        fx.global(fx.script("next", vec![vec![Succeed, Done]]), 1, pad);

        fx.tick(0);
        assert_eq!(fx.arbiter.pending_len(), 2);

        assert!(!fx.fire_timers(100));
        assert_eq!(fx.delivered(), vec!["hold:1"]);
        assert_eq!(fx.arbiter.pending_len(), 1);
        assert_eq!(fx.log(), vec!["process hold", "timer hold 7"]);

        assert!(fx.tick(110));
        assert_eq!(fx.log().last().map(String::as_str), Some("process next"));
    }

    #[test]
    fn test_timer_of_destroyed_recognizer_is_discarded() {
        let (mut fx, pad) = Fixture::with_pad();
        let script = fx
            .script("flaky", vec![vec![Timer(50), Fail]])
            .on_timer(vec![Emit]);
        fx.global(script, 0, pad);

        assert!(fx.tick(0));
        assert!(fx.arbiter.drain_timers().is_empty());
        assert_eq!(fx.log(), vec!["process flaky"]);
    }

    #[test]
    fn test_interpreting_until_terminated() {
        let (mut fx, pad) = Fixture::with_pad();
        fx.global(
            fx.script("drag", vec![vec![Succeed], vec![Emit], vec![Emit, Done]]),
            0,
            pad,
        );

        assert!(!fx.tick(0));
        assert!(!fx.tick(10));
        assert_eq!(fx.delivered(), vec!["drag:1"]);
        assert!(fx.tick(20));
        assert_eq!(fx.delivered(), vec!["drag:1", "drag:2"]);
        assert!(fx.arbiter.is_done());
    }

    #[test]
    fn test_global_subscriptions_follow_roles() {
        let (mut fx, pad) = Fixture::with_pad();
        let elsewhere = fx.target(5.0, 5.0, 1.0, 1.0);
        let config = fx.global(fx.script("g", vec![vec![]]), 0, pad);
        fx.register::<Scripted>(&config, elsewhere);

        fx.tick(0);
        let runtime = fx.arbiter.pending().next().unwrap();
        assert_eq!(runtime.subscribers(Signal::Began.code()).as_slice(), &[pad]);
        assert!(runtime.subscribers(Signal::Ended.code()).is_empty());
    }

    #[test]
    fn test_late_priority_reorders_pending() {
        let (mut fx, pad) = Fixture::with_pad();
        let a = Configuration::new(fx.script("a", vec![vec![]]));
        fx.register::<Scripted>(&a, pad);
        fx.global(fx.script("b", vec![vec![]]), 5, pad);

        fx.tick(0);
        assert_eq!(fx.log(), vec!["process a"]);

        fx.arbiter
            .apply_priority(RecognizerKey::of::<Scripted>(&a), 9);
        fx.tick(10);
        assert_eq!(fx.log(), vec!["process a", "process b"]);
    }
}
