//! A group: cluster bookkeeping plus its recognizer arbiter.

use crate::error::{Result, SurfaceError};
use tactus_config::Settings;
use tactus_contacts::{Arena, GroupId, GroupState, Trace, TraceId};
use tactus_recognition::{GroupArbiter, GroupView, RecognitionRegistry, RuntimeId};
use tactus_targets::{TargetId, TargetTable};

/// One spatio-temporal cluster of traces and the recognizers competing over it.
#[derive(Debug)]
pub struct Group {
    state: GroupState,
    arbiter: GroupArbiter,
    done: bool,
}

impl Group {
    pub(crate) fn new(id: GroupId, created_ms: u64) -> Self {
        Self {
            state: GroupState::new(id, created_ms),
            arbiter: GroupArbiter::new(id),
            done: true,
        }
    }

    pub fn id(&self) -> GroupId {
        self.state.id()
    }

    pub fn state(&self) -> &GroupState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut GroupState {
        &mut self.state
    }

    pub fn arbiter(&self) -> &GroupArbiter {
        &self.arbiter
    }

    pub(crate) fn arbiter_mut(&mut self) -> &mut GroupArbiter {
        &mut self.arbiter
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// No recognizer work remained after the last processing pass.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Target bound by an exclusive Local winner.
    pub fn exclusive_target(&self) -> Option<TargetId> {
        self.arbiter.exclusive_target()
    }

    /// Refresh roles and run the recognizer competition for one tick.
    ///
    /// `touched` are the traces of this group that changed during the tick.
    pub(crate) fn process(
        &mut self,
        now_ms: u64,
        touched: &[TraceId],
        traces: &Arena<TraceId, Trace>,
        table: &TargetTable,
        settings: &Settings,
        registry: &RecognitionRegistry,
    ) -> Result<bool> {
        let members = self
            .state
            .traces()
            .iter()
            .map(|id| traces.get(*id).ok_or(SurfaceError::MissingTrace(*id)))
            .collect::<Result<Vec<&Trace>>>()?;
        let changes = self.state.update(now_ms, &members, table, settings);

        let changed = touched
            .iter()
            .map(|id| traces.get(*id).ok_or(SurfaceError::MissingTrace(*id)))
            .collect::<Result<Vec<&Trace>>>()?;

        let view = GroupView::new(&self.state, traces, table, now_ms);
        self.arbiter.sync_instances(&view, registry);
        self.arbiter.resubscribe(&view, Some(changes), registry);
        self.done = self.arbiter.process(&view, &changed, registry);
        tracing::trace!(
            group = %self.id(),
            changed = changed.len(),
            pending = self.arbiter.pending_len(),
            interpreting = self.arbiter.interpreting_len(),
            done = self.done,
            "Group processed"
        );
        Ok(self.done)
    }

    /// Instantiate recognizers for registrations made since the last tick.
    pub(crate) fn sync(
        &mut self,
        now_ms: u64,
        traces: &Arena<TraceId, Trace>,
        table: &TargetTable,
        registry: &RecognitionRegistry,
    ) {
        let view = GroupView::new(&self.state, traces, table, now_ms);
        self.arbiter.sync_instances(&view, registry);
        self.arbiter.resubscribe(&view, None, registry);
        self.done = self.arbiter.is_done();
    }

    pub(crate) fn timer_expired(
        &mut self,
        now_ms: u64,
        runtime: RuntimeId,
        token: u64,
        traces: &Arena<TraceId, Trace>,
        table: &TargetTable,
        registry: &RecognitionRegistry,
    ) -> bool {
        let view = GroupView::new(&self.state, traces, table, now_ms);
        self.done = self.arbiter.timer_expired(&view, runtime, token, registry);
        self.done
    }
}
