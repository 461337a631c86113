//! Read-only view of a group handed to the arbiter for one tick.

use tactus_contacts::{Arena, GroupState, Trace, TraceId};
use tactus_targets::{Role, TargetId, TargetList, TargetTable};

/// Everything a recognizer may look at while the arbiter drives it.
#[derive(Clone, Copy)]
pub struct GroupView<'a> {
    pub state: &'a GroupState,
    pub traces: &'a Arena<TraceId, Trace>,
    pub table: &'a TargetTable,
    pub now_ms: u64,
}

impl<'a> GroupView<'a> {
    pub fn new(
        state: &'a GroupState,
        traces: &'a Arena<TraceId, Trace>,
        table: &'a TargetTable,
        now_ms: u64,
    ) -> Self {
        Self {
            state,
            traces,
            table,
            now_ms,
        }
    }

    /// Every trace of the group, in attachment order.
    pub fn group_traces(&self) -> Vec<&'a Trace> {
        self.state
            .traces()
            .iter()
            .filter_map(|id| self.traces.get(*id))
            .collect()
    }

    pub fn role(&self, role: Role) -> TargetList {
        self.state.targets().role(role)
    }

    /// Squared distance from the group centroid to `target`; unknown targets sort last.
    pub fn distance_to(&self, target: TargetId) -> f32 {
        self.state
            .square_distance_to(self.table, target)
            .unwrap_or(f32::INFINITY)
    }
}
