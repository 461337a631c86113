//! Group-level aggregation over a cluster of traces.
//!
//! A group never owns its traces; the clusterer keeps them in an arena and
//! hands the group's members to [`GroupState::update`] once per tick.

use crate::arena_key;
use crate::trace::{Trace, TraceId};
use tactus_config::{Aggregation, Settings};
use tactus_targets::{Role, TargetId, TargetList, TargetTable};

arena_key!(
    /// Handle of a group in the clusterer's arena.
    GroupId,
    "group"
);

/// Role lists and closest-target slots of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupTargets {
    pub initial: TargetList,
    pub new_initial: TargetList,
    pub final_: TargetList,
    pub entering: TargetList,
    pub current: TargetList,
    pub leaving: TargetList,
    pub intersection: TargetList,
    pub union: TargetList,
    pub closest_initial: Option<TargetId>,
    pub closest_new_initial: Option<TargetId>,
    pub closest_final: Option<TargetId>,
    pub closest_entering: Option<TargetId>,
    pub closest_current: Option<TargetId>,
    pub closest_leaving: Option<TargetId>,
}

impl GroupTargets {
    /// Members of `role`. `Role::Default` has no backing list and is empty.
    pub fn role(&self, role: Role) -> TargetList {
        match role {
            Role::Initial => self.initial.clone(),
            Role::NewInitial => self.new_initial.clone(),
            Role::Final => self.final_.clone(),
            Role::Entering => self.entering.clone(),
            Role::Current => self.current.clone(),
            Role::Leaving => self.leaving.clone(),
            Role::Intersection => self.intersection.clone(),
            Role::Union => self.union.clone(),
            Role::ClosestInitial => self.closest_initial.into(),
            Role::ClosestNewInitial => self.closest_new_initial.into(),
            Role::ClosestFinal => self.closest_final.into(),
            Role::ClosestEntering => self.closest_entering.into(),
            Role::ClosestCurrent => self.closest_current.into(),
            Role::ClosestLeaving => self.closest_leaving.into(),
            Role::Default => TargetList::new(),
        }
    }

    /// Drop `id` from every list and vacate the slots it holds.
    pub fn forget(&mut self, id: TargetId) {
        for list in [
            &mut self.initial,
            &mut self.new_initial,
            &mut self.final_,
            &mut self.entering,
            &mut self.current,
            &mut self.leaving,
            &mut self.intersection,
            &mut self.union,
        ] {
            list.remove(id);
        }
        for slot in [
            &mut self.closest_initial,
            &mut self.closest_new_initial,
            &mut self.closest_final,
            &mut self.closest_entering,
            &mut self.closest_current,
            &mut self.closest_leaving,
        ] {
            if *slot == Some(id) {
                *slot = None;
            }
        }
    }

    fn diff(&self, previous: &GroupTargets) -> RoleChanges {
        let mut changes = RoleChanges::default();
        for role in Role::TRACKED {
            if !self.role(role).same_members(&previous.role(role)) {
                changes.mark(role);
            }
        }
        changes
    }
}

/// Set of roles whose membership changed during one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoleChanges(u16);

impl RoleChanges {
    pub fn mark(&mut self, role: Role) {
        self.0 |= role.bit();
    }

    pub fn changed(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    pub fn any(&self) -> bool {
        self.0 != 0
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        Role::TRACKED.into_iter().filter(|role| self.changed(*role))
    }
}

/// Spatial and target bookkeeping of a group.
#[derive(Debug, Clone)]
pub struct GroupState {
    id: GroupId,
    traces: Vec<TraceId>,
    created_ms: u64,
    alive: bool,
    dead_since_ms: Option<u64>,
    centroid: (f32, f32),
    living_centroid: Option<(f32, f32)>,
    targets: GroupTargets,
}

impl GroupState {
    pub fn new(id: GroupId, created_ms: u64) -> Self {
        tracing::debug!(group = %id, created_ms, "Group created");
        Self {
            id,
            traces: Vec::new(),
            created_ms,
            alive: true,
            dead_since_ms: None,
            centroid: (0.0, 0.0),
            living_centroid: None,
            targets: GroupTargets::default(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Add a trace to the group. Traces are never reassigned.
    pub fn attach(&mut self, trace: TraceId) {
        if !self.traces.contains(&trace) {
            self.traces.push(trace);
        }
    }

    /// Forget a garbage-collected trace.
    pub fn detach(&mut self, trace: TraceId) {
        self.traces.retain(|id| *id != trace);
    }

    pub fn traces(&self) -> &[TraceId] {
        &self.traces
    }

    pub fn created_ms(&self) -> u64 {
        self.created_ms
    }

    /// A group is alive while at least one of its traces is alive.
    pub fn is_alive(&self) -> bool {
        self.alive
    }

    /// When the last trace lifted, if the group is dead.
    pub fn dead_since_ms(&self) -> Option<u64> {
        self.dead_since_ms
    }

    /// Mean of the last samples of live and recently-dead traces.
    pub fn centroid(&self) -> (f32, f32) {
        self.centroid
    }

    /// Mean of the last samples of live traces only.
    pub fn living_centroid(&self) -> Option<(f32, f32)> {
        self.living_centroid
    }

    /// Centroid used for closest-target and local ordering queries.
    pub fn active_centroid(&self) -> (f32, f32) {
        self.living_centroid.unwrap_or(self.centroid)
    }

    pub fn targets(&self) -> &GroupTargets {
        &self.targets
    }

    pub fn forget_target(&mut self, id: TargetId) {
        self.targets.forget(id);
    }

    /// Squared distance from the active centroid to `target`.
    pub fn square_distance_to(&self, table: &TargetTable, target: TargetId) -> Option<f32> {
        let (x, y) = self.active_centroid();
        table.square_distance(target, x, y)
    }

    /// Recompute centroids and role lists from the member traces.
    ///
    /// `traces` must be this group's traces, in attachment order.
    pub fn update(
        &mut self,
        now_ms: u64,
        traces: &[&Trace],
        table: &TargetTable,
        settings: &Settings,
    ) -> RoleChanges {
        self.update_liveness(traces);
        self.update_centroids(now_ms, traces, settings.trace_time_gap_ms);

        let previous = std::mem::take(&mut self.targets);
        let mode = settings.aggregation;
        let synch = settings.grouping_synch_time_ms;
        let mut next = GroupTargets::default();

        let alive: Vec<&Trace> = traces.iter().copied().filter(|t| t.is_alive()).collect();
        next.current = aggregate(mode, alive.iter().map(|t| &t.targets().current));
        next.entering = next.current.difference(&previous.current);
        next.leaving = previous.current.difference(&next.current);

        next.intersection = aggregate(mode, traces.iter().map(|t| &t.targets().intersection));
        next.union = aggregate(mode, traces.iter().map(|t| &t.targets().union));

        let starts: Vec<u64> = traces.iter().map(|t| t.started_ms()).collect();
        if let Some(first) = starts.iter().min().copied() {
            next.initial = aggregate(
                mode,
                traces
                    .iter()
                    .filter(|t| t.started_ms() <= first + synch)
                    .map(|t| &t.targets().initial),
            );
        }
        if let Some(cluster) = latest_cluster_start(&starts, synch) {
            next.new_initial = aggregate(
                mode,
                traces
                    .iter()
                    .filter(|t| t.started_ms() >= cluster)
                    .map(|t| &t.targets().initial),
            );
        }

        let deaths: Vec<u64> = traces.iter().filter_map(|t| t.removed_ms()).collect();
        if let Some(cluster) = latest_cluster_start(&deaths, synch) {
            next.final_ = aggregate(
                mode,
                traces
                    .iter()
                    .filter(|t| t.removed_ms().is_some_and(|d| d >= cluster))
                    .map(|t| &t.targets().final_),
            );
        }

        let (cx, cy) = self.active_centroid();
        let ceiling = settings.grouping_space_sq();
        next.closest_initial = next.initial.closest(table, cx, cy, ceiling);
        next.closest_new_initial = next.new_initial.closest(table, cx, cy, ceiling);
        next.closest_final = next.final_.closest(table, cx, cy, ceiling);
        next.closest_current = next.current.closest(table, cx, cy, ceiling);
        if next.closest_current != previous.closest_current {
            next.closest_entering = next.closest_current;
            next.closest_leaving = previous.closest_current;
        }

        let changes = next.diff(&previous);
        if changes.any() {
            tracing::trace!(
                group = %self.id,
                roles = ?changes.roles().map(|r| r.label()).collect::<Vec<_>>(),
                "Group roles changed"
            );
        }
        self.targets = next;
        changes
    }

    fn update_liveness(&mut self, traces: &[&Trace]) {
        let alive = traces.iter().any(|t| t.is_alive());
        if alive == self.alive {
            return;
        }
        self.alive = alive;
        if alive {
            self.dead_since_ms = None;
            tracing::debug!(group = %self.id, "Group revived");
        } else {
            self.dead_since_ms = traces.iter().filter_map(|t| t.removed_ms()).max();
            tracing::debug!(group = %self.id, dead_since_ms = ?self.dead_since_ms, "Group dead");
        }
    }

    fn update_centroids(&mut self, now_ms: u64, traces: &[&Trace], gap_ms: u64) {
        self.living_centroid = mean(traces.iter().filter(|t| t.is_alive()).copied());
        if let Some(recent) = mean(traces.iter().filter(|t| t.is_recent(now_ms, gap_ms)).copied()) {
            self.centroid = recent;
        }
    }
}

fn aggregate<'a>(mode: Aggregation, lists: impl IntoIterator<Item = &'a TargetList>) -> TargetList {
    match mode {
        Aggregation::Union => TargetList::union_all(lists),
        Aggregation::Intersection => TargetList::intersection_all(lists),
    }
}

fn mean<'a>(traces: impl Iterator<Item = &'a Trace>) -> Option<(f32, f32)> {
    let (mut sx, mut sy, mut n) = (0.0_f32, 0.0_f32, 0_u32);
    for trace in traces {
        let last = trace.last();
        sx += last.x;
        sy += last.y;
        n += 1;
    }
    (n > 0).then(|| (sx / n as f32, sy / n as f32))
}

/// Start of the most recent synchronized cluster.
///
/// Walking the times in order, a new cluster opens whenever a time falls more
/// than `synch_ms` after the start of the open one.
fn latest_cluster_start(times: &[u64], synch_ms: u64) -> Option<u64> {
    let mut sorted = times.to_vec();
    sorted.sort_unstable();
    let mut start = *sorted.first()?;
    for t in sorted {
        if t > start + synch_ms {
            start = t;
        }
    }
    Some(start)
}
