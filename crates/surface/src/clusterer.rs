//! Point ingestion: resolves contact samples to traces and traces to groups.

use crate::error::{Result, SurfaceError};
use crate::group::Group;
use std::collections::{HashMap, VecDeque};
use tactus_config::Settings;
use tactus_contacts::{
    Arena, ContactBatch, ContactSample, GroupId, Lifecycle, PointId, Trace, TraceId,
};
use tactus_targets::{TargetId, TargetTable};

/// Groups touched by one batch, in first-touch order, with their changed traces.
#[derive(Debug, Default)]
pub(crate) struct Ingested {
    pub touched: Vec<(GroupId, Vec<TraceId>)>,
    pub groups_created: usize,
    pub traces_resurrected: usize,
}

impl Ingested {
    fn touch(&mut self, group: GroupId, trace: TraceId) {
        match self.touched.iter_mut().find(|(id, _)| *id == group) {
            Some((_, traces)) => {
                if !traces.contains(&trace) {
                    traces.push(trace);
                }
            }
            None => self.touched.push((group, vec![trace])),
        }
    }
}

/// Owner of every trace and group of a surface.
#[derive(Debug, Default)]
pub struct Clusterer {
    traces: Arena<TraceId, Trace>,
    groups: Arena<GroupId, Group>,
    by_point: HashMap<PointId, TraceId>,
    /// Dead traces that may still be resurrected, most recently dead first.
    resurrectable: VecDeque<TraceId>,
}

impl Clusterer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> &Arena<TraceId, Trace> {
        &self.traces
    }

    pub fn groups(&self) -> &Arena<GroupId, Group> {
        &self.groups
    }

    /// Split borrow for processing groups against the trace arena.
    pub(crate) fn parts_mut(&mut self) -> (&Arena<TraceId, Trace>, &mut Arena<GroupId, Group>) {
        (&self.traces, &mut self.groups)
    }

    /// Drop a removed listener from every cached trace and group role list.
    pub(crate) fn forget_target(&mut self, id: TargetId) {
        for (_, trace) in self.traces.iter_mut() {
            trace.forget_target(id);
        }
        for (_, group) in self.groups.iter_mut() {
            group.state_mut().forget_target(id);
            group.arbiter_mut().remove_target(id);
        }
    }

    pub fn trace_for_point(&self, point: PointId) -> Option<&Trace> {
        self.by_point
            .get(&point)
            .and_then(|id| self.traces.get(*id))
    }

    pub fn resurrectable_len(&self) -> usize {
        self.resurrectable.len()
    }

    /// Apply one batch: removals, then updates, then additions.
    pub(crate) fn ingest(
        &mut self,
        batch: &ContactBatch,
        table: &TargetTable,
        settings: &Settings,
    ) -> Result<Ingested> {
        let mut out = Ingested::default();

        for sample in &batch.removed {
            let Some(trace_id) = self.by_point.remove(&sample.id) else {
                tracing::warn!(point = %sample.id, "Removal for unknown contact, skipping");
                continue;
            };
            let trace = self
                .traces
                .get_mut(trace_id)
                .ok_or(SurfaceError::MissingTrace(trace_id))?;
            trace.push(sample, Lifecycle::Removed, table);
            self.resurrectable.push_front(trace_id);
            out.touch(trace.group(), trace_id);
        }

        for sample in &batch.updated {
            let Some(trace_id) = self.by_point.get(&sample.id).copied() else {
                tracing::warn!(point = %sample.id, "Update for unknown contact, skipping");
                continue;
            };
            let trace = self
                .traces
                .get_mut(trace_id)
                .ok_or(SurfaceError::MissingTrace(trace_id))?;
            trace.push(sample, Lifecycle::Updated, table);
            out.touch(trace.group(), trace_id);
        }

        for sample in &batch.added {
            if self.by_point.contains_key(&sample.id) {
                tracing::warn!(point = %sample.id, "Contact added twice, skipping");
                continue;
            }
            if let Some(trace_id) = self.resurrect(sample, table, settings)? {
                out.traces_resurrected += 1;
                let group = self
                    .traces
                    .get(trace_id)
                    .map(|t| t.group())
                    .ok_or(SurfaceError::MissingTrace(trace_id))?;
                out.touch(group, trace_id);
                continue;
            }

            let group = match self.nearest_group(sample, settings)? {
                Some(group) => group,
                None => {
                    out.groups_created += 1;
                    self.groups
                        .insert_with(|id| Group::new(id, sample.timestamp_ms))
                }
            };
            let trace_id = self
                .traces
                .insert_with(|id| Trace::new(id, group, sample, table));
            self.groups
                .get_mut(group)
                .ok_or(SurfaceError::MissingGroup(group))?
                .state_mut()
                .attach(trace_id);
            self.by_point.insert(sample.id, trace_id);
            out.touch(group, trace_id);
        }

        Ok(out)
    }

    /// Reattach `sample` to the nearest qualifying dead trace.
    ///
    /// Ties go to the most recently dead trace.
    fn resurrect(
        &mut self,
        sample: &ContactSample,
        table: &TargetTable,
        settings: &Settings,
    ) -> Result<Option<TraceId>> {
        let max_d2 = settings.trace_space_gap_sq();
        let mut best: Option<(usize, f32)> = None;
        for (position, id) in self.resurrectable.iter().enumerate() {
            let trace = self.traces.get(*id).ok_or(SurfaceError::MissingTrace(*id))?;
            let last = trace.last();
            let elapsed = sample.timestamp_ms.saturating_sub(last.timestamp_ms);
            let d2 = last.square_distance(sample.x, sample.y);
            if elapsed > settings.trace_time_gap_ms || d2 > max_d2 {
                continue;
            }
            if best.map_or(true, |(_, best_d2)| d2 < best_d2) {
                best = Some((position, d2));
            }
        }

        let Some((position, _)) = best else {
            return Ok(None);
        };
        let Some(trace_id) = self.resurrectable.remove(position) else {
            return Ok(None);
        };
        let trace = self
            .traces
            .get_mut(trace_id)
            .ok_or(SurfaceError::MissingTrace(trace_id))?;
        trace.resurrect(sample, table);
        self.by_point.insert(sample.id, trace_id);
        Ok(Some(trace_id))
    }

    /// Alive group closest to `sample`, measured to the last samples of its
    /// live and recently-dead traces, within the grouping distance.
    fn nearest_group(
        &self,
        sample: &ContactSample,
        settings: &Settings,
    ) -> Result<Option<GroupId>> {
        let max_d2 = settings.grouping_space_sq();
        let mut best: Option<(GroupId, f32)> = None;
        for (group_id, group) in self.groups.iter() {
            let mut alive = false;
            let mut nearest = f32::INFINITY;
            for id in group.state().traces() {
                let trace = self.traces.get(*id).ok_or(SurfaceError::MissingTrace(*id))?;
                alive |= trace.is_alive();
                if trace.is_recent(sample.timestamp_ms, settings.trace_time_gap_ms) {
                    nearest = nearest.min(trace.last().square_distance(sample.x, sample.y));
                }
            }
            if !alive || nearest > max_d2 {
                continue;
            }
            if best.map_or(true, |(_, best_d2)| nearest < best_d2) {
                best = Some((group_id, nearest));
            }
        }
        Ok(best.map(|(id, _)| id))
    }

    /// Expire the resurrection pool and remove groups that can no longer change.
    ///
    /// A dead group and its traces stay resurrectable for `trace_time_gap_ms`
    /// inclusive after the last lift. The group is destroyed on the first
    /// tick past that, once `keep(group)` no longer asks to hold on to it.
    pub(crate) fn collect_garbage(
        &mut self,
        now_ms: u64,
        settings: &Settings,
        keep: impl Fn(&Group) -> bool,
    ) -> Vec<GroupId> {
        let gap = settings.trace_time_gap_ms;
        let traces = &self.traces;
        self.resurrectable.retain(|id| {
            traces
                .get(*id)
                .is_some_and(|trace| now_ms <= trace.last_ms().saturating_add(gap))
        });

        let expired: Vec<GroupId> = self
            .groups
            .iter()
            .filter(|(_, group)| {
                !group.is_alive()
                    && group
                        .state()
                        .dead_since_ms()
                        .is_some_and(|dead| now_ms > dead.saturating_add(gap))
                    && !keep(group)
            })
            .map(|(id, _)| id)
            .collect();

        for id in &expired {
            let Some(group) = self.groups.remove(*id) else {
                continue;
            };
            for trace in group.state().traces() {
                self.traces.remove(*trace);
                self.resurrectable.retain(|t| t != trace);
            }
            self.by_point
                .retain(|_, trace| !group.state().traces().contains(trace));
            tracing::debug!(
                group = %id,
                traces = group.state().traces().len(),
                pending = group.arbiter().pending_len(),
                interpreting = group.arbiter().interpreting_len(),
                "Group destroyed"
            );
        }
        expired
    }
}
