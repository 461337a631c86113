//! Traces: the sample history of one physical contact.

use crate::arena_key;
use crate::group::GroupId;
use crate::point::{ContactSample, Lifecycle, Point, PointId};
use tactus_targets::{TargetId, TargetList, TargetTable};

arena_key!(
    /// Handle of a trace in the clusterer's arena.
    TraceId,
    "trace"
);

/// Target lists of one trace, refreshed by re-hit-testing every sample.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceTargets {
    /// Hit-test result of the first sample.
    pub initial: TargetList,
    /// Hit-test result of the last `Removed` sample (empty while alive).
    pub final_: TargetList,
    /// Targets that joined `current` on the latest sample.
    pub entering: TargetList,
    /// Targets that left `current` on the latest sample.
    pub leaving: TargetList,
    pub current: TargetList,
    /// Targets hit by every sample so far.
    pub intersection: TargetList,
    /// Targets hit by any sample so far.
    pub union: TargetList,
}

impl TraceTargets {
    fn first(hits: TargetList) -> Self {
        Self {
            initial: hits.clone(),
            final_: TargetList::new(),
            entering: hits.clone(),
            leaving: TargetList::new(),
            current: hits.clone(),
            intersection: hits.clone(),
            union: hits,
        }
    }

    /// Drop `id` from every list.
    pub fn forget(&mut self, id: TargetId) {
        for list in [
            &mut self.initial,
            &mut self.final_,
            &mut self.entering,
            &mut self.leaving,
            &mut self.current,
            &mut self.intersection,
            &mut self.union,
        ] {
            list.remove(id);
        }
    }

    fn apply(&mut self, lifecycle: Lifecycle, hits: TargetList) {
        match lifecycle {
            Lifecycle::Added => *self = Self::first(hits),
            Lifecycle::Updated | Lifecycle::Reset => {
                if lifecycle == Lifecycle::Reset {
                    self.final_ = TargetList::new();
                }
                self.entering = hits.difference(&self.current);
                self.leaving = self.current.difference(&hits);
                self.current = self
                    .current
                    .union(&self.entering)
                    .difference(&self.leaving);
                self.union = self.union.union(&self.entering);
                self.intersection = self.intersection.intersection(&hits);
            }
            Lifecycle::Removed => {
                self.final_ = hits;
                self.entering = TargetList::new();
                self.leaving = std::mem::take(&mut self.current);
            }
        }
    }
}

/// Continuous (with bounded gaps) history of one physical contact.
///
/// Created and destroyed by the clusterer only. A trace belongs to the group
/// it was created in for its whole life.
#[derive(Debug, Clone)]
pub struct Trace {
    id: TraceId,
    group: GroupId,
    point_id: PointId,
    points: Vec<Point>,
    targets: TraceTargets,
    resurrections: u32,
}

impl Trace {
    /// Start a trace from an `Added` sample.
    pub fn new(id: TraceId, group: GroupId, sample: &ContactSample, table: &TargetTable) -> Self {
        let point = Point::first(sample, Lifecycle::Added);
        let targets = TraceTargets::first(table.hit_test(point.x, point.y));
        tracing::trace!(
            trace = %id,
            group = %group,
            hits = targets.current.len(),
            "Trace started"
        );
        Self {
            id,
            group,
            point_id: sample.id,
            points: vec![point],
            targets,
            resurrections: 0,
        }
    }

    /// Append a sample and re-hit-test.
    pub fn push(&mut self, sample: &ContactSample, lifecycle: Lifecycle, table: &TargetTable) {
        let point = match self.points.last() {
            Some(prev) => Point::following(prev, sample, lifecycle),
            None => Point::first(sample, lifecycle),
        };
        let hits = table.hit_test(point.x, point.y);
        self.targets.apply(lifecycle, hits);
        self.points.push(point);
    }

    /// Reattach a new contact to this dead trace.
    pub fn resurrect(&mut self, sample: &ContactSample, table: &TargetTable) {
        self.point_id = sample.id;
        self.resurrections += 1;
        self.push(sample, Lifecycle::Reset, table);
        tracing::debug!(
            trace = %self.id,
            point = %sample.id,
            resurrections = self.resurrections,
            "Trace resurrected"
        );
    }

    pub fn id(&self) -> TraceId {
        self.id
    }

    pub fn group(&self) -> GroupId {
        self.group
    }

    /// Transport id of the contact currently feeding this trace.
    pub fn point_id(&self) -> PointId {
        self.point_id
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// First sample. Traces are never empty.
    pub fn first(&self) -> &Point {
        &self.points[0]
    }

    pub fn last(&self) -> &Point {
        &self.points[self.points.len() - 1]
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.last().lifecycle
    }

    pub fn is_alive(&self) -> bool {
        self.lifecycle().is_alive()
    }

    pub fn started_ms(&self) -> u64 {
        self.first().timestamp_ms
    }

    pub fn last_ms(&self) -> u64 {
        self.last().timestamp_ms
    }

    /// Time of death, if the trace is currently dead.
    pub fn removed_ms(&self) -> Option<u64> {
        (!self.is_alive()).then(|| self.last_ms())
    }

    /// Alive, or dead for less than `gap_ms`.
    pub fn is_recent(&self, now_ms: u64, gap_ms: u64) -> bool {
        self.is_alive() || now_ms.saturating_sub(self.last_ms()) <= gap_ms
    }

    pub fn resurrections(&self) -> u32 {
        self.resurrections
    }

    /// Forget a removed listener without waiting for the next sample.
    pub fn forget_target(&mut self, id: TargetId) {
        self.targets.forget(id);
    }

    pub fn targets(&self) -> &TraceTargets {
        &self.targets
    }

    /// Largest distance from the first sample reached so far.
    pub fn max_travel(&self) -> f32 {
        let first = self.first();
        self.points
            .iter()
            .map(|p| p.square_distance(first.x, first.y))
            .fold(0.0_f32, f32::max)
            .sqrt()
    }
}
