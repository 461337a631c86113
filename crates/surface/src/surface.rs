//! The tick driver.

use crate::clusterer::Clusterer;
use crate::error::{Result, SurfaceError};
use crate::group::Group;
use crate::timer::TimerQueue;
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::sync::Arc;
use tactus_config::Settings;
use tactus_contacts::{ContactBatch, GroupId, PointId, Trace, TraceId};
use tactus_recognition::{RecognitionRegistry, RegistryUpdate};
use tactus_targets::{Target, TargetId, TargetTable};

/// What one call to [`Surface::refresh`] or [`Surface::advance_to`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub groups_processed: usize,
    pub groups_created: usize,
    pub groups_destroyed: usize,
    pub traces_resurrected: usize,
    pub timers_fired: usize,
}

/// A touch surface: targets, clustering, and recognition for one contact stream.
///
/// All methods must be called from a single thread (the tick thread);
/// registrations go through the shared [`RecognitionRegistry`] and are folded
/// in at the start of each tick.
pub struct Surface {
    settings: Arc<Settings>,
    registry: Arc<RecognitionRegistry>,
    updates: Receiver<RegistryUpdate>,
    table: TargetTable,
    clusterer: Clusterer,
    timers: TimerQueue,
    now_ms: u64,
}

impl Surface {
    /// Create a surface over validated settings.
    pub fn new(settings: Settings, registry: Arc<RecognitionRegistry>) -> Result<Self> {
        settings.validate()?;
        let updates = registry.subscribe();
        tracing::debug!(
            aggregation = %settings.aggregation,
            grouping_space = settings.grouping_space,
            trace_time_gap_ms = settings.trace_time_gap_ms,
            "Surface created"
        );
        Ok(Self {
            settings: Arc::new(settings),
            registry,
            updates,
            table: TargetTable::new(),
            clusterer: Clusterer::new(),
            timers: TimerQueue::new(),
            now_ms: 0,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &Arc<RecognitionRegistry> {
        &self.registry
    }

    pub fn table(&self) -> &TargetTable {
        &self.table
    }

    /// Latest time the surface has seen.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Add a hit-testable target under a fresh id.
    pub fn add_target(&mut self, target: Arc<dyn Target>) -> TargetId {
        self.table.add(target)
    }

    /// Add or replace the target stored under `id`.
    pub fn insert_target(&mut self, id: TargetId, target: Arc<dyn Target>) {
        self.table.insert(id, target);
    }

    /// Remove a target, its cached role memberships and every recognizer
    /// state bound to it.
    ///
    /// Registry registrations are left alone; use
    /// [`RecognitionRegistry::unregister_all`] for those.
    pub fn remove_target(&mut self, id: TargetId) -> bool {
        let removed = self.table.remove(id);
        self.clusterer.forget_target(id);
        removed
    }

    /// Process one transport batch.
    pub fn refresh(&mut self, batch: &ContactBatch) -> Result<TickSummary> {
        let mut summary = TickSummary::default();
        self.now_ms = self.now_ms.max(batch.timestamp_ms);
        self.apply_registry_updates();
        summary.timers_fired = self.fire_timers();

        let ingested = self
            .clusterer
            .ingest(batch, &self.table, &self.settings)?;
        summary.groups_created = ingested.groups_created;
        summary.traces_resurrected = ingested.traces_resurrected;

        let now = self.now_ms;
        let (traces, groups) = self.clusterer.parts_mut();
        for (group_id, touched) in &ingested.touched {
            let group = groups
                .get_mut(*group_id)
                .ok_or(SurfaceError::MissingGroup(*group_id))?;
            group.process(
                now,
                touched,
                traces,
                &self.table,
                &self.settings,
                &self.registry,
            )?;
            summary.groups_processed += 1;
        }

        self.schedule_timers();
        summary.groups_destroyed = self.collect_garbage();
        if summary != TickSummary::default() {
            tracing::trace!(now_ms = self.now_ms, ?summary, "Tick");
        }
        Ok(summary)
    }

    /// Move the clock forward without new contacts: fires timers and expires groups.
    pub fn advance_to(&mut self, now_ms: u64) -> TickSummary {
        self.now_ms = self.now_ms.max(now_ms);
        self.apply_registry_updates();
        let timers_fired = self.fire_timers();
        self.schedule_timers();
        let groups_destroyed = self.collect_garbage();
        TickSummary {
            timers_fired,
            groups_destroyed,
            ..TickSummary::default()
        }
    }

    /// Earliest pending timer deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers.next_deadline()
    }

    pub fn groups(&self) -> impl Iterator<Item = (GroupId, &Group)> + '_ {
        self.clusterer.groups().iter()
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.clusterer.groups().get(id)
    }

    pub fn trace(&self, id: TraceId) -> Option<&Trace> {
        self.clusterer.traces().get(id)
    }

    /// Trace currently fed by transport contact `point`.
    pub fn trace_for_point(&self, point: PointId) -> Option<&Trace> {
        self.clusterer.trace_for_point(point)
    }

    /// Group currently holding transport contact `point`.
    pub fn group_for_point(&self, point: PointId) -> Option<&Group> {
        self.trace_for_point(point)
            .and_then(|trace| self.group(trace.group()))
    }

    fn apply_registry_updates(&mut self) {
        let mut resync = false;
        let (traces, groups) = self.clusterer.parts_mut();
        for update in self.updates.try_iter() {
            match update {
                RegistryUpdate::Registered { .. } => resync = true,
                RegistryUpdate::PriorityChanged { key, priority } => {
                    for (_, group) in groups.iter_mut() {
                        group.arbiter_mut().apply_priority(key, priority);
                    }
                }
                RegistryUpdate::Unregistered { target } => {
                    for (_, group) in groups.iter_mut() {
                        group.arbiter_mut().remove_target(target);
                    }
                }
            }
        }
        if resync {
            for (_, group) in groups.iter_mut() {
                group.sync(self.now_ms, traces, &self.table, &self.registry);
            }
        }
    }

    fn fire_timers(&mut self) -> usize {
        let due = self.timers.pop_due(self.now_ms);
        let fired = due.len();
        let (traces, groups) = self.clusterer.parts_mut();
        for timer in due {
            let Some(group) = groups.get_mut(timer.group) else {
                tracing::trace!(group = %timer.group, token = timer.token, "Timer for destroyed group dropped");
                continue;
            };
            group.timer_expired(
                self.now_ms,
                timer.runtime,
                timer.token,
                traces,
                &self.table,
                &self.registry,
            );
        }
        fired
    }

    fn schedule_timers(&mut self) {
        let now = self.now_ms;
        let (_, groups) = self.clusterer.parts_mut();
        for (group_id, group) in groups.iter_mut() {
            for timer in group.arbiter_mut().drain_timers() {
                self.timers.schedule(
                    now.saturating_add(timer.delay_ms),
                    group_id,
                    timer.runtime,
                    timer.token,
                );
            }
        }
    }

    /// A dead group is kept past its grace period only while it still has
    /// recognizer work and a timer that could move that work forward.
    fn collect_garbage(&mut self) -> usize {
        let timers = &self.timers;
        let destroyed = self
            .clusterer
            .collect_garbage(self.now_ms, &self.settings, |group| {
                !group.is_done() && timers.has_group(group.id())
            });
        for id in &destroyed {
            self.timers.cancel_group(*id);
        }
        destroyed.len()
    }
}

impl std::fmt::Debug for Surface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Surface")
            .field("settings", &self.settings)
            .field("targets", &self.table.len())
            .field("groups", &self.clusterer.groups().len())
            .field("timers", &self.timers.len())
            .field("now_ms", &self.now_ms)
            .finish()
    }
}
