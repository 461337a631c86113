//! Deadline queue for recognizer timers.
//!
//! Recognizers never sleep. They ask for a callback after some delay; the
//! surface keeps every such request here and fires the due ones on the tick
//! thread, so timer callbacks and ticks never run concurrently.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use tactus_contacts::GroupId;
use tactus_recognition::RuntimeId;

/// One scheduled recognizer callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimerEntry {
    pub deadline_ms: u64,
    /// Tie-breaker: timers due at the same time fire in scheduling order.
    pub seq: u64,
    pub group: GroupId,
    pub runtime: RuntimeId,
    pub token: u64,
}

/// Min-heap of timer deadlines.
#[derive(Debug, Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<TimerEntry>>,
    next_seq: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline_ms: u64, group: GroupId, runtime: RuntimeId, token: u64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(TimerEntry {
            deadline_ms,
            seq,
            group,
            runtime,
            token,
        }));
        tracing::trace!(group = %group, runtime = %runtime, token, deadline_ms, "Timer scheduled");
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.heap.peek().map(|Reverse(entry)| entry.deadline_ms)
    }

    /// Remove and return every timer due at `now_ms`, earliest first.
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<TimerEntry> {
        let mut due = Vec::new();
        while let Some(Reverse(entry)) = self.heap.peek() {
            if entry.deadline_ms > now_ms {
                break;
            }
            if let Some(Reverse(entry)) = self.heap.pop() {
                due.push(entry);
            }
        }
        due
    }

    pub fn has_group(&self, group: GroupId) -> bool {
        self.heap.iter().any(|Reverse(entry)| entry.group == group)
    }

    pub fn cancel_group(&mut self, group: GroupId) {
        self.heap.retain(|Reverse(entry)| entry.group != group);
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
