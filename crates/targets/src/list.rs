//! Ordered target sets.
//!
//! Lists keep the order in which members were first seen (hit-test order for
//! fresh lists, left operand first for combined lists) and never hold
//! duplicates. Lists are tiny (a handful of listeners under a contact), so the
//! set operations are plain linear scans.

use crate::table::TargetTable;
use crate::target::TargetId;
use serde::{Deserialize, Serialize};

/// Ordered, duplicate-free set of targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetList(Vec<TargetId>);

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `id` unless it is already a member. Returns whether it was added.
    pub fn push(&mut self, id: TargetId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.0.push(id);
        true
    }

    /// Remove `id`. Returns whether it was a member.
    pub fn remove(&mut self, id: TargetId) -> bool {
        let before = self.0.len();
        self.0.retain(|member| *member != id);
        self.0.len() != before
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.0.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn first(&self) -> Option<TargetId> {
        self.0.first().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[TargetId] {
        &self.0
    }

    /// Members of `self`, then members of `other` not already present.
    pub fn union(&self, other: &TargetList) -> TargetList {
        let mut out = self.clone();
        for id in other.iter() {
            out.push(id);
        }
        out
    }

    /// Members of `self` that are also in `other`, in `self` order.
    pub fn intersection(&self, other: &TargetList) -> TargetList {
        TargetList(self.iter().filter(|id| other.contains(*id)).collect())
    }

    /// Members of `self` that are not in `other`, in `self` order.
    pub fn difference(&self, other: &TargetList) -> TargetList {
        TargetList(self.iter().filter(|id| !other.contains(*id)).collect())
    }

    /// Set equality, ignoring order.
    pub fn same_members(&self, other: &TargetList) -> bool {
        self.len() == other.len() && self.iter().all(|id| other.contains(id))
    }

    /// Union of every list, in first-seen order.
    pub fn union_all<'a>(lists: impl IntoIterator<Item = &'a TargetList>) -> TargetList {
        let mut out = TargetList::new();
        for list in lists {
            for id in list.iter() {
                out.push(id);
            }
        }
        out
    }

    /// Intersection of every list. Empty when there are no lists.
    pub fn intersection_all<'a>(lists: impl IntoIterator<Item = &'a TargetList>) -> TargetList {
        let mut iter = lists.into_iter();
        let Some(first) = iter.next() else {
            return TargetList::new();
        };
        iter.fold(first.clone(), |acc, list| acc.intersection(list))
    }

    /// Member nearest to `(x, y)`, if any lies within `max_square_distance`.
    ///
    /// Ties keep the earlier member. Members missing from `table` are skipped.
    pub fn closest(
        &self,
        table: &TargetTable,
        x: f32,
        y: f32,
        max_square_distance: f32,
    ) -> Option<TargetId> {
        let mut best: Option<(TargetId, f32)> = None;
        for id in self.iter() {
            let Some(d2) = table.square_distance(id, x, y) else {
                continue;
            };
            if d2 > max_square_distance {
                continue;
            }
            match best {
                Some((_, best_d2)) if best_d2 <= d2 => {}
                _ => best = Some((id, d2)),
            }
        }
        best.map(|(id, _)| id)
    }
}

impl FromIterator<TargetId> for TargetList {
    fn from_iter<I: IntoIterator<Item = TargetId>>(iter: I) -> Self {
        let mut out = TargetList::new();
        for id in iter {
            out.push(id);
        }
        out
    }
}

impl From<Option<TargetId>> for TargetList {
    fn from(id: Option<TargetId>) -> Self {
        id.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a TargetList {
    type Item = TargetId;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, TargetId>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}
