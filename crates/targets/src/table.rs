//! Registered listeners, in hit-test order.

use crate::list::TargetList;
use crate::target::{Target, TargetId};
use std::sync::Arc;

/// Table of hit-testable listeners.
///
/// Hit-testing reports targets in table order (the order they were added).
#[derive(Clone, Default)]
pub struct TargetTable {
    entries: Vec<(TargetId, Arc<dyn Target>)>,
}

impl TargetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target under a freshly allocated id.
    pub fn add(&mut self, target: Arc<dyn Target>) -> TargetId {
        let id = TargetId::next();
        self.insert(id, target);
        id
    }

    /// Add or replace the target stored under `id`.
    pub fn insert(&mut self, id: TargetId, target: Arc<dyn Target>) {
        if let Some(entry) = self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            entry.1 = target;
            return;
        }
        self.entries.push((id, target));
        tracing::trace!(target_id = %id, "Target added");
    }

    /// Remove a target. Returns whether it was present.
    pub fn remove(&mut self, id: TargetId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub fn get(&self, id: TargetId) -> Option<&Arc<dyn Target>> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, target)| target)
    }

    pub fn contains(&self, id: TargetId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = TargetId> + '_ {
        self.entries.iter().map(|(id, _)| *id)
    }

    /// Every target containing `(x, y)`, in table order.
    pub fn hit_test(&self, x: f32, y: f32) -> TargetList {
        self.entries
            .iter()
            .filter(|(_, target)| target.contains_point(x, y))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Squared distance from `(x, y)` to target `id`, if registered.
    pub fn square_distance(&self, id: TargetId, x: f32, y: f32) -> Option<f32> {
        self.get(id).map(|target| target.square_distance(x, y))
    }
}

impl std::fmt::Debug for TargetTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetTable")
            .field("ids", &self.ids().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::RectTarget;

    #[test]
    fn test_hit_test_in_table_order() {
        let mut table = TargetTable::new();
        let background = table.add(Arc::new(RectTarget::new(0.0, 0.0, 1.0, 1.0)));
        let button = table.add(Arc::new(RectTarget::new(0.4, 0.4, 0.2, 0.2)));

        let hits = table.hit_test(0.5, 0.5);
        assert_eq!(hits.as_slice(), &[background, button]);

        let hits = table.hit_test(0.1, 0.1);
        assert_eq!(hits.as_slice(), &[background]);
    }

    #[test]
    fn test_insert_replaces_existing() {
        let mut table = TargetTable::new();
        let id = TargetId::next();
        table.insert(id, Arc::new(RectTarget::new(0.0, 0.0, 0.1, 0.1)));
        table.insert(id, Arc::new(RectTarget::new(0.5, 0.5, 0.1, 0.1)));

        assert_eq!(table.len(), 1);
        assert!(table.hit_test(0.55, 0.55).contains(id));
    }

    #[test]
    fn test_remove() {
        let mut table = TargetTable::new();
        let id = table.add(Arc::new(RectTarget::new(0.0, 0.0, 1.0, 1.0)));
        assert!(table.remove(id));
        assert!(!table.remove(id));
        assert!(table.hit_test(0.5, 0.5).is_empty());
        assert_eq!(table.square_distance(id, 0.5, 0.5), None);
    }
}
