//! Process-wide table of listener interests.
//!
//! Applications register "listener L wants event E from recognizer R with
//! configuration C" from any thread. Surfaces subscribe to the update stream
//! and fold changes into their live groups at the start of each tick.

use crate::config::Configuration;
use crate::error::{RegistryError, Result};
use crate::event::{Gesture, GestureEvent, RawGesture};
use crate::recognizer::{Recognizer, RecognizerKey, RecognizerType};
use crossbeam_channel::{Receiver, Sender};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tactus_targets::{TargetId, TargetList};

/// Priority of a recognizer/configuration pair nobody set a priority for.
pub const DEFAULT_PRIORITY: i32 = 0;

type Handler = Arc<dyn Fn(&RawGesture) + Send + Sync>;

/// Change notification pushed to surfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryUpdate {
    Registered {
        key: RecognizerKey,
        code: u16,
        target: TargetId,
    },
    PriorityChanged {
        key: RecognizerKey,
        priority: i32,
    },
    Unregistered {
        target: TargetId,
    },
}

/// A recognizer/configuration pair with at least one registration.
#[derive(Debug, Clone)]
pub struct Binding {
    pub kind: RecognizerType,
    pub configuration: Configuration,
    pub priority: i32,
    /// Registered listeners, in first-registration order.
    pub targets: TargetList,
}

impl Binding {
    pub fn key(&self) -> RecognizerKey {
        RecognizerKey::new(&self.kind, &self.configuration)
    }
}

struct Entry {
    key: RecognizerKey,
    kind: RecognizerType,
    configuration: Configuration,
    code: u16,
    target: TargetId,
    handler: Handler,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    priorities: HashMap<RecognizerKey, i32>,
    subscribers: Vec<Sender<RegistryUpdate>>,
}

impl Inner {
    fn broadcast(&mut self, update: RegistryUpdate) {
        self.subscribers
            .retain(|subscriber| subscriber.send(update.clone()).is_ok());
    }
}

/// Registry of recognizer registrations, shared by reference.
#[derive(Default)]
pub struct RecognitionRegistry {
    inner: Mutex<Inner>,
}

impl RecognitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `callback` on `target` for `event` of recognizer `R`.
    pub fn register<R, F>(
        &self,
        configuration: &Configuration,
        event: R::Event,
        target: TargetId,
        callback: F,
    )
    where
        R: Recognizer,
        F: Fn(&Gesture<R::Event>) + Send + Sync + 'static,
    {
        let kind = RecognizerType::of::<R>();
        let key = RecognizerKey::new(&kind, configuration);
        let code = event.code();
        let handler: Handler = Arc::new(move |raw: &RawGesture| {
            if let Some(gesture) = Gesture::<R::Event>::from_raw(raw) {
                callback(&gesture);
            }
        });

        let mut inner = self.lock();
        inner.entries.push(Entry {
            key,
            kind,
            configuration: configuration.clone(),
            code,
            target,
            handler,
        });
        inner.broadcast(RegistryUpdate::Registered { key, code, target });
        tracing::debug!(
            recognizer = R::NAME,
            event = event.name(),
            target_id = %target,
            config = %configuration.id(),
            "Registered gesture listener"
        );
    }

    /// Set the priority of recognizer `R` with `configuration`.
    ///
    /// Lower numbers are evaluated first. A priority can be set once; setting
    /// the same value again is accepted, a different value is refused.
    pub fn set_priority<R: Recognizer>(
        &self,
        configuration: &Configuration,
        priority: i32,
    ) -> Result<()> {
        let key = RecognizerKey::of::<R>(configuration);
        let mut inner = self.lock();
        match inner.priorities.get(&key) {
            Some(existing) if *existing == priority => Ok(()),
            Some(existing) => {
                let err = RegistryError::PriorityRedefined {
                    recognizer: R::NAME,
                    config: configuration.id(),
                    existing: *existing,
                    requested: priority,
                };
                tracing::error!(error = %err, "Priority redefinition refused");
                Err(err)
            }
            None => {
                inner.priorities.insert(key, priority);
                inner.broadcast(RegistryUpdate::PriorityChanged { key, priority });
                tracing::debug!(
                    recognizer = R::NAME,
                    config = %configuration.id(),
                    priority,
                    "Recognizer priority set"
                );
                Ok(())
            }
        }
    }

    /// Drop every registration of `target`.
    pub fn unregister_all(&self, target: TargetId) -> usize {
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|entry| entry.target != target);
        let removed = before - inner.entries.len();
        if removed > 0 {
            inner.broadcast(RegistryUpdate::Unregistered { target });
            tracing::debug!(target_id = %target, removed, "Unregistered gesture listener");
        }
        removed
    }

    /// Receive every registry change made from now on.
    pub fn subscribe(&self) -> Receiver<RegistryUpdate> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.lock().subscribers.push(tx);
        rx
    }

    pub fn priority(&self, key: RecognizerKey) -> i32 {
        self.lock()
            .priorities
            .get(&key)
            .copied()
            .unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Every recognizer/configuration pair with registrations, in first-registration order.
    pub fn bindings(&self) -> Vec<Binding> {
        let inner = self.lock();
        let mut bindings: Vec<Binding> = Vec::new();
        for entry in &inner.entries {
            if let Some(binding) = bindings.iter_mut().find(|b| b.key() == entry.key) {
                binding.targets.push(entry.target);
                continue;
            }
            bindings.push(Binding {
                kind: entry.kind,
                configuration: entry.configuration.clone(),
                priority: inner
                    .priorities
                    .get(&entry.key)
                    .copied()
                    .unwrap_or(DEFAULT_PRIORITY),
                targets: TargetList::from(Some(entry.target)),
            });
        }
        bindings
    }

    /// Listeners registered for one event of one recognizer/configuration pair.
    pub fn targets_for(&self, key: RecognizerKey, code: u16) -> TargetList {
        self.lock()
            .entries
            .iter()
            .filter(|entry| entry.key == key && entry.code == code)
            .map(|entry| entry.target)
            .collect()
    }

    /// Invoke every handler `target` registered for this event.
    ///
    /// Handlers run after the registry lock is released, so they may register
    /// or unregister listeners themselves.
    pub fn dispatch(&self, key: RecognizerKey, gesture: &RawGesture) -> usize {
        let handlers: Vec<Handler> = self
            .lock()
            .entries
            .iter()
            .filter(|entry| {
                entry.key == key && entry.code == gesture.code && entry.target == gesture.target
            })
            .map(|entry| Arc::clone(&entry.handler))
            .collect();
        for handler in &handlers {
            handler(gesture);
        }
        handlers.len()
    }
}

impl std::fmt::Debug for RecognitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("RecognitionRegistry")
            .field("entries", &inner.entries.len())
            .field("priorities", &inner.priorities.len())
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::tests::Signal;
    use crate::recognizer::Context;
    use tactus_contacts::{Arena, GroupId, Trace};

    struct Noop;

    impl Recognizer for Noop {
        type Event = Signal;
        type Config = ();
        const NAME: &'static str = "noop";

        fn new(_config: ()) -> Self {
            Noop
        }

        fn process(&mut self, _cx: &mut Context<'_, '_, Signal>, _traces: &[&Trace]) {}
    }

    fn raw(code: u16, target: TargetId) -> RawGesture {
        let mut groups: Arena<GroupId, ()> = Arena::new();
        RawGesture {
            code,
            event: "began",
            recognizer: "noop",
            group: groups.insert(()),
            target,
            timestamp_ms: 0,
            payload: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_priority_is_write_once() {
        let registry = RecognitionRegistry::new();
        let config = Configuration::empty();
        let key = RecognizerKey::of::<Noop>(&config);

        assert_eq!(registry.priority(key), DEFAULT_PRIORITY);
        registry.set_priority::<Noop>(&config, 3).unwrap();
        registry.set_priority::<Noop>(&config, 3).unwrap();
        let err = registry.set_priority::<Noop>(&config, 1).unwrap_err();

        assert!(matches!(
            err,
            RegistryError::PriorityRedefined { existing: 3, requested: 1, .. }
        ));
        assert_eq!(registry.priority(key), 3);
    }

    #[test]
    fn test_bindings_group_by_configuration() {
        let registry = RecognitionRegistry::new();
        let a = Configuration::empty();
        let b = Configuration::empty();
        let t1 = TargetId::next();
        let t2 = TargetId::next();

        registry.register::<Noop, _>(&a, Signal::Began, t1, |_| {});
        registry.register::<Noop, _>(&b, Signal::Began, t1, |_| {});
        registry.register::<Noop, _>(&a, Signal::Ended, t2, |_| {});
        registry.set_priority::<Noop>(&b, -1).unwrap();

        let bindings = registry.bindings();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].configuration.id(), a.id());
        assert_eq!(bindings[0].targets.as_slice(), &[t1, t2]);
        assert_eq!(bindings[1].priority, -1);
    }

    #[test]
    fn test_dispatch_reaches_matching_handlers_only() {
        let registry = RecognitionRegistry::new();
        let config = Configuration::empty();
        let key = RecognizerKey::of::<Noop>(&config);
        let target = TargetId::next();
        let other = TargetId::next();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        registry.register::<Noop, _>(&config, Signal::Began, target, move |g| {
            sink.lock().unwrap().push(g.event);
        });
        registry.register::<Noop, _>(&config, Signal::Began, other, |_| panic!("wrong target"));

        assert_eq!(registry.dispatch(key, &raw(Signal::Began.code(), target)), 1);
        assert_eq!(registry.dispatch(key, &raw(Signal::Ended.code(), target)), 0);
        assert_eq!(*seen.lock().unwrap(), vec![Signal::Began]);
    }

    #[test]
    fn test_updates_are_broadcast() {
        let registry = RecognitionRegistry::new();
        let updates = registry.subscribe();
        let config = Configuration::empty();
        let target = TargetId::next();

        registry.register::<Noop, _>(&config, Signal::Ended, target, |_| {});
        registry.set_priority::<Noop>(&config, 2).unwrap();
        assert_eq!(registry.unregister_all(target), 1);
        assert_eq!(registry.unregister_all(target), 0);

        let received: Vec<_> = updates.try_iter().collect();
        assert_eq!(received.len(), 3);
        assert!(matches!(received[0], RegistryUpdate::Registered { code: 1, .. }));
        assert!(matches!(received[1], RegistryUpdate::PriorityChanged { priority: 2, .. }));
        assert_eq!(received[2], RegistryUpdate::Unregistered { target });
        assert!(registry.is_empty());
    }

    #[test]
    fn test_handlers_may_reenter_registry() {
        let registry = Arc::new(RecognitionRegistry::new());
        let config = Configuration::empty();
        let key = RecognizerKey::of::<Noop>(&config);
        let target = TargetId::next();

        let inner = Arc::clone(&registry);
        registry.register::<Noop, _>(&config, Signal::Began, target, move |g| {
            inner.unregister_all(g.target);
        });
        registry.dispatch(key, &raw(Signal::Began.code(), target));
        assert!(registry.is_empty());
    }
}
