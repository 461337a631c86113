//! Recognizer configurations.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tactus_targets::Role;

static NEXT_CONFIG_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Configuration`]. Clones share it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigId(u64);

impl std::fmt::Display for ConfigId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "config#{}", self.0)
    }
}

/// Configuration a recognizer instance is built from.
///
/// Two registrations share recognizer instances (and a priority) only when
/// they use the same recognizer type and the same configuration, i.e. clones
/// of one `Configuration`. The payload is handed to the recognizer's
/// constructor; a payload of the wrong concrete type makes the recognizer fall
/// back to its default configuration.
#[derive(Clone)]
pub struct Configuration {
    id: ConfigId,
    exclusive: bool,
    local_role: Role,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Configuration {
    /// Wrap a recognizer-specific configuration value.
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self {
            id: ConfigId(NEXT_CONFIG_ID.fetch_add(1, Ordering::Relaxed)),
            exclusive: false,
            local_role: Role::Intersection,
            payload: Arc::new(payload),
        }
    }

    /// Configuration without a payload; recognizers use their defaults.
    pub fn empty() -> Self {
        Self::new(())
    }

    /// Once a recognizer with this configuration wins, every other pending
    /// recognizer of the group is discarded.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Group role whose members get a Local instance (default: intersection).
    pub fn with_local_role(mut self, role: Role) -> Self {
        self.local_role = role;
        self
    }

    pub fn id(&self) -> ConfigId {
        self.id
    }

    pub fn is_exclusive(&self) -> bool {
        self.exclusive
    }

    pub fn local_role(&self) -> Role {
        self.local_role
    }

    /// Payload as `T`, if it has that type.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("id", &self.id)
            .field("exclusive", &self.exclusive)
            .field("local_role", &self.local_role)
            .finish_non_exhaustive()
    }
}
