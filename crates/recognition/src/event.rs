//! Gesture events and the notifications delivered to listeners.

use serde::Serialize;
use tactus_contacts::GroupId;
use tactus_targets::{Role, TargetId};

/// Closed set of events a recognizer type can emit.
///
/// Each event is bound to the group role whose members receive it when a
/// Global recognizer emits it. Local recognizers ignore the role and always
/// deliver to their own target.
pub trait GestureEvent: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// Every event of the type, in declaration order.
    const ALL: &'static [Self];

    /// Stable numeric code, unique within the type.
    fn code(&self) -> u16;

    fn name(&self) -> &'static str;

    /// Role whose members receive this event from a Global recognizer.
    fn role(&self) -> Role {
        Role::Default
    }

    fn from_code(code: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|event| event.code() == code)
    }
}

/// Event emitted by a recognizer, before the event type is erased.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub code: u16,
    pub name: &'static str,
    pub timestamp_ms: u64,
    pub payload: serde_json::Value,
}

/// Type-erased notification handed to registry handlers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawGesture {
    pub code: u16,
    pub event: &'static str,
    pub recognizer: &'static str,
    #[serde(serialize_with = "display")]
    pub group: GroupId,
    pub target: TargetId,
    pub timestamp_ms: u64,
    pub payload: serde_json::Value,
}

/// Notification delivered to a listener callback.
#[derive(Debug, Clone, PartialEq)]
pub struct Gesture<E> {
    pub event: E,
    /// Name of the recognizer type that emitted the event.
    pub recognizer: &'static str,
    pub group: GroupId,
    pub target: TargetId,
    pub timestamp_ms: u64,
    pub payload: serde_json::Value,
}

impl<E: GestureEvent> Gesture<E> {
    pub(crate) fn from_raw(raw: &RawGesture) -> Option<Self> {
        Some(Self {
            event: E::from_code(raw.code)?,
            recognizer: raw.recognizer,
            group: raw.group,
            target: raw.target,
            timestamp_ms: raw.timestamp_ms,
            payload: raw.payload.clone(),
        })
    }
}

fn display<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Signal {
        Began,
        Ended,
    }

    impl GestureEvent for Signal {
        const ALL: &'static [Self] = &[Signal::Began, Signal::Ended];

        fn code(&self) -> u16 {
            *self as u16
        }

        fn name(&self) -> &'static str {
            match self {
                Signal::Began => "began",
                Signal::Ended => "ended",
            }
        }

        fn role(&self) -> Role {
            match self {
                Signal::Began => Role::Initial,
                Signal::Ended => Role::Final,
            }
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(Signal::from_code(1), Some(Signal::Ended));
        assert_eq!(Signal::from_code(7), None);
    }
}
