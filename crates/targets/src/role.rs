//! Named target lists a group exposes.

use serde::{Deserialize, Serialize};

/// A target list (or single-slot "closest" pointer) maintained per group.
///
/// Global recognizers bind each of their events to one role; the event is
/// delivered to the registered listeners currently holding that role.
/// [`Role::Default`] bypasses role filtering altogether.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Targets under the first synchronized cluster of traces at touch-down.
    Initial,
    /// Targets under the most recent synchronized cluster of added traces.
    NewInitial,
    /// Targets under the most recent synchronized cluster of lifted traces.
    Final,
    /// Targets that joined `Current` this tick.
    Entering,
    /// Targets the group is over right now.
    Current,
    /// Targets that left `Current` this tick.
    Leaving,
    /// Targets every trace has stayed over for its whole life.
    Intersection,
    /// Targets any trace has ever been over.
    Union,
    ClosestInitial,
    ClosestNewInitial,
    ClosestFinal,
    /// New occupant of the closest-current slot, in the tick it changed.
    ClosestEntering,
    ClosestCurrent,
    /// Previous occupant of the closest-current slot, in the tick it changed.
    ClosestLeaving,
    /// Every listener registered for the event, regardless of position.
    Default,
}

impl Role {
    /// Every role backed by a group list or slot (excludes `Default`).
    pub const TRACKED: [Role; 14] = [
        Role::Initial,
        Role::NewInitial,
        Role::Final,
        Role::Entering,
        Role::Current,
        Role::Leaving,
        Role::Intersection,
        Role::Union,
        Role::ClosestInitial,
        Role::ClosestNewInitial,
        Role::ClosestFinal,
        Role::ClosestEntering,
        Role::ClosestCurrent,
        Role::ClosestLeaving,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Role::Initial => "initial",
            Role::NewInitial => "new_initial",
            Role::Final => "final",
            Role::Entering => "entering",
            Role::Current => "current",
            Role::Leaving => "leaving",
            Role::Intersection => "intersection",
            Role::Union => "union",
            Role::ClosestInitial => "closest_initial",
            Role::ClosestNewInitial => "closest_new_initial",
            Role::ClosestFinal => "closest_final",
            Role::ClosestEntering => "closest_entering",
            Role::ClosestCurrent => "closest_current",
            Role::ClosestLeaving => "closest_leaving",
            Role::Default => "default",
        }
    }

    pub fn is_closest(&self) -> bool {
        matches!(
            self,
            Role::ClosestInitial
                | Role::ClosestNewInitial
                | Role::ClosestFinal
                | Role::ClosestEntering
                | Role::ClosestCurrent
                | Role::ClosestLeaving
        )
    }

    /// Bit position used by role-change sets.
    pub fn bit(&self) -> u16 {
        1 << (*self as u16)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
