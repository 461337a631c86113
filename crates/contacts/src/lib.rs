//! Contact bookkeeping: from transport samples to grouped traces.
//!
//! # Layout
//!
//! ```text
//! arena.rs - generational arena and typed keys
//! point.rs - PointId, Lifecycle, ContactSample, ContactBatch, Point kinematics
//! trace.rs - Trace: per-contact history and per-sample target roles
//! group.rs - GroupState: centroids, aggregated roles, role-change detection
//! ```
//!
//! Nothing here decides which trace belongs to which group; that is the
//! clusterer's job. This crate only keeps the books once it has decided.

pub mod arena;
mod group;
mod point;
mod trace;

pub use arena::{Arena, ArenaKey};
pub use group::{GroupId, GroupState, GroupTargets, RoleChanges};
pub use point::{ContactBatch, ContactSample, Lifecycle, Point, PointId};
pub use trace::{Trace, TraceId, TraceTargets};
