//! Listeners ("targets") that gestures are delivered to.
//!
//! A target is anything that can answer two questions about a surface
//! coordinate: does it contain the point, and how far away is it. The rest of
//! the system only ever refers to targets through their [`TargetId`] and
//! reasons about sets of them with [`TargetList`].
//!
//! # Layout
//!
//! ```text
//! target.rs - Target trait, TargetId, RectTarget
//! table.rs  - TargetTable: id -> target, hit-testing in table order
//! list.rs   - TargetList: ordered set algebra (union, intersection, difference)
//! role.rs   - Role: named target lists a group exposes to recognizers
//! ```

mod list;
mod role;
mod table;
mod target;

pub use list::TargetList;
pub use role::Role;
pub use table::TargetTable;
pub use target::{RectTarget, Target, TargetId};
