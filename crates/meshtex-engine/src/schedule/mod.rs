//! Coalesced, tick-deferred rebuild scheduling.
//!
//! - [`TickLoop`]: single-threaded queue of callbacks run once per tick
//! - [`DirtyState`]: dirty flags plus the one "resolve pending" bit

mod dirty;
mod tick;

pub use dirty::{DirtyFlags, DirtyState};
pub use tick::TickLoop;
