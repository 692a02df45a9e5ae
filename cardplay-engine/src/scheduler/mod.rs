//! Playback scheduler
//!
//! **Module Structure:**
//! - `core.rs`: Lifecycle, shared state, transition dispatch, unmount
//! - `admission.rs`: Caps, admission, preemption, promotion, timers
//! - `rotation.rs`: Preview expiry and slot hand-over
//! - `diagnostics.rs`: Stats, accessors, invariant check
//! - `wait_queue.rs`, `deadlines.rs`, `entry.rs`: Supporting structures

mod admission;
mod core;
mod deadlines;
mod diagnostics;
mod entry;
mod rotation;
mod wait_queue;

pub use self::core::PlaybackScheduler;
pub use diagnostics::SchedulerStats;
pub use entry::{CardHandle, PreviewTimer, ScheduleEntry};
