//! # Cardplay Engine (cardplay-engine)
//!
//! Playback decision engine for feeds of media cards.
//!
//! **Purpose:** Turn raw visibility samples into hysteresis-filtered lifecycle
//! transitions, and decide which cards play under per-category and global
//! concurrency caps, with priority preemption, wait-queue promotion and
//! preview rotation.
//!
//! **Architecture:** One `VisibilityMeter` per card feeds a shared
//! `PlaybackScheduler`; the `PlaybackCoordinator` wires them together and a
//! `PreviewTimerDriver` fires preview deadlines on a tokio runtime. Commands
//! leave through the scheduler's `EventBus`.

pub mod coordinator;
pub mod driver;
pub mod error;
pub mod scheduler;
pub mod trace;
pub mod visibility;

pub use coordinator::PlaybackCoordinator;
pub use driver::PreviewTimerDriver;
pub use error::{Error, Result};
pub use scheduler::{CardHandle, PlaybackScheduler, ScheduleEntry, SchedulerStats};
pub use visibility::{Rect, VisibilityEvent, VisibilityMeter};
