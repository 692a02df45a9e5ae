//! # Cardplay Common Library
//!
//! Shared code for the cardplay playback decision engine:
//! - Configuration model and hot-reloadable configuration store
//! - Card, category, media and visibility types
//! - Outbound playback commands (PlaybackCommand enum) and EventBus
//! - Error type
//! - Time utilities

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use config::{ConfigSnapshot, ConfigStore, PlaybackConfig, VisibilityThresholdSet};
pub use error::{Error, Result};
pub use events::{
    CardId, Category, Direction, EventBus, MediaKind, PauseReason, PlaybackCommand, VisibilityState,
};
