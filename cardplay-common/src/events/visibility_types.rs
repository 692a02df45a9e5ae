//! Visibility state and direction definitions
//!
//! Supporting types for turning viewport overlap into discrete engagement
//! states.

use serde::{Deserialize, Serialize};

/// Direction of visibility change between two samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Visible fraction increased
    MovingIn,
    /// Visible fraction decreased
    MovingOut,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::MovingIn => write!(f, "MovingIn"),
            Direction::MovingOut => write!(f, "MovingOut"),
        }
    }
}

/// Discrete visibility state of a card
///
/// Incoming side, shallow to deep: `Prefetch`, `PrepareToBeActive`, `IsActive`.
/// Outgoing side, shallow to deep: `WillResignActive`, `NotActive`, `Released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VisibilityState {
    Prefetch,
    PrepareToBeActive,
    IsActive,
    WillResignActive,
    NotActive,
    Released,
}

impl VisibilityState {
    /// States reached while moving in, in threshold order
    pub const MOVING_IN: [VisibilityState; 3] = [
        VisibilityState::Prefetch,
        VisibilityState::PrepareToBeActive,
        VisibilityState::IsActive,
    ];

    /// States reached while moving out, in threshold order
    pub const MOVING_OUT: [VisibilityState; 3] = [
        VisibilityState::WillResignActive,
        VisibilityState::NotActive,
        VisibilityState::Released,
    ];

    /// Depth of engagement
    ///
    /// `released < notActive < prefetch < willResignActive < prepareToBeActive < isActive`
    pub fn engagement(self) -> u8 {
        match self {
            VisibilityState::Released => 0,
            VisibilityState::NotActive => 1,
            VisibilityState::Prefetch => 2,
            VisibilityState::WillResignActive => 3,
            VisibilityState::PrepareToBeActive => 4,
            VisibilityState::IsActive => 5,
        }
    }

    /// Side of the threshold configuration that produces this state
    pub fn direction(self) -> Direction {
        match self {
            VisibilityState::Prefetch
            | VisibilityState::PrepareToBeActive
            | VisibilityState::IsActive => Direction::MovingIn,
            VisibilityState::WillResignActive
            | VisibilityState::NotActive
            | VisibilityState::Released => Direction::MovingOut,
        }
    }

    /// Eligible to hold or wait for a playing slot
    pub fn is_eligible(self) -> bool {
        matches!(
            self,
            VisibilityState::PrepareToBeActive | VisibilityState::IsActive
        )
    }

    /// Level reached on the incoming side (`-1` = nothing yet)
    ///
    /// Outgoing states map to the incoming level they still imply: a resigned
    /// card is still mounted (prepare level), a not-active card may still be
    /// prefetched (prefetch level).
    pub fn incoming_level(self) -> i8 {
        match self {
            VisibilityState::Released => -1,
            VisibilityState::NotActive | VisibilityState::Prefetch => 0,
            VisibilityState::WillResignActive | VisibilityState::PrepareToBeActive => 1,
            VisibilityState::IsActive => 2,
        }
    }

    /// Level reached on the outgoing side (`-1` = nothing yet)
    pub fn outgoing_level(self) -> i8 {
        match self {
            VisibilityState::IsActive => -1,
            VisibilityState::WillResignActive | VisibilityState::PrepareToBeActive => 0,
            VisibilityState::NotActive | VisibilityState::Prefetch => 1,
            VisibilityState::Released => 2,
        }
    }
}

impl std::fmt::Display for VisibilityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VisibilityState::Prefetch => write!(f, "prefetch"),
            VisibilityState::PrepareToBeActive => write!(f, "prepareToBeActive"),
            VisibilityState::IsActive => write!(f, "isActive"),
            VisibilityState::WillResignActive => write!(f, "willResignActive"),
            VisibilityState::NotActive => write!(f, "notActive"),
            VisibilityState::Released => write!(f, "released"),
        }
    }
}
