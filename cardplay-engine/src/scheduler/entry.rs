//! Scheduler-owned per-card records

use cardplay_common::events::{CardId, Category, MediaKind, VisibilityState};
use serde::{Deserialize, Serialize};

/// Identity a card presents to the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardHandle {
    /// Stable for the card's mounted lifetime
    pub id: CardId,
    /// Selects concurrency cap and priority
    pub category: Category,
    pub media_kind: MediaKind,
    /// Last transition the scheduler received for this card
    #[serde(default)]
    pub last_visibility_state: Option<VisibilityState>,
}

impl CardHandle {
    pub fn new(id: impl Into<CardId>, category: Category, media_kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            category,
            media_kind,
            last_visibility_state: None,
        }
    }

    pub fn on_demand(id: impl Into<CardId>, category: Category) -> Self {
        Self::new(id, category, MediaKind::OnDemand)
    }

    pub fn live(id: impl Into<CardId>, category: Category) -> Self {
        Self::new(id, category, MediaKind::Live)
    }
}

/// Armed preview timer
///
/// `generation` distinguishes a re-armed timer from stale heap entries of
/// an earlier arm of the same card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewTimer {
    pub deadline_ms: u64,
    pub generation: u64,
}

/// Per-card scheduling record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub handle: CardHandle,
    pub is_playing: bool,
    /// When the card last started playing
    pub admitted_at: Option<u64>,
    pub preview_timer: Option<PreviewTimer>,
    /// Arrival order within the wait queue
    pub(crate) arrival_seq: u64,
}

impl ScheduleEntry {
    pub(crate) fn new(handle: CardHandle, arrival_seq: u64) -> Self {
        Self {
            handle,
            is_playing: false,
            admitted_at: None,
            preview_timer: None,
            arrival_seq,
        }
    }

    pub fn id(&self) -> &CardId {
        &self.handle.id
    }

    /// Last known visibility state
    pub fn state(&self) -> Option<VisibilityState> {
        self.handle.last_visibility_state
    }

    pub fn preview_deadline(&self) -> Option<u64> {
        self.preview_timer.map(|t| t.deadline_ms)
    }

    pub fn is_live(&self) -> bool {
        self.handle.media_kind.is_live()
    }

    pub fn is_eligible(&self) -> bool {
        self.state().is_some_and(|s| s.is_eligible())
    }

    /// Eligible for admission on promotion (isActive, not playing)
    pub fn is_waiting_active(&self) -> bool {
        !self.is_playing && self.state() == Some(VisibilityState::IsActive)
    }
}
