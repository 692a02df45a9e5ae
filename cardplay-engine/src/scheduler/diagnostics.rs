//! Diagnostics and invariant checks
//!
//! **Responsibilities:**
//! - Status accessors (stats, playing cards, wait queue order, entries)
//! - Post-event cap invariant check

use super::core::{PlaybackScheduler, SchedulerPass};
use super::entry::ScheduleEntry;
use cardplay_common::events::{CardId, PauseReason};
use serde::Serialize;
use tracing::error;

/// Point-in-time scheduler counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchedulerStats {
    /// Cards with a schedule entry
    pub active_count: usize,
    pub playing_count: usize,
    pub wait_queue_length: usize,
    /// Preview timers currently armed
    pub armed_timers: usize,
}

impl PlaybackScheduler {
    pub fn stats(&self) -> SchedulerStats {
        let state = self.lock_state();
        SchedulerStats {
            active_count: state.entries.len(),
            playing_count: state.entries.values().filter(|e| e.is_playing).count(),
            wait_queue_length: state.wait_queue.len(),
            armed_timers: state
                .entries
                .values()
                .filter(|e| e.preview_timer.is_some())
                .count(),
        }
    }

    pub fn is_playing(&self, card_id: &CardId) -> bool {
        self.lock_state()
            .entries
            .get(card_id)
            .is_some_and(|e| e.is_playing)
    }

    /// Copy of a card's schedule entry
    pub fn entry(&self, card_id: &CardId) -> Option<ScheduleEntry> {
        self.lock_state().entries.get(card_id).cloned()
    }

    /// Playing cards, earliest admitted first
    pub fn playing_cards(&self) -> Vec<CardId> {
        let state = self.lock_state();
        let mut playing: Vec<&ScheduleEntry> =
            state.entries.values().filter(|e| e.is_playing).collect();
        playing.sort_by_key(|e| (e.admitted_at, e.arrival_seq));
        playing.into_iter().map(|e| e.id().clone()).collect()
    }

    /// Waiting cards in promotion order under the current configuration
    pub fn waiting_cards(&self) -> Vec<CardId> {
        let config = self.config.current();
        let mut state = self.lock_state();
        let pass = SchedulerPass::new(&mut state, &config, &self.events, 0);
        pass.ordered_wait_queue()
    }
}

impl SchedulerPass<'_> {
    /// Verify caps after an event
    ///
    /// A violation is a scheduler bug: debug builds panic, release builds
    /// log it and pause the excess cards.
    pub(super) fn check_invariants(&mut self) {
        let excess = self.cards_over_caps();
        if excess.is_empty() {
            return;
        }
        debug_assert!(
            excess.is_empty(),
            "playing cards exceed caps: {:?}",
            excess
        );
        error!(
            "Cap invariant violated, clamping {} card(s): {:?}",
            excess.len(),
            excess
        );
        for card_id in excess {
            self.pause(&card_id, PauseReason::InvariantClamp);
            self.requeue_at_back(&card_id);
        }
    }
}
