//! Preview rotation
//!
//! **Responsibilities:**
//! - Popping due preview deadlines, discarding stale ones
//! - Handing an expired preview slot to the best waiting card
//! - Re-arming the preview when nobody can take the slot

use super::core::SchedulerPass;
use cardplay_common::events::{CardId, PauseReason, PlaybackCommand};
use tracing::{debug, info};

impl SchedulerPass<'_> {
    /// Fire all live timers due at the current time
    ///
    /// Overdue deadlines fire in deadline order, each at its own time, so a
    /// preview re-armed by one expiry can expire again within the same call.
    pub(super) fn fire_due_timers(&mut self) -> usize {
        let call_ms = self.now_ms;
        let mut fired = 0;
        while let Some(deadline) = self.state.deadlines.pop_due(call_ms) {
            let armed = self
                .state
                .entries
                .get(&deadline.card_id)
                .and_then(|e| e.preview_timer)
                .is_some_and(|t| t.generation == deadline.generation);
            if !armed {
                debug!(
                    "Discarding stale preview timer for {} ({}ms)",
                    deadline.card_id, deadline.at_ms
                );
                continue;
            }
            fired += 1;
            self.now_ms = deadline.at_ms;
            self.on_preview_end(&deadline.card_id);
            self.now_ms = call_ms;
        }
        fired
    }

    /// Preview slice of a playing card ended
    fn on_preview_end(&mut self, card_id: &CardId) {
        let Some(entry) = self.state.entries.get_mut(card_id) else {
            return;
        };
        entry.preview_timer = None;
        if !entry.is_playing {
            return;
        }
        if entry.is_live() || !self.config.scheduler.rotation_active() {
            debug!("Rotation not applicable to {}, timer dropped", card_id);
            return;
        }

        match self.rotation_candidate(card_id) {
            Some(next) => {
                info!("Preview of {} ended, rotating to {}", card_id, next);
                self.pause(card_id, PauseReason::Rotated);
                self.requeue_at_back(card_id);
                self.admit(&next);
                self.emit(PlaybackCommand::sequence(card_id, &next));
            }
            None => {
                debug!("Preview of {} ended with nobody waiting, extending", card_id);
                self.arm_preview(card_id);
            }
        }
    }

    /// First waiting card that could take `current`'s slot
    ///
    /// Candidates are eligible (prepare or active), not playing, not live,
    /// and fit under every cap once `current` stops.
    fn rotation_candidate(&self, current: &CardId) -> Option<CardId> {
        let freed = self.category_of(current)?;
        let total_after = self.playing_count().saturating_sub(1);
        if total_after >= self.global_cap() {
            return None;
        }

        self.ordered_wait_queue().into_iter().find(|candidate| {
            if candidate == current {
                return false;
            }
            let Some(entry) = self.state.entries.get(candidate) else {
                return false;
            };
            if entry.is_playing || entry.is_live() || !entry.is_eligible() {
                return false;
            }
            let Some(category) = self.category_of(candidate) else {
                return false;
            };
            let mut in_category = self.playing_in(&category);
            if category == freed {
                in_category = in_category.saturating_sub(1);
            }
            in_category < self.config.scheduler.cap(&category)
        })
    }
}
