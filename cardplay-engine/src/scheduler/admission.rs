//! Admission control
//!
//! **Responsibilities:**
//! - Cap accounting (per category and global)
//! - Admission, preemption of lower-priority cards, enqueueing
//! - Promotion from the wait queue when a slot frees
//! - Enforcing lowered caps after a configuration change
//! - Arming and cancelling preview timers

use super::core::SchedulerPass;
use super::entry::PreviewTimer;
use super::wait_queue::WaitKey;
use cardplay_common::events::{CardId, Category, PauseReason, PlaybackCommand};
use tracing::{debug, info, warn};

impl SchedulerPass<'_> {
    /// Category a card is scheduled under
    ///
    /// Categories missing from the configuration schedule as `default`.
    pub(super) fn category_of(&self, card_id: &CardId) -> Option<Category> {
        self.state.entries.get(card_id).map(|e| {
            if self.config.scheduler.is_known(&e.handle.category) {
                e.handle.category.clone()
            } else {
                Category::default_category()
            }
        })
    }

    pub(super) fn priority_of(&self, card_id: &CardId) -> u32 {
        self.category_of(card_id)
            .map(|c| self.config.scheduler.priority(&c))
            .unwrap_or(0)
    }

    pub(super) fn is_playing(&self, card_id: &CardId) -> bool {
        self.state.entries.get(card_id).is_some_and(|e| e.is_playing)
    }

    pub(super) fn playing_count(&self) -> usize {
        self.state.entries.values().filter(|e| e.is_playing).count()
    }

    pub(super) fn playing_in(&self, category: &Category) -> usize {
        self.state
            .entries
            .keys()
            .filter(|id| self.is_playing(id) && self.category_of(id).as_ref() == Some(category))
            .count()
    }

    /// Effective global cap: one on low-end devices
    pub(super) fn global_cap(&self) -> usize {
        if self.config.performance.low_end_device {
            1
        } else {
            self.config.scheduler.max_total_playing
        }
    }

    /// Whether the scheduler may start playback on its own
    pub(super) fn autoplay_allowed(&self) -> bool {
        !self.config.performance.low_end_device || self.config.performance.autoplay_on_low_end
    }

    fn category_has_room(&self, category: &Category) -> bool {
        self.playing_in(category) < self.config.scheduler.cap(category)
    }

    fn global_has_room(&self) -> bool {
        self.playing_count() < self.global_cap()
    }

    pub(super) fn can_admit(&self, category: &Category) -> bool {
        self.category_has_room(category) && self.global_has_room()
    }

    /// Wait-queue sort key computed from the current configuration
    pub(super) fn wait_key(&self, card_id: &CardId) -> Option<WaitKey> {
        let entry = self.state.entries.get(card_id)?;
        Some(WaitKey {
            priority: self.priority_of(card_id),
            engagement: entry.state().map(|s| s.engagement()).unwrap_or(0),
            arrival_seq: entry.arrival_seq,
        })
    }

    /// Waiting cards in promotion order
    pub(super) fn ordered_wait_queue(&self) -> Vec<CardId> {
        self.state.wait_queue.ordered(|id| self.wait_key(id))
    }

    pub(super) fn enqueue(&mut self, card_id: &CardId) {
        if self.state.wait_queue.insert(card_id) {
            debug!("Card {} waiting ({} in queue)", card_id, self.state.wait_queue.len());
        }
    }

    /// Put a card back at the end of its priority class
    pub(super) fn requeue_at_back(&mut self, card_id: &CardId) {
        let seq = self.state.next_arrival();
        let Some(entry) = self.state.entries.get_mut(card_id) else {
            return;
        };
        if !entry.is_eligible() {
            return;
        }
        entry.arrival_seq = seq;
        self.state.wait_queue.remove(card_id);
        self.state.wait_queue.insert(card_id);
    }

    /// Start a card playing
    pub(super) fn admit(&mut self, card_id: &CardId) {
        let Some(entry) = self.state.entries.get_mut(card_id) else {
            return;
        };
        entry.is_playing = true;
        entry.admitted_at = Some(self.now_ms);
        let live = entry.is_live();
        self.state.wait_queue.remove(card_id);
        self.emit(PlaybackCommand::play(card_id));

        if self.config.scheduler.rotation_active() && !live {
            self.arm_preview(card_id);
        }
    }

    /// Stop a card playing and release its slot
    pub(super) fn pause(&mut self, card_id: &CardId, reason: PauseReason) {
        let Some(entry) = self.state.entries.get_mut(card_id) else {
            return;
        };
        if !entry.is_playing {
            return;
        }
        entry.is_playing = false;
        self.cancel_preview(card_id);
        debug!("Pausing {} ({})", card_id, reason);
        self.emit(PlaybackCommand::pause(card_id, reason));
    }

    pub(super) fn arm_preview(&mut self, card_id: &CardId) {
        let deadline_ms = self
            .now_ms
            .saturating_add(self.config.scheduler.preview_duration_ms);
        let generation = self.state.next_timer_generation;
        let Some(entry) = self.state.entries.get_mut(card_id) else {
            return;
        };
        self.state.next_timer_generation += 1;
        entry.preview_timer = Some(PreviewTimer {
            deadline_ms,
            generation,
        });
        self.state
            .deadlines
            .push(card_id.clone(), deadline_ms, generation);
        self.timers_changed = true;
        debug!("Preview timer for {} armed at {}ms", card_id, deadline_ms);

        let armed = self
            .state
            .entries
            .values()
            .filter(|e| e.preview_timer.is_some())
            .count();
        let entries = &self.state.entries;
        self.state.deadlines.compact(armed, |d| {
            entries
                .get(&d.card_id)
                .and_then(|e| e.preview_timer)
                .is_some_and(|t| t.generation == d.generation)
        });
    }

    /// Disarm a card's preview timer; its heap entry goes stale
    pub(super) fn cancel_preview(&mut self, card_id: &CardId) {
        if let Some(entry) = self.state.entries.get_mut(card_id) {
            entry.preview_timer = None;
        }
    }

    /// Lowest-priority playing card a card of `category` may evict
    ///
    /// Only applies when `category` has room of its own but the global
    /// pool is full. Among strictly lower-priority victims the lowest
    /// priority goes first, then the earliest admitted.
    fn preemption_victim(&self, category: &Category) -> Option<CardId> {
        if self.config.performance.low_end_device {
            return None;
        }
        if !self.category_has_room(category) || self.global_has_room() {
            return None;
        }
        let incoming = self.config.scheduler.priority(category);
        self.state
            .entries
            .values()
            .filter(|e| e.is_playing)
            .map(|e| (self.priority_of(e.id()), e.admitted_at.unwrap_or(0), e.id()))
            .filter(|(priority, _, _)| *priority < incoming)
            .min_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)).then_with(|| a.2.as_str().cmp(b.2.as_str())))
            .map(|(_, _, id)| id.clone())
    }

    /// Admit an active card, preempting if allowed, else leave it waiting
    pub(super) fn admit_or_enqueue(&mut self, card_id: &CardId) {
        let Some(category) = self.category_of(card_id) else {
            return;
        };

        if !self.autoplay_allowed() {
            debug!("Autoplay disabled on low-end device, {} waits", card_id);
            self.enqueue(card_id);
            return;
        }

        if self.can_admit(&category) {
            self.admit(card_id);
            return;
        }

        if let Some(victim) = self.preemption_victim(&category) {
            info!("Card {} preempts {}", card_id, victim);
            self.pause(&victim, PauseReason::Preempted);
            self.requeue_at_back(&victim);
            self.admit(card_id);
            return;
        }

        self.enqueue(card_id);
    }

    /// Fill free slots from the wait queue
    ///
    /// Only active, non-playing cards are promoted, in wait-queue order.
    /// Promotion never preempts.
    pub(super) fn promote(&mut self) {
        if !self.autoplay_allowed() {
            return;
        }
        for card_id in self.ordered_wait_queue() {
            if !self.global_has_room() {
                break;
            }
            let Some(entry) = self.state.entries.get(&card_id) else {
                continue;
            };
            if !entry.is_waiting_active() {
                continue;
            }
            let Some(category) = self.category_of(&card_id) else {
                continue;
            };
            if self.can_admit(&category) {
                debug!("Promoting {}", card_id);
                self.admit(&card_id);
            }
        }
    }

    /// Pause cards over a cap that was lowered since they were admitted
    ///
    /// The most recently admitted cards are paused first and go back to the
    /// wait queue.
    pub(super) fn reconcile_caps(&mut self) {
        let excess = self.cards_over_caps();
        for card_id in excess {
            warn!("Cap reduced, pausing {}", card_id);
            self.pause(&card_id, PauseReason::CapReduced);
            self.requeue_at_back(&card_id);
        }
    }

    /// Playing cards that must stop for every cap to hold
    pub(super) fn cards_over_caps(&self) -> Vec<CardId> {
        let mut playing: Vec<(u32, u64, CardId, Category)> = self
            .state
            .entries
            .values()
            .filter(|e| e.is_playing)
            .filter_map(|e| {
                let category = self.category_of(e.id())?;
                Some((
                    self.priority_of(e.id()),
                    e.admitted_at.unwrap_or(0),
                    e.id().clone(),
                    category,
                ))
            })
            .collect();
        // newest first
        playing.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.2.as_str().cmp(a.2.as_str())));

        let mut excess = Vec::new();
        let mut kept: Vec<(u32, u64, CardId, Category)> = Vec::new();
        for card in playing.into_iter().rev() {
            let in_category = kept.iter().filter(|k| k.3 == card.3).count();
            if in_category < self.config.scheduler.cap(&card.3) {
                kept.push(card);
            } else {
                excess.push(card.2);
            }
        }

        let global_cap = self.global_cap();
        while kept.len() > global_cap {
            // lowest priority, then newest
            let Some(idx) = kept
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| a.0.cmp(&b.0).then_with(|| b.1.cmp(&a.1)))
                .map(|(idx, _)| idx)
            else {
                break;
            };
            excess.push(kept.remove(idx).2);
        }
        excess
    }
}
