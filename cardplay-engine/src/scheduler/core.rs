//! Scheduler lifecycle and transition handling
//!
//! **Responsibilities:**
//! - Scheduler construction, shared state and the per-event critical section
//! - Visibility transition dispatch (prefetch, prepare, active, resign, leave)
//! - Unmount and shutdown
//! - Picking up configuration changes between events

use super::deadlines::DeadlineHeap;
use super::entry::{CardHandle, ScheduleEntry};
use super::wait_queue::WaitQueue;
use cardplay_common::config::{ConfigStore, PlaybackConfig};
use cardplay_common::events::{
    CardId, EventBus, PauseReason, PlaybackCommand, VisibilityState,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, info, warn};

/// Mutable scheduler state, guarded by a single lock
#[derive(Debug, Default)]
pub(super) struct SchedulerState {
    pub(super) entries: HashMap<CardId, ScheduleEntry>,
    pub(super) wait_queue: WaitQueue,
    pub(super) deadlines: DeadlineHeap,
    /// Cards with an outstanding prefetch request
    pub(super) prefetched: HashSet<CardId>,
    pub(super) next_arrival_seq: u64,
    pub(super) next_timer_generation: u64,
    /// Configuration generation seen by the previous event
    pub(super) config_generation: Option<u64>,
}

impl SchedulerState {
    pub(super) fn next_arrival(&mut self) -> u64 {
        let seq = self.next_arrival_seq;
        self.next_arrival_seq += 1;
        seq
    }

    pub(super) fn next_deadline(&mut self) -> Option<u64> {
        let entries = &self.entries;
        self.deadlines.peek_live(|d| {
            entries
                .get(&d.card_id)
                .and_then(|e| e.preview_timer)
                .is_some_and(|t| t.generation == d.generation && t.deadline_ms == d.at_ms)
        })
    }
}

/// One inbound event's view of the scheduler
///
/// Holds the locked state, the configuration snapshot read once the lock was
/// taken, and the event's timestamp. Every decision made for the event
/// reads this snapshot, so a concurrent configuration update takes effect
/// at the next event.
pub(super) struct SchedulerPass<'a> {
    pub(super) state: &'a mut SchedulerState,
    pub(super) config: &'a PlaybackConfig,
    pub(super) events: &'a EventBus,
    pub(super) now_ms: u64,
    /// A timer was armed; the timer driver must recompute its sleep
    pub(super) timers_changed: bool,
}

impl<'a> SchedulerPass<'a> {
    pub(super) fn new(
        state: &'a mut SchedulerState,
        config: &'a PlaybackConfig,
        events: &'a EventBus,
        now_ms: u64,
    ) -> Self {
        Self {
            state,
            config,
            events,
            now_ms,
            timers_changed: false,
        }
    }

    pub(super) fn emit(&self, command: PlaybackCommand) {
        debug!("Emitting {}", command);
        self.events.emit_lossy(command);
    }

    /// Bring state in line with the configuration snapshot
    ///
    /// Lowered caps are enforced on every event. When the generation moved,
    /// raised caps are filled from the wait queue and preview timers follow
    /// the rotation switches.
    pub(super) fn sync_config(&mut self, generation: u64) {
        let previous = self.state.config_generation;
        if previous.is_some_and(|seen| generation < seen) {
            warn!(
                "Ignoring configuration generation {} older than {:?}",
                generation, previous
            );
            return;
        }

        self.reconcile_caps();
        self.state.config_generation = Some(generation);
        if previous.is_none() || previous == Some(generation) {
            return;
        }

        debug!("Configuration generation {:?} -> {}", previous, generation);
        if self.config.scheduler.rotation_active() {
            let untimed: Vec<CardId> = self
                .state
                .entries
                .values()
                .filter(|e| e.is_playing && !e.is_live() && e.preview_timer.is_none())
                .map(|e| e.id().clone())
                .collect();
            for card_id in untimed {
                self.arm_preview(&card_id);
            }
        }
        self.promote();
    }

    /// Route a visibility transition to its handler
    pub(super) fn apply_transition(&mut self, handle: &CardHandle, state: VisibilityState) {
        debug!("Card {} -> {}", handle.id, state);
        match state {
            VisibilityState::Prefetch => self.on_prefetch(handle),
            VisibilityState::PrepareToBeActive => self.on_prepare(handle),
            VisibilityState::IsActive => self.on_active(handle),
            VisibilityState::WillResignActive => self.on_will_resign(handle),
            VisibilityState::NotActive => self.on_not_active(handle),
            VisibilityState::Released => self.on_released(&handle.id),
        }
    }

    /// Create or refresh the entry of a card moving in
    fn upsert_entry(&mut self, handle: &CardHandle, state: VisibilityState) {
        if let Some(entry) = self.state.entries.get_mut(&handle.id) {
            entry.handle.category = handle.category.clone();
            entry.handle.media_kind = handle.media_kind;
            entry.handle.last_visibility_state = Some(state);
            return;
        }

        if !self.config.scheduler.is_known(&handle.category) {
            warn!(
                "Card {} has unknown category '{}', scheduling it as '{}'",
                handle.id,
                handle.category,
                cardplay_common::Category::DEFAULT
            );
        }
        let seq = self.state.next_arrival();
        let mut handle = handle.clone();
        handle.last_visibility_state = Some(state);
        debug!("Tracking card {} ({}, {:?})", handle.id, handle.category, handle.media_kind);
        self.state
            .entries
            .insert(handle.id.clone(), ScheduleEntry::new(handle, seq));
    }

    /// A playing card moved back out of the active state
    fn demote_if_playing(&mut self, card_id: &CardId) {
        if self.is_playing(card_id) {
            self.pause(card_id, PauseReason::Demoted);
            self.promote();
        }
    }

    fn on_prefetch(&mut self, handle: &CardHandle) {
        self.upsert_entry(handle, VisibilityState::Prefetch);
        self.state.wait_queue.remove(&handle.id);
        self.demote_if_playing(&handle.id);

        if !self.config.prefetch.enabled {
            debug!("Prefetch disabled, not requesting {}", handle.id);
            return;
        }
        if handle.media_kind.is_live() {
            debug!("Live card {} is never prefetched", handle.id);
            return;
        }
        if self.state.prefetched.insert(handle.id.clone()) {
            self.emit(PlaybackCommand::prefetch_requested(&handle.id));
        }
    }

    fn on_prepare(&mut self, handle: &CardHandle) {
        let was_active = self
            .state
            .entries
            .get(&handle.id)
            .is_some_and(|e| e.state() == Some(VisibilityState::IsActive));
        self.upsert_entry(handle, VisibilityState::PrepareToBeActive);
        if was_active {
            self.demote_if_playing(&handle.id);
        }
        if !self.is_playing(&handle.id) {
            self.enqueue(&handle.id);
        }
    }

    fn on_active(&mut self, handle: &CardHandle) {
        self.upsert_entry(handle, VisibilityState::IsActive);
        if self.is_playing(&handle.id) {
            debug!("Card {} already playing", handle.id);
            return;
        }
        self.admit_or_enqueue(&handle.id);
    }

    fn on_will_resign(&mut self, handle: &CardHandle) {
        let Some(entry) = self.state.entries.get_mut(&handle.id) else {
            debug!("Ignoring willResignActive for untracked card {}", handle.id);
            return;
        };
        entry.handle.last_visibility_state = Some(VisibilityState::WillResignActive);
        self.state.wait_queue.remove(&handle.id);
        if self.is_playing(&handle.id) {
            self.pause(&handle.id, PauseReason::Resigned);
        }
        self.promote();
    }

    fn on_not_active(&mut self, handle: &CardHandle) {
        if !self.state.entries.contains_key(&handle.id) {
            debug!("Ignoring notActive for untracked card {}", handle.id);
            return;
        }
        self.release_entry(&handle.id);
        self.promote();
    }

    fn on_released(&mut self, card_id: &CardId) {
        let tracked = self.state.entries.contains_key(card_id);
        if tracked {
            self.release_entry(card_id);
        }
        let prefetch_cancelled = self.cancel_prefetch(card_id);
        if !tracked && !prefetch_cancelled {
            debug!("Ignoring release of untracked card {}", card_id);
            return;
        }
        if tracked {
            self.promote();
        }
    }

    /// Forget a card: pause it, cancel its timer, leave the wait queue
    fn release_entry(&mut self, card_id: &CardId) {
        if self.is_playing(card_id) {
            self.pause(card_id, PauseReason::Released);
        }
        self.cancel_preview(card_id);
        self.state.wait_queue.remove(card_id);
        self.state.entries.remove(card_id);
        debug!("Released card {}", card_id);
    }

    fn cancel_prefetch(&mut self, card_id: &CardId) -> bool {
        if self.state.prefetched.remove(card_id) {
            self.emit(PlaybackCommand::prefetch_cancelled(card_id));
            true
        } else {
            false
        }
    }

    /// Card left the host view regardless of its visibility state
    pub(super) fn unmount(&mut self, card_id: &CardId) {
        debug!("Unmounting card {}", card_id);
        self.on_released(card_id);
    }

    pub(super) fn shutdown(&mut self) {
        let playing: Vec<CardId> = self
            .state
            .entries
            .values()
            .filter(|e| e.is_playing)
            .map(|e| e.id().clone())
            .collect();
        for card_id in &playing {
            self.pause(card_id, PauseReason::Shutdown);
        }
        self.state.entries.clear();
        self.state.wait_queue.clear();
        self.state.deadlines.clear();
        self.state.prefetched.clear();
        info!("Playback scheduler shut down ({} cards paused)", playing.len());
    }
}

/// Playback scheduler
///
/// Decides which visible cards play, enforcing per-category and global
/// concurrency caps with priority preemption, promotion from a wait queue,
/// and preview rotation for on-demand media.
///
/// All operations take the caller's monotonic timestamp in milliseconds and
/// run in one critical section, so events from many cards are serialized.
/// Commands are published on the scheduler's own [`EventBus`]; emission
/// order within one event is the order of the scheduling decisions.
pub struct PlaybackScheduler {
    pub(super) state: Mutex<SchedulerState>,
    pub(super) config: Arc<ConfigStore>,
    pub(super) events: EventBus,
    /// Signalled whenever a preview timer is armed
    pub(super) timer_notify: Arc<Notify>,
}

impl PlaybackScheduler {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self::with_event_bus(config, EventBus::default())
    }

    pub fn with_event_bus(config: Arc<ConfigStore>, events: EventBus) -> Self {
        info!(
            "Creating playback scheduler (config generation {})",
            config.generation()
        );
        Self {
            state: Mutex::new(SchedulerState::default()),
            config,
            events,
            timer_notify: Arc::new(Notify::new()),
        }
    }

    /// Subscribe to outbound playback commands
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackCommand> {
        self.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.events
    }

    pub fn config_store(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// Notified when the earliest preview deadline may have moved
    pub fn timer_notify(&self) -> Arc<Notify> {
        Arc::clone(&self.timer_notify)
    }

    /// Lock scheduler state
    ///
    /// A panic inside a previous critical section leaves the state usable,
    /// so a poisoned lock is recovered rather than propagated.
    pub(super) fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one event in the critical section
    fn run<R, F>(&self, now_ms: u64, op: F) -> R
    where
        F: FnOnce(&mut SchedulerPass<'_>) -> R,
    {
        let mut state = self.lock_state();
        // Read under the lock so events never apply an older generation
        let snapshot = self.config.snapshot();
        let mut pass = SchedulerPass::new(&mut state, &snapshot.config, &self.events, now_ms);
        pass.sync_config(snapshot.generation);
        let result = op(&mut pass);
        pass.check_invariants();
        let timers_changed = pass.timers_changed;
        drop(state);

        if timers_changed {
            self.timer_notify.notify_one();
        }
        result
    }

    /// Apply a visibility transition reported for a card
    pub fn handle_transition(&self, handle: &CardHandle, state: VisibilityState, now_ms: u64) {
        self.run(now_ms, |pass| pass.apply_transition(handle, state));
    }

    /// Card removed from the host view
    pub fn unmount(&self, card_id: &CardId, now_ms: u64) {
        self.run(now_ms, |pass| pass.unmount(card_id));
    }

    /// Fire every preview timer due at `now_ms`
    ///
    /// Returns the number of live timers fired. Stale timers (cancelled or
    /// re-armed since they were scheduled) are discarded silently.
    pub fn fire_due_timers(&self, now_ms: u64) -> usize {
        self.run(now_ms, |pass| pass.fire_due_timers())
    }

    /// Apply a configuration change without waiting for the next event
    pub fn refresh_config(&self, now_ms: u64) {
        self.run(now_ms, |_| ());
    }

    /// Earliest armed preview deadline
    pub fn next_deadline(&self) -> Option<u64> {
        self.lock_state().next_deadline()
    }

    /// Pause everything and forget all cards
    pub fn shutdown(&self) {
        let config = self.config.current();
        let mut state = self.lock_state();
        SchedulerPass::new(&mut state, &config, &self.events, 0).shutdown();
    }
}

impl std::fmt::Debug for PlaybackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackScheduler")
            .field("stats", &self.stats())
            .finish()
    }
}
