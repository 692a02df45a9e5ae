//! Host-facing entry point
//!
//! The coordinator owns one [`VisibilityMeter`] per mounted card and forwards
//! every transition a meter emits to the shared [`PlaybackScheduler`]. Hosts
//! report either ready-made percentages or raw geometry.

use crate::error::Result;
use crate::scheduler::{CardHandle, PlaybackScheduler, SchedulerStats};
use crate::visibility::{sample, Rect, VisibilityEvent, VisibilityMeter};
use cardplay_common::config::{ConfigStore, PlaybackConfig};
use cardplay_common::events::{CardId, PlaybackCommand, VisibilityState};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info};

struct CardMeter {
    handle: CardHandle,
    meter: VisibilityMeter,
    /// Configuration generation the meter's thresholds came from
    generation: u64,
}

/// Meters plus scheduler for one feed
pub struct PlaybackCoordinator {
    scheduler: Arc<PlaybackScheduler>,
    meters: Mutex<HashMap<CardId, CardMeter>>,
}

impl PlaybackCoordinator {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Self::with_scheduler(Arc::new(PlaybackScheduler::new(config)))
    }

    /// Build from a TOML configuration file
    pub fn from_config_file(path: &Path) -> Result<Self> {
        let config = PlaybackConfig::load(path)?;
        let store = ConfigStore::new(config)?;
        Ok(Self::new(Arc::new(store)))
    }

    pub fn with_scheduler(scheduler: Arc<PlaybackScheduler>) -> Self {
        Self {
            scheduler,
            meters: Mutex::new(HashMap::new()),
        }
    }

    pub fn scheduler(&self) -> &Arc<PlaybackScheduler> {
        &self.scheduler
    }

    pub fn config(&self) -> &Arc<ConfigStore> {
        self.scheduler.config_store()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackCommand> {
        self.scheduler.subscribe()
    }

    fn lock_meters(&self) -> MutexGuard<'_, HashMap<CardId, CardMeter>> {
        self.meters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed a visibility percentage for a card
    ///
    /// Returns the transitions the sample produced, already applied to the
    /// scheduler in order.
    pub fn report_visibility(
        &self,
        handle: &CardHandle,
        percentage: f64,
        now_ms: u64,
    ) -> Vec<VisibilityEvent> {
        let snapshot = self.config().snapshot();
        let visibility = &snapshot.config.visibility;

        // Held across the scheduler calls so one card's transitions stay ordered
        let mut meters = self.lock_meters();
        let card = meters.entry(handle.id.clone()).or_insert_with(|| {
            debug!("Mounting meter for {} ({})", handle.id, handle.category);
            CardMeter {
                handle: handle.clone(),
                meter: VisibilityMeter::new(
                    handle.id.clone(),
                    visibility.thresholds_for(&handle.category),
                    visibility.throttle_ms,
                ),
                generation: snapshot.generation,
            }
        });

        if card.generation != snapshot.generation || card.handle.category != handle.category {
            card.meter.reconfigure(
                visibility.thresholds_for(&handle.category),
                visibility.throttle_ms,
            );
            card.generation = snapshot.generation;
        }
        card.handle.category = handle.category.clone();
        card.handle.media_kind = handle.media_kind;

        let events = card.meter.on_tick(percentage, now_ms);
        for event in &events {
            self.scheduler
                .handle_transition(&card.handle, event.state, event.timestamp_ms);
            card.handle.last_visibility_state = Some(event.state);
        }
        events
    }

    /// Feed raw geometry; the percentage is sampled from the two rectangles
    pub fn report_geometry(
        &self,
        handle: &CardHandle,
        viewport: &Rect,
        card_rect: &Rect,
        now_ms: u64,
    ) -> Vec<VisibilityEvent> {
        self.report_visibility(handle, sample(viewport, card_rect), now_ms)
    }

    /// Card removed from the host view
    pub fn unmount(&self, card_id: &CardId, now_ms: u64) {
        let mut meters = self.lock_meters();
        meters.remove(card_id);
        self.scheduler.unmount(card_id, now_ms);
    }

    /// Fire preview timers due at `now_ms`
    pub fn advance_to(&self, now_ms: u64) -> usize {
        self.scheduler.fire_due_timers(now_ms)
    }

    /// Last state a card's meter classified it into
    pub fn meter_state(&self, card_id: &CardId) -> Option<VisibilityState> {
        self.lock_meters().get(card_id).and_then(|c| c.meter.state())
    }

    pub fn mounted_cards(&self) -> usize {
        self.lock_meters().len()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Drop every meter and shut the scheduler down
    pub fn shutdown(&self) {
        let mut meters = self.lock_meters();
        let mounted = meters.len();
        meters.clear();
        self.scheduler.shutdown();
        info!("Coordinator shut down ({} meters dropped)", mounted);
    }
}
