//! Test helpers for cardplay-engine integration tests
//!
//! Provides a scheduler harness that records every emitted command and
//! short-hand transition methods per card.

#![allow(dead_code)]

use cardplay_common::config::{ConfigStore, PlaybackConfig};
use cardplay_common::events::{CardId, Category, PlaybackCommand, VisibilityState};
use cardplay_engine::{CardHandle, PlaybackScheduler};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Default configuration with an edit applied
pub fn config_with(edit: impl FnOnce(&mut PlaybackConfig)) -> PlaybackConfig {
    let mut config = PlaybackConfig::default();
    edit(&mut config);
    config
}

pub fn short(id: &str) -> CardHandle {
    CardHandle::on_demand(id, Category::short())
}

pub fn carousel(id: &str) -> CardHandle {
    CardHandle::on_demand(id, Category::carousel())
}

pub fn merch(id: &str) -> CardHandle {
    CardHandle::on_demand(id, Category::merch())
}

pub fn live_short(id: &str) -> CardHandle {
    CardHandle::live(id, Category::short())
}

pub fn ids(list: &[&str]) -> Vec<CardId> {
    list.iter().map(|id| CardId::from(*id)).collect()
}

/// Scheduler plus a subscriber that collects commands
pub struct Harness {
    pub scheduler: Arc<PlaybackScheduler>,
    pub store: Arc<ConfigStore>,
    rx: broadcast::Receiver<PlaybackCommand>,
}

impl Harness {
    pub fn new(config: PlaybackConfig) -> Self {
        let store = Arc::new(ConfigStore::new(config).expect("valid test configuration"));
        let scheduler = Arc::new(PlaybackScheduler::new(Arc::clone(&store)));
        let rx = scheduler.subscribe();
        Self { scheduler, store, rx }
    }

    pub fn with_defaults() -> Self {
        Self::new(PlaybackConfig::default())
    }

    pub fn send(&self, card: &CardHandle, state: VisibilityState, at_ms: u64) {
        self.scheduler.handle_transition(card, state, at_ms);
    }

    pub fn prefetch(&self, card: &CardHandle, at_ms: u64) {
        self.send(card, VisibilityState::Prefetch, at_ms);
    }

    pub fn prepare(&self, card: &CardHandle, at_ms: u64) {
        self.send(card, VisibilityState::PrepareToBeActive, at_ms);
    }

    pub fn active(&self, card: &CardHandle, at_ms: u64) {
        self.send(card, VisibilityState::IsActive, at_ms);
    }

    pub fn resign(&self, card: &CardHandle, at_ms: u64) {
        self.send(card, VisibilityState::WillResignActive, at_ms);
    }

    pub fn not_active(&self, card: &CardHandle, at_ms: u64) {
        self.send(card, VisibilityState::NotActive, at_ms);
    }

    pub fn released(&self, card: &CardHandle, at_ms: u64) {
        self.send(card, VisibilityState::Released, at_ms);
    }

    pub fn fire(&self, at_ms: u64) -> usize {
        self.scheduler.fire_due_timers(at_ms)
    }

    /// Commands emitted since the last drain
    pub fn drain_raw(&mut self) -> Vec<PlaybackCommand> {
        std::iter::from_fn(|| self.rx.try_recv().ok()).collect()
    }

    /// Commands emitted since the last drain, in compact form
    pub fn drain(&mut self) -> Vec<String> {
        self.drain_raw().iter().map(|c| c.to_string()).collect()
    }

    pub fn playing(&self) -> Vec<CardId> {
        self.scheduler.playing_cards()
    }

    pub fn waiting(&self) -> Vec<CardId> {
        self.scheduler.waiting_cards()
    }
}
