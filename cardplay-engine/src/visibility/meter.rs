//! Per-card visibility meter
//!
//! Converts a stream of visibility percentages into discrete, debounced
//! [`VisibilityState`] transitions.
//!
//! Classification is directional. While a card moves in, only `moving_in`
//! thresholds are considered; while it moves out, only `moving_out` ones.
//! A sample moves the card's state forward along its direction only when it
//! reaches a level deeper than the one already emitted, so oscillating inside
//! a band never re-fires. When a single sample passes several thresholds the
//! skipped states are emitted in order, which also covers the first sample of
//! a card mounted partially on screen.

use cardplay_common::config::VisibilityThresholdSet;
use cardplay_common::events::{CardId, Direction, VisibilityState};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Discrete transition emitted by a meter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityEvent {
    pub card_id: CardId,
    pub direction: Direction,
    pub state: VisibilityState,
    /// Percentage of the sample that produced the event
    pub percentage: f64,
    pub timestamp_ms: u64,
}

/// Sampling state for one mounted card
///
/// Owns nothing but its own bookkeeping; it never touches scheduler state.
#[derive(Debug, Clone)]
pub struct VisibilityMeter {
    card_id: CardId,
    thresholds: VisibilityThresholdSet,
    throttle_ms: u64,

    /// Last sampled percentage (true motion, throttled samples included)
    last_percentage: f64,

    /// Direction of a sample discarded by the throttle
    deferred_direction: Option<Direction>,

    /// Last emitted state, `None` until the first event
    state: Option<VisibilityState>,
    last_emitted_percentage: Option<f64>,
    last_emit_ms: Option<u64>,
}

impl VisibilityMeter {
    pub fn new(card_id: CardId, thresholds: VisibilityThresholdSet, throttle_ms: u64) -> Self {
        Self {
            card_id,
            thresholds,
            throttle_ms,
            last_percentage: 0.0,
            deferred_direction: None,
            state: None,
            last_emitted_percentage: None,
            last_emit_ms: None,
        }
    }

    pub fn card_id(&self) -> &CardId {
        &self.card_id
    }

    /// Last emitted state
    pub fn state(&self) -> Option<VisibilityState> {
        self.state
    }

    pub fn last_percentage(&self) -> f64 {
        self.last_percentage
    }

    pub fn last_emitted_percentage(&self) -> Option<f64> {
        self.last_emitted_percentage
    }

    pub fn thresholds(&self) -> &VisibilityThresholdSet {
        &self.thresholds
    }

    /// Swap in new thresholds / throttle (configuration reload)
    ///
    /// The current state is kept; the next sample is classified against the
    /// new thresholds.
    pub fn reconfigure(&mut self, thresholds: VisibilityThresholdSet, throttle_ms: u64) {
        if self.thresholds != thresholds || self.throttle_ms != throttle_ms {
            debug!(
                "Meter {} reconfigured: in={:?} out={:?} throttle={}ms",
                self.card_id, thresholds.moving_in, thresholds.moving_out, throttle_ms
            );
        }
        self.thresholds = thresholds;
        self.throttle_ms = throttle_ms;
    }

    /// Process one sample
    ///
    /// Returns the transitions to deliver, in order (usually zero or one).
    pub fn on_tick(&mut self, percentage: f64, now_ms: u64) -> Vec<VisibilityEvent> {
        let percentage = if percentage.is_finite() {
            percentage.clamp(0.0, 100.0)
        } else {
            0.0
        };

        let direction = if percentage > self.last_percentage {
            Some(Direction::MovingIn)
        } else if percentage < self.last_percentage {
            Some(Direction::MovingOut)
        } else {
            self.deferred_direction
        };
        self.last_percentage = percentage;

        let Some(direction) = direction else {
            return Vec::new();
        };

        if self.is_throttled(now_ms) {
            trace!(
                "Meter {}: sample {:.1}% throttled ({:?})",
                self.card_id,
                percentage,
                direction
            );
            self.deferred_direction = Some(direction);
            return Vec::new();
        }
        self.deferred_direction = None;

        let states = self.crossed_states(direction, percentage);
        if states.is_empty() {
            return Vec::new();
        }

        let events: Vec<VisibilityEvent> = states
            .into_iter()
            .map(|state| VisibilityEvent {
                card_id: self.card_id.clone(),
                direction,
                state,
                percentage,
                timestamp_ms: now_ms,
            })
            .collect();

        if let Some(last) = events.last() {
            debug!(
                "Meter {}: {:.1}% {} -> {}",
                self.card_id,
                percentage,
                self.state
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                last.state
            );
            self.state = Some(last.state);
        }
        self.last_emitted_percentage = Some(percentage);
        self.last_emit_ms = Some(now_ms);
        events
    }

    fn is_throttled(&self, now_ms: u64) -> bool {
        self.throttle_ms > 0
            && self
                .last_emit_ms
                .is_some_and(|last| now_ms.saturating_sub(last) < self.throttle_ms)
    }

    /// States newly reached in `direction`, shallow to deep
    fn crossed_states(&self, direction: Direction, percentage: f64) -> Vec<VisibilityState> {
        match direction {
            Direction::MovingIn => {
                let Some(target) = self.thresholds.incoming_level(percentage) else {
                    return Vec::new();
                };
                let reached = self.state.map(|s| s.incoming_level()).unwrap_or(-1);
                ((reached + 1)..=target as i8)
                    .map(|level| VisibilityState::MOVING_IN[level as usize])
                    .collect()
            }
            Direction::MovingOut => {
                let Some(target) = self.thresholds.outgoing_level(percentage) else {
                    return Vec::new();
                };
                // A card that never emitted has nothing to leave
                let reached = self.state.map(|s| s.outgoing_level()).unwrap_or(2);
                ((reached + 1)..=target as i8)
                    .map(|level| VisibilityState::MOVING_OUT[level as usize])
                    .collect()
            }
        }
    }
}
