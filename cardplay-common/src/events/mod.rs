//! Event types for the cardplay event system
//!
//! Provides the outbound playback command definitions and the EventBus the
//! scheduler writes them to.

// Sub-modules (supporting types)
mod card_types;
mod visibility_types;

pub use card_types::{CardId, Category, MediaKind};
pub use visibility_types::{Direction, VisibilityState};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Why a card was paused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PauseReason {
    /// Card reported willResignActive
    Resigned,
    /// Card reported notActive/released or was unmounted
    Released,
    /// Evicted to admit a higher-priority card
    Preempted,
    /// Preview slice ended and another card took the slot
    Rotated,
    /// Category or global cap was lowered below the playing count
    CapReduced,
    /// Card moved back to a non-playing incoming state
    Demoted,
    /// Scheduler shut down
    Shutdown,
    /// Playing count exceeded a cap (scheduler bug, clamped)
    InvariantClamp,
}

impl std::fmt::Display for PauseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PauseReason::Resigned => write!(f, "Resigned"),
            PauseReason::Released => write!(f, "Released"),
            PauseReason::Preempted => write!(f, "Preempted"),
            PauseReason::Rotated => write!(f, "Rotated"),
            PauseReason::CapReduced => write!(f, "CapReduced"),
            PauseReason::Demoted => write!(f, "Demoted"),
            PauseReason::Shutdown => write!(f, "Shutdown"),
            PauseReason::InvariantClamp => write!(f, "InvariantClamp"),
        }
    }
}

/// Outbound playback commands
///
/// Consumed by the render-surface collaborator (`Play`, `Pause`, `Sequence`)
/// and the prefetch collaborator (`PrefetchRequested`, `PrefetchCancelled`).
/// The scheduler is the only producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlaybackCommand {
    /// Start (or resume) playback of a card
    Play {
        card_id: CardId,
        timestamp: DateTime<Utc>,
    },

    /// Pause a card and release its slot
    Pause {
        card_id: CardId,
        reason: PauseReason,
        timestamp: DateTime<Utc>,
    },

    /// Preview rotation handed the slot from one card to another
    ///
    /// Always follows the `Pause` of `from` and the `Play` of `to`.
    Sequence {
        from: CardId,
        to: CardId,
        timestamp: DateTime<Utc>,
    },

    /// Card entered prefetch range
    PrefetchRequested {
        card_id: CardId,
        timestamp: DateTime<Utc>,
    },

    /// Card left entirely; outstanding prefetch should stop
    PrefetchCancelled {
        card_id: CardId,
        timestamp: DateTime<Utc>,
    },
}

impl PlaybackCommand {
    pub fn play(card_id: &CardId) -> Self {
        PlaybackCommand::Play {
            card_id: card_id.clone(),
            timestamp: crate::time::now(),
        }
    }

    pub fn pause(card_id: &CardId, reason: PauseReason) -> Self {
        PlaybackCommand::Pause {
            card_id: card_id.clone(),
            reason,
            timestamp: crate::time::now(),
        }
    }

    pub fn sequence(from: &CardId, to: &CardId) -> Self {
        PlaybackCommand::Sequence {
            from: from.clone(),
            to: to.clone(),
            timestamp: crate::time::now(),
        }
    }

    pub fn prefetch_requested(card_id: &CardId) -> Self {
        PlaybackCommand::PrefetchRequested {
            card_id: card_id.clone(),
            timestamp: crate::time::now(),
        }
    }

    pub fn prefetch_cancelled(card_id: &CardId) -> Self {
        PlaybackCommand::PrefetchCancelled {
            card_id: card_id.clone(),
            timestamp: crate::time::now(),
        }
    }

    /// Card the command is about (`to` for sequence)
    pub fn card_id(&self) -> &CardId {
        match self {
            PlaybackCommand::Play { card_id, .. }
            | PlaybackCommand::Pause { card_id, .. }
            | PlaybackCommand::PrefetchRequested { card_id, .. }
            | PlaybackCommand::PrefetchCancelled { card_id, .. } => card_id,
            PlaybackCommand::Sequence { to, .. } => to,
        }
    }
}

/// Compact form used in logs and test assertions: `play(a)`, `sequence(a->b)`
impl std::fmt::Display for PlaybackCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackCommand::Play { card_id, .. } => write!(f, "play({})", card_id),
            PlaybackCommand::Pause { card_id, .. } => write!(f, "pause({})", card_id),
            PlaybackCommand::Sequence { from, to, .. } => write!(f, "sequence({}->{})", from, to),
            PlaybackCommand::PrefetchRequested { card_id, .. } => {
                write!(f, "prefetchRequested({})", card_id)
            }
            PlaybackCommand::PrefetchCancelled { card_id, .. } => {
                write!(f, "prefetchCancelled({})", card_id)
            }
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Distribution bus for playback commands
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (the scheduler never waits on a slow consumer)
/// - Multiple concurrent subscribers (render surface, prefetcher, diagnostics)
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// Each scheduler owns its own bus, so tests never share listeners.
///
/// # Examples
///
/// ```
/// use cardplay_common::events::{CardId, EventBus, PlaybackCommand};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(PlaybackCommand::play(&CardId::from("card-1")));
///
/// let received = rx.try_recv().unwrap();
/// assert_eq!(received.to_string(), "play(card-1)");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlaybackCommand>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Arguments
    ///
    /// * `capacity` - Number of commands to buffer before lagging receivers
    ///   start losing the oldest ones
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future commands
    ///
    /// Commands emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackCommand> {
        self.tx.subscribe()
    }

    /// Emit a command to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        command: PlaybackCommand,
    ) -> Result<usize, broadcast::error::SendError<PlaybackCommand>> {
        self.tx.send(command)
    }

    /// Emit a command, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, command: PlaybackCommand) {
        let _ = self.tx.send(command);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_compact() {
        let a = CardId::from("a");
        let b = CardId::from("b");
        assert_eq!(PlaybackCommand::play(&a).to_string(), "play(a)");
        assert_eq!(
            PlaybackCommand::pause(&a, PauseReason::Preempted).to_string(),
            "pause(a)"
        );
        assert_eq!(PlaybackCommand::sequence(&a, &b).to_string(), "sequence(a->b)");
        assert_eq!(
            PlaybackCommand::prefetch_cancelled(&b).to_string(),
            "prefetchCancelled(b)"
        );
    }

    #[test]
    fn test_sequence_card_id_is_destination() {
        let cmd = PlaybackCommand::sequence(&CardId::from("a"), &CardId::from("b"));
        assert_eq!(cmd.card_id().as_str(), "b");
    }

    #[test]
    fn test_serialization_is_tagged() {
        let cmd = PlaybackCommand::pause(&CardId::from("x"), PauseReason::Rotated);
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "Pause");
        assert_eq!(json["card_id"], "x");
        assert_eq!(json["reason"], "rotated");
    }

    #[test]
    fn test_emit_without_subscribers_errors() {
        let bus = EventBus::new(10);
        assert!(bus.emit(PlaybackCommand::play(&CardId::from("a"))).is_err());
        // Lossy emit must not panic either
        bus.emit_lossy(PlaybackCommand::play(&CardId::from("a")));
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 10);
    }

    #[test]
    fn test_subscribers_receive_in_order() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();
        let a = CardId::from("a");
        bus.emit_lossy(PlaybackCommand::play(&a));
        bus.emit_lossy(PlaybackCommand::pause(&a, PauseReason::Resigned));
        assert_eq!(rx.try_recv().unwrap().to_string(), "play(a)");
        assert_eq!(rx.try_recv().unwrap().to_string(), "pause(a)");
        assert!(rx.try_recv().is_err());
    }
}
