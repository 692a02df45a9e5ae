//! Min-heap of preview deadlines
//!
//! Cancellation is lazy: a cancelled or re-armed timer leaves its old heap
//! entry behind, and the scheduler drops it on pop because the entry no
//! longer matches the card's armed [`PreviewTimer`](super::entry::PreviewTimer).
//! Arming is O(log n); the heap is compacted when stale entries dominate.

use cardplay_common::events::CardId;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct Deadline {
    pub(crate) at_ms: u64,
    pub(crate) generation: u64,
    pub(crate) card_id: CardId,
}

#[derive(Debug, Default)]
pub(crate) struct DeadlineHeap {
    heap: BinaryHeap<Reverse<Deadline>>,
}

impl DeadlineHeap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, card_id: CardId, at_ms: u64, generation: u64) {
        self.heap.push(Reverse(Deadline {
            at_ms,
            generation,
            card_id,
        }));
    }

    /// Remove and return the earliest deadline at or before `now_ms`
    pub(crate) fn pop_due(&mut self, now_ms: u64) -> Option<Deadline> {
        if self.heap.peek().is_some_and(|Reverse(d)| d.at_ms <= now_ms) {
            self.heap.pop().map(|Reverse(d)| d)
        } else {
            None
        }
    }

    /// Earliest deadline that `is_live` accepts, discarding stale ones on top
    pub(crate) fn peek_live<F>(&mut self, is_live: F) -> Option<u64>
    where
        F: Fn(&Deadline) -> bool,
    {
        while let Some(Reverse(top)) = self.heap.peek() {
            if is_live(top) {
                return Some(top.at_ms);
            }
            self.heap.pop();
        }
        None
    }

    /// Drop stale entries when they outnumber live ones
    pub(crate) fn compact<F>(&mut self, live_count: usize, is_live: F)
    where
        F: Fn(&Deadline) -> bool,
    {
        if self.heap.len() > 2 * live_count + 16 {
            self.heap.retain(|Reverse(d)| is_live(d));
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.heap.len()
    }

    pub(crate) fn clear(&mut self) {
        self.heap.clear();
    }
}
