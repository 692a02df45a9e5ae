//! Wait queue of eligible, not-yet-admitted cards
//!
//! Membership is stored in arrival order. The priority order is computed
//! on demand from the live configuration, so a priority change between
//! calls is honoured without re-sorting stored state.

use cardplay_common::events::CardId;
use std::cmp::Reverse;

/// Sort key of a waiting card: category priority, state depth, arrival
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct WaitKey {
    pub(crate) priority: u32,
    pub(crate) engagement: u8,
    pub(crate) arrival_seq: u64,
}

#[derive(Debug, Default)]
pub(crate) struct WaitQueue {
    members: Vec<CardId>,
}

impl WaitQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a card; a card already waiting keeps its place
    pub(crate) fn insert(&mut self, card_id: &CardId) -> bool {
        if self.contains(card_id) {
            return false;
        }
        self.members.push(card_id.clone());
        true
    }

    pub(crate) fn remove(&mut self, card_id: &CardId) -> bool {
        let before = self.members.len();
        self.members.retain(|id| id != card_id);
        self.members.len() != before
    }

    pub(crate) fn contains(&self, card_id: &CardId) -> bool {
        self.members.iter().any(|id| id == card_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn clear(&mut self) {
        self.members.clear();
    }

    /// Members in priority order: higher priority first, deeper state first,
    /// then earlier arrival. Members `key` cannot resolve are skipped.
    pub(crate) fn ordered<F>(&self, key: F) -> Vec<CardId>
    where
        F: Fn(&CardId) -> Option<WaitKey>,
    {
        let mut keyed: Vec<(WaitKey, &CardId)> = self
            .members
            .iter()
            .filter_map(|id| key(id).map(|k| (k, id)))
            .collect();
        keyed.sort_by_key(|(k, _)| (Reverse(k.priority), Reverse(k.engagement), k.arrival_seq));
        keyed.into_iter().map(|(_, id)| id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn key_table(entries: &[(&str, u32, u8, u64)]) -> HashMap<CardId, WaitKey> {
        entries
            .iter()
            .map(|(id, priority, engagement, arrival_seq)| {
                (
                    CardId::from(*id),
                    WaitKey {
                        priority: *priority,
                        engagement: *engagement,
                        arrival_seq: *arrival_seq,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_orders_by_priority_then_depth_then_arrival() {
        let keys = key_table(&[
            ("merch", 1, 5, 0),
            ("short-prepare", 3, 4, 1),
            ("short-active-late", 3, 5, 3),
            ("short-active-early", 3, 5, 2),
        ]);
        let mut queue = WaitQueue::new();
        for id in ["merch", "short-prepare", "short-active-late", "short-active-early"] {
            queue.insert(&CardId::from(id));
        }

        let ordered: Vec<String> = queue
            .ordered(|id| keys.get(id).copied())
            .into_iter()
            .map(|id| id.to_string())
            .collect();
        assert_eq!(
            ordered,
            vec!["short-active-early", "short-active-late", "short-prepare", "merch"]
        );
    }

    #[test]
    fn test_insert_is_idempotent() {
        let mut queue = WaitQueue::new();
        let a = CardId::from("a");
        assert!(queue.insert(&a));
        assert!(!queue.insert(&a));
        assert_eq!(queue.len(), 1);
        assert!(queue.remove(&a));
        assert!(!queue.remove(&a));
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_unresolvable_members_skipped() {
        let mut queue = WaitQueue::new();
        queue.insert(&CardId::from("ghost"));
        assert!(queue.ordered(|_| None).is_empty());
    }
}
