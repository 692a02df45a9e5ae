//! Card lifecycle tests
//!
//! Covers:
//! - Prefetch request/cancel policy
//! - Release and unmount clean-up (timers, wait queue, slots)
//! - Transitions for cards the scheduler never saw
//! - Demotion of a playing card moving back to prefetch
//! - Cap invariants under a long pseudo-random event stream

mod helpers;

use cardplay_common::config::CategoryConfig;
use cardplay_common::events::{CardId, Category, PauseReason, PlaybackCommand, VisibilityState};
use cardplay_engine::{CardHandle, SchedulerStats};
use helpers::{config_with, ids, live_short, short, Harness};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

#[test]
fn test_prefetch_requested_and_cancelled() {
    let mut h = Harness::with_defaults();
    let a = short("a");
    h.prefetch(&a, 0);
    h.prepare(&a, 10);
    h.active(&a, 20);
    h.resign(&a, 30);
    h.not_active(&a, 40);
    h.released(&a, 50);

    assert_eq!(
        h.drain(),
        vec!["prefetchRequested(a)", "play(a)", "pause(a)", "prefetchCancelled(a)"]
    );
    assert_eq!(h.scheduler.stats(), SchedulerStats::default());
}

#[test]
fn test_live_and_disabled_prefetch_not_requested() {
    let mut h = Harness::with_defaults();
    let live = live_short("live");
    h.prefetch(&live, 0);
    h.released(&live, 1);
    assert!(h.drain().is_empty());

    let mut h = Harness::new(config_with(|c| c.prefetch.enabled = false));
    let a = short("a");
    h.prefetch(&a, 0);
    h.released(&a, 1);
    assert!(h.drain().is_empty());
}

#[test]
fn test_prefetch_requested_once_per_card() {
    let mut h = Harness::with_defaults();
    let a = short("a");
    h.prefetch(&a, 0);
    h.prefetch(&a, 5);
    assert_eq!(h.drain(), vec!["prefetchRequested(a)"]);
}

#[test]
fn test_not_active_releases_slot_and_entry() {
    let mut h = Harness::with_defaults();
    let a = short("a");
    let b = short("b");
    h.active(&a, 0);
    h.active(&b, 1);
    h.drain();

    h.not_active(&a, 2);
    let commands = h.drain_raw();
    assert_eq!(commands.len(), 2);
    assert!(matches!(
        commands[0],
        PlaybackCommand::Pause {
            reason: PauseReason::Released,
            ..
        }
    ));
    assert_eq!(commands[1].to_string(), "play(b)");
    assert!(h.scheduler.entry(&a.id).is_none());
}

#[test]
fn test_unmount_cancels_everything() {
    let mut h = Harness::with_defaults();
    let a = short("a");
    let b = short("b");
    h.prefetch(&a, 0);
    h.active(&a, 1);
    h.active(&b, 2);
    h.drain();

    h.scheduler.unmount(&a.id, 3);
    assert_eq!(h.drain(), vec!["pause(a)", "prefetchCancelled(a)", "play(b)"]);

    let stats = h.scheduler.stats();
    assert_eq!(stats.active_count, 1);
    assert_eq!(stats.armed_timers, 1);

    // a's old deadline at 30_001 is stale; b's runs from 3
    assert_eq!(h.fire(30_001), 0);
    assert_eq!(h.scheduler.next_deadline(), Some(30_003));
    assert!(h.drain().is_empty());
}

#[test]
fn test_unmount_of_waiting_card_leaves_queue() {
    let mut h = Harness::with_defaults();
    h.active(&short("a"), 0);
    let b = short("b");
    h.active(&b, 1);
    h.scheduler.unmount(&b.id, 2);

    assert!(h.waiting().is_empty());
    assert_eq!(h.drain(), vec!["play(a)"]);
}

#[test]
fn test_outgoing_events_for_unknown_cards_are_ignored() {
    let mut h = Harness::with_defaults();
    let ghost = short("ghost");
    h.resign(&ghost, 0);
    h.not_active(&ghost, 1);
    h.released(&ghost, 2);
    h.scheduler.unmount(&ghost.id, 3);

    assert!(h.drain().is_empty());
    assert_eq!(h.scheduler.stats(), SchedulerStats::default());
}

#[test]
fn test_prepare_without_prefetch_creates_entry() {
    let h = Harness::with_defaults();
    let a = short("a");
    h.prepare(&a, 0);

    let entry = h.scheduler.entry(&a.id).unwrap();
    assert_eq!(entry.state(), Some(VisibilityState::PrepareToBeActive));
    assert_eq!(h.waiting(), ids(&["a"]));
}

#[test]
fn test_playing_card_back_to_prefetch_is_demoted() {
    let mut h = Harness::with_defaults();
    let a = short("a");
    let b = short("b");
    h.active(&a, 0);
    h.active(&b, 1);
    h.drain();

    h.prefetch(&a, 2);
    let commands = h.drain_raw();
    let compact: Vec<String> = commands.iter().map(|c| c.to_string()).collect();
    assert_eq!(compact, vec!["pause(a)", "play(b)", "prefetchRequested(a)"]);
    assert!(matches!(
        commands[0],
        PlaybackCommand::Pause {
            reason: PauseReason::Demoted,
            ..
        }
    ));
    assert!(h.waiting().is_empty());
}

#[test]
fn test_shutdown_pauses_all_playing() {
    let mut h = Harness::new(config_with(|c| {
        c.scheduler
            .categories
            .insert(Category::short(), CategoryConfig::with_cap(2));
    }));
    h.active(&short("a"), 0);
    h.active(&short("b"), 1);
    h.drain();

    h.scheduler.shutdown();
    let commands = h.drain_raw();
    assert_eq!(commands.len(), 2);
    assert!(commands.iter().all(|c| matches!(
        c,
        PlaybackCommand::Pause {
            reason: PauseReason::Shutdown,
            ..
        }
    )));
    assert_eq!(h.scheduler.stats(), SchedulerStats::default());
    assert_eq!(h.scheduler.next_deadline(), None);
}

#[test]
fn test_caps_hold_under_random_event_stream() {
    let config = config_with(|c| {
        c.scheduler.max_total_playing = 2;
        c.scheduler.preview_duration_ms = 2_000;
        c.scheduler
            .categories
            .insert(Category::carousel(), CategoryConfig::with_cap(2));
    });
    let h = Harness::new(config.clone());
    let categories = [
        Category::short(),
        Category::carousel(),
        Category::merch(),
        Category::new("ads"),
    ];
    let states = [
        VisibilityState::Prefetch,
        VisibilityState::PrepareToBeActive,
        VisibilityState::IsActive,
        VisibilityState::WillResignActive,
        VisibilityState::NotActive,
        VisibilityState::Released,
    ];
    let cards: Vec<CardHandle> = (0..10)
        .map(|i| {
            let id = format!("card-{}", i);
            let category = categories[i % categories.len()].clone();
            if i == 9 {
                CardHandle::live(id, category)
            } else {
                CardHandle::on_demand(id, category)
            }
        })
        .collect();

    let effective = |card: &CardId| -> Category {
        let category = &cards
            .iter()
            .find(|c| &c.id == card)
            .expect("known card")
            .category;
        if config.scheduler.is_known(category) {
            category.clone()
        } else {
            Category::default_category()
        }
    };

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut now = 0;
    for step in 0..5_000 {
        now += rng.gen_range(0..700);
        match rng.gen_range(0..10) {
            0 => {
                h.fire(now);
            }
            1 => {
                let card = &cards[rng.gen_range(0..cards.len())];
                h.scheduler.unmount(&card.id, now);
            }
            _ => {
                let card = &cards[rng.gen_range(0..cards.len())];
                let state = states[rng.gen_range(0..states.len())];
                h.send(card, state, now);
            }
        }

        let playing = h.playing();
        assert!(playing.len() <= 2, "step {}: {:?}", step, playing);
        let mut per_category: HashMap<Category, usize> = HashMap::new();
        for id in &playing {
            *per_category.entry(effective(id)).or_default() += 1;
            let entry = h.scheduler.entry(id).expect("playing card has an entry");
            assert!(entry.is_eligible(), "step {}: {} playing while {:?}", step, id, entry.state());
            if entry.is_live() {
                assert!(entry.preview_timer.is_none());
            }
        }
        for (category, count) in per_category {
            assert!(
                count <= config.scheduler.cap(&category),
                "step {}: {} playing in {}",
                step,
                count,
                category
            );
        }
        for id in h.waiting() {
            assert!(!h.scheduler.is_playing(&id), "step {}: {} both playing and waiting", step, id);
        }
    }
}
