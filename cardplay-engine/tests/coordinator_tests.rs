//! End-to-end tests: visibility samples in, playback commands out
//!
//! Covers:
//! - A card scrolled through the viewport and back out
//! - Slot hand-over between two cards while scrolling
//! - Trace replay with preview rotation driven by `advance`
//! - Coordinator and trace built from files on disk

use cardplay_common::config::{ConfigStore, PlaybackConfig};
use cardplay_common::events::{Category, PlaybackCommand, VisibilityState};
use cardplay_engine::trace::{self, TraceOp};
use cardplay_engine::{CardHandle, PlaybackCoordinator, Rect};
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::broadcast;

fn coordinator(edit: impl FnOnce(&mut PlaybackConfig)) -> PlaybackCoordinator {
    let mut config = PlaybackConfig::default();
    edit(&mut config);
    PlaybackCoordinator::new(Arc::new(ConfigStore::new(config).unwrap()))
}

fn drain(rx: &mut broadcast::Receiver<PlaybackCommand>) -> Vec<String> {
    std::iter::from_fn(|| rx.try_recv().ok())
        .map(|c| c.to_string())
        .collect()
}

#[test]
fn test_scroll_through_and_out() {
    let coordinator = coordinator(|_| {});
    let mut rx = coordinator.subscribe();
    let a = CardHandle::on_demand("a", Category::short());

    let mut states = Vec::new();
    for (i, pct) in [10.0, 30.0, 60.0, 80.0, 40.0, 10.0, 0.0].into_iter().enumerate() {
        let events = coordinator.report_visibility(&a, pct, i as u64 * 100);
        states.extend(events.into_iter().map(|e| e.state));
    }

    assert_eq!(
        states,
        vec![
            VisibilityState::Prefetch,
            VisibilityState::PrepareToBeActive,
            VisibilityState::IsActive,
            VisibilityState::WillResignActive,
            VisibilityState::NotActive,
            VisibilityState::Released,
        ]
    );
    assert_eq!(
        drain(&mut rx),
        vec!["prefetchRequested(a)", "play(a)", "pause(a)", "prefetchCancelled(a)"]
    );
    assert_eq!(coordinator.stats().active_count, 0);
}

#[test]
fn test_feed_scroll_hands_slot_to_next_card() {
    let coordinator = coordinator(|c| c.visibility.throttle_ms = 0);
    let mut rx = coordinator.subscribe();
    let viewport = Rect::new(0.0, 0.0, 100.0, 100.0);
    let a = CardHandle::on_demand("a", Category::short());
    let b = CardHandle::on_demand("b", Category::short());

    // Cards stacked vertically, each one viewport tall; scroll down
    for (t, offset) in [0.0, 50.0, 95.0].into_iter().enumerate() {
        let at = t as u64 * 100;
        coordinator.report_geometry(&a, &viewport, &Rect::new(0.0, -offset, 100.0, 100.0), at);
        coordinator.report_geometry(
            &b,
            &viewport,
            &Rect::new(0.0, 100.0 - offset, 100.0, 100.0),
            at,
        );
    }

    assert_eq!(
        drain(&mut rx),
        vec![
            "prefetchRequested(a)",
            "play(a)",
            "pause(a)",
            "prefetchRequested(b)",
            "play(b)",
            "prefetchCancelled(a)",
        ]
    );
    assert_eq!(coordinator.meter_state(&a.id), Some(VisibilityState::Released));
    assert_eq!(coordinator.meter_state(&b.id), Some(VisibilityState::IsActive));
}

#[test]
fn test_trace_replay_with_rotation() {
    let ops = trace::parse_trace(
        r#"
        {"op":"report","at_ms":0,"card":"a","category":"short","percentage":100}
        {"op":"report","at_ms":0,"card":"b","category":"short","percentage":100}
        {"op":"report","at_ms":0,"card":"l","category":"short","media":"live","percentage":100}
        {"op":"advance","at_ms":30000}
        {"op":"unmount","at_ms":30500,"card":"b"}
        "#,
    )
    .unwrap();
    assert_eq!(ops.last().map(TraceOp::at_ms), Some(30_500));

    let coordinator = coordinator(|_| {});
    let mut rx = coordinator.subscribe();
    for op in &ops {
        trace::apply(&coordinator, op);
    }

    assert_eq!(
        drain(&mut rx),
        vec![
            "prefetchRequested(a)",
            "play(a)",
            "prefetchRequested(b)",
            "pause(a)",
            "play(b)",
            "sequence(a->b)",
            "pause(b)",
            "prefetchCancelled(b)",
            // a went to the back of the queue when it rotated out
            "play(l)",
        ]
    );
    let stats = coordinator.stats();
    assert_eq!(stats.playing_count, 1);
    assert_eq!(stats.wait_queue_length, 1);
}

fn write_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_config_and_trace_from_files() {
    let config = write_file(
        r#"
        [scheduler]
        preview_duration_ms = 1000
        priorities = ["short"]

        [scheduler.categories.short]
        max_concurrent = 2

        [visibility]
        throttle_ms = 0
        "#,
    );
    let trace_file = write_file(
        "{\"op\":\"report\",\"at_ms\":0,\"card\":\"a\",\"category\":\"short\",\"percentage\":100}\n\
         {\"op\":\"report\",\"at_ms\":1,\"card\":\"b\",\"category\":\"short\",\"percentage\":100}\n\
         {\"op\":\"advance\",\"at_ms\":1000}\n",
    );

    let coordinator = PlaybackCoordinator::from_config_file(config.path()).unwrap();
    let mut rx = coordinator.subscribe();
    let ops = trace::read_trace(trace_file.path()).unwrap();
    assert_eq!(ops.len(), 3);
    for op in &ops {
        trace::apply(&coordinator, op);
    }

    // Both fit under the raised cap; a's preview ends with nobody waiting
    assert_eq!(
        drain(&mut rx),
        vec![
            "prefetchRequested(a)",
            "play(a)",
            "prefetchRequested(b)",
            "play(b)",
        ]
    );
    assert_eq!(coordinator.scheduler().next_deadline(), Some(1_001));
}
