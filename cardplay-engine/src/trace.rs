//! Recorded host traces
//!
//! A trace is a JSON-lines file of host operations, one object per line,
//! tagged by `op`:
//!
//! ```text
//! {"op":"report","at_ms":0,"card":"a","category":"short","percentage":60}
//! {"op":"geometry","at_ms":10,"card":"b","viewport":{"x":0,"y":0,"width":100,"height":100},"rect":{"x":0,"y":50,"width":100,"height":100}}
//! {"op":"unmount","at_ms":20,"card":"a"}
//! {"op":"advance","at_ms":40000}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Timestamps must not
//! decrease; preview timers due before an operation fire before it runs.

use crate::coordinator::PlaybackCoordinator;
use crate::error::{Error, Result};
use crate::scheduler::CardHandle;
use crate::visibility::Rect;
use cardplay_common::events::{CardId, Category, MediaKind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// One host operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TraceOp {
    /// Visibility percentage sample
    Report {
        at_ms: u64,
        card: CardId,
        #[serde(default = "Category::default_category")]
        category: Category,
        #[serde(default)]
        media: MediaKind,
        percentage: f64,
    },
    /// Geometry sample, converted to a percentage
    Geometry {
        at_ms: u64,
        card: CardId,
        #[serde(default = "Category::default_category")]
        category: Category,
        #[serde(default)]
        media: MediaKind,
        viewport: Rect,
        rect: Rect,
    },
    Unmount { at_ms: u64, card: CardId },
    /// Let time pass, firing due preview timers
    Advance { at_ms: u64 },
}

impl TraceOp {
    pub fn at_ms(&self) -> u64 {
        match self {
            TraceOp::Report { at_ms, .. }
            | TraceOp::Geometry { at_ms, .. }
            | TraceOp::Unmount { at_ms, .. }
            | TraceOp::Advance { at_ms } => *at_ms,
        }
    }
}

/// Parse a JSON-lines trace
pub fn parse_trace(input: &str) -> Result<Vec<TraceOp>> {
    let mut ops = Vec::new();
    let mut last_at = 0;
    for (idx, raw) in input.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let op: TraceOp = serde_json::from_str(line).map_err(|e| Error::Trace {
            line: idx + 1,
            message: e.to_string(),
        })?;
        if op.at_ms() < last_at {
            return Err(Error::Trace {
                line: idx + 1,
                message: format!("timestamp {}ms goes back from {}ms", op.at_ms(), last_at),
            });
        }
        last_at = op.at_ms();
        ops.push(op);
    }
    Ok(ops)
}

/// Read and parse a trace file
pub fn read_trace(path: &Path) -> Result<Vec<TraceOp>> {
    let content = std::fs::read_to_string(path)?;
    parse_trace(&content)
}

/// Apply one operation to a coordinator
///
/// Fires preview timers due up to the operation's timestamp first.
pub fn apply(coordinator: &PlaybackCoordinator, op: &TraceOp) {
    let fired = coordinator.advance_to(op.at_ms());
    if fired > 0 {
        debug!("{} preview timer(s) fired before {}ms", fired, op.at_ms());
    }

    match op {
        TraceOp::Report {
            at_ms,
            card,
            category,
            media,
            percentage,
        } => {
            let handle = CardHandle::new(card.clone(), category.clone(), *media);
            coordinator.report_visibility(&handle, *percentage, *at_ms);
        }
        TraceOp::Geometry {
            at_ms,
            card,
            category,
            media,
            viewport,
            rect,
        } => {
            let handle = CardHandle::new(card.clone(), category.clone(), *media);
            coordinator.report_geometry(&handle, viewport, rect, *at_ms);
        }
        TraceOp::Unmount { at_ms, card } => coordinator.unmount(card, *at_ms),
        TraceOp::Advance { .. } => {}
    }
}
