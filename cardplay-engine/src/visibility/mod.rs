//! Viewport visibility sampling
//!
//! **Module Structure:**
//! - `mod.rs`: geometry (`Rect`) and the canonical percentage sample
//! - `meter.rs`: per-card debounced state classification (`VisibilityMeter`)

mod meter;

pub use meter::{VisibilityEvent, VisibilityMeter};

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in viewport coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Area, zero for degenerate rectangles
    pub fn area(&self) -> f64 {
        if self.width <= 0.0 || self.height <= 0.0 {
            0.0
        } else {
            self.width * self.height
        }
    }

    /// Overlapping region, if any
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right > left && bottom > top {
            Some(Rect::new(left, top, right - left, bottom - top))
        } else {
            None
        }
    }
}

/// Percentage of `card` visible inside `viewport`
///
/// Area ratio (intersection area over card area), floored to a whole percent
/// and clamped to `[0, 100]`. Cards with no area are 0% visible.
pub fn sample(viewport: &Rect, card: &Rect) -> f64 {
    let card_area = card.area();
    if card_area <= 0.0 {
        return 0.0;
    }
    let visible = viewport
        .intersection(card)
        .map(|overlap| overlap.area())
        .unwrap_or(0.0);
    (100.0 * visible / card_area).floor().clamp(0.0, 100.0)
}
