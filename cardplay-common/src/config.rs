//! Configuration model and hot-reloadable configuration store
//!
//! One TOML document configures both sides of the engine:
//!
//! ```toml
//! [scheduler]
//! max_total_playing = 3
//! preview_duration_ms = 30000
//! rotation_enabled = true
//! priorities = ["short", "carousel", "merch"]
//!
//! [scheduler.categories.short]
//! max_concurrent = 1
//!
//! [visibility]
//! throttle_ms = 50
//!
//! [visibility.thresholds.short]
//! moving_in = [5.0, 25.0, 50.0]
//! moving_out = [90.0, 20.0, 5.0]
//! ```
//!
//! Every section is optional; missing values take the built-in defaults.
//! Validation happens once, at load/update time. A configuration that reaches
//! the scheduler is always well formed.

use crate::events::Category;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Per-category visibility thresholds (percentages)
///
/// - `moving_in`: ascending `[prefetch, prepareToBeActive, isActive]`
/// - `moving_out`: descending `[willResignActive, notActive, released]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityThresholdSet {
    pub moving_in: [f64; 3],
    pub moving_out: [f64; 3],
}

impl VisibilityThresholdSet {
    pub const fn new(moving_in: [f64; 3], moving_out: [f64; 3]) -> Self {
        Self {
            moving_in,
            moving_out,
        }
    }

    /// Thresholds used by short-video cards
    pub const fn shorts() -> Self {
        Self::new([5.0, 25.0, 50.0], [90.0, 20.0, 5.0])
    }

    /// Carousel cards need more of the card on screen before playing
    pub const fn carousel() -> Self {
        Self::new([5.0, 25.0, 90.0], [70.0, 10.0, 5.0])
    }

    /// Check range and monotonicity
    pub fn validate(&self, name: &str) -> Result<()> {
        for value in self.moving_in.iter().chain(self.moving_out.iter()) {
            if !value.is_finite() || *value < 0.0 || *value > 100.0 {
                return Err(Error::Config(format!(
                    "thresholds for '{}': {} is outside [0, 100]",
                    name, value
                )));
            }
        }
        if !self.moving_in.windows(2).all(|w| w[0] <= w[1]) {
            return Err(Error::Config(format!(
                "thresholds for '{}': moving_in {:?} must be ascending",
                name, self.moving_in
            )));
        }
        if !self.moving_out.windows(2).all(|w| w[0] >= w[1]) {
            return Err(Error::Config(format!(
                "thresholds for '{}': moving_out {:?} must be descending",
                name, self.moving_out
            )));
        }
        Ok(())
    }

    /// Deepest incoming level whose threshold `percentage` has reached
    pub fn incoming_level(&self, percentage: f64) -> Option<usize> {
        self.moving_in
            .iter()
            .rposition(|threshold| percentage >= *threshold)
    }

    /// Deepest outgoing level whose threshold `percentage` has reached
    pub fn outgoing_level(&self, percentage: f64) -> Option<usize> {
        self.moving_out
            .iter()
            .rposition(|threshold| percentage <= *threshold)
    }
}

impl Default for VisibilityThresholdSet {
    fn default() -> Self {
        Self::shorts()
    }
}

/// Per-category scheduling limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Maximum simultaneously playing cards of this category
    #[serde(default = "default_category_cap")]
    pub max_concurrent: usize,
}

impl CategoryConfig {
    pub fn with_cap(max_concurrent: usize) -> Self {
        Self { max_concurrent }
    }
}

impl Default for CategoryConfig {
    fn default() -> Self {
        Self::with_cap(default_category_cap())
    }
}

/// Admission, preemption and rotation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cards allowed to play at once across all categories
    #[serde(default = "default_max_total_playing")]
    pub max_total_playing: usize,

    /// Preview slice length for on-demand rotation
    #[serde(default = "default_preview_duration_ms")]
    pub preview_duration_ms: u64,

    /// Master switch for preview sequencing
    #[serde(default = "default_true")]
    pub rotation_enabled: bool,

    /// Rotate into waiting cards when a preview slice ends
    #[serde(default = "default_true")]
    pub rotate_to_waiting: bool,

    /// Category priority order, highest first
    #[serde(default = "default_priorities")]
    pub priorities: Vec<Category>,

    /// Concurrency caps by category
    #[serde(default = "default_categories")]
    pub categories: BTreeMap<Category, CategoryConfig>,
}

impl SchedulerConfig {
    /// Priority of a category (higher value wins)
    ///
    /// Categories missing from `priorities` (including `default` unless listed)
    /// share the lowest priority, 0.
    pub fn priority(&self, category: &Category) -> u32 {
        self.priorities
            .iter()
            .position(|c| c == category)
            .map(|idx| (self.priorities.len() - idx) as u32)
            .unwrap_or(0)
    }

    /// Concurrency cap of a category (unknown categories get the default cap)
    pub fn cap(&self, category: &Category) -> usize {
        self.categories
            .get(category)
            .or_else(|| self.categories.get(&Category::default_category()))
            .map(|c| c.max_concurrent)
            .unwrap_or(1)
    }

    pub fn is_known(&self, category: &Category) -> bool {
        self.categories.contains_key(category)
    }

    /// Both rotation switches are on
    pub fn rotation_active(&self) -> bool {
        self.rotation_enabled && self.rotate_to_waiting
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_total_playing: default_max_total_playing(),
            preview_duration_ms: default_preview_duration_ms(),
            rotation_enabled: true,
            rotate_to_waiting: true,
            priorities: default_priorities(),
            categories: default_categories(),
        }
    }
}

/// Visibility sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Minimum spacing between emitted events (0 disables throttling)
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Threshold sets by category
    #[serde(default = "default_thresholds")]
    pub thresholds: BTreeMap<Category, VisibilityThresholdSet>,
}

impl VisibilityConfig {
    /// Thresholds for a category, falling back to `default`, then shorts
    pub fn thresholds_for(&self, category: &Category) -> VisibilityThresholdSet {
        self.thresholds
            .get(category)
            .or_else(|| self.thresholds.get(&Category::default_category()))
            .copied()
            .unwrap_or_default()
    }
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            thresholds: default_thresholds(),
        }
    }
}

/// Prefetch signalling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrefetchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Device class settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Restrict playback to a single card, no preemption
    #[serde(default)]
    pub low_end_device: bool,

    /// Whether low-end devices admit cards automatically
    #[serde(default)]
    pub autoplay_on_low_end: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub visibility: VisibilityConfig,
    #[serde(default)]
    pub prefetch: PrefetchConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PlaybackConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PlaybackConfig = toml::from_str(content)?;
        config.normalized()
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded playback configuration from {}", path.display());
        Ok(config)
    }

    /// Insert the `default` category when absent, then validate
    pub fn normalized(mut self) -> Result<Self> {
        self.scheduler
            .categories
            .entry(Category::default_category())
            .or_insert_with(|| CategoryConfig::with_cap(1));
        self.validate()?;
        Ok(self)
    }

    /// Fail fast on malformed configuration
    pub fn validate(&self) -> Result<()> {
        let scheduler = &self.scheduler;

        if scheduler.max_total_playing == 0 {
            return Err(Error::Config(
                "scheduler.max_total_playing must be at least 1".to_string(),
            ));
        }
        if scheduler.rotation_active() && scheduler.preview_duration_ms == 0 {
            return Err(Error::Config(
                "scheduler.preview_duration_ms must be positive when rotation is enabled"
                    .to_string(),
            ));
        }
        for (category, limits) in &scheduler.categories {
            if limits.max_concurrent == 0 {
                return Err(Error::Config(format!(
                    "category '{}' has max_concurrent = 0",
                    category
                )));
            }
        }

        let mut seen = std::collections::BTreeSet::new();
        for category in &scheduler.priorities {
            if !scheduler.is_known(category) {
                return Err(Error::Config(format!(
                    "priority list names unknown category '{}'",
                    category
                )));
            }
            if !seen.insert(category) {
                return Err(Error::Config(format!(
                    "priority list names '{}' twice",
                    category
                )));
            }
        }

        for (category, thresholds) in &self.visibility.thresholds {
            if !scheduler.is_known(category) {
                return Err(Error::Config(format!(
                    "thresholds defined for unknown category '{}'",
                    category
                )));
            }
            thresholds.validate(category.as_str())?;
        }

        Ok(())
    }
}

/// Versioned configuration snapshot
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Incremented on every successful update
    pub generation: u64,
    pub config: Arc<PlaybackConfig>,
}

/// Hot-reloadable configuration holder
///
/// Readers take a cheap `Arc` snapshot on every call, so a change is visible
/// at the next event. Updates are validated before they are published; an
/// invalid update leaves the current configuration in place.
#[derive(Debug)]
pub struct ConfigStore {
    tx: watch::Sender<ConfigSnapshot>,
}

impl ConfigStore {
    /// Create a store from a configuration (validated first)
    pub fn new(config: PlaybackConfig) -> Result<Self> {
        let config = config.normalized()?;
        let (tx, _) = watch::channel(ConfigSnapshot {
            generation: 0,
            config: Arc::new(config),
        });
        Ok(Self { tx })
    }

    /// Current configuration
    pub fn current(&self) -> Arc<PlaybackConfig> {
        Arc::clone(&self.tx.borrow().config)
    }

    /// Current configuration with its generation
    pub fn snapshot(&self) -> ConfigSnapshot {
        self.tx.borrow().clone()
    }

    pub fn generation(&self) -> u64 {
        self.tx.borrow().generation
    }

    /// Replace the whole configuration
    pub fn update(&self, config: PlaybackConfig) -> Result<u64> {
        self.modify(move |current| *current = config)
    }

    /// Edit a copy of the current configuration and publish it if valid
    ///
    /// Returns the new generation.
    pub fn modify<F>(&self, edit: F) -> Result<u64>
    where
        F: FnOnce(&mut PlaybackConfig),
    {
        let mut outcome = Err(Error::Internal("configuration edit not applied".to_string()));
        self.tx.send_if_modified(|snapshot| {
            let mut next = (*snapshot.config).clone();
            edit(&mut next);
            match next.normalized() {
                Ok(valid) => {
                    snapshot.generation += 1;
                    snapshot.config = Arc::new(valid);
                    outcome = Ok(snapshot.generation);
                    true
                }
                Err(e) => {
                    outcome = Err(e);
                    false
                }
            }
        });
        if let Ok(generation) = outcome {
            info!("Playback configuration updated (generation {})", generation);
        }
        outcome
    }

    /// Watch for configuration changes
    pub fn subscribe(&self) -> watch::Receiver<ConfigSnapshot> {
        self.tx.subscribe()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        let (tx, _) = watch::channel(ConfigSnapshot {
            generation: 0,
            config: Arc::new(default_config()),
        });
        Self { tx }
    }
}

fn default_config() -> PlaybackConfig {
    let mut config = PlaybackConfig::default();
    config
        .scheduler
        .categories
        .entry(Category::default_category())
        .or_insert_with(|| CategoryConfig::with_cap(1));
    config
}

fn default_true() -> bool {
    true
}

fn default_category_cap() -> usize {
    1
}

fn default_max_total_playing() -> usize {
    3
}

fn default_preview_duration_ms() -> u64 {
    30_000
}

fn default_throttle_ms() -> u64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_priorities() -> Vec<Category> {
    vec![Category::short(), Category::carousel(), Category::merch()]
}

fn default_categories() -> BTreeMap<Category, CategoryConfig> {
    BTreeMap::from([
        (Category::short(), CategoryConfig::with_cap(1)),
        (Category::carousel(), CategoryConfig::with_cap(3)),
        (Category::merch(), CategoryConfig::with_cap(1)),
        (Category::default_category(), CategoryConfig::with_cap(1)),
    ])
}

fn default_thresholds() -> BTreeMap<Category, VisibilityThresholdSet> {
    BTreeMap::from([
        (Category::short(), VisibilityThresholdSet::shorts()),
        (Category::carousel(), VisibilityThresholdSet::carousel()),
        (Category::default_category(), VisibilityThresholdSet::shorts()),
    ])
}
