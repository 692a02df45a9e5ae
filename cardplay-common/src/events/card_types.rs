//! Card identity, category and media type definitions
//!
//! Supporting types for the identity a card presents to the scheduler.

use serde::{Deserialize, Serialize};

/// Opaque card identifier, stable for a card's mounted lifetime
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(String);

impl CardId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CardId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CardId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for CardId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Card category (short, carousel, merch, default, ...)
///
/// Categories are configuration-defined, so this is a string newtype rather
/// than a closed enum. Unknown categories reported at runtime fall back to
/// [`Category::DEFAULT`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Name of the fallback category
    pub const DEFAULT: &'static str = "default";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn default_category() -> Self {
        Self(Self::DEFAULT.to_string())
    }

    pub fn short() -> Self {
        Self::new("short")
    }

    pub fn carousel() -> Self {
        Self::new("carousel")
    }

    pub fn merch() -> Self {
        Self::new("merch")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_default(&self) -> bool {
        self.0 == Self::DEFAULT
    }
}

impl From<&str> for Category {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Media kind of a card
///
/// Live content is never prefetched and never takes part in preview rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    #[serde(alias = "VOD", alias = "vod")]
    OnDemand,
    #[serde(alias = "LIVE")]
    Live,
}

impl MediaKind {
    pub fn is_live(self) -> bool {
        matches!(self, MediaKind::Live)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::OnDemand => write!(f, "OnDemand"),
            MediaKind::Live => write!(f, "Live"),
        }
    }
}
