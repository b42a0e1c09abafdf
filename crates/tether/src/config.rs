//! Engine Configuration

use serde::{Deserialize, Serialize};

/// How bound positions are marked in a compiled skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerStyle {
    /// An empty text node
    #[default]
    Text,
    /// A `begin "key"` / `end "key"` comment pair; the end comment is the
    /// insertion boundary
    Comment,
}

/// Engine configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Marker node kind used by the compiler
    pub marker: MarkerStyle,

    /// Group contiguous insertions into one fragment
    pub batch_insertions: bool,

    /// Append (then re-append the marker) when the marker is the last child
    pub append_at_end: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            marker: MarkerStyle::Text,
            batch_insertions: true,
            append_at_end: true,
        }
    }
}

impl Config {
    /// Use the given marker style
    pub fn with_marker(mut self, marker: MarkerStyle) -> Self {
        self.marker = marker;
        self
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
