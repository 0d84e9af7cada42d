//! Render configuration.
//!
//! Options arrive as JSON from the WASM host or a CLI wrapper, e.g.
//! `{"loops": 3, "trimLeadingSilence": true}`. Every field is optional.

use serde::{Deserialize, Serialize};

use crate::error::SoundError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderOptions {
    /// How many times the track's loop region plays. Values below 2 play
    /// the track once straight through.
    pub loops: u32,
    /// Shift every tone earlier by the common leading silence first.
    pub trim_leading_silence: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        RenderOptions {
            loops: 1,
            trim_leading_silence: false,
        }
    }
}

impl RenderOptions {
    /// Parse options from JSON. An empty string yields the defaults.
    pub fn from_json(json: &str) -> Result<Self, SoundError> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(json)?)
    }
}
