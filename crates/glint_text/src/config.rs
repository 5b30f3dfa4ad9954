//! Font and text rendering settings
//!
//! [`DrawingSettings`] is shared by every font size in a registry.
//! [`TextConfig`] bundles it with the registry-level knobs and can be read
//! from TOML:
//!
//! ```toml
//! zoom = 150
//! cache_update_interval = 3600
//!
//! [drawing]
//! description = "Ubuntu, Noto Sans"
//! language = "en"
//! line_height_scale = 1.2
//! paragraph_break_scale = 0.4
//! ```

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_UPDATE_INTERVAL;
use crate::scale::DEFAULT_ZOOM;
use crate::Result;

/// Font and layout settings common to all pixel sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DrawingSettings {
    /// Comma separated list of font families
    pub description: String,
    /// Language tag used for shaping
    pub language: String,
    /// Default line height as a multiple of the font height
    pub line_height_scale: f64,
    /// Default paragraph break as a multiple of the font height
    pub paragraph_break_scale: f64,
}

impl Default for DrawingSettings {
    fn default() -> Self {
        Self {
            description: default_description(),
            language: default_language(),
            line_height_scale: 1.20,
            paragraph_break_scale: 0.40,
        }
    }
}

fn default_description() -> String {
    "Ubuntu".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextConfig {
    #[serde(default)]
    pub drawing: DrawingSettings,
    /// Display zoom in percent
    #[serde(default = "default_zoom")]
    pub zoom: u32,
    /// Ticks between render cache compactions
    #[serde(default = "default_update_interval")]
    pub cache_update_interval: u32,
}

fn default_zoom() -> u32 {
    DEFAULT_ZOOM
}

fn default_update_interval() -> u32 {
    DEFAULT_UPDATE_INTERVAL
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            drawing: DrawingSettings::default(),
            zoom: default_zoom(),
            cache_update_interval: default_update_interval(),
        }
    }
}

impl TextConfig {
    /// Parse a configuration from TOML text; missing keys take defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
