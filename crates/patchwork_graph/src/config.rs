// SPDX-License-Identifier: MIT OR Apache-2.0
//! Patchbay configuration: layout metrics, colors and cascade limits.

use egui::Color32;
use serde::{Deserialize, Serialize};

/// Patchbay settings.
///
/// Missing fields take their default value when loading from RON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchbayConfig {
    /// Horizontal distance between neighbouring ports
    pub port_spacing: f32,
    /// Port hit-area width
    pub port_width: f32,
    /// Port hit-area height
    pub port_height: f32,
    /// Estimated width of one label character
    pub char_width: f32,
    /// Label line height
    pub line_height: f32,
    /// Space between label and box edge
    pub text_padding: f32,
    /// Size of the marker drawn over a hovered port
    pub hover_marker: [f32; 2],
    /// Distance from a cord within which it can be picked
    pub cord_pick_tolerance: f32,
    /// Deepest message cascade before delivery stops
    pub max_cascade_depth: usize,
    /// Refuse cords that would close a loop
    pub reject_cycles: bool,
    /// Patcher box and port color (RGBA)
    pub chrome_color: [u8; 4],
    /// Outline color of the focused patcher or cord (RGBA)
    pub focus_color: [u8; 4],
    /// Label color (RGBA)
    pub text_color: [u8; 4],
    /// Cord color (RGBA)
    pub cord_color: [u8; 4],
}

impl Default for PatchbayConfig {
    fn default() -> Self {
        Self {
            port_spacing: 14.0,
            port_width: 10.0,
            port_height: 4.0,
            char_width: 8.0,
            line_height: 11.0,
            text_padding: 4.0,
            hover_marker: [14.0, 8.0],
            cord_pick_tolerance: 4.0,
            max_cascade_depth: 256,
            reject_cycles: true,
            chrome_color: [255, 255, 255, 255],
            focus_color: [0xCC, 0xFF, 0x77, 127],
            text_color: [255, 255, 255, 255],
            cord_color: [200, 200, 200, 255],
        }
    }
}

impl PatchbayConfig {
    /// Parse a RON document
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Chrome color
    pub fn chrome(&self) -> Color32 {
        rgba(self.chrome_color)
    }

    /// Focus outline color
    pub fn focus(&self) -> Color32 {
        rgba(self.focus_color)
    }

    /// Label color
    pub fn text(&self) -> Color32 {
        rgba(self.text_color)
    }

    /// Cord color
    pub fn cord(&self) -> Color32 {
        rgba(self.cord_color)
    }
}

fn rgba([r, g, b, a]: [u8; 4]) -> Color32 {
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid RON for this struct
    #[error("Invalid configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serialization failed
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PatchbayConfig::default();
        assert_eq!(config.port_spacing, 14.0);
        assert!(config.reject_cycles);
        assert_eq!(config.focus(), Color32::from_rgba_unmultiplied(0xCC, 0xFF, 0x77, 127));
    }

    #[test]
    fn test_serialization() {
        let mut config = PatchbayConfig::default();
        config.max_cascade_depth = 12;
        let ron_str = config.to_ron().unwrap();
        let loaded = PatchbayConfig::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_document() {
        let config = PatchbayConfig::from_ron("(port_spacing: 20.0, reject_cycles: false)").unwrap();
        assert_eq!(config.port_spacing, 20.0);
        assert!(!config.reject_cycles);
        assert_eq!(config.port_width, 10.0);
    }

    #[test]
    fn test_invalid_document() {
        let err = PatchbayConfig::from_ron("(port_spacing: \"wide\")").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
