use std::path::PathBuf;
use std::time::Duration;

use debugcanvas_core::Rgba;
use serde::{Deserialize, Serialize};

/// Tunable policy and style for a [`RenderEngine`](crate::RenderEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Requests arriving within this long of a pass starting are dropped.
    pub debounce_window_ms: u64,
    /// Delay before a deferred request is re-evaluated.
    pub retry_delay_ms: u64,
    /// Half-length, in world units, of the reference cross at the origin.
    pub origin_cross_extent: f64,
    pub origin_cross_color: Rgba,
    pub background: Rgba,
    pub line_width: f32,
    /// Pixels added around every box on each side.
    pub box_padding: f64,
    /// TrueType/OpenType font used for text commands. The bundled DejaVu Sans
    /// is used when unset or unreadable.
    pub font_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 50,
            retry_delay_ms: 50,
            origin_cross_extent: 100.0,
            origin_cross_color: Rgba::WHITE,
            background: Rgba::TRANSPARENT,
            line_width: 1.0,
            box_padding: 0.5,
            font_path: None,
        }
    }
}

impl EngineConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Settings for a [`DebugCanvas`](crate::DebugCanvas).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub engine: EngineConfig,
    /// A press released within this long counts as a click.
    pub click_max_duration_ms: u64,
    /// Bounds scale factor per wheel notch.
    pub zoom_step: f64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            click_max_duration_ms: 250,
            zoom_step: 1.1,
        }
    }
}

impl CanvasConfig {
    pub fn click_max_duration(&self) -> Duration {
        Duration::from_millis(self.click_max_duration_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.debounce_window(), Duration::from_millis(50));
        assert_eq!(config.retry_delay(), Duration::from_millis(50));
        assert_eq!(config.origin_cross_color, Rgba::WHITE);
        assert!(config.font_path.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{ "retry_delay_ms": 10 }"#).unwrap();
        assert_eq!(config.retry_delay_ms, 10);
        assert_eq!(config.debounce_window_ms, 50);
        assert!((config.origin_cross_extent - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_canvas_config_roundtrip() {
        let mut config = CanvasConfig::default();
        config.engine.font_path = Some(PathBuf::from("fonts/mono.ttf"));
        let json = serde_json::to_string(&config).unwrap();
        let back: CanvasConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
