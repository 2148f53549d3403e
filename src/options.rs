//! Renderer configuration and reader presentation settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RendererError;

const DEFAULT_SCRIPT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_HIT_TEST_DEBOUNCE_MS: u64 = 120;
const DEFAULT_HIT_TEST_TOLERANCE_PX: f32 = 4.0;

/// Spread behaviour passed to the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyntheticSpread {
    /// Engine decides from the viewport aspect ratio.
    #[default]
    Auto,
    Single,
    Double,
}

/// Presentation settings forwarded to the engine's `updateSettings`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaderSettings {
    /// Font size as a percentage of the book's base size.
    pub font_size: u32,
    /// Gap between columns in CSS pixels.
    pub column_gap: u32,
    pub synthetic_spread: SyntheticSpread,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            font_size: 100,
            column_gap: 60,
            synthetic_spread: SyntheticSpread::Auto,
        }
    }
}

impl ReaderSettings {
    /// Clamp values into ranges the reader scripts handle.
    pub fn normalized(mut self) -> Self {
        self.font_size = self.font_size.clamp(50, 400);
        self.column_gap = self.column_gap.min(400);
        self
    }
}

/// Session-level tunables.
///
/// Every field has a default, so partial JSON documents are accepted:
///
/// ```rust
/// use epub_stream_webview::RendererOptions;
///
/// let opts = RendererOptions::from_json_slice(br#"{ "script_timeout_ms": 4000 }"#).unwrap();
/// assert_eq!(opts.script_timeout_ms, 4000);
/// assert_eq!(opts.hit_test_debounce_ms, 120);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererOptions {
    /// How long a dispatched script may go unacknowledged before it is failed.
    pub script_timeout_ms: u64,
    /// Minimum spacing between element-at-point queries during a gesture.
    pub hit_test_debounce_ms: u64,
    /// Distance within which a previous hit-test answer is reused.
    pub hit_test_tolerance_px: f32,
    /// Mark the engine unresponsive when heartbeats stop for this long.
    /// `None` disables heartbeat supervision.
    pub heartbeat_timeout_ms: Option<u64>,
    /// Initial presentation settings sent with `openBook`.
    pub settings: ReaderSettings,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            script_timeout_ms: DEFAULT_SCRIPT_TIMEOUT_MS,
            hit_test_debounce_ms: DEFAULT_HIT_TEST_DEBOUNCE_MS,
            hit_test_tolerance_px: DEFAULT_HIT_TEST_TOLERANCE_PX,
            heartbeat_timeout_ms: None,
            settings: ReaderSettings::default(),
        }
    }
}

impl RendererOptions {
    /// Parse options from JSON and normalize them.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, RendererError> {
        let parsed: Self = serde_json::from_slice(bytes)
            .map_err(|err| RendererError::InvalidOptions(err.to_string()))?;
        Ok(parsed.normalized())
    }

    /// Clamp values into workable ranges.
    pub fn normalized(mut self) -> Self {
        self.script_timeout_ms = self.script_timeout_ms.clamp(250, 120_000);
        self.hit_test_debounce_ms = self.hit_test_debounce_ms.min(2_000);
        self.hit_test_tolerance_px = if self.hit_test_tolerance_px.is_finite() {
            self.hit_test_tolerance_px.clamp(0.0, 64.0)
        } else {
            DEFAULT_HIT_TEST_TOLERANCE_PX
        };
        self.heartbeat_timeout_ms = match self.heartbeat_timeout_ms {
            Some(0) | None => None,
            Some(ms) => Some(ms.max(500)),
        };
        self.settings = self.settings.normalized();
        self
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }

    pub fn hit_test_debounce(&self) -> Duration {
        Duration::from_millis(self.hit_test_debounce_ms)
    }

    pub fn heartbeat_timeout(&self) -> Option<Duration> {
        self.heartbeat_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_clamps_values() {
        let opts = RendererOptions {
            script_timeout_ms: 1,
            hit_test_debounce_ms: 60_000,
            hit_test_tolerance_px: f32::NAN,
            heartbeat_timeout_ms: Some(0),
            settings: ReaderSettings {
                font_size: 10,
                column_gap: 9_000,
                synthetic_spread: SyntheticSpread::Double,
            },
        }
        .normalized();
        assert_eq!(opts.script_timeout_ms, 250);
        assert_eq!(opts.hit_test_debounce_ms, 2_000);
        assert_eq!(opts.hit_test_tolerance_px, DEFAULT_HIT_TEST_TOLERANCE_PX);
        assert_eq!(opts.heartbeat_timeout_ms, None);
        assert_eq!(opts.settings.font_size, 50);
        assert_eq!(opts.settings.column_gap, 400);
    }

    #[test]
    fn json_accepts_partial_documents() {
        let opts = RendererOptions::from_json_slice(
            br#"{ "heartbeat_timeout_ms": 3000, "settings": { "fontSize": 140 } }"#,
        )
        .expect("options should parse");
        assert_eq!(opts.heartbeat_timeout(), Some(Duration::from_millis(3000)));
        assert_eq!(opts.settings.font_size, 140);
        assert_eq!(opts.settings.column_gap, 60);
        assert_eq!(opts.script_timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn json_rejects_wrong_types() {
        let err = RendererOptions::from_json_slice(br#"{ "script_timeout_ms": "soon" }"#)
            .expect_err("string timeout should be rejected");
        assert!(matches!(err, RendererError::InvalidOptions(_)));
    }

    #[test]
    fn settings_serialize_camel_case() {
        let value = serde_json::to_value(ReaderSettings::default()).expect("serialize");
        assert_eq!(value["fontSize"], 100);
        assert_eq!(value["columnGap"], 60);
        assert_eq!(value["syntheticSpread"], "auto");
    }
}
