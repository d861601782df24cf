//! Tracker configuration
//!
//! Keys use camelCase on the wire so hosts can pass the same object they
//! already use for their own settings.

use crate::error::TrackerError;
use serde::{Deserialize, Serialize};

/// Default debounce delay for scroll signals
pub const DEFAULT_SCROLL_THROTTLE_MS: u64 = 300;

/// Default throttle window for pointer movement
pub const DEFAULT_MOUSE_MOVE_THROTTLE_MS: u64 = 500;

/// Default debounce delay for resize signals
pub const DEFAULT_RESIZE_THROTTLE_MS: u64 = 500;

/// Default inactivity threshold before the user is considered idle
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Default visibility ratio that counts as "viewed"
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.5;

/// Default delay after page load before view candidates are registered
pub const DEFAULT_VIEW_SETTLE_DELAY_MS: u64 = 1_000;

/// Upper bound for every millisecond delay (24 hours)
pub const MAX_DELAY_MS: u64 = 86_400_000;

/// Effective tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackerConfig {
    /// Scroll debounce delay (ms)
    pub scroll_throttle: u64,
    /// Mouse-move throttle window (ms)
    pub mouse_move_throttle: u64,
    /// Resize debounce delay (ms)
    pub resize_throttle: u64,
    /// Inactivity threshold (ms)
    pub idle_timeout: u64,
    pub track_mouse_movement: bool,
    pub track_keyboard: bool,
    pub track_clipboard: bool,
    pub track_visibility: bool,
    /// Intersection ratio (0-1] at which an element counts as viewed
    pub visibility_threshold: f64,
    /// Delay before buffered view candidates are registered (ms)
    pub view_settle_delay: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            scroll_throttle: DEFAULT_SCROLL_THROTTLE_MS,
            mouse_move_throttle: DEFAULT_MOUSE_MOVE_THROTTLE_MS,
            resize_throttle: DEFAULT_RESIZE_THROTTLE_MS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT_MS,
            track_mouse_movement: true,
            track_keyboard: true,
            track_clipboard: true,
            track_visibility: true,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
            view_settle_delay: DEFAULT_VIEW_SETTLE_DELAY_MS,
        }
    }
}

/// Partial configuration update; absent fields keep their current value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scroll_throttle: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouse_move_throttle: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resize_throttle: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_mouse_movement: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_keyboard: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_clipboard: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_visibility: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_settle_delay: Option<u64>,
}

impl TrackerConfig {
    /// Parse a (possibly partial) configuration object, filling in defaults
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let config: TrackerConfig = serde_json::from_str(json)
            .map_err(|e| TrackerError::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that values are within usable ranges
    pub fn validate(&self) -> Result<(), TrackerError> {
        if !(self.visibility_threshold > 0.0 && self.visibility_threshold <= 1.0) {
            return Err(TrackerError::InvalidConfig(format!(
                "visibilityThreshold must be in (0, 1], got {}",
                self.visibility_threshold
            )));
        }
        if self.idle_timeout == 0 {
            return Err(TrackerError::InvalidConfig(
                "idleTimeout must be greater than zero".to_string(),
            ));
        }
        let delays = [
            ("scrollThrottle", self.scroll_throttle),
            ("mouseMoveThrottle", self.mouse_move_throttle),
            ("resizeThrottle", self.resize_throttle),
            ("idleTimeout", self.idle_timeout),
            ("viewSettleDelay", self.view_settle_delay),
        ];
        for (name, ms) in delays {
            if ms > MAX_DELAY_MS {
                return Err(TrackerError::InvalidConfig(format!(
                    "{} must be at most {} ms, got {}",
                    name, MAX_DELAY_MS, ms
                )));
            }
        }
        Ok(())
    }

    /// Return a copy with the patch applied. The result is validated; `self`
    /// is left untouched on error.
    pub fn merged(&self, patch: &ConfigPatch) -> Result<Self, TrackerError> {
        let mut next = self.clone();
        if let Some(v) = patch.scroll_throttle {
            next.scroll_throttle = v;
        }
        if let Some(v) = patch.mouse_move_throttle {
            next.mouse_move_throttle = v;
        }
        if let Some(v) = patch.resize_throttle {
            next.resize_throttle = v;
        }
        if let Some(v) = patch.idle_timeout {
            next.idle_timeout = v;
        }
        if let Some(v) = patch.track_mouse_movement {
            next.track_mouse_movement = v;
        }
        if let Some(v) = patch.track_keyboard {
            next.track_keyboard = v;
        }
        if let Some(v) = patch.track_clipboard {
            next.track_clipboard = v;
        }
        if let Some(v) = patch.track_visibility {
            next.track_visibility = v;
        }
        if let Some(v) = patch.visibility_threshold {
            next.visibility_threshold = v;
        }
        if let Some(v) = patch.view_settle_delay {
            next.view_settle_delay = v;
        }
        next.validate()?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip_camel_case() {
        let json = serde_json::to_value(TrackerConfig::default()).unwrap();
        assert_eq!(json["mouseMoveThrottle"], 500);
        assert_eq!(json["scrollThrottle"], 300);
        assert_eq!(json["idleTimeout"], 30_000);
        assert_eq!(json["visibilityThreshold"], 0.5);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = TrackerConfig::from_json(r#"{ "idleTimeout": 5000, "trackKeyboard": false }"#)
            .unwrap();
        assert_eq!(config.idle_timeout, 5000);
        assert!(!config.track_keyboard);
        assert_eq!(config.resize_throttle, DEFAULT_RESIZE_THROTTLE_MS);
    }

    #[test]
    fn test_merge_applies_only_present_fields() {
        let base = TrackerConfig::default();
        let patch = ConfigPatch {
            mouse_move_throttle: Some(250),
            track_clipboard: Some(false),
            ..Default::default()
        };
        let merged = base.merged(&patch).unwrap();
        assert_eq!(merged.mouse_move_throttle, 250);
        assert!(!merged.track_clipboard);
        assert_eq!(merged.scroll_throttle, base.scroll_throttle);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let patch = ConfigPatch {
            visibility_threshold: Some(1.5),
            ..Default::default()
        };
        let result = TrackerConfig::default().merged(&patch);
        assert!(matches!(result, Err(TrackerError::InvalidConfig(_))));
    }

    #[test]
    fn test_delays_are_bounded() {
        let huge = TrackerConfig::from_json(r#"{ "idleTimeout": 18446744073709551615 }"#);
        assert!(matches!(huge, Err(TrackerError::InvalidConfig(_))));

        let large = TrackerConfig::from_json(r#"{ "idleTimeout": 10000000000000000 }"#);
        assert!(matches!(large, Err(TrackerError::InvalidConfig(_))));

        for key in ["scrollThrottle", "mouseMoveThrottle", "resizeThrottle", "viewSettleDelay"] {
            let json = format!(r#"{{ "{}": {} }}"#, key, MAX_DELAY_MS + 1);
            let err = TrackerConfig::from_json(&json).unwrap_err();
            assert!(err.to_string().contains(key), "{}", err);
        }

        let edge = format!(r#"{{ "idleTimeout": {} }}"#, MAX_DELAY_MS);
        assert_eq!(TrackerConfig::from_json(&edge).unwrap().idle_timeout, MAX_DELAY_MS);
    }

    #[test]
    fn test_merge_rejects_oversized_delay() {
        let base = TrackerConfig::default();
        let patch = ConfigPatch {
            mouse_move_throttle: Some(10_000_000_000_000_000),
            ..Default::default()
        };
        assert!(matches!(base.merged(&patch), Err(TrackerError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        assert!(TrackerConfig::from_json(r#"{ "idleTimeout": 0 }"#).is_err());
    }
}
