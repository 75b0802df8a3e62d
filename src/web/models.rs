//! Contains the data models for API requests and responses.

use serde::{Deserialize, Serialize};

use crate::config::{ColorSpec, EffectSettings};
use crate::detector::DetectorStatus;
use crate::effects::{EffectKind, FillDirection, TempSource};
use crate::state::PrinterState;

/// Full service snapshot returned by `GET /api/v1/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub strip: String,
    /// RFC 3339 wall-clock time the snapshot was taken.
    pub timestamp: String,
    pub uptime_seconds: f64,
    pub led_count: usize,
    pub active_effect: String,
    /// True while a manual override is holding the effect.
    pub overridden: bool,
    pub detector: DetectorStatus,
    pub printer: PrinterState,
}

/// Palette listing returned by `GET /api/v1/colors`.
#[derive(Debug, Serialize)]
pub struct ColorsResponse {
    pub colors: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Body of `POST /api/v1/effect`. `effect: null` (or absent) clears the
/// override; any omitted tuning field keeps its stock default.
#[derive(Debug, Default, Deserialize)]
pub struct EffectOverrideRequest {
    #[serde(default)]
    pub effect: Option<String>,
    #[serde(default)]
    pub color: Option<ColorSpec>,
    #[serde(default)]
    pub start_color: Option<ColorSpec>,
    #[serde(default)]
    pub end_color: Option<ColorSpec>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub min_brightness: Option<f64>,
    #[serde(default)]
    pub max_brightness: Option<f64>,
    #[serde(default)]
    pub min_sparkle: Option<usize>,
    #[serde(default)]
    pub max_sparkle: Option<usize>,
    #[serde(default)]
    pub gradient_curve: Option<f64>,
    #[serde(default)]
    pub temp_source: Option<TempSource>,
    #[serde(default)]
    pub direction: Option<FillDirection>,
}

impl EffectOverrideRequest {
    /// Turn the request into override settings. `Ok(None)` means clear.
    pub fn into_settings(self) -> Result<Option<EffectSettings>, String> {
        let Some(name) = self.effect else {
            return Ok(None);
        };
        let Some(kind) = EffectKind::from_name(&name) else {
            return Err(format!("unknown effect: {name}"));
        };
        let mut settings = EffectSettings {
            effect: kind,
            ..EffectSettings::default()
        };
        if let Some(color) = self.color {
            settings.color = color;
        }
        if let Some(start_color) = self.start_color {
            settings.start_color = start_color;
        }
        if let Some(end_color) = self.end_color {
            settings.end_color = end_color;
        }
        if let Some(speed) = self.speed {
            settings.speed = speed;
        }
        if let Some(min_brightness) = self.min_brightness {
            settings.min_brightness = min_brightness;
        }
        if let Some(max_brightness) = self.max_brightness {
            settings.max_brightness = max_brightness;
        }
        if let Some(min_sparkle) = self.min_sparkle {
            settings.min_sparkle = min_sparkle;
        }
        if let Some(max_sparkle) = self.max_sparkle {
            settings.max_sparkle = max_sparkle;
        }
        if let Some(gradient_curve) = self.gradient_curve {
            settings.gradient_curve = gradient_curve;
        }
        if let Some(temp_source) = self.temp_source {
            settings.temp_source = temp_source;
        }
        if let Some(direction) = self.direction {
            settings.direction = direction;
        }
        Ok(Some(settings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::colors::Rgb;

    #[test]
    fn test_override_request_clear() {
        let req: EffectOverrideRequest = serde_json::from_str(r#"{"effect": null}"#).unwrap();
        assert!(req.into_settings().unwrap().is_none());
    }

    #[test]
    fn test_override_request_unknown_effect() {
        let req: EffectOverrideRequest = serde_json::from_str(r#"{"effect": "plaid"}"#).unwrap();
        assert!(req.into_settings().is_err());
    }

    #[test]
    fn test_override_request_partial_fields() {
        let req: EffectOverrideRequest =
            serde_json::from_str(r#"{"effect": "pulse", "color": "red", "speed": 0.5}"#).unwrap();
        let settings = req.into_settings().unwrap().unwrap();
        assert_eq!(settings.effect, EffectKind::Pulse);
        assert_eq!(settings.color, ColorSpec::Named("red".to_string()));
        assert_eq!(settings.speed, 0.5);
        // Untouched fields keep the stock defaults.
        assert_eq!(settings.max_brightness, EffectSettings::default().max_brightness);
    }

    #[test]
    fn test_override_request_literal_color() {
        let req: EffectOverrideRequest =
            serde_json::from_str(r#"{"effect": "solid", "color": [0.2, 0.4, 0.6]}"#).unwrap();
        let settings = req.into_settings().unwrap().unwrap();
        assert_eq!(settings.color, ColorSpec::Literal(Rgb(0.2, 0.4, 0.6)));
    }
}
