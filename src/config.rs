//! # Lumen Configuration
//!
//! Single TOML file covering the strip, the detector thresholds, the driver
//! selection, the web API, and one effect block per printer event.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [strip]
//! name = "chamber"
//! led_count = 24
//! fps = 20.0
//!
//! [detector]
//! temp_floor = 25.0
//! bored_timeout = 300.0
//! sleep_timeout = 600.0
//! strategy = "tree"
//!
//! [driver]
//! kind = "klipper"
//! led_name = "chamber_leds"
//!
//! [effects.heating]
//! effect = "thermal"
//! start_color = "ice"
//! end_color = "lava"
//! temp_source = "bed"
//!
//! [effects.error]
//! effect = "heartbeat"
//! color = [1.0, 0.0, 0.0]
//! speed = 0.8
//! ```
//!
//! - Colors accept a palette name or a literal `[r, g, b]` triple.
//! - Every field has a default; an empty file is a valid config.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::colors::{get_color, Rgb};
use crate::detector::DetectionStrategyKind;
use crate::effects::{EffectKind, EffectState, FillDirection, TempSource};
use crate::state::PrinterEvent;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Main configuration struct for the LED service.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LumenConfig {
    #[serde(default)]
    pub strip: StripConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub effects: EffectsConfig,
}

/// LED strip geometry and render cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripConfig {
    #[serde(default = "default_strip_name")]
    pub name: String,
    #[serde(default = "default_led_count")]
    pub led_count: usize,
    /// Render ticks per second.
    #[serde(default = "default_fps")]
    pub fps: f64,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            name: default_strip_name(),
            led_count: default_led_count(),
            fps: default_fps(),
        }
    }
}

/// Detector thresholds and strategy selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectorConfig {
    /// Ambient baseline for thermal fills, degrees C.
    #[serde(default = "default_temp_floor")]
    pub temp_floor: f64,
    /// Seconds of idle before the bored event.
    #[serde(default = "default_bored_timeout")]
    pub bored_timeout: f64,
    /// Seconds of bored before the sleep event.
    #[serde(default = "default_sleep_timeout")]
    pub sleep_timeout: f64,
    #[serde(default)]
    pub strategy: DetectionStrategyKind,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            temp_floor: default_temp_floor(),
            bored_timeout: default_bored_timeout(),
            sleep_timeout: default_sleep_timeout(),
            strategy: DetectionStrategyKind::default(),
        }
    }
}

/// Which output driver renders frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    #[default]
    Klipper,
    Pwm,
    Gpio,
    Proxy,
}

/// RGB pin names for the PWM driver.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PwmPins {
    pub red: String,
    pub green: String,
    pub blue: String,
}

impl Default for PwmPins {
    fn default() -> Self {
        Self {
            red: "lumen_r".to_string(),
            green: "lumen_g".to_string(),
            blue: "lumen_b".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    #[serde(default)]
    pub kind: DriverKind,
    /// Klipper LED object name, as in `[neopixel <led_name>]`.
    #[serde(default = "default_led_name")]
    pub led_name: String,
    /// Pins for the PWM driver.
    #[serde(default)]
    pub pins: PwmPins,
    /// Output pin for the GPIO driver.
    #[serde(default = "default_gpio_pin")]
    pub pin: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            kind: DriverKind::default(),
            led_name: default_led_name(),
            pins: PwmPins::default(),
            pin: default_gpio_pin(),
        }
    }
}

/// HTTP API binding.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

/// A color in config: palette name or literal `[r, g, b]` triple.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ColorSpec {
    Named(String),
    Literal(Rgb),
}

impl ColorSpec {
    /// Resolve to a concrete color. Unknown palette names fall back to the
    /// caller's default and are logged here.
    pub fn resolve(&self, fallback: Rgb) -> Rgb {
        match self {
            ColorSpec::Named(name) => match get_color(name) {
                Some(c) => c,
                None => {
                    tracing::warn!(color = %name, "unknown color name in config, using default");
                    fallback
                }
            },
            ColorSpec::Literal(rgb) => *rgb,
        }
    }
}

/// One effect block: which effect an event runs and its tuning.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EffectSettings {
    #[serde(default)]
    pub effect: EffectKind,
    /// Base color for solid, pulse, and heartbeat.
    #[serde(default = "default_effect_color")]
    pub color: ColorSpec,
    #[serde(default = "default_start_color")]
    pub start_color: ColorSpec,
    #[serde(default = "default_end_color")]
    pub end_color: ColorSpec,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_min_brightness")]
    pub min_brightness: f64,
    #[serde(default = "default_max_brightness")]
    pub max_brightness: f64,
    #[serde(default = "default_min_sparkle")]
    pub min_sparkle: usize,
    #[serde(default = "default_max_sparkle")]
    pub max_sparkle: usize,
    #[serde(default = "default_gradient_curve")]
    pub gradient_curve: f64,
    #[serde(default)]
    pub temp_source: TempSource,
    #[serde(default)]
    pub direction: FillDirection,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            effect: EffectKind::Off,
            color: default_effect_color(),
            start_color: default_start_color(),
            end_color: default_end_color(),
            speed: default_speed(),
            min_brightness: default_min_brightness(),
            max_brightness: default_max_brightness(),
            min_sparkle: default_min_sparkle(),
            max_sparkle: default_max_sparkle(),
            gradient_curve: default_gradient_curve(),
            temp_source: TempSource::default(),
            direction: FillDirection::default(),
        }
    }
}

impl EffectSettings {
    /// Build the runtime effect state, resolving color names. The caller
    /// anchors `start_time` by calling `activate` on the result.
    pub fn to_effect_state(&self) -> EffectState {
        let defaults = EffectState::default();
        EffectState {
            kind: self.effect,
            base_color: self.color.resolve(Rgb(1.0, 1.0, 1.0)),
            start_color: self.start_color.resolve(defaults.start_color),
            end_color: self.end_color.resolve(defaults.end_color),
            speed: self.speed,
            min_brightness: self.min_brightness,
            max_brightness: self.max_brightness,
            min_sparkle: self.min_sparkle,
            max_sparkle: self.max_sparkle,
            gradient_curve: self.gradient_curve,
            temp_source: self.temp_source,
            direction: self.direction,
            start_time: 0.0,
            last_update: 0.0,
        }
    }
}

/// Per-event effect table. Defaults follow the stock theme: calm pulse when
/// idle, thermal fills while heating and cooling, a progress bar during the
/// print, red heartbeat on error, disco when bored, dark when asleep.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EffectsConfig {
    #[serde(default = "default_idle_effect")]
    pub idle: EffectSettings,
    #[serde(default = "default_heating_effect")]
    pub heating: EffectSettings,
    #[serde(default = "default_printing_effect")]
    pub printing: EffectSettings,
    #[serde(default = "default_cooldown_effect")]
    pub cooldown: EffectSettings,
    #[serde(default = "default_error_effect")]
    pub error: EffectSettings,
    #[serde(default = "default_bored_effect")]
    pub bored: EffectSettings,
    #[serde(default = "default_sleep_effect")]
    pub sleep: EffectSettings,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            idle: default_idle_effect(),
            heating: default_heating_effect(),
            printing: default_printing_effect(),
            cooldown: default_cooldown_effect(),
            error: default_error_effect(),
            bored: default_bored_effect(),
            sleep: default_sleep_effect(),
        }
    }
}

impl EffectsConfig {
    pub fn for_event(&self, event: PrinterEvent) -> &EffectSettings {
        match event {
            PrinterEvent::Idle => &self.idle,
            PrinterEvent::Heating => &self.heating,
            PrinterEvent::Printing => &self.printing,
            PrinterEvent::Cooldown => &self.cooldown,
            PrinterEvent::Error => &self.error,
            PrinterEvent::Bored => &self.bored,
            PrinterEvent::Sleep => &self.sleep,
        }
    }
}

// Default value functions
fn default_strip_name() -> String { "lumen".to_string() }
fn default_led_count() -> usize { 16 }
fn default_fps() -> f64 { 20.0 }
fn default_temp_floor() -> f64 { 25.0 }
fn default_bored_timeout() -> f64 { 300.0 }
fn default_sleep_timeout() -> f64 { 600.0 }
fn default_led_name() -> String { "lumen".to_string() }
fn default_gpio_pin() -> String { "lumen".to_string() }
fn default_bind_addr() -> String { "127.0.0.1:7130".to_string() }
fn default_effect_color() -> ColorSpec { ColorSpec::Named("white".to_string()) }
fn default_start_color() -> ColorSpec { ColorSpec::Named("steel".to_string()) }
fn default_end_color() -> ColorSpec { ColorSpec::Named("green".to_string()) }
fn default_speed() -> f64 { 1.0 }
fn default_min_brightness() -> f64 { 0.2 }
fn default_max_brightness() -> f64 { 1.0 }
fn default_min_sparkle() -> usize { 1 }
fn default_max_sparkle() -> usize { 6 }
fn default_gradient_curve() -> f64 { 1.0 }

fn default_idle_effect() -> EffectSettings {
    EffectSettings {
        effect: EffectKind::Pulse,
        color: ColorSpec::Named("moonlight".to_string()),
        speed: 0.2,
        min_brightness: 0.1,
        max_brightness: 0.5,
        ..EffectSettings::default()
    }
}

fn default_heating_effect() -> EffectSettings {
    EffectSettings {
        effect: EffectKind::Thermal,
        start_color: ColorSpec::Named("ice".to_string()),
        end_color: ColorSpec::Named("lava".to_string()),
        temp_source: TempSource::Bed,
        ..EffectSettings::default()
    }
}

fn default_printing_effect() -> EffectSettings {
    EffectSettings {
        effect: EffectKind::Progress,
        start_color: ColorSpec::Named("steel".to_string()),
        end_color: ColorSpec::Named("matrix".to_string()),
        ..EffectSettings::default()
    }
}

fn default_cooldown_effect() -> EffectSettings {
    EffectSettings {
        effect: EffectKind::Thermal,
        start_color: ColorSpec::Named("lava".to_string()),
        end_color: ColorSpec::Named("ice".to_string()),
        temp_source: TempSource::Bed,
        direction: FillDirection::Reverse,
        ..EffectSettings::default()
    }
}

fn default_error_effect() -> EffectSettings {
    EffectSettings {
        effect: EffectKind::Heartbeat,
        color: ColorSpec::Named("red".to_string()),
        speed: 0.8,
        ..EffectSettings::default()
    }
}

fn default_bored_effect() -> EffectSettings {
    EffectSettings {
        effect: EffectKind::Disco,
        speed: 2.0,
        ..EffectSettings::default()
    }
}

fn default_sleep_effect() -> EffectSettings {
    EffectSettings {
        effect: EffectKind::Off,
        ..EffectSettings::default()
    }
}

/// Load configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<LumenConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::error!("Failed to parse config TOML: {}", e);
                Err(ConfigError::Toml(e))
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            Err(ConfigError::Io(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = LumenConfig::default();
        assert_eq!(config.strip.led_count, 16);
        assert_eq!(config.strip.fps, 20.0);
        assert_eq!(config.detector.temp_floor, 25.0);
        assert_eq!(config.detector.bored_timeout, 300.0);
        assert_eq!(config.detector.sleep_timeout, 600.0);
        assert_eq!(config.detector.strategy, DetectionStrategyKind::Tree);
        assert_eq!(config.driver.kind, DriverKind::Klipper);
        assert_eq!(config.effects.idle.effect, EffectKind::Pulse);
        assert_eq!(config.effects.error.effect, EffectKind::Heartbeat);
        assert_eq!(config.effects.sleep.effect, EffectKind::Off);
    }

    #[test]
    fn test_load_config_success() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "[strip]\nled_count = 32\nfps = 30.0").unwrap();
        file.flush().unwrap();
        let config = load_config(file_path.to_str().unwrap()).unwrap();
        assert_eq!(config.strip.led_count, 32);
        assert_eq!(config.strip.fps, 30.0);
        // Defaults for missing sections
        assert_eq!(config.detector.bored_timeout, 300.0);
        assert_eq!(config.effects.bored.effect, EffectKind::Disco);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent_file.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "not a valid toml").unwrap();
        file.flush().unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_effect_block_parsing() {
        let toml = r#"
        [detector]
        strategy = "probes"

        [effects.heating]
        effect = "thermal"
        start_color = "ice"
        end_color = [1.0, 0.25, 0.0]
        temp_source = "bed"
        gradient_curve = 2.0

        [effects.error]
        effect = "heartbeat"
        color = "red"
        speed = 0.5
        "#;
        let config: LumenConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.detector.strategy, DetectionStrategyKind::Probes);
        assert_eq!(config.effects.heating.effect, EffectKind::Thermal);
        assert_eq!(config.effects.heating.temp_source, TempSource::Bed);
        assert_eq!(config.effects.heating.gradient_curve, 2.0);
        assert_eq!(
            config.effects.heating.end_color,
            ColorSpec::Literal(Rgb(1.0, 0.25, 0.0))
        );
        assert_eq!(config.effects.error.speed, 0.5);
        // Untouched events keep their stock theme.
        assert_eq!(config.effects.bored.effect, EffectKind::Disco);
    }

    #[test]
    fn test_color_resolution() {
        let settings = default_heating_effect();
        let state = settings.to_effect_state();
        assert_eq!(state.start_color, get_color("ice").unwrap());
        assert_eq!(state.end_color, get_color("lava").unwrap());

        let bad = ColorSpec::Named("plaid".to_string());
        assert_eq!(bad.resolve(Rgb(0.1, 0.2, 0.3)), Rgb(0.1, 0.2, 0.3));
    }
}
