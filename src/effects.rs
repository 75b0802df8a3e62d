//! Effect state and the pure per-frame effect functions.
//!
//! Every effect is a plain function of `(EffectState, time, ...)`. Nothing in
//! here blocks, sleeps, or touches hardware; the engine calls these once per
//! render tick and hands the result to a driver. The one permitted mutation
//! is disco's minimum-interval gate, which stamps `last_update` when it fires.

use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::colors::{hsv_to_rgb, LedBuffer, Rgb};

// Heartbeat phase layout, as fractions of one cycle. Fixed, not configurable.
const HEARTBEAT_FIRST_PULSE: f64 = 0.15;
const HEARTBEAT_DIP: f64 = 0.05;
const HEARTBEAT_SECOND_PULSE: f64 = 0.05;
const HEARTBEAT_FADE: f64 = 0.10;
// Depth of the dip between the two pulses, as a fraction of the
// min..max brightness span.
const HEARTBEAT_DIP_DEPTH: f64 = 0.5;

/// Which effect a group is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    #[default]
    Off,
    Solid,
    Pulse,
    Heartbeat,
    Disco,
    Thermal,
    Progress,
}

impl EffectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Off => "off",
            EffectKind::Solid => "solid",
            EffectKind::Pulse => "pulse",
            EffectKind::Heartbeat => "heartbeat",
            EffectKind::Disco => "disco",
            EffectKind::Thermal => "thermal",
            EffectKind::Progress => "progress",
        }
    }

    /// Parse an effect name as it appears in API payloads. Case-insensitive.
    pub fn from_name(name: &str) -> Option<EffectKind> {
        match name.to_ascii_lowercase().as_str() {
            "off" => Some(EffectKind::Off),
            "solid" => Some(EffectKind::Solid),
            "pulse" => Some(EffectKind::Pulse),
            "heartbeat" => Some(EffectKind::Heartbeat),
            "disco" => Some(EffectKind::Disco),
            "thermal" => Some(EffectKind::Thermal),
            "progress" => Some(EffectKind::Progress),
            _ => None,
        }
    }
}

impl std::fmt::Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Temperature feed for the thermal effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempSource {
    #[default]
    Extruder,
    Bed,
    Chamber,
}

/// Physical fill direction for gradient effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillDirection {
    #[default]
    Standard,
    Reverse,
}

/// Tunable parameters for the active effect, plus the two timestamps
/// time-based effects measure phase against.
///
/// `start_time` is pinned when the effect is activated and stays put for the
/// life of the run. `last_update` belongs to disco's update gate and is the
/// only field an effect function may write.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectState {
    pub kind: EffectKind,
    pub base_color: Rgb,
    pub start_color: Rgb,
    pub end_color: Rgb,
    /// Cycles (or, for disco, updates) per second. Must be positive;
    /// nonpositive values produce degenerate intervals and are not corrected.
    pub speed: f64,
    /// Brightness bounds in [0,1], min at or below max. Inverted bounds are
    /// not validated and invert the oscillation instead.
    pub min_brightness: f64,
    pub max_brightness: f64,
    pub min_sparkle: usize,
    pub max_sparkle: usize,
    /// Gradient shaping exponent. 1.0 is linear, above 1.0 back-loads the
    /// color shift, below 1.0 front-loads it.
    pub gradient_curve: f64,
    pub temp_source: TempSource,
    pub direction: FillDirection,
    pub start_time: f64,
    pub last_update: f64,
}

impl Default for EffectState {
    fn default() -> Self {
        Self {
            kind: EffectKind::Off,
            base_color: Rgb(0.0, 0.0, 0.0),
            start_color: Rgb(0.5, 0.5, 0.5),
            end_color: Rgb(0.0, 1.0, 0.0),
            speed: 1.0,
            min_brightness: 0.2,
            max_brightness: 1.0,
            min_sparkle: 1,
            max_sparkle: 6,
            gradient_curve: 1.0,
            temp_source: TempSource::Extruder,
            direction: FillDirection::Standard,
            start_time: 0.0,
            last_update: 0.0,
        }
    }
}

impl EffectState {
    /// Re-anchor the effect's phase to `now`. Called on every event
    /// transition so oscillating effects start from a known phase. Clearing
    /// `last_update` lets disco fire on its first tick.
    pub fn activate(&mut self, now: f64) {
        self.start_time = now;
        self.last_update = 0.0;
    }
}

/// Breathing effect: sine-modulated brightness between the configured
/// bounds, phase anchored to `start_time`. At `now == start_time` the
/// brightness sits at the midpoint of the bounds.
pub fn effect_pulse(state: &EffectState, now: f64) -> Rgb {
    let elapsed = now - state.start_time;
    let phase = ((elapsed * state.speed * std::f64::consts::TAU).sin() + 1.0) / 2.0;
    let brightness = state.min_brightness + phase * (state.max_brightness - state.min_brightness);
    state.base_color * brightness
}

/// Double-pulse heartbeat. One cycle is `1/speed` seconds: rise to max,
/// dip halfway back down, second rise to max, fade to min, then rest at min
/// for the remainder of the cycle.
pub fn effect_heartbeat(state: &EffectState, now: f64) -> Rgb {
    let cycle_time = 1.0 / state.speed;
    let phase = (now - state.start_time).rem_euclid(cycle_time) / cycle_time;
    let span = state.max_brightness - state.min_brightness;

    let dip_end = HEARTBEAT_FIRST_PULSE + HEARTBEAT_DIP;
    let second_end = dip_end + HEARTBEAT_SECOND_PULSE;
    let fade_end = second_end + HEARTBEAT_FADE;

    let brightness = if phase < HEARTBEAT_FIRST_PULSE {
        let t = phase / HEARTBEAT_FIRST_PULSE;
        state.min_brightness + t * span
    } else if phase < dip_end {
        let t = (phase - HEARTBEAT_FIRST_PULSE) / HEARTBEAT_DIP;
        state.max_brightness - t * span * HEARTBEAT_DIP_DEPTH
    } else if phase < second_end {
        let t = (phase - dip_end) / HEARTBEAT_SECOND_PULSE;
        (state.max_brightness - span * HEARTBEAT_DIP_DEPTH) + t * span * HEARTBEAT_DIP_DEPTH
    } else if phase < fade_end {
        let t = (phase - second_end) / HEARTBEAT_FADE;
        state.max_brightness - t * span
    } else {
        state.min_brightness
    };

    state.base_color * brightness
}

/// Seed derivation for disco's per-frame random source. Microsecond
/// granularity keeps patterns from repeating at update rates below 1 Hz.
pub fn disco_seed(now: f64) -> u64 {
    (now * 1_000_000.0).floor() as u64
}

/// Sparkle effect: light a random subset of LEDs in random fully-saturated
/// hues, leaving the rest unlit.
///
/// Gated to at most one update per `1/speed` seconds; below that interval it
/// returns `(empty, false)` and touches nothing. The caller supplies the
/// random source, seeded from [`disco_seed`] for the frame timestamp, which
/// makes output reproducible for a given `now`.
///
/// Panics if `min_sparkle > max_sparkle` (empty sample range); this is the
/// documented misconfiguration edge, not validated here.
pub fn effect_disco<R: Rng>(
    state: &mut EffectState,
    now: f64,
    led_count: usize,
    rng: &mut R,
) -> (LedBuffer, bool) {
    let interval = 1.0 / state.speed;
    if now - state.last_update < interval {
        return (Vec::new(), false);
    }
    state.last_update = now;

    let min_lit = state.min_sparkle.min(led_count);
    let max_lit = state.max_sparkle.min(led_count);
    let num_lit = rng.random_range(min_lit..=max_lit);

    let mut frame: LedBuffer = vec![None; led_count];
    for idx in index::sample(rng, led_count, num_lit) {
        let hue = rng.random::<f64>();
        frame[idx] = Some(hsv_to_rgb(hue, 1.0, state.max_brightness));
    }
    (frame, true)
}

fn gradient_at(state: &EffectState, i: usize, led_count: usize) -> Rgb {
    let t = if led_count <= 1 {
        1.0
    } else {
        i as f64 / (led_count - 1) as f64
    };
    state
        .start_color
        .lerp(state.end_color, t.powf(state.gradient_curve))
}

/// Gradient fill, the shared core of thermal and progress.
///
/// Lights the leading `fill_percent` of the strip with a start-to-end color
/// gradient. The lit count is fractional: the LED at the leading edge is
/// dimmed by its fractional coverage, giving a smooth sweep instead of a
/// stepped one. LEDs past the edge are unlit, not black. `Reverse` flips the
/// finished buffer so the opposite physical end fills first.
pub fn effect_fill(state: &EffectState, fill_percent: f64, led_count: usize) -> LedBuffer {
    let fill = fill_percent.clamp(0.0, 1.0);
    let lit_count = fill * led_count as f64;

    let mut frame: LedBuffer = Vec::with_capacity(led_count);
    for i in 0..led_count {
        // 1-indexed position against the fractional lit count.
        let pos = (i + 1) as f64;
        if pos <= lit_count {
            frame.push(Some(gradient_at(state, i, led_count)));
        } else if pos - 1.0 < lit_count {
            let partial = lit_count - (pos - 1.0);
            frame.push(Some(gradient_at(state, i, led_count) * partial));
        } else {
            frame.push(None);
        }
    }

    if state.direction == FillDirection::Reverse {
        frame.reverse();
    }
    frame
}

/// Temperature fill: maps `current_temp` between `temp_floor` and
/// `target_temp` onto a gradient fill. A heater with no target (or a target
/// at or below the floor) renders as a uniform `start_color` strip.
pub fn effect_thermal(
    state: &EffectState,
    current_temp: f64,
    target_temp: f64,
    temp_floor: f64,
    led_count: usize,
) -> LedBuffer {
    if target_temp <= 0.0 || target_temp <= temp_floor {
        return vec![Some(state.start_color); led_count];
    }

    let fill = (current_temp - temp_floor) / (target_temp - temp_floor);
    effect_fill(state, fill, led_count)
}

/// Print progress bar: a gradient fill driven directly by completion
/// fraction.
pub fn effect_progress(state: &EffectState, progress: f64, led_count: usize) -> LedBuffer {
    effect_fill(state, progress, led_count)
}
