//! Color model and named palette.
//!
//! Channels are `f64` in the nominal range `[0, 1]`. Effects are allowed to
//! produce values slightly above 1.0; clamping happens once, at the driver
//! boundary, so intermediate math keeps its headroom.

use serde::{Deserialize, Serialize};
use std::ops;

/// RGB color with unit-range channels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb(pub f64, pub f64, pub f64);

/// One frame of strip output. `None` marks an LED that is explicitly unlit
/// this frame, which drivers must treat differently from black.
pub type LedBuffer = Vec<Option<Rgb>>;

impl Rgb {
    pub const OFF: Rgb = Rgb(0.0, 0.0, 0.0);

    /// Linear interpolation between two colors. `t=0` returns `self`,
    /// `t=1` returns `other`. `t` is not clamped.
    pub fn lerp(self, other: Rgb, t: f64) -> Rgb {
        Rgb(
            self.0 + (other.0 - self.0) * t,
            self.1 + (other.1 - self.1) * t,
            self.2 + (other.2 - self.2) * t,
        )
    }

    /// Clamp every channel into `[0, 1]`. Drivers call this before
    /// formatting hardware commands.
    pub fn clamped(self) -> Rgb {
        Rgb(
            self.0.clamp(0.0, 1.0),
            self.1.clamp(0.0, 1.0),
            self.2.clamp(0.0, 1.0),
        )
    }

    pub fn is_off(&self) -> bool {
        self.0 == 0.0 && self.1 == 0.0 && self.2 == 0.0
    }
}

impl ops::Mul<f64> for Rgb {
    type Output = Rgb;

    /// Scale all channels by a brightness factor. No clamping.
    fn mul(self, rhs: f64) -> Rgb {
        Rgb(self.0 * rhs, self.1 * rhs, self.2 * rhs)
    }
}

/// Full HSV to RGB conversion. `h` in `[0, 1)` wraps, `s` and `v` in
/// `[0, 1]`.
pub fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Rgb {
    let h = (h.rem_euclid(1.0)) * 6.0;
    let c = v * s;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 1.0 {
        (c, x, 0.0)
    } else if h < 2.0 {
        (x, c, 0.0)
    } else if h < 3.0 {
        (0.0, c, x)
    } else if h < 4.0 {
        (0.0, x, c)
    } else if h < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    Rgb(r + m, g + m, b + m)
}

// Palette used by effect configuration. Thematic pairs that show up in the
// default config: ice -> lava (bed heating), steel -> fire (extruder),
// steel -> matrix (print progress).
static NAMED_COLORS: &[(&str, Rgb)] = &[
    ("off", Rgb(0.0, 0.0, 0.0)),
    ("black", Rgb(0.0, 0.0, 0.0)),
    ("white", Rgb(1.0, 1.0, 1.0)),
    ("warm_white", Rgb(1.0, 0.82, 0.6)),
    ("red", Rgb(1.0, 0.0, 0.0)),
    ("green", Rgb(0.0, 1.0, 0.0)),
    ("blue", Rgb(0.0, 0.0, 1.0)),
    ("yellow", Rgb(1.0, 1.0, 0.0)),
    ("cyan", Rgb(0.0, 1.0, 1.0)),
    ("magenta", Rgb(1.0, 0.0, 1.0)),
    ("orange", Rgb(1.0, 0.55, 0.0)),
    ("purple", Rgb(0.55, 0.0, 1.0)),
    ("pink", Rgb(1.0, 0.4, 0.7)),
    ("steel", Rgb(0.5, 0.5, 0.5)),
    ("ice", Rgb(0.6, 0.8, 1.0)),
    ("lava", Rgb(1.0, 0.25, 0.0)),
    ("fire", Rgb(1.0, 0.4, 0.05)),
    ("ember", Rgb(0.8, 0.2, 0.0)),
    ("matrix", Rgb(0.0, 0.9, 0.2)),
    ("moonlight", Rgb(0.25, 0.35, 0.55)),
];

/// Look up a palette color by name (case-insensitive).
pub fn get_color(name: &str) -> Option<Rgb> {
    NAMED_COLORS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, c)| *c)
}

/// All palette names, in table order.
pub fn list_colors() -> Vec<&'static str> {
    NAMED_COLORS.iter().map(|(n, _)| *n).collect()
}
