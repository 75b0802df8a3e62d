//! Gcode-emitting drivers: addressable strips via `SET_LED`, analog strips
//! and relays via `SET_PIN`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::colors::Rgb;
use crate::config::PwmPins;

use super::{DriverError, GcodeSink, LedDriver};

/// Addressable strip behind a Klipper LED object (`[neopixel ...]` and
/// friends). Emits one `SET_LED` per LED with `TRANSMIT=0`, transmitting on
/// the final index so the strip latches the whole frame at once.
pub struct KlipperDriver {
    led_name: String,
    led_count: usize,
    sink: Arc<dyn GcodeSink>,
}

impl KlipperDriver {
    pub fn new(led_name: &str, led_count: usize, sink: Arc<dyn GcodeSink>) -> Self {
        Self {
            led_name: led_name.to_string(),
            led_count,
            sink,
        }
    }
}

#[async_trait]
impl LedDriver for KlipperDriver {
    fn led_count(&self) -> usize {
        self.led_count
    }

    async fn apply(&mut self, frame: &[Option<Rgb>]) -> Result<(), DriverError> {
        if frame.len() != self.led_count {
            return Err(DriverError::FrameLength {
                got: frame.len(),
                want: self.led_count,
            });
        }

        let mut script = String::new();
        for (i, slot) in frame.iter().enumerate() {
            // SET_LED is an absolute write, so unlit renders as black.
            let color = slot.unwrap_or(Rgb::OFF).clamped();
            let transmit = if i + 1 == frame.len() { 1 } else { 0 };
            if i > 0 {
                script.push('\n');
            }
            script.push_str(&format!(
                "SET_LED LED={} RED={:.4} GREEN={:.4} BLUE={:.4} INDEX={} TRANSMIT={}",
                self.led_name,
                color.0,
                color.1,
                color.2,
                i + 1,
                transmit
            ));
        }

        if script.is_empty() {
            return Ok(());
        }
        self.sink.send(&script).await
    }

    async fn turn_off(&mut self) -> Result<(), DriverError> {
        // No INDEX addresses the whole strip.
        let script = format!(
            "SET_LED LED={} RED=0 GREEN=0 BLUE=0 TRANSMIT=1",
            self.led_name
        );
        self.sink.send(&script).await
    }
}

/// Single-zone analog strip on three PWM pins. The strip has one color, so
/// the frame collapses to the average of its lit LEDs.
pub struct PwmDriver {
    pins: PwmPins,
    led_count: usize,
    sink: Arc<dyn GcodeSink>,
}

impl PwmDriver {
    pub fn new(pins: PwmPins, led_count: usize, sink: Arc<dyn GcodeSink>) -> Self {
        Self {
            pins,
            led_count,
            sink,
        }
    }

    async fn set_color(&self, color: Rgb) -> Result<(), DriverError> {
        let color = color.clamped();
        let script = format!(
            "SET_PIN PIN={} VALUE={:.4}\nSET_PIN PIN={} VALUE={:.4}\nSET_PIN PIN={} VALUE={:.4}",
            self.pins.red, color.0, self.pins.green, color.1, self.pins.blue, color.2
        );
        self.sink.send(&script).await
    }
}

#[async_trait]
impl LedDriver for PwmDriver {
    fn led_count(&self) -> usize {
        self.led_count
    }

    async fn apply(&mut self, frame: &[Option<Rgb>]) -> Result<(), DriverError> {
        if frame.len() != self.led_count {
            return Err(DriverError::FrameLength {
                got: frame.len(),
                want: self.led_count,
            });
        }

        let mut sum = Rgb::OFF;
        let mut lit = 0usize;
        for color in frame.iter().flatten() {
            sum = Rgb(sum.0 + color.0, sum.1 + color.1, sum.2 + color.2);
            lit += 1;
        }
        let average = if lit == 0 {
            Rgb::OFF
        } else {
            Rgb(sum.0 / lit as f64, sum.1 / lit as f64, sum.2 / lit as f64)
        };

        self.set_color(average).await
    }

    async fn turn_off(&mut self) -> Result<(), DriverError> {
        self.set_color(Rgb::OFF).await
    }
}

/// On/off relay or status LED on a single pin: high while anything on the
/// strip is visibly lit. Repeated frames with the same level are not
/// re-sent.
pub struct GpioDriver {
    pin: String,
    led_count: usize,
    sink: Arc<dyn GcodeSink>,
    last_level: Option<u8>,
}

impl GpioDriver {
    pub fn new(pin: &str, led_count: usize, sink: Arc<dyn GcodeSink>) -> Self {
        Self {
            pin: pin.to_string(),
            led_count,
            sink,
            last_level: None,
        }
    }

    async fn set_level(&mut self, level: u8) -> Result<(), DriverError> {
        if self.last_level == Some(level) {
            return Ok(());
        }
        let script = format!("SET_PIN PIN={} VALUE={}", self.pin, level);
        self.sink.send(&script).await?;
        self.last_level = Some(level);
        Ok(())
    }
}

#[async_trait]
impl LedDriver for GpioDriver {
    fn led_count(&self) -> usize {
        self.led_count
    }

    async fn apply(&mut self, frame: &[Option<Rgb>]) -> Result<(), DriverError> {
        if frame.len() != self.led_count {
            return Err(DriverError::FrameLength {
                got: frame.len(),
                want: self.led_count,
            });
        }
        let lit = frame.iter().flatten().any(|c| !c.is_off());
        self.set_level(if lit { 1 } else { 0 }).await
    }

    async fn turn_off(&mut self) -> Result<(), DriverError> {
        self.set_level(0).await
    }
}
