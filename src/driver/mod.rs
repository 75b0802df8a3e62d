// src/driver/mod.rs - LED output drivers
//! Driver boundary between rendered frames and the printer.
//!
//! A [`LedDriver`] consumes one frame per render tick. The gcode-emitting
//! drivers format Klipper commands and push them through a [`GcodeSink`],
//! which is the transport seam: the host glue that actually talks to
//! Moonraker implements it, tests record it, the default logs it. Channel
//! clamping to `[0, 1]` happens here and nowhere earlier.

pub mod klipper;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::colors::{LedBuffer, Rgb};
use crate::config::{DriverConfig, DriverKind};

pub use klipper::{GpioDriver, KlipperDriver, PwmDriver};

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("frame has {got} elements, strip has {want}")]
    FrameLength { got: usize, want: usize },
    #[error("gcode transport error: {0}")]
    Transport(String),
}

/// Transport that delivers gcode scripts to the printer host.
#[async_trait]
pub trait GcodeSink: Send + Sync {
    async fn send(&self, script: &str) -> Result<(), DriverError>;
}

/// Sink that logs scripts instead of sending them. Stands in until a real
/// transport is wired up, and doubles as a dry-run mode.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingGcodeSink;

#[async_trait]
impl GcodeSink for TracingGcodeSink {
    async fn send(&self, script: &str) -> Result<(), DriverError> {
        for line in script.lines() {
            tracing::debug!(gcode = line, "emit");
        }
        Ok(())
    }
}

/// Renders color frames to hardware or a software stand-in.
#[async_trait]
pub trait LedDriver: Send + Sync {
    fn led_count(&self) -> usize;

    /// Apply one frame. `frame.len()` must equal `led_count`. `None`
    /// entries are unlit; each driver maps them per its own policy.
    async fn apply(&mut self, frame: &[Option<Rgb>]) -> Result<(), DriverError>;

    async fn turn_off(&mut self) -> Result<(), DriverError>;
}

/// In-memory driver. Keeps the last frame where tests and the simulator can
/// read it back.
pub struct ProxyDriver {
    led_count: usize,
    frame: Arc<Mutex<LedBuffer>>,
}

impl ProxyDriver {
    pub fn new(led_count: usize) -> Self {
        Self {
            led_count,
            frame: Arc::new(Mutex::new(vec![None; led_count])),
        }
    }

    /// Shared view of the last applied frame.
    pub fn handle(&self) -> Arc<Mutex<LedBuffer>> {
        Arc::clone(&self.frame)
    }
}

#[async_trait]
impl LedDriver for ProxyDriver {
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
        let mut stored = self.frame.lock().await;
        stored.clear();
        stored.extend(frame.iter().map(|slot| slot.map(Rgb::clamped)));
        Ok(())
    }

    async fn turn_off(&mut self) -> Result<(), DriverError> {
        let mut stored = self.frame.lock().await;
        stored.clear();
        stored.resize(self.led_count, None);
        Ok(())
    }
}

/// Build the configured driver. Gcode-emitting drivers share the one sink.
pub fn create_driver(
    config: &DriverConfig,
    led_count: usize,
    sink: Arc<dyn GcodeSink>,
) -> Box<dyn LedDriver> {
    match config.kind {
        DriverKind::Klipper => Box::new(KlipperDriver::new(&config.led_name, led_count, sink)),
        DriverKind::Pwm => Box::new(PwmDriver::new(config.pins.clone(), led_count, sink)),
        DriverKind::Gpio => Box::new(GpioDriver::new(&config.pin, led_count, sink)),
        DriverKind::Proxy => Box::new(ProxyDriver::new(led_count)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn proxy_stores_clamped_frame() {
        let mut driver = ProxyDriver::new(3);
        let handle = driver.handle();
        let frame = vec![Some(Rgb(1.5, 0.5, -0.1)), None, Some(Rgb(0.0, 1.0, 0.0))];
        driver.apply(&frame).await.unwrap();

        let stored = handle.lock().await;
        assert_eq!(stored[0], Some(Rgb(1.0, 0.5, 0.0)));
        assert_eq!(stored[1], None);
        assert_eq!(stored[2], Some(Rgb(0.0, 1.0, 0.0)));
    }

    #[tokio::test]
    async fn proxy_rejects_wrong_length() {
        let mut driver = ProxyDriver::new(4);
        let err = driver.apply(&[None, None]).await.unwrap_err();
        assert!(matches!(
            err,
            DriverError::FrameLength { got: 2, want: 4 }
        ));
    }

    #[tokio::test]
    async fn proxy_turn_off_clears_frame() {
        let mut driver = ProxyDriver::new(2);
        driver.apply(&[Some(Rgb(1.0, 0.0, 0.0)), None]).await.unwrap();
        driver.turn_off().await.unwrap();
        assert_eq!(*driver.handle().lock().await, vec![None, None]);
    }
}
