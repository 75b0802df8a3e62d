// src/lib.rs - Library root for the lumen LED service
//! Printer-state-driven LED control: merge Moonraker-style telemetry,
//! detect what the printer is doing, and render the matching effect to
//! an LED strip through Klipper gcode or bare pins.

pub mod clock;
pub mod colors;
pub mod config;
pub mod detector;
pub mod driver;
pub mod effects;
pub mod engine;
pub mod state;
pub mod web;

pub use config::{load_config, LumenConfig};
pub use engine::LumenEngine;
pub use state::{PrinterEvent, PrinterState};
