//! CLI entry point for the lifecycle simulator: drives the render engine with
//! synthetic Moonraker telemetry and prints each frame to the terminal.

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;

use lumen_rs::clock::{Clock, ManualClock};
use lumen_rs::colors::{LedBuffer, Rgb};
use lumen_rs::config::LumenConfig;
use lumen_rs::driver::ProxyDriver;
use lumen_rs::engine::LumenEngine;

/// Lifecycle simulation CLI
#[derive(Parser, Debug)]
#[command(
    name = "lumen-sim",
    about = "Scripted printer lifecycle against the LED render engine."
)]
pub struct Cli {
    /// Path to a TOML config file (overrides the built-in sim profile)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated seconds per rendered step
    #[arg(long, default_value_t = 0.5)]
    step: f64,

    /// ANSI true-color swatches instead of ASCII brightness glyphs
    #[arg(long)]
    color: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the scripted lifecycle phases
    ListPhases,
    /// Run the lifecycle (default)
    Run,
}

/// One scripted stretch of printer behavior. The closure gets phase
/// progress in [0,1] and returns the status payload for that step.
struct Phase {
    name: &'static str,
    seconds: f64,
    status: Box<dyn Fn(f64) -> Value>,
}

fn lifecycle(bored_timeout: f64, sleep_timeout: f64) -> Vec<Phase> {
    vec![
        Phase {
            name: "boot",
            seconds: 2.0,
            status: Box::new(|_| {
                json!({
                    "webhooks": {"state": "ready"},
                    "idle_timeout": {"state": "Idle"},
                    "heater_bed": {"temperature": 24.0, "target": 0.0},
                    "extruder": {"temperature": 24.0, "target": 0.0},
                })
            }),
        },
        Phase {
            name: "heatup",
            // Ramp stops a few degrees short so the heating event holds
            // until the print phase takes over.
            seconds: 15.0,
            status: Box::new(|t| {
                json!({
                    "idle_timeout": {"state": "Printing"},
                    "heater_bed": {"temperature": 24.0 + t * 33.0, "target": 60.0},
                    "extruder": {"temperature": 24.0 + t * 183.0, "target": 210.0},
                })
            }),
        },
        Phase {
            name: "print",
            seconds: 25.0,
            status: Box::new(|t| {
                json!({
                    "print_stats": {"state": "printing", "filename": "benchy.gcode"},
                    "display_status": {"progress": t},
                    "heater_bed": {"temperature": 60.0, "target": 60.0},
                    "extruder": {"temperature": 210.0, "target": 210.0},
                })
            }),
        },
        Phase {
            name: "cooldown",
            seconds: 20.0,
            status: Box::new(|t| {
                json!({
                    "print_stats": {"state": "complete"},
                    "display_status": {"progress": 0.0},
                    "idle_timeout": {"state": "Idle"},
                    "heater_bed": {"temperature": 60.0 - t * 34.0, "target": 0.0},
                    "extruder": {"temperature": 210.0 - t * 184.0, "target": 0.0},
                })
            }),
        },
        Phase {
            name: "idle",
            seconds: bored_timeout + 5.0,
            status: Box::new(|_| json!({"idle_timeout": {"state": "Idle"}})),
        },
        Phase {
            name: "bored",
            seconds: sleep_timeout + 5.0,
            status: Box::new(|_| json!({"idle_timeout": {"state": "Idle"}})),
        },
        Phase {
            name: "asleep",
            seconds: 5.0,
            status: Box::new(|_| json!({"idle_timeout": {"state": "Idle"}})),
        },
    ]
}

fn render_line(frame: &LedBuffer, color: bool) -> String {
    let mut out = String::new();
    for slot in frame {
        match slot {
            Some(c) => {
                let c = c.clamped();
                if color {
                    let (r, g, b) = (
                        (c.0 * 255.0) as u8,
                        (c.1 * 255.0) as u8,
                        (c.2 * 255.0) as u8,
                    );
                    out.push_str(&format!("\x1b[48;2;{r};{g};{b}m \x1b[0m"));
                } else {
                    out.push(brightness_glyph(c));
                }
            }
            // Unlit is not black; give it its own glyph.
            None => out.push('_'),
        }
    }
    out
}

fn brightness_glyph(c: Rgb) -> char {
    const RAMP: &[u8] = b" .:-=+*#%@";
    let luma = 0.299 * c.0 + 0.587 * c.1 + 0.114 * c.2;
    let idx = ((luma * (RAMP.len() - 1) as f64).round() as usize).min(RAMP.len() - 1);
    RAMP[idx] as char
}

fn main() {
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        let path = path.to_string_lossy();
        match lumen_rs::config::load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                std::process::exit(1);
            }
        }
    } else {
        // Sim profile: short idle timers so the whole arc fits in one run.
        let mut cfg = LumenConfig::default();
        cfg.detector.bored_timeout = 15.0;
        cfg.detector.sleep_timeout = 15.0;
        cfg
    };

    let phases = lifecycle(config.detector.bored_timeout, config.detector.sleep_timeout);

    if let Some(Commands::ListPhases) = cli.command {
        println!("Scripted phases:");
        for phase in &phases {
            println!("  {:<9} {:>6.1}s", phase.name, phase.seconds);
        }
        return;
    }

    let led_count = config.strip.led_count;
    let clock = Arc::new(ManualClock::new(1000.0));
    let driver = Box::new(ProxyDriver::new(led_count));
    let mut engine = LumenEngine::with_clock(&config, driver, clock.clone());

    let step = cli.step.max(0.05);
    let mut last_event = engine.current_event();
    let mut elapsed = 0.0;

    println!(
        "{} LEDs, bored after {}s, asleep {}s later",
        led_count, config.detector.bored_timeout, config.detector.sleep_timeout
    );
    println!("{:<9} {:>7}  {:<9} frame", "phase", "t(s)", "event");

    for phase in &phases {
        let steps = (phase.seconds / step).ceil() as usize;
        for i in 0..steps.max(1) {
            let t = if steps <= 1 {
                1.0
            } else {
                i as f64 / (steps - 1) as f64
            };
            clock.advance(step);
            elapsed += step;

            let status = (phase.status)(t);
            engine.handle_status(&status);

            let event = engine.current_event();
            if event != last_event {
                println!("-- {last_event} -> {event}");
                last_event = event;
            }

            if let Some(frame) = engine.render_frame(clock.now()) {
                println!(
                    "{:<9} {:>7.1}  {:<9} {}",
                    phase.name,
                    elapsed,
                    event.as_str(),
                    render_line(&frame, cli.color)
                );
            }
        }
    }
}
