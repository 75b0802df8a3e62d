// src/engine.rs - Telemetry in, frames out
//! Render engine: owns the printer snapshot, the detector, and the active
//! effect, and is the single place all of them are mutated. Telemetry and
//! control requests arrive over a channel, frames leave through the driver.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};

use crate::clock::{Clock, SystemClock};
use crate::colors::LedBuffer;
use crate::config::{EffectSettings, EffectsConfig, LumenConfig};
use crate::detector::StateDetector;
use crate::driver::LedDriver;
use crate::effects::{
    disco_seed, effect_disco, effect_heartbeat, effect_progress, effect_pulse, effect_thermal,
    EffectKind, EffectState, TempSource,
};
use crate::state::{PrinterEvent, PrinterState};
use crate::web::engine_channel::EngineRequest;
use crate::web::models::StatusResponse;

/// Orchestrates detection and rendering for one LED strip.
pub struct LumenEngine {
    strip_name: String,
    led_count: usize,
    fps: f64,
    temp_floor: f64,

    effects: EffectsConfig,
    printer: PrinterState,
    detector: StateDetector,
    active: EffectState,
    override_settings: Option<EffectSettings>,
    blanked: bool,

    driver: Box<dyn LedDriver>,
    clock: Arc<dyn Clock>,
    started_at: f64,
}

impl LumenEngine {
    pub fn new(config: &LumenConfig, driver: Box<dyn LedDriver>) -> Self {
        Self::with_clock(config, driver, Arc::new(SystemClock))
    }

    /// Engine on an explicit time source. Tests drive this with a manual
    /// clock; the detector shares it.
    pub fn with_clock(
        config: &LumenConfig,
        driver: Box<dyn LedDriver>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut detector = StateDetector::new(
            config.detector.bored_timeout,
            config.detector.sleep_timeout,
        )
        .with_clock(Arc::clone(&clock))
        .with_strategy(config.detector.strategy.build());

        detector.add_listener(|event| {
            tracing::info!(event = %event, "printer event changed");
        });

        let now = clock.now();
        let mut active = config.effects.for_event(PrinterEvent::Idle).to_effect_state();
        active.activate(now);

        Self {
            strip_name: config.strip.name.clone(),
            led_count: config.strip.led_count,
            fps: config.strip.fps,
            temp_floor: config.detector.temp_floor,
            effects: config.effects.clone(),
            printer: PrinterState::default(),
            detector,
            active,
            override_settings: None,
            blanked: false,
            driver,
            clock,
            started_at: now,
        }
    }

    /// Merge a telemetry delta and re-run detection. Only an actual event
    /// transition touches the active effect; repeated updates in the same
    /// state never reset its phase.
    pub fn handle_status(&mut self, status: &Value) {
        self.printer.update_from_status(status);
        if let Some(event) = self.detector.update(&self.printer) {
            if self.override_settings.is_some() {
                tracing::debug!(event = %event, "transition while override active, effect unchanged");
                return;
            }
            let settings = self.effects.for_event(event).clone();
            self.activate(&settings);
        }
    }

    fn activate(&mut self, settings: &EffectSettings) {
        let now = self.clock.now();
        let mut state = settings.to_effect_state();
        state.activate(now);
        tracing::debug!(effect = %state.kind, "effect activated");
        self.active = state;
        self.blanked = false;
    }

    /// Install or clear a manual effect override. Clearing falls back to
    /// whatever the detector currently reports.
    pub fn set_override(&mut self, settings: Option<EffectSettings>) {
        match settings {
            Some(settings) => {
                tracing::info!(effect = %settings.effect, "manual effect override");
                self.activate(&settings);
                self.override_settings = Some(settings);
            }
            None => {
                tracing::info!("manual effect override cleared");
                self.override_settings = None;
                let settings = self
                    .effects
                    .for_event(self.detector.current_event())
                    .clone();
                self.activate(&settings);
            }
        }
    }

    /// Render one frame for the active effect at time `now`. `None` means
    /// nothing to push this tick: disco below its update interval, or an
    /// off strip that has already been blanked.
    pub fn render_frame(&mut self, now: f64) -> Option<LedBuffer> {
        let n = self.led_count;
        match self.active.kind {
            EffectKind::Off => {
                if self.blanked {
                    None
                } else {
                    self.blanked = true;
                    Some(vec![None; n])
                }
            }
            EffectKind::Solid => Some(vec![Some(self.active.base_color); n]),
            EffectKind::Pulse => {
                let color = effect_pulse(&self.active, now);
                Some(vec![Some(color); n])
            }
            EffectKind::Heartbeat => {
                let color = effect_heartbeat(&self.active, now);
                Some(vec![Some(color); n])
            }
            EffectKind::Disco => {
                let mut rng = StdRng::seed_from_u64(disco_seed(now));
                let (frame, updated) = effect_disco(&mut self.active, now, n, &mut rng);
                updated.then_some(frame)
            }
            EffectKind::Thermal => {
                let (current, target) = match self.active.temp_source {
                    TempSource::Extruder => {
                        (self.printer.extruder_temp, self.printer.extruder_target)
                    }
                    TempSource::Bed => (self.printer.bed_temp, self.printer.bed_target),
                    // No chamber group in the telemetry feed yet; the bed
                    // is the closest stand-in.
                    TempSource::Chamber => (self.printer.bed_temp, self.printer.bed_target),
                };
                Some(effect_thermal(
                    &self.active,
                    current,
                    target,
                    self.temp_floor,
                    n,
                ))
            }
            EffectKind::Progress => Some(effect_progress(
                &self.active,
                self.printer.progress,
                n,
            )),
        }
    }

    pub fn status_response(&self) -> StatusResponse {
        let now = self.clock.now();
        StatusResponse {
            strip: self.strip_name.clone(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: now - self.started_at,
            led_count: self.led_count,
            active_effect: self.active.kind.as_str().to_string(),
            overridden: self.override_settings.is_some(),
            detector: self.detector.status(),
            printer: self.printer.clone(),
        }
    }

    pub fn printer(&self) -> &PrinterState {
        &self.printer
    }

    pub fn current_event(&self) -> PrinterEvent {
        self.detector.current_event()
    }

    pub fn active_effect(&self) -> &EffectState {
        &self.active
    }

    async fn handle_request(&mut self, request: EngineRequest) {
        match request {
            EngineRequest::GetStatus { respond_to } => {
                let _ = respond_to.send(self.status_response());
            }
            EngineRequest::PushStatus { status, respond_to } => {
                self.handle_status(&status);
                let _ = respond_to.send(());
            }
            EngineRequest::SetOverride {
                settings,
                respond_to,
            } => {
                self.set_override(settings);
                let _ = respond_to.send(());
            }
        }
    }

    /// Main loop: render at the configured cadence, serve channel requests
    /// between ticks, blank the strip on the way out. Driver failures are
    /// logged and the loop keeps going; a dead frame is not worth stopping
    /// the service for.
    pub async fn run(
        mut self,
        mut requests: mpsc::Receiver<EngineRequest>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        let period = std::time::Duration::from_secs_f64(1.0 / self.fps.max(0.1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        tracing::info!(
            strip = %self.strip_name,
            leds = self.led_count,
            fps = self.fps,
            "render engine started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("render engine shutting down");
                    break;
                }
                request = requests.recv() => {
                    match request {
                        Some(request) => self.handle_request(request).await,
                        None => {
                            tracing::info!("request channel closed, stopping engine");
                            break;
                        }
                    }
                }
                _ = interval.tick() => {
                    let now = self.clock.now();
                    if let Some(frame) = self.render_frame(now) {
                        if let Err(e) = self.driver.apply(&frame).await {
                            tracing::error!("LED driver apply failed: {}", e);
                        }
                    }
                }
            }
        }

        if let Err(e) = self.driver.turn_off().await {
            tracing::warn!("failed to blank strip on shutdown: {}", e);
        }
    }
}
