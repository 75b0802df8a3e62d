//! Printer event detection.
//!
//! The [`StateDetector`] shell owns the event register, the idle and bored
//! timers, and the listener list. How the next event is chosen is delegated
//! to a [`DetectionStrategy`]: either the ordered decision tree or the
//! priority probe chain. Both see the same context and must never drive the
//! same detector concurrently, so the shell owns exactly one of them.

pub mod bored;
pub mod probes;
pub mod sleep;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clock::{Clock, SystemClock};
use crate::state::{
    PrinterEvent, PrinterState, CLEARLY_HEATING_THRESHOLD, DEFAULT_TEMP_TOLERANCE,
};

pub use bored::BoredProbe;
pub use probes::{ProbeCtx, ProbeSet, StateProbe};
pub use sleep::SleepProbe;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("duplicate probe name: {0}")]
    DuplicateProbe(String),
}

/// Everything a strategy may look at when choosing the next event. Strategies
/// are pure; timer mutation stays in the shell.
#[derive(Debug, Clone, Copy)]
pub struct DetectCtx<'a> {
    pub state: &'a PrinterState,
    pub current_event: PrinterEvent,
    pub state_enter_time: f64,
    pub idle_start: Option<f64>,
    pub bored_start: Option<f64>,
    pub now: f64,
    pub bored_timeout: f64,
    pub sleep_timeout: f64,
}

/// Swappable event-selection strategy.
pub trait DetectionStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn evaluate(&self, ctx: &DetectCtx<'_>) -> PrinterEvent;
}

/// Which strategy a detector runs. Config-selectable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionStrategyKind {
    #[default]
    Tree,
    Probes,
}

impl DetectionStrategyKind {
    pub fn build(&self) -> Box<dyn DetectionStrategy> {
        match self {
            DetectionStrategyKind::Tree => Box::new(DecisionTree),
            DetectionStrategyKind::Probes => Box::new(ProbeChain::new()),
        }
    }
}

/// The ordered decision tree. First match wins; error outranks everything,
/// the printing arm carries the heating hysteresis, and the idle timers are
/// only consulted once every active condition has been ruled out.
pub struct DecisionTree;

impl DetectionStrategy for DecisionTree {
    fn name(&self) -> &'static str {
        "tree"
    }

    fn evaluate(&self, ctx: &DetectCtx<'_>) -> PrinterEvent {
        let state = ctx.state;

        if matches!(state.klipper_state.as_str(), "shutdown" | "error") {
            return PrinterEvent::Error;
        }

        if state.print_state == "printing" {
            if ctx.current_event == PrinterEvent::Printing {
                // Mid-print, only a clear deficit counts as heating. Minor
                // dips stay printing.
                if state.clearly_heating(CLEARLY_HEATING_THRESHOLD) {
                    return PrinterEvent::Heating;
                }
                return PrinterEvent::Printing;
            }
            // Not printing yet: hold in heating until the heaters settle.
            if state.is_heating() && !state.at_temp(DEFAULT_TEMP_TOLERANCE) {
                return PrinterEvent::Heating;
            }
            return PrinterEvent::Printing;
        }

        if state.is_heating() {
            return PrinterEvent::Heating;
        }

        if state.is_hot() {
            return PrinterEvent::Cooldown;
        }

        if let Some(idle_start) = ctx.idle_start {
            if let Some(bored_start) = ctx.bored_start {
                if ctx.now - bored_start >= ctx.sleep_timeout {
                    return PrinterEvent::Sleep;
                }
            }
            if ctx.now - idle_start >= ctx.bored_timeout {
                return PrinterEvent::Bored;
            }
        }

        PrinterEvent::Idle
    }
}

/// Probe-chain strategy: the snapshot is rendered back to status form and
/// handed to the priority-ordered [`ProbeSet`].
pub struct ProbeChain {
    probes: ProbeSet,
}

impl ProbeChain {
    pub fn new() -> Self {
        Self {
            probes: ProbeSet::with_core_probes(),
        }
    }

    pub fn with_probes(probes: ProbeSet) -> Self {
        Self { probes }
    }
}

impl Default for ProbeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectionStrategy for ProbeChain {
    fn name(&self) -> &'static str {
        "probes"
    }

    fn evaluate(&self, ctx: &DetectCtx<'_>) -> PrinterEvent {
        let status = ctx.state.status_value();
        let probe_ctx = ProbeCtx {
            last_event: ctx.current_event,
            state_enter_time: ctx.state_enter_time,
            now: ctx.now,
            bored_timeout: ctx.bored_timeout,
            sleep_timeout: ctx.sleep_timeout,
        };
        self.probes.evaluate(&status, &probe_ctx)
    }
}

/// Handle returned by [`StateDetector::add_listener`].
pub type ListenerId = Uuid;

struct Listener {
    id: ListenerId,
    callback: Box<dyn FnMut(PrinterEvent) + Send>,
}

/// Serializable detector report, served by the status API.
#[derive(Debug, Clone, Serialize)]
pub struct DetectorStatus {
    pub current_event: PrinterEvent,
    pub previous_event: PrinterEvent,
    pub idle_seconds: f64,
    pub bored_seconds: f64,
    pub bored_timeout: f64,
    pub sleep_timeout: f64,
    pub strategy: &'static str,
}

/// Detects printer events from state changes and notifies listeners on every
/// transition. One instance per printer; all mutation goes through the
/// single `update` path.
pub struct StateDetector {
    bored_timeout: f64,
    sleep_timeout: f64,

    current_event: PrinterEvent,
    previous_event: PrinterEvent,
    state_enter_time: f64,
    idle_start: Option<f64>,
    bored_start: Option<f64>,

    listeners: Vec<Listener>,
    clock: Arc<dyn Clock>,
    strategy: Box<dyn DetectionStrategy>,
}

impl StateDetector {
    /// Detector with wall-clock time and the decision-tree strategy. The
    /// idle timer starts running immediately.
    pub fn new(bored_timeout: f64, sleep_timeout: f64) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let now = clock.now();
        Self {
            bored_timeout,
            sleep_timeout,
            current_event: PrinterEvent::Idle,
            previous_event: PrinterEvent::Idle,
            state_enter_time: now,
            idle_start: Some(now),
            bored_start: None,
            listeners: Vec::new(),
            clock,
            strategy: Box::new(DecisionTree),
        }
    }

    /// Swap the time source. Re-anchors the idle timer and the state entry
    /// time to the new clock, so call this before the first `update`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        self.clock = clock;
        self.state_enter_time = now;
        self.idle_start = Some(now);
        self
    }

    pub fn with_strategy(mut self, strategy: Box<dyn DetectionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Evaluate the snapshot and detect an event change. Returns the new
    /// event only on an actual transition; `None` means no change, and
    /// callers must not re-activate effects on it.
    pub fn update(&mut self, state: &PrinterState) -> Option<PrinterEvent> {
        let now = self.clock.now();
        let ctx = DetectCtx {
            state,
            current_event: self.current_event,
            state_enter_time: self.state_enter_time,
            idle_start: self.idle_start,
            bored_start: self.bored_start,
            now,
            bored_timeout: self.bored_timeout,
            sleep_timeout: self.sleep_timeout,
        };
        let new_event = self.strategy.evaluate(&ctx);

        // The bored timer starts the moment bored is detected, change or
        // not, so the sleep tier has a fixed reference point.
        if new_event == PrinterEvent::Bored && self.bored_start.is_none() {
            self.bored_start = Some(now);
        }

        if new_event != self.current_event {
            self.transition(new_event, now);
            return Some(new_event);
        }
        None
    }

    fn transition(&mut self, new_event: PrinterEvent, now: f64) {
        self.previous_event = self.current_event;
        self.current_event = new_event;
        self.state_enter_time = now;

        match new_event {
            PrinterEvent::Heating
            | PrinterEvent::Printing
            | PrinterEvent::Cooldown
            | PrinterEvent::Error => {
                self.idle_start = None;
                self.bored_start = None;
            }
            PrinterEvent::Idle => {
                self.idle_start = Some(now);
                self.bored_start = None;
            }
            PrinterEvent::Bored => {
                if self.bored_start.is_none() {
                    self.bored_start = Some(now);
                }
            }
            // Sleep keeps the timers running; waking goes through the
            // normal detection path.
            PrinterEvent::Sleep => {}
        }

        tracing::debug!(
            from = %self.previous_event,
            to = %new_event,
            "printer event transition"
        );

        for listener in &mut self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| (listener.callback)(new_event)));
            if outcome.is_err() {
                tracing::warn!(listener = %listener.id, event = %new_event, "event listener panicked");
            }
        }
    }

    /// Register a transition callback. Callbacks run synchronously on every
    /// transition; a panicking callback is logged and skipped, never letting
    /// one consumer break the others.
    pub fn add_listener(&mut self, callback: impl FnMut(PrinterEvent) + Send + 'static) -> ListenerId {
        let id = Uuid::new_v4();
        self.listeners.push(Listener {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Returns true if a listener was removed.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn current_event(&self) -> PrinterEvent {
        self.current_event
    }

    pub fn previous_event(&self) -> PrinterEvent {
        self.previous_event
    }

    /// Force a transition to `event`, firing listeners even when `event`
    /// is already current.
    pub fn force_event(&mut self, event: PrinterEvent) {
        let now = self.clock.now();
        self.transition(event, now);
    }

    pub fn status(&self) -> DetectorStatus {
        let now = self.clock.now();
        DetectorStatus {
            current_event: self.current_event,
            previous_event: self.previous_event,
            idle_seconds: self.idle_start.map_or(0.0, |t| now - t),
            bored_seconds: self.bored_start.map_or(0.0, |t| now - t),
            bored_timeout: self.bored_timeout,
            sleep_timeout: self.sleep_timeout,
            strategy: self.strategy.name(),
        }
    }
}
