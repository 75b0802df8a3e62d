//! Pluggable state probes.
//!
//! Each probe answers one question: is the state I am named after currently
//! active? Probes read the status document plus a shared timing context and
//! never mutate anything, which keeps them testable in isolation. The
//! [`ProbeSet`] composes them: ascending priority order, first hit wins.

use serde_json::Value;

use crate::state::{PrinterEvent, CLEARLY_HEATING_THRESHOLD, DEFAULT_TEMP_TOLERANCE};

use super::DetectorError;

/// Shared timing context handed to every probe.
#[derive(Debug, Clone, Copy)]
pub struct ProbeCtx {
    /// Event the detector currently reports, before this evaluation.
    pub last_event: PrinterEvent,
    /// When `last_event` was entered, seconds since epoch.
    pub state_enter_time: f64,
    pub now: f64,
    pub bored_timeout: f64,
    pub sleep_timeout: f64,
}

/// One independently testable detection unit.
pub trait StateProbe: Send + Sync {
    /// Unique name, used for registration and diagnostics.
    fn name(&self) -> &'static str;

    /// Evaluation order. Lower runs first; the first probe to return true
    /// decides the event.
    fn priority(&self) -> u8;

    /// The event this probe asserts when it fires.
    fn event(&self) -> PrinterEvent;

    fn detect(&self, status: &Value, ctx: &ProbeCtx) -> bool;
}

/// Priority-ordered probe registry.
pub struct ProbeSet {
    probes: Vec<Box<dyn StateProbe>>,
}

impl ProbeSet {
    pub fn new() -> Self {
        Self { probes: Vec::new() }
    }

    /// The full built-in chain: error, printing, heating, cooldown, sleep,
    /// bored. Sleep sits ahead of bored so the deeper tier can still win
    /// once bored has gone sticky.
    pub fn with_core_probes() -> Self {
        let mut probes: Vec<Box<dyn StateProbe>> = vec![
            Box::new(ErrorProbe),
            Box::new(PrintingProbe),
            Box::new(HeatingProbe),
            Box::new(CooldownProbe),
            Box::new(super::sleep::SleepProbe),
            Box::new(super::bored::BoredProbe),
        ];
        probes.sort_by_key(|p| p.priority());
        Self { probes }
    }

    /// Register a probe, keeping the set ordered. Names must be unique.
    pub fn register(&mut self, probe: Box<dyn StateProbe>) -> Result<(), DetectorError> {
        if self.probes.iter().any(|p| p.name() == probe.name()) {
            return Err(DetectorError::DuplicateProbe(probe.name().to_string()));
        }
        self.probes.push(probe);
        self.probes.sort_by_key(|p| p.priority());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    /// First probe to fire decides the event; none firing means idle.
    pub fn evaluate(&self, status: &Value, ctx: &ProbeCtx) -> PrinterEvent {
        for probe in &self.probes {
            if probe.detect(status, ctx) {
                tracing::trace!(probe = probe.name(), "state probe fired");
                return probe.event();
            }
        }
        PrinterEvent::Idle
    }
}

impl Default for ProbeSet {
    fn default() -> Self {
        Self::with_core_probes()
    }
}

pub(super) fn num_field(status: &Value, group: &str, key: &str) -> f64 {
    status
        .get(group)
        .and_then(|g| g.get(key))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

pub(super) fn str_field<'a>(status: &'a Value, group: &str, key: &str) -> &'a str {
    status
        .get(group)
        .and_then(|g| g.get(key))
        .and_then(Value::as_str)
        .unwrap_or("")
}

/// Guard shared by the inactivity probes: no heater running, not printing
/// or paused, no idle-timeout error.
pub(super) fn inactivity_guard(status: &Value) -> bool {
    if num_field(status, "extruder", "target") > 0.0
        || num_field(status, "heater_bed", "target") > 0.0
    {
        return false;
    }

    let print_state = str_field(status, "print_stats", "state");
    if print_state.eq_ignore_ascii_case("printing") || print_state.eq_ignore_ascii_case("paused") {
        return false;
    }

    if str_field(status, "idle_timeout", "state").eq_ignore_ascii_case("error") {
        return false;
    }

    true
}

fn any_target_set(status: &Value) -> bool {
    num_field(status, "extruder", "target") > 0.0 || num_field(status, "heater_bed", "target") > 0.0
}

fn any_heater_hot(status: &Value) -> bool {
    num_field(status, "extruder", "temperature") > crate::state::AMBIENT_HOT_THRESHOLD
        || num_field(status, "heater_bed", "temperature") > crate::state::AMBIENT_HOT_THRESHOLD
}

fn at_temp(status: &Value, tolerance: f64) -> bool {
    let bed_target = num_field(status, "heater_bed", "target");
    let bed_ok = bed_target == 0.0
        || (num_field(status, "heater_bed", "temperature") - bed_target).abs() <= tolerance;
    let ext_target = num_field(status, "extruder", "target");
    let ext_ok = ext_target == 0.0
        || (num_field(status, "extruder", "temperature") - ext_target).abs() <= tolerance;
    bed_ok && ext_ok
}

fn clearly_heating(status: &Value, threshold: f64) -> bool {
    let bed_target = num_field(status, "heater_bed", "target");
    if bed_target > 0.0 && bed_target - num_field(status, "heater_bed", "temperature") > threshold {
        return true;
    }
    let ext_target = num_field(status, "extruder", "target");
    if ext_target > 0.0 && ext_target - num_field(status, "extruder", "temperature") > threshold {
        return true;
    }
    false
}

/// Klipper reported shutdown or error.
pub struct ErrorProbe;

impl StateProbe for ErrorProbe {
    fn name(&self) -> &'static str {
        "error"
    }

    fn priority(&self) -> u8 {
        10
    }

    fn event(&self) -> PrinterEvent {
        PrinterEvent::Error
    }

    fn detect(&self, status: &Value, _ctx: &ProbeCtx) -> bool {
        matches!(str_field(status, "webhooks", "state"), "shutdown" | "error")
    }
}

/// A print is running and the heaters are where they need to be. While the
/// detector already reports printing, only a clear heating deficit knocks
/// this probe out, which is the same hysteresis the decision tree applies.
pub struct PrintingProbe;

impl StateProbe for PrintingProbe {
    fn name(&self) -> &'static str {
        "printing"
    }

    fn priority(&self) -> u8 {
        30
    }

    fn event(&self) -> PrinterEvent {
        PrinterEvent::Printing
    }

    fn detect(&self, status: &Value, ctx: &ProbeCtx) -> bool {
        if str_field(status, "print_stats", "state") != "printing" {
            return false;
        }
        if ctx.last_event == PrinterEvent::Printing {
            !clearly_heating(status, CLEARLY_HEATING_THRESHOLD)
        } else {
            !(any_target_set(status) && !at_temp(status, DEFAULT_TEMP_TOLERANCE))
        }
    }
}

/// A heater is working toward a target, either before a print reaches
/// temperature or on its own.
pub struct HeatingProbe;

impl StateProbe for HeatingProbe {
    fn name(&self) -> &'static str {
        "heating"
    }

    fn priority(&self) -> u8 {
        40
    }

    fn event(&self) -> PrinterEvent {
        PrinterEvent::Heating
    }

    fn detect(&self, status: &Value, ctx: &ProbeCtx) -> bool {
        if str_field(status, "print_stats", "state") == "printing" {
            if ctx.last_event == PrinterEvent::Printing {
                clearly_heating(status, CLEARLY_HEATING_THRESHOLD)
            } else {
                any_target_set(status) && !at_temp(status, DEFAULT_TEMP_TOLERANCE)
            }
        } else {
            any_target_set(status)
        }
    }
}

/// Heaters off but still above ambient.
pub struct CooldownProbe;

impl StateProbe for CooldownProbe {
    fn name(&self) -> &'static str {
        "cooldown"
    }

    fn priority(&self) -> u8 {
        50
    }

    fn event(&self) -> PrinterEvent {
        PrinterEvent::Cooldown
    }

    fn detect(&self, status: &Value, _ctx: &ProbeCtx) -> bool {
        !any_target_set(status) && any_heater_hot(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(last: PrinterEvent) -> ProbeCtx {
        ProbeCtx {
            last_event: last,
            state_enter_time: 0.0,
            now: 0.0,
            bored_timeout: 300.0,
            sleep_timeout: 600.0,
        }
    }

    #[test]
    fn guard_blocks_on_heater_target() {
        let status = json!({ "extruder": { "target": 210.0 } });
        assert!(!inactivity_guard(&status));
    }

    #[test]
    fn guard_blocks_on_paused_print_any_case() {
        let status = json!({ "print_stats": { "state": "Paused" } });
        assert!(!inactivity_guard(&status));
    }

    #[test]
    fn guard_passes_on_quiet_printer() {
        let status = json!({
            "extruder": { "target": 0.0 },
            "print_stats": { "state": "standby" },
            "idle_timeout": { "state": "Idle" },
        });
        assert!(inactivity_guard(&status));
    }

    #[test]
    fn guard_reads_missing_groups_as_inactive() {
        assert!(inactivity_guard(&json!({})));
    }

    #[test]
    fn core_set_orders_by_priority() {
        let set = ProbeSet::with_core_probes();
        let status = json!({ "webhooks": { "state": "shutdown" } });
        // Error outranks everything else even when the guard would pass.
        assert_eq!(
            set.evaluate(&status, &ctx(PrinterEvent::Idle)),
            PrinterEvent::Error
        );
    }

    #[test]
    fn duplicate_probe_name_is_rejected() {
        let mut set = ProbeSet::with_core_probes();
        let err = set.register(Box::new(ErrorProbe)).unwrap_err();
        assert!(matches!(err, DetectorError::DuplicateProbe(name) if name == "error"));
    }

    #[test]
    fn printing_probe_holds_through_small_dips() {
        let status = json!({
            "print_stats": { "state": "printing" },
            "extruder": { "temperature": 195.0, "target": 200.0 },
        });
        assert!(PrintingProbe.detect(&status, &ctx(PrinterEvent::Printing)));
        // A fresh print still 5 degrees short is not at temp yet.
        assert!(!PrintingProbe.detect(&status, &ctx(PrinterEvent::Heating)));
    }
}
