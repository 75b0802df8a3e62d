//! Extended-idle probe.

use serde_json::Value;

use crate::state::PrinterEvent;

use super::probes::{inactivity_guard, ProbeCtx, StateProbe};

/// Fires once the printer has sat idle past `bored_timeout`, and stays
/// latched while the detector reports bored. The shared guard keeps it from
/// firing during prints, heating, or error states.
pub struct BoredProbe;

impl StateProbe for BoredProbe {
    fn name(&self) -> &'static str {
        "bored"
    }

    fn priority(&self) -> u8 {
        80
    }

    fn event(&self) -> PrinterEvent {
        PrinterEvent::Bored
    }

    fn detect(&self, status: &Value, ctx: &ProbeCtx) -> bool {
        if !inactivity_guard(status) {
            return false;
        }

        // Sticky until a higher-priority probe takes over.
        if ctx.last_event == PrinterEvent::Bored {
            return true;
        }

        if ctx.last_event == PrinterEvent::Idle {
            return ctx.now - ctx.state_enter_time >= ctx.bored_timeout;
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quiet_status() -> Value {
        json!({
            "extruder": { "target": 0.0, "temperature": 22.0 },
            "heater_bed": { "target": 0.0, "temperature": 22.0 },
            "print_stats": { "state": "standby" },
            "idle_timeout": { "state": "Idle" },
        })
    }

    fn ctx(last: PrinterEvent, entered: f64, now: f64) -> ProbeCtx {
        ProbeCtx {
            last_event: last,
            state_enter_time: entered,
            now,
            bored_timeout: 300.0,
            sleep_timeout: 600.0,
        }
    }

    #[test]
    fn fires_after_timeout_from_idle() {
        let status = quiet_status();
        assert!(!BoredProbe.detect(&status, &ctx(PrinterEvent::Idle, 0.0, 299.0)));
        assert!(BoredProbe.detect(&status, &ctx(PrinterEvent::Idle, 0.0, 300.0)));
    }

    #[test]
    fn sticky_while_bored() {
        let status = quiet_status();
        assert!(BoredProbe.detect(&status, &ctx(PrinterEvent::Bored, 300.0, 301.0)));
    }

    #[test]
    fn never_fires_from_active_states() {
        let status = quiet_status();
        assert!(!BoredProbe.detect(&status, &ctx(PrinterEvent::Printing, 0.0, 1000.0)));
        assert!(!BoredProbe.detect(&status, &ctx(PrinterEvent::Cooldown, 0.0, 1000.0)));
    }
}
