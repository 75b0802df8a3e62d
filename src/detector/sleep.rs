//! Deep-idle probe, the tier past bored.

use serde_json::Value;

use crate::state::PrinterEvent;

use super::probes::{inactivity_guard, ProbeCtx, StateProbe};

/// Fires once the printer has been bored past `sleep_timeout`, and stays
/// latched while the detector reports sleep. Runs ahead of [`BoredProbe`]
/// in the chain; bored's stickiness would otherwise hold the slot forever.
///
/// [`BoredProbe`]: super::bored::BoredProbe
pub struct SleepProbe;

impl StateProbe for SleepProbe {
    fn name(&self) -> &'static str {
        "sleep"
    }

    fn priority(&self) -> u8 {
        70
    }

    fn event(&self) -> PrinterEvent {
        PrinterEvent::Sleep
    }

    fn detect(&self, status: &Value, ctx: &ProbeCtx) -> bool {
        if !inactivity_guard(status) {
            return false;
        }

        if ctx.last_event == PrinterEvent::Sleep {
            return true;
        }

        // Only ever entered from bored; the timeout counts from bored entry.
        if ctx.last_event == PrinterEvent::Bored {
            return ctx.now - ctx.state_enter_time >= ctx.sleep_timeout;
        }

        false
    }
}
