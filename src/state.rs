//! Printer telemetry snapshot and the discrete events derived from it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Temperature above which a heater counts as "hot" with no target set.
pub const AMBIENT_HOT_THRESHOLD: f64 = 40.0;
/// Tolerance for considering a heater settled at its target.
pub const DEFAULT_TEMP_TOLERANCE: f64 = 2.0;
/// Gap below target that counts as actively heating. Used as the hysteresis
/// guard so a print does not flap back to heating on minor dips.
pub const CLEARLY_HEATING_THRESHOLD: f64 = 10.0;

/// Discrete printer operating states. Exactly one is current at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterEvent {
    #[default]
    Idle,
    Heating,
    Printing,
    Cooldown,
    Error,
    Bored,
    Sleep,
}

impl PrinterEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrinterEvent::Idle => "idle",
            PrinterEvent::Heating => "heating",
            PrinterEvent::Printing => "printing",
            PrinterEvent::Cooldown => "cooldown",
            PrinterEvent::Error => "error",
            PrinterEvent::Bored => "bored",
            PrinterEvent::Sleep => "sleep",
        }
    }
}

impl std::fmt::Display for PrinterEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutable snapshot of printer telemetry. One instance per printer
/// connection, updated in place as status deltas arrive and read by the
/// detector on every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrinterState {
    pub klipper_state: String,
    pub print_state: String,
    pub progress: f64,
    pub filename: String,

    pub bed_temp: f64,
    pub bed_target: f64,
    pub extruder_temp: f64,
    pub extruder_target: f64,

    pub position_x: f64,
    pub position_y: f64,
    pub position_z: f64,

    pub idle_state: String,
}

impl Default for PrinterState {
    fn default() -> Self {
        Self {
            klipper_state: "startup".to_string(),
            print_state: "standby".to_string(),
            progress: 0.0,
            filename: String::new(),
            bed_temp: 0.0,
            bed_target: 0.0,
            extruder_temp: 0.0,
            extruder_target: 0.0,
            position_x: 0.0,
            position_y: 0.0,
            position_z: 0.0,
            idle_state: "Ready".to_string(),
        }
    }
}

impl PrinterState {
    /// Merge a Moonraker-style status delta into the snapshot.
    ///
    /// Each recognized group overwrites only the fields it carries; absent
    /// groups leave prior values untouched. Numeric fields that are present
    /// but null become 0.0. Unknown groups and keys are ignored without
    /// error, since the upstream feed freely omits groups between updates.
    pub fn update_from_status(&mut self, status: &Value) {
        if let Some(wh) = status.get("webhooks") {
            if let Some(s) = wh.get("state").and_then(Value::as_str) {
                self.klipper_state = s.to_string();
            }
        }

        if let Some(ps) = status.get("print_stats") {
            if let Some(s) = ps.get("state").and_then(Value::as_str) {
                self.print_state = s.to_string();
            }
            if let Some(f) = ps.get("filename") {
                self.filename = f.as_str().unwrap_or("").to_string();
            }
        }

        if let Some(ds) = status.get("display_status") {
            if let Some(p) = ds.get("progress") {
                self.progress = p.as_f64().unwrap_or(0.0);
            }
        }

        if let Some(hb) = status.get("heater_bed") {
            if let Some(t) = hb.get("temperature") {
                self.bed_temp = t.as_f64().unwrap_or(0.0);
            }
            if let Some(t) = hb.get("target") {
                self.bed_target = t.as_f64().unwrap_or(0.0);
            }
        }

        if let Some(ex) = status.get("extruder") {
            if let Some(t) = ex.get("temperature") {
                self.extruder_temp = t.as_f64().unwrap_or(0.0);
            }
            if let Some(t) = ex.get("target") {
                self.extruder_target = t.as_f64().unwrap_or(0.0);
            }
        }

        if let Some(th) = status.get("toolhead") {
            if let Some(pos) = th.get("position").and_then(Value::as_array) {
                if pos.len() >= 3 {
                    self.position_x = pos[0].as_f64().unwrap_or(0.0);
                    self.position_y = pos[1].as_f64().unwrap_or(0.0);
                    self.position_z = pos[2].as_f64().unwrap_or(0.0);
                }
            }
        }

        if let Some(it) = status.get("idle_timeout") {
            if let Some(s) = it.get("state").and_then(Value::as_str) {
                self.idle_state = s.to_string();
            }
        }
    }

    /// Render the snapshot back into status form. Detection probes consume
    /// this instead of the raw delta, so a delta that omits a group cannot
    /// blank out their view of the heaters or print state.
    pub fn status_value(&self) -> Value {
        serde_json::json!({
            "webhooks": { "state": self.klipper_state },
            "print_stats": { "state": self.print_state, "filename": self.filename },
            "display_status": { "progress": self.progress },
            "heater_bed": { "temperature": self.bed_temp, "target": self.bed_target },
            "extruder": { "temperature": self.extruder_temp, "target": self.extruder_target },
            "toolhead": { "position": [self.position_x, self.position_y, self.position_z, 0.0] },
            "idle_timeout": { "state": self.idle_state },
        })
    }

    /// True if any heater has a target set.
    pub fn is_heating(&self) -> bool {
        self.bed_target > 0.0 || self.extruder_target > 0.0
    }

    /// True if any heater reads above ambient.
    pub fn is_hot(&self) -> bool {
        self.bed_temp > AMBIENT_HOT_THRESHOLD || self.extruder_temp > AMBIENT_HOT_THRESHOLD
    }

    /// True if every heater with a nonzero target is within `tolerance` of
    /// it. Heaters with no target do not count against this.
    pub fn at_temp(&self, tolerance: f64) -> bool {
        let bed_ok = self.bed_target == 0.0 || (self.bed_temp - self.bed_target).abs() <= tolerance;
        let ext_ok = self.extruder_target == 0.0
            || (self.extruder_temp - self.extruder_target).abs() <= tolerance;
        bed_ok && ext_ok
    }

    /// True if any heater sits more than `threshold` below its target.
    pub fn clearly_heating(&self, threshold: f64) -> bool {
        if self.bed_target > 0.0 && (self.bed_target - self.bed_temp) > threshold {
            return true;
        }
        if self.extruder_target > 0.0 && (self.extruder_target - self.extruder_temp) > threshold {
            return true;
        }
        false
    }
}
