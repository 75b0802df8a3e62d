//! Integration tests for the probe chain: thresholds, stickiness, priority,
//! and agreement with the decision tree over a full lifecycle.

use std::sync::Arc;

use serde_json::json;

use lumen_rs::clock::ManualClock;
use lumen_rs::detector::{
    BoredProbe, DetectionStrategyKind, ProbeCtx, ProbeSet, SleepProbe, StateDetector, StateProbe,
};
use lumen_rs::state::{PrinterEvent, PrinterState};

const T0: f64 = 1000.0;

fn ctx(last: PrinterEvent, state_enter_time: f64, now: f64) -> ProbeCtx {
    ProbeCtx {
        last_event: last,
        state_enter_time,
        now,
        bored_timeout: 300.0,
        sleep_timeout: 600.0,
    }
}

fn quiet_status() -> serde_json::Value {
    json!({
        "webhooks": {"state": "ready"},
        "print_stats": {"state": "standby"},
        "heater_bed": {"temperature": 24.0, "target": 0.0},
        "extruder": {"temperature": 24.0, "target": 0.0},
        "idle_timeout": {"state": "Idle"},
    })
}

#[test]
fn bored_probe_fires_at_the_timeout_boundary() {
    let status = quiet_status();
    assert!(!BoredProbe.detect(&status, &ctx(PrinterEvent::Idle, T0, T0 + 299.0)));
    assert!(BoredProbe.detect(&status, &ctx(PrinterEvent::Idle, T0, T0 + 300.0)));
}

#[test]
fn bored_probe_is_sticky_once_entered() {
    let status = quiet_status();
    assert!(BoredProbe.detect(&status, &ctx(PrinterEvent::Bored, T0, T0 + 1.0)));
}

#[test]
fn bored_probe_never_fires_from_active_states() {
    let status = quiet_status();
    for last in [
        PrinterEvent::Heating,
        PrinterEvent::Printing,
        PrinterEvent::Cooldown,
        PrinterEvent::Error,
    ] {
        assert!(!BoredProbe.detect(&status, &ctx(last, T0, T0 + 10_000.0)));
    }
}

#[test]
fn bored_probe_respects_the_activity_guard() {
    let status = json!({
        "extruder": {"temperature": 30.0, "target": 210.0},
    });
    assert!(!BoredProbe.detect(&status, &ctx(PrinterEvent::Idle, T0, T0 + 10_000.0)));
}

#[test]
fn sleep_probe_fires_only_from_bored() {
    let status = quiet_status();
    assert!(!SleepProbe.detect(&status, &ctx(PrinterEvent::Bored, T0, T0 + 599.0)));
    assert!(SleepProbe.detect(&status, &ctx(PrinterEvent::Bored, T0, T0 + 600.0)));
    // Straight from idle there is no path to sleep, however long it's been.
    assert!(!SleepProbe.detect(&status, &ctx(PrinterEvent::Idle, T0, T0 + 10_000.0)));
}

#[test]
fn sleep_probe_is_sticky_until_activity() {
    let status = quiet_status();
    assert!(SleepProbe.detect(&status, &ctx(PrinterEvent::Sleep, T0, T0 + 1.0)));

    let heater_on = json!({
        "heater_bed": {"temperature": 25.0, "target": 60.0},
    });
    assert!(!SleepProbe.detect(&heater_on, &ctx(PrinterEvent::Sleep, T0, T0 + 1.0)));
}

#[test]
fn chain_lets_sleep_pre_empt_sticky_bored() {
    let set = ProbeSet::with_core_probes();
    let status = quiet_status();
    // Bored long enough for the deeper tier: sleep must win even though
    // the bored probe would also report true.
    assert_eq!(
        set.evaluate(&status, &ctx(PrinterEvent::Bored, T0, T0 + 600.0)),
        PrinterEvent::Sleep
    );
    assert_eq!(
        set.evaluate(&status, &ctx(PrinterEvent::Bored, T0, T0 + 599.0)),
        PrinterEvent::Bored
    );
}

#[test]
fn chain_defaults_to_idle_when_nothing_fires() {
    let set = ProbeSet::with_core_probes();
    assert_eq!(
        set.evaluate(&quiet_status(), &ctx(PrinterEvent::Idle, T0, T0 + 1.0)),
        PrinterEvent::Idle
    );
}

#[test]
fn chain_agrees_with_tree_across_a_lifecycle() {
    let clock = Arc::new(ManualClock::new(T0));
    let mut tree = StateDetector::new(20.0, 30.0).with_clock(clock.clone());
    let mut chain = StateDetector::new(20.0, 30.0)
        .with_clock(clock.clone())
        .with_strategy(DetectionStrategyKind::Probes.build());

    let script: &[(f64, serde_json::Value)] = &[
        (1.0, quiet_status()),
        (2.0, json!({
            "extruder": {"temperature": 50.0, "target": 200.0},
            "idle_timeout": {"state": "Printing"},
        })),
        (5.0, json!({
            "print_stats": {"state": "printing", "filename": "part.gcode"},
            "extruder": {"temperature": 200.0, "target": 200.0},
        })),
        (8.0, json!({
            "print_stats": {"state": "complete"},
            "extruder": {"temperature": 180.0, "target": 0.0},
            "heater_bed": {"temperature": 55.0, "target": 0.0},
        })),
        (10.0, json!({
            "extruder": {"temperature": 28.0, "target": 0.0},
            "heater_bed": {"temperature": 26.0, "target": 0.0},
            "idle_timeout": {"state": "Idle"},
        })),
        (29.0, json!({})),
        (30.0, json!({})),
        (59.0, json!({})),
        (60.0, json!({})),
        (62.0, json!({
            "extruder": {"temperature": 28.0, "target": 210.0},
        })),
    ];

    let mut tree_state = PrinterState::default();
    let mut chain_state = PrinterState::default();
    let mut tree_events = Vec::new();
    let mut chain_events = Vec::new();

    for (offset, delta) in script {
        clock.set(T0 + offset);
        tree_state.update_from_status(delta);
        chain_state.update_from_status(delta);
        if let Some(event) = tree.update(&tree_state) {
            tree_events.push(event);
        }
        if let Some(event) = chain.update(&chain_state) {
            chain_events.push(event);
        }
    }

    let expected = vec![
        PrinterEvent::Heating,
        PrinterEvent::Printing,
        PrinterEvent::Cooldown,
        PrinterEvent::Idle,
        PrinterEvent::Bored,
        PrinterEvent::Sleep,
        PrinterEvent::Heating,
    ];
    assert_eq!(tree_events, expected);
    assert_eq!(chain_events, expected);
}
