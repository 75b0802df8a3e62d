// Benchmark for effect rendering and full engine frame dispatch
// Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

use lumen_rs::clock::ManualClock;
use lumen_rs::config::LumenConfig;
use lumen_rs::driver::ProxyDriver;
use lumen_rs::effects::{disco_seed, effect_disco, effect_fill, EffectState};
use lumen_rs::engine::LumenEngine;

fn bench_gradient_fill(c: &mut Criterion) {
    let state = EffectState::default();
    c.bench_function("fill 100-LED gradient at 60%", |b| {
        b.iter(|| {
            let frame = effect_fill(&state, 0.6, 100);
            assert_eq!(frame.len(), 100);
        });
    });
}

fn bench_disco_frame(c: &mut Criterion) {
    let mut state = EffectState {
        max_sparkle: 30,
        ..EffectState::default()
    };
    let mut now = 1000.0;
    c.bench_function("disco frame on 100 LEDs", |b| {
        b.iter(|| {
            // Step past the update gate so every iteration renders.
            now += 1.0;
            let mut rng = StdRng::seed_from_u64(disco_seed(now));
            let (frame, updated) = effect_disco(&mut state, now, 100, &mut rng);
            assert!(updated);
            assert_eq!(frame.len(), 100);
        });
    });
}

fn bench_engine_render(c: &mut Criterion) {
    let config = LumenConfig::default();
    let clock = Arc::new(ManualClock::new(1000.0));
    let driver = Box::new(ProxyDriver::new(config.strip.led_count));
    let mut engine = LumenEngine::with_clock(&config, driver, clock);
    engine.handle_status(&serde_json::json!({
        "heater_bed": {"temperature": 42.0, "target": 60.0}
    }));
    c.bench_function("engine thermal frame, 16 LEDs", |b| {
        b.iter(|| {
            let frame = engine.render_frame(1000.0).unwrap();
            assert_eq!(frame.len(), 16);
        });
    });
}

criterion_group!(
    benches,
    bench_gradient_fill,
    bench_disco_frame,
    bench_engine_render
);
criterion_main!(benches);
