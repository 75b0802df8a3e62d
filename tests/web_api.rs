//! Integration tests for the HTTP control surface.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use std::sync::Arc;

use lumen_rs::clock::ManualClock;
use lumen_rs::config::LumenConfig;
use lumen_rs::driver::ProxyDriver;
use lumen_rs::engine::LumenEngine;
use lumen_rs::web::api::create_router;
use lumen_rs::web::engine_channel::EngineRequest;

/// Router backed by a live engine task on a frozen clock. The returned
/// shutdown sender must stay alive for the duration of the test; dropping
/// it stops the engine.
fn test_app() -> (Router, tokio::sync::broadcast::Sender<()>) {
    let config = LumenConfig::default();
    let clock = Arc::new(ManualClock::new(1000.0));
    let driver = Box::new(ProxyDriver::new(config.strip.led_count));
    let engine = LumenEngine::with_clock(&config, driver, clock);

    let (engine_tx, engine_rx) = tokio::sync::mpsc::channel::<EngineRequest>(16);
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    tokio::spawn(engine.run(engine_rx, shutdown_tx.subscribe()));

    (create_router(engine_tx), shutdown_tx)
}

use serde_json::json;
use tower::util::ServiceExt; // for `oneshot`
use http_body_util::BodyExt; // for .collect().await

#[tokio::test]
async fn test_status_reports_defaults() {
    let (app, _shutdown) = test_app();
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/status")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["strip"], "lumen");
    assert_eq!(json["led_count"], 16);
    assert_eq!(json["active_effect"], "pulse");
    assert_eq!(json["overridden"], false);
    assert_eq!(json["detector"]["current_event"], "idle");
    assert_eq!(json["detector"]["strategy"], "tree");
    assert_eq!(json["printer"]["klipper_state"], "startup");
}

#[tokio::test]
async fn test_push_status_drives_detection() {
    let (app, _shutdown) = test_app();
    let payload = json!({
        "extruder": {"temperature": 180.0, "target": 200.0}
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/status")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/status")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["detector"]["current_event"], "heating");
    assert_eq!(json["active_effect"], "thermal");
    assert_eq!(json["printer"]["extruder_target"], 200.0);
}

#[tokio::test]
async fn test_effect_override_and_clear() {
    let (app, _shutdown) = test_app();
    let payload = json!({
        "effect": "solid",
        "color": "red"
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/effect")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/status")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["overridden"], true);
    assert_eq!(json["active_effect"], "solid");

    // Null effect clears the override and falls back to the detector.
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/effect")
        .header("content-type", "application/json")
        .body(Body::from(json!({"effect": null}).to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/status")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["overridden"], false);
    assert_eq!(json["active_effect"], "pulse");
}

#[tokio::test]
async fn test_effect_unknown_name_rejected() {
    let (app, _shutdown) = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/effect")
        .header("content-type", "application/json")
        .body(Body::from(json!({"effect": "plaid"}).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let error = json["error"].as_str().unwrap();
    assert!(error.contains("unknown effect"), "got: {error}");
}

#[tokio::test]
async fn test_effect_unknown_color_falls_back() {
    let (app, _shutdown) = test_app();
    // Unknown color names are not an error; they resolve to the effect's
    // default with a warning, matching config file handling.
    let payload = json!({
        "effect": "solid",
        "color": "chartreuse-ish"
    });
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/effect")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/status")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["active_effect"], "solid");
}

#[tokio::test]
async fn test_colors_listing() {
    let (app, _shutdown) = test_app();
    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/colors")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let colors = json["colors"].as_array().unwrap();
    assert!(colors.iter().any(|c| c == "moonlight"));
    assert!(colors.iter().any(|c| c == "lava"));
}
