// src/main.rs - lumen-host service entry point
use clap::Parser;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::LocalSet;

use lumen_rs::config;
use lumen_rs::driver::{create_driver, TracingGcodeSink};
use lumen_rs::engine::LumenEngine;
use lumen_rs::web;
use lumen_rs::web::engine_channel::EngineRequest;

#[derive(Parser, Debug)]
#[command(name = "lumen-host", about = "Printer-state-driven LED controller", version)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "lumen.toml")]
    config: String,
    /// Override the web API bind address from the config.
    #[arg(long)]
    bind: Option<String>,
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::info!("Starting lumen LED service");
    tracing::info!("Loading configuration from: {}", args.config);

    let config = config::load_config(&args.config).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", args.config, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;

    tracing::info!(
        "Strip: {} ({} LEDs @ {} fps, {:?} driver)",
        config.strip.name,
        config.strip.led_count,
        config.strip.fps,
        config.driver.kind
    );

    let sink = Arc::new(TracingGcodeSink);
    let driver = create_driver(&config.driver, config.strip.led_count, sink);
    let engine = LumenEngine::new(&config, driver);

    // Channel between the Axum handlers and the engine task.
    let (engine_tx, engine_rx) = mpsc::channel::<EngineRequest>(16);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    let bind_addr = args.bind.unwrap_or_else(|| config.web.bind_addr.clone());

    // A LocalSet keeps all service tasks on this thread.
    let local = LocalSet::new();

    let engine_shutdown = shutdown_tx.subscribe();
    local.spawn_local(async move {
        engine.run(engine_rx, engine_shutdown).await;
    });

    let signal_tx = shutdown_tx.clone();
    local.spawn_local(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown signal received");
            let _ = signal_tx.send(());
        }
    });

    let app = web::api::create_router(engine_tx);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Web API listening on http://{}", listener.local_addr()?);

    let mut serve_shutdown = shutdown_tx.subscribe();
    local.spawn_local(async move {
        let shutdown = async move {
            let _ = serve_shutdown.recv().await;
        };
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            tracing::error!("web server error: {}", e);
        }
    });

    local.await;
    tracing::info!("lumen LED service stopped");

    Ok(())
}
