//! ==============================================================================
//! main.rs - sensor relay entry point
//! ==============================================================================
//!
//! purpose:
//!     relays distance / signal-state readings from a sensor board on a
//!     serial line to browsers in real time, and serves the live dashboard.
//!
//! responsibilities:
//!     - load configuration (relay.toml + command line overrides)
//!     - set up structured logging
//!     - start the single device read loop (blocking thread)
//!     - serve dashboard, snapshot api and websocket push channel
//!     - shut down in order on ctrl-c: stop reading, close the port, exit
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                      relay (this file)                       │
//!     │                                                              │
//!     │  serial ──► framer ──► parser ──► hub ──┬──► ws client 1     │
//!     │  (blocking thread)                 │    ├──► ws client 2     │
//!     │                                  cache  └──► ws client N     │
//!     │                                    │                         │
//!     │                          /api/status, /api/health            │
//!     └──────────────────────────────────────────────────────────────┘
//!
//! relationships:
//!     - pipeline.rs: device loop (framer.rs + parser.rs -> hub.rs)
//!     - api.rs: http routes, ws.rs: per-client push
//!
//! ==============================================================================

mod api;
mod cache;
mod config;
mod domain;
mod error;
mod framer;
mod hub;
mod parser;
mod pipeline;
mod serial;
mod ws;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sensor-relay", about = "Relay serial sensor readings to web clients")]
struct Cli {
    /// Path to relay.toml (defaults to config/relay.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port of the sensor board, overrides [serial].port
    #[arg(short, long)]
    port: Option<String>,

    /// Serial data rate, overrides [serial].baud_rate
    #[arg(short, long)]
    baud_rate: Option<u32>,

    /// Print the serial ports this machine can see and exit
    #[arg(long)]
    list_ports: bool,
}

// ==============================================================================
// main entry point
// ==============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.list_ports {
        return print_ports();
    }

    // startup banner
    println!("===========================================================");
    println!("  Sensor Relay - Traffic Light Detector");
    println!("===========================================================");

    // step 1: load configuration
    let config = config::RelayConfig::load_or_default(cli.config.as_deref())?
        .with_overrides(cli.port, cli.baud_rate)?;
    config.print_summary();

    // step 2: logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("invalid logging.level")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // step 3: shared state - one cache, one hub, one device link
    let hub = Arc::new(hub::BroadcastHub::new(
        cache::StateCache::new(),
        config.server.subscriber_queue,
    ));
    let link = serial::LinkState::new();
    let shutdown = Arc::new(AtomicBool::new(false));

    // step 4: device loop
    let parser = parser::ReadingParser::new(config.diagnostics.suppressed.clone());
    let pipeline = Arc::new(pipeline::Pipeline::new(parser, Arc::clone(&hub), &config.logging));
    let device_loop = pipeline::spawn_device_loop(
        config.serial.clone(),
        pipeline,
        link.clone(),
        Arc::clone(&shutdown),
    );

    // step 5: web server until ctrl-c
    let app = api::router(api::ApiState {
        hub,
        link,
        heartbeat: Duration::from_secs(config.server.heartbeat_seconds),
    });
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(address = %addr, "dashboard live at http://{}", addr);
    tracing::info!("api endpoint: http://{}/api/status", addr);
    tracing::info!("port list:    http://{}/api/ports", addr);

    let signal_flag = Arc::clone(&shutdown);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
            signal_flag.store(true, Ordering::SeqCst);
        })
        .await
        .context("web server error")?;

    // make sure the port is closed even if the server ended on its own
    shutdown.store(true, Ordering::SeqCst);
    if let Err(e) = device_loop.await {
        tracing::error!(error = %e, "device loop panicked");
    }
    tracing::info!("relay stopped");
    Ok(())
}

fn print_ports() -> Result<()> {
    let ports = serial::list_ports().context("failed to enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for p in ports {
        println!(
            "{}  {}  {}",
            p.path,
            p.manufacturer.as_deref().unwrap_or("-"),
            p.serial_number.as_deref().unwrap_or("-"),
        );
    }
    Ok(())
}
