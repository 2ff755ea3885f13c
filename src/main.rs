use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use netexp::config::Args;
use netexp::metrics::{duration_label, Engine};
use netexp::netdev::NetDev;
use netexp::{collector, logging, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let args = Args::parse();

    // ── 1. Validate windows and build the engine ─────────────────
    let engine = Engine::new(args.engine_config()).context("invalid configuration")?;

    // ── 2. Counter source ────────────────────────────────────────
    let sampler = NetDev::new(&args.host_proc, args.iface_regexp.clone());
    info!(
        path = %sampler.path().display(),
        interval = %duration_label(args.interval),
        burst_windows = %args.burst_windows,
        output_windows = %args.output_windows,
        "starting collector"
    );

    // ── 3. Shared state + collector task ─────────────────────────
    let state = Arc::new(AppState::new());
    let collector = tokio::spawn(collector::run(sampler, engine, Arc::clone(&state.snapshot)));

    // ── 4. Bind & serve ──────────────────────────────────────────
    let app = server::create_router(state);
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("could not bind {}", args.listen))?;
    info!(listen = %args.listen, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server exited with error")?;

    collector.abort();
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
