//! rcl-daemon entry point.
//!
//! Thin on purpose: tracing, config load, boot, middleware, serve. Ctrl-C
//! stops the HTTP server first, then lets every account loop finish its
//! current tick.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use rcl_config::load_control_document;
use rcl_daemon::{boot, reload, routes, state};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

const DEFAULT_CONFIG: &str = "config/control.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Production injects env
    // vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let paths = config_paths_from_env();
    let (loaded, doc) = load_control_document(&paths)?;
    info!(config_hash = %loaded.config_hash, paths = ?paths, "control document loaded");

    let daemon = boot::boot(&loaded, &doc).await?;
    let shared = daemon.state.clone();

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let _watcher = if doc.daemon.watch_config {
        Some(reload::spawn_config_watcher(shared.clone(), paths.clone())?)
    } else {
        None
    };

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = match bind_addr_from_env() {
        Some(a) => a,
        None => doc
            .daemon
            .addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid daemon.addr {}", doc.daemon.addr))?,
    };
    info!("rcl-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    info!("stopping account loops");
    daemon.fleet.shutdown().await;
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    info!("shutdown requested");
}

/// `RCL_CONFIG` holds comma-separated layer paths, base first.
fn config_paths_from_env() -> Vec<PathBuf> {
    match std::env::var("RCL_CONFIG") {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect(),
        _ => vec![PathBuf::from(DEFAULT_CONFIG)],
    }
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("RCL_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
