//! wms-daemon entry point.
//!
//! Thin on purpose: load config, connect shared resources, spawn
//! background workers, build the router, serve with graceful shutdown.
//! All route handlers live in `routes.rs`; all shared state lives in
//! `state.rs`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use wms_daemon::auth::StaticCredentialStore;
use wms_daemon::{queue_consumer, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects real environment variables and
    // never ships a `.env.local`.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let settings = wms_config::Settings::load().context("failed to load configuration")?;
    let settings = Arc::new(settings);

    let pool = wms_db::connect(&settings.db.url(), wms_db::PoolLimits::default())
        .await
        .context("failed to connect to Postgres")?;
    wms_db::check_connectivity(&pool)
        .await
        .context("startup connectivity check failed")?;
    wms_db::migrate(&pool).await.context("failed to run migrations")?;

    let events = Arc::new(
        wms_events::EventBus::connect(&settings.pubsub.url(), 1024)
            .await
            .context("failed to connect to Redis")?,
    );
    wms_events::spawn_subscriber(settings.pubsub.url(), events.local_sender());

    let realtime_state =
        wms_realtime::RealtimeState::new(settings.auth.jwt_secret.clone(), events.local_sender());

    let credentials = Arc::new(StaticCredentialStore::new(settings.auth.bcrypt_cost));
    let app_state = Arc::new(AppState::new(
        pool.clone(),
        events.clone(),
        settings.clone(),
        credentials,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let assignment_handle = wms_workers::spawn_assignment_loop(
        pool.clone(),
        events.clone(),
        std::time::Duration::from_secs(settings.assignment.interval_seconds),
        settings.assignment.batch_size,
        shutdown_rx.clone(),
    );
    let metrics_handle = wms_workers::spawn_metrics_loop(
        pool.clone(),
        settings.metrics.run_hour,
        settings.metrics.run_minute,
        settings.metrics.run_on_startup,
        shutdown_rx.clone(),
    );
    let queue_handle = queue_consumer::spawn(
        pool.clone(),
        settings.generation,
        "wms-daemon".to_string(),
        shutdown_rx.clone(),
    );

    let app = routes::build_router(app_state)
        .merge(wms_realtime::build_router(realtime_state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr: SocketAddr = settings
        .bind_addr
        .parse()
        .with_context(|| format!("invalid WMS_DAEMON_ADDR: {}", settings.bind_addr))?;
    info!("wms-daemon listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(assignment_handle, metrics_handle, queue_handle);
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received, draining in-flight requests");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only localhost origins, matching the operator consoles this
/// daemon is meant to serve directly.
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
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers(tower_http::cors::Any)
}
