use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mailrelay_backend::api;
use mailrelay_backend::config::{Config, StoreBackend};
use mailrelay_backend::mail::{SmtpTransportFactory, SystemClock, WebhookDispatcher};
use mailrelay_backend::state::AppState;
use mailrelay_backend::store::{
    create_pool, ConfigStore, EmailLog, MemoryStore, RedisStore, TemplateStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting MailRelay Backend...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        host = %config.server_host,
        port = %config.server_port,
        store = ?config.store_backend,
        "Configuration loaded"
    );

    // Create stores
    let (configs, templates, email_log): (
        Arc<dyn ConfigStore>,
        Arc<dyn TemplateStore>,
        Arc<dyn EmailLog>,
    ) = match config.store_backend {
        StoreBackend::Redis => {
            let pool = create_pool(&config)?;
            let store = Arc::new(RedisStore::new(pool, config.email_log_retention));

            // Test Redis connection
            match store.health_check().await {
                Ok(true) => tracing::info!("Redis connection established"),
                Ok(false) => tracing::warn!("Redis health check returned false"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to connect to Redis");
                    // Continue anyway, might recover later
                }
            }

            (
                store.clone() as Arc<dyn ConfigStore>,
                store.clone() as Arc<dyn TemplateStore>,
                store as Arc<dyn EmailLog>,
            )
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store, data is lost on restart");
            let store = Arc::new(MemoryStore::new(config.email_log_retention));
            (
                store.clone() as Arc<dyn ConfigStore>,
                store.clone() as Arc<dyn TemplateStore>,
                store as Arc<dyn EmailLog>,
            )
        }
    };

    // Notification dispatcher
    let (events, _dispatcher) = WebhookDispatcher::new(
        config.webhook_url.clone(),
        Duration::from_secs(config.webhook_timeout_seconds),
        config.event_queue_capacity,
    )?
    .spawn();
    if let Some(url) = &config.webhook_url {
        tracing::info!(url = %url, "Webhook notifications enabled");
    }

    // Create application state
    let factory = Arc::new(SmtpTransportFactory::new(Duration::from_secs(
        config.smtp_timeout_seconds,
    )));
    let state = AppState::new(
        config.clone(),
        configs,
        templates,
        email_log,
        factory,
        Arc::new(SystemClock::new()),
        events,
    );

    // Build router
    let app = Router::new()
        .merge(api::create_router(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr: SocketAddr = config.server_addr().parse()?;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(address = %addr, "Server listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Handle shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, shutting down...");
        },
    }
}
