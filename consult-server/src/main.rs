//! climate-consult entry point

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use consult_server::{build_router, config::ServerConfig, AppState};

#[tokio::main]
async fn main() {
    // .env is optional; real environment variables win
    dotenv::dotenv().ok();

    // Load configuration
    let config_path = std::env::var("CONSULT_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let (config, config_error) = match ServerConfig::load(
        std::path::Path::new(&config_path)
            .exists()
            .then_some(config_path.as_str()),
    ) {
        Ok(config) => (config, None),
        Err(e) => {
            let mut config = ServerConfig::default();
            config.apply_env(|key| std::env::var(key).ok());
            (config, Some(e.to_string()))
        }
    };

    // Initialize logging
    let json_logs = config.log.format.eq_ignore_ascii_case("json");
    tracing_subscriber::registry()
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level)),
        )
        .init();

    tracing::info!("Starting climate-consult server...");
    if let Some(e) = config_error {
        tracing::warn!("Failed to load config, using defaults: {}", e);
    }

    let missing = config.missing_settings();
    if !missing.is_empty() {
        tracing::warn!("Missing settings: {}", missing.join(", "));
    }

    let http = consult_upstream::build_client(config.http_timeout()).unwrap_or_else(|e| {
        tracing::error!("Failed to build HTTP client: {}", e);
        std::process::exit(1);
    });

    tracing::info!(
        fhir = %config.smart.api_base,
        model = %config.google.gemini_model,
        "Upstream services configured"
    );

    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState::new(config, http));

    // Build router
    let app = build_router(state);

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Server error: {}", e);
        });

    tracing::info!("Server shut down gracefully");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
