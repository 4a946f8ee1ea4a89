//! climate-consult - SMART-on-FHIR environmental health consultation
//!
//! Launched from an EHR, fetches the patient's record, the air quality and
//! weather at their address, and asks a generative model for a consultation.

pub mod config;
pub mod error;
pub mod handlers;
pub mod page;
pub mod pipeline;
pub mod session;
pub mod smart;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use config::ServerConfig;
use pipeline::Services;
use session::SessionStore;

/// Application state
pub struct AppState {
    pub config: ServerConfig,
    pub services: Services,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: ServerConfig, http: reqwest::Client) -> Self {
        let services = Services::from_config(&config, http);
        Self {
            config,
            services,
            sessions: SessionStore::new(),
        }
    }
}

/// Build the application router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::health_check))
        // SMART launch
        .route("/launch", get(handlers::launch::launch))
        .route("/redirect_uri", get(handlers::launch::redirect_uri))
        // Consultation
        .route("/visualization", get(handlers::consultation::visualization))
        .route("/api/consultation", get(handlers::consultation::api_consultation))
        // Middleware
        .layer(RequestBodyLimitLayer::new(64 * 1024))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
