//! HTTP surface of the calendar server.

mod handlers;

pub use handlers::{
    event_handler, health_handler, merkliste_handler, metrics_handler, plain_calendar_handler,
    ApiError,
};

use crate::components::CalendarBuilder;
use crate::error::AppResult;
use axum::{routing::get, Router};
use prometheus::Registry;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state of all handlers
#[derive(Clone)]
pub struct AppState {
    pub builder: Arc<CalendarBuilder>,
    /// Metrics served on `/metrics`
    pub registry: Registry,
}

impl AppState {
    /// Create the state and register the cache metrics of `builder`
    pub fn new(builder: CalendarBuilder) -> AppResult<Self> {
        let registry = Registry::new();
        builder.gateway().register_metrics(&registry)?;
        Ok(Self {
            builder: Arc::new(builder),
            registry,
        })
    }
}

/// Build the router with all routes
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/merkliste/{user}", get(merkliste_handler))
        .route("/events/{id}", get(event_handler))
        .route("/{user}", get(plain_calendar_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
