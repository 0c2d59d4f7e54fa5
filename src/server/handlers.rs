use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::TextEncoder;
use tracing::error;

use super::AppState;
use crate::components::{MergeMode, OutputCalendar};
use crate::error::GatewayError;

const CALENDAR_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// What a failed lookup was looking for
#[derive(Debug, Clone, Copy)]
enum Resource {
    User,
    Event,
}

/// Error response of the calendar endpoints
#[derive(Debug)]
pub struct ApiError {
    resource: Resource,
    id: String,
    error: GatewayError,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.error.is_not_found() {
            let message = match self.resource {
                Resource::User => format!("Invalid User ID: {}", self.id),
                Resource::Event => format!("Invalid Event ID: {}", self.id),
            };
            return (StatusCode::NOT_FOUND, message).into_response();
        }

        error!(id = %self.id, error = %self.error, "upstream failure");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            StatusCode::SERVICE_UNAVAILABLE
                .canonical_reason()
                .unwrap_or("Service Unavailable"),
        )
            .into_response()
    }
}

fn calendar_response(calendar: OutputCalendar) -> Response {
    (
        [(header::CONTENT_TYPE, CALENDAR_CONTENT_TYPE)],
        calendar.to_ics(),
    )
        .into_response()
}

/// Subscribers usually add `.ics` to the user id
fn trim_ics_suffix(id: &str) -> &str {
    id.strip_suffix(".ics").unwrap_or(id)
}

async fn user_calendar(state: AppState, user: String, mode: MergeMode) -> Result<Response, ApiError> {
    let user_id = trim_ics_suffix(&user);
    state
        .builder
        .build_calendar(user_id, mode)
        .await
        .map(calendar_response)
        .map_err(|error| ApiError {
            resource: Resource::User,
            id: user_id.to_string(),
            error,
        })
}

/// Calendar of a user's favorites merged with each event's feed
pub async fn merkliste_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Response, ApiError> {
    user_calendar(state, user, MergeMode::WithFeeds).await
}

/// Calendar of a user's favorites from event details only
pub async fn plain_calendar_handler(
    State(state): State<AppState>,
    Path(user): Path<String>,
) -> Result<Response, ApiError> {
    user_calendar(state, user, MergeMode::DetailsOnly).await
}

/// Calendar with a single event
pub async fn event_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let event_id = trim_ics_suffix(&id);
    state
        .builder
        .build_event_calendar(event_id)
        .await
        .map(calendar_response)
        .map_err(|error| ApiError {
            resource: Resource::Event,
            id: event_id.to_string(),
            error,
        })
}

/// Prometheus text exposition of the cache metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match TextEncoder::new().encode_to_string(&state.registry.gather()) {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Handler for health check
pub async fn health_handler() -> &'static str {
    "OK"
}
