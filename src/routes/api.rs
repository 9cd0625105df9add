//! Read-only REST views of the policy and the live pages.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use policy::{ErrorCode, Policy};
use tracing::warn;

use crate::coordinator::CoordinatorError;
use crate::pages::PageSummary;
use crate::state::AppState;

/// `GET /api/state` — current stored policy.
pub async fn get_state(State(state): State<AppState>) -> Result<Json<Policy>, StatusCode> {
    state.coordinator.get_policy().await.map(Json).map_err(coordinator_error_to_status)
}

/// `GET /api/pages` — attached pages with their last badge.
pub async fn list_pages(State(state): State<AppState>) -> Json<Vec<PageSummary>> {
    Json(state.pages.list().await)
}

pub(crate) fn coordinator_error_to_status(err: CoordinatorError) -> StatusCode {
    warn!(error = %err, code = err.error_code(), "api: request failed");
    match err {
        CoordinatorError::InvalidHostname(_) => StatusCode::BAD_REQUEST,
        CoordinatorError::Store(_) | CoordinatorError::Stopped => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
