use axum::Json;

use super::types::{API_RUNNING, StatusResponse};

/// GET /api/status
///
/// Liveness probe. No authentication and no dependency checks.
pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse {
        status: API_RUNNING.to_string(),
    })
}
