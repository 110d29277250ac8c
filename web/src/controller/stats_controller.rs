use crate::controller::ApiResponse;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use service::AppState;

/// GET a snapshot of push engine statistics
#[utoipa::path(
    get,
    path = "/events/stats",
    responses(
        (status = 200, description = "Connection counts per tenant, events sent, average latency and uptime"),
    )
)]
pub async fn read(State(app_state): State<AppState>) -> impl IntoResponse {
    let stats = app_state.sse_manager_ref().get_stats();
    Json(ApiResponse::new(StatusCode::OK.into(), stats))
}
