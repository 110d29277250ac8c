use crate::controller::ApiResponse;
use crate::params::connection::UpdateFiltersParams;
use crate::{Error, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use log::*;
use service::AppState;
use sse::ConnectionId;

/// GET all open connections for a tenant
#[utoipa::path(
    get,
    path = "/events/tenants/{tenant_id}/connections",
    params(
        ("tenant_id" = String, Path, description = "Tenant to list connections for", example = "acme"),
    ),
    responses(
        (status = 200, description = "Successfully retrieved the tenant's connections"),
    )
)]
pub async fn index(
    State(app_state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> impl IntoResponse {
    debug!("GET connections for tenant: {tenant_id}");

    let connections = app_state
        .sse_manager_ref()
        .get_tenant_connections(&tenant_id);

    Json(ApiResponse::new(StatusCode::OK.into(), connections))
}

/// PUT replace the allow-list of an open connection
#[utoipa::path(
    put,
    path = "/events/connections/{id}/filters",
    params(
        ("id" = String, Path, description = "Connection id to update"),
    ),
    request_body = UpdateFiltersParams,
    responses(
        (status = 204, description = "Successfully replaced the connection's event filters"),
        (status = 404, description = "Connection not found"),
    )
)]
pub async fn update_filters(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(params): Json<UpdateFiltersParams>,
) -> Result<impl IntoResponse> {
    let connection_id = ConnectionId::from(id);
    if !app_state
        .sse_manager_ref()
        .update_connection_filters(&connection_id, params.event_filters)
    {
        return Err(Error::ConnectionNotFound(connection_id.to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE close an open connection
#[utoipa::path(
    delete,
    path = "/events/connections/{id}",
    params(
        ("id" = String, Path, description = "Connection id to close"),
    ),
    responses(
        (status = 204, description = "Successfully closed the connection"),
        (status = 404, description = "Connection not found"),
    )
)]
pub async fn delete(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse> {
    let connection_id = ConnectionId::from(id);
    if !app_state.sse_manager_ref().remove_connection(&connection_id) {
        return Err(Error::ConnectionNotFound(connection_id.to_string()));
    }

    info!("Closed connection {connection_id} on request");
    Ok(StatusCode::NO_CONTENT)
}
