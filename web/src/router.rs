use crate::controller::{connection_controller, health_check_controller, stats_controller};
use crate::{params, sse::handler as sse_handler};
use axum::{
    routing::{delete, get, put},
    Router,
};
use service::AppState;

use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;

// This is the global definition of our OpenAPI document. To be a part
// of the rendered document, a path and schema must be listed here.
#[derive(OpenApi)]
#[openapi(
        info(
            title = "Tenant Push API"
        ),
        paths(
            connection_controller::index,
            connection_controller::update_filters,
            connection_controller::delete,
            health_check_controller::health_check,
            sse_handler::sse_handler,
            stats_controller::read,
        ),
        components(
            schemas(
                params::connection::UpdateFiltersParams,
            )
        ),
        tags(
            (name = "tenant_push_rs", description = "Tenant-scoped real-time event push")
        )
    )]
struct ApiDoc;

pub fn define_routes(app_state: AppState) -> Router {
    Router::new()
        .merge(event_stream_routes(app_state.clone()))
        .merge(connection_routes(app_state.clone()))
        .merge(stats_routes(app_state))
        .merge(health_routes())
        .merge(RapiDoc::with_openapi("/api-docs/openapi.json", ApiDoc::openapi()).path("/rapidoc"))
}

fn event_stream_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events/stream", get(sse_handler::sse_handler))
        .with_state(app_state)
}

fn connection_routes(app_state: AppState) -> Router {
    Router::new()
        .route(
            "/events/tenants/:tenant_id/connections",
            get(connection_controller::index),
        )
        .route(
            "/events/connections/:id/filters",
            put(connection_controller::update_filters),
        )
        .route(
            "/events/connections/:id",
            delete(connection_controller::delete),
        )
        .with_state(app_state)
}

fn stats_routes(app_state: AppState) -> Router {
    Router::new()
        .route("/events/stats", get(stats_controller::read))
        .with_state(app_state)
}

fn health_routes() -> Router {
    Router::new().route("/health", get(health_check_controller::health_check))
}
