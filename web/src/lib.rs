use axum::http::{
    header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use log::*;
use service::AppState;
use std::future::Future;
use tower_http::cors::CorsLayer;

mod controller;
mod error;
pub(crate) mod extractors;
pub(crate) mod params;
pub mod router;
pub(crate) mod sse;

pub use error::{Error, Result};

/// Binds the configured interface/port and serves the router until
/// `shutdown_signal` resolves.
///
/// Event streams never finish on their own, so the shutdown future is
/// expected to close every open connection before it returns, otherwise the
/// graceful shutdown would wait on them forever.
pub async fn init_server<F>(app_state: AppState, shutdown_signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listen_address = app_state.config.listen_address();
    info!("Server starting... listening for connections on http://{listen_address}");

    let cors_layer = cors_layer(&app_state.config.allowed_origins);
    let listener = tokio::net::TcpListener::bind(&listen_address).await?;

    axum::serve(listener, router::define_routes(app_state).layer(cors_layer))
        .with_graceful_shutdown(shutdown_signal)
        .await
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();
    debug!("allowed_origins: {:#?}", origins);

    CorsLayer::new()
        .allow_methods([Method::DELETE, Method::GET, Method::OPTIONS, Method::PUT])
        .allow_credentials(true)
        .allow_headers([
            ACCEPT,
            CACHE_CONTROL,
            CONTENT_TYPE,
            HeaderName::from_static(extractors::tenant_context::TENANT_HEADER),
            HeaderName::from_static(extractors::tenant_context::USER_HEADER),
            HeaderName::from_static(params::stream::LAST_EVENT_ID_HEADER),
        ])
        .allow_origin(origins)
}
