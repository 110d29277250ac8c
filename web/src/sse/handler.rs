use crate::extractors::tenant_context::TenantContext;
use crate::params::stream::StreamParams;
use crate::Error;
use async_stream::stream;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, Sse};
use futures::Stream;
use log::*;
use service::AppState;
use sse::transport::ChannelTransport;
use sse::{ConnectionId, Manager};
use std::convert::Infallible;
use std::sync::Arc;

/// Releases the engine's connection when the response body is dropped,
/// which is how a client disconnect shows up on this side.
struct ConnectionGuard {
    manager: Arc<Manager>,
    connection_id: ConnectionId,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.manager.release_connection(&self.connection_id) {
            debug!("SSE client for connection {} went away", self.connection_id);
        }
    }
}

/// Opens a long-lived event stream for the caller's tenant.
#[utoipa::path(
    get,
    path = "/events/stream",
    params(
        StreamParams,
        ("x-tenant-id" = String, Header, description = "Tenant resolved by the gateway"),
        ("x-user-id" = Option<String>, Header, description = "User resolved by the gateway"),
    ),
    responses(
        (status = 200, description = "Stream of tenant events", body = String, content_type = "text/event-stream"),
        (status = 400, description = "No tenant on the request"),
        (status = 503, description = "Connection capacity exceeded"),
    )
)]
pub(crate) async fn sse_handler(
    TenantContext { tenant_id, user_id }: TenantContext,
    State(app_state): State<AppState>,
    Query(params): Query<StreamParams>,
    headers: HeaderMap,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, Error> {
    debug!("Establishing SSE connection for tenant {tenant_id}");

    let manager = Arc::clone(&app_state.sse_manager);
    let (transport, mut rx) = ChannelTransport::new(manager.config().connection_buffer_size);

    let connection_id = manager
        .create_connection(
            tenant_id,
            Arc::new(transport),
            user_id,
            params.into_options(&headers),
        )
        .await?;

    let guard = ConnectionGuard {
        manager,
        connection_id,
    };

    // The stream ends once the engine closes the transport and the buffered
    // frames have drained.
    let stream = stream! {
        let _guard = guard;
        while let Some(frame) = rx.recv().await {
            match frame.into_sse_event() {
                Ok(event) => yield Ok::<_, Infallible>(event),
                Err(e) => warn!("Dropping frame for connection {}: {}", _guard.connection_id, e),
            }
        }
        debug!("SSE stream for connection {} closed by the server", _guard.connection_id);
    };

    Ok(Sse::new(stream))
}
