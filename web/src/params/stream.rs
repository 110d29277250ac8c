use axum::http::HeaderMap;
use serde::Deserialize;
use sse::{filter::parse_filter_list, ConnectionOptions};
use utoipa::IntoParams;

/// Header browsers send on automatic reconnects.
pub(crate) const LAST_EVENT_ID_HEADER: &str = "last-event-id";

/// Query parameters accepted when opening an event stream.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub(crate) struct StreamParams {
    /// Comma-separated event names to receive; `*` or nothing means all.
    #[param(example = "job.completed,job.failed")]
    pub filters: Option<String>,
    /// Id of the last event the client saw. Echoed back only; nothing is replayed.
    pub last_event_id: Option<String>,
    /// Requested heartbeat interval in milliseconds, clamped by the server.
    pub heartbeat_interval: Option<u64>,
}

impl StreamParams {
    /// Engine options for this stream. The query's `lastEventId` wins over
    /// the `Last-Event-ID` header.
    pub(crate) fn into_options(self, headers: &HeaderMap) -> ConnectionOptions {
        let last_event_id = self.last_event_id.filter(|id| !id.is_empty()).or_else(|| {
            headers
                .get(LAST_EVENT_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .filter(|id| !id.is_empty())
                .map(str::to_string)
        });

        ConnectionOptions {
            event_filters: self
                .filters
                .as_deref()
                .map(parse_filter_list)
                .unwrap_or_default(),
            heartbeat_interval_ms: self.heartbeat_interval,
            last_event_id,
            ..Default::default()
        }
    }
}
