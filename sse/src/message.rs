//! Wire format for pushed events.
//!
//! Each event becomes one [`Frame`]: the SSE `id`, `event` and `retry`
//! fields plus a JSON `data` object holding the payload fields and the
//! envelope (`timestamp`, `tenantId`, `userId`, `metadata`). Frames travel
//! through a connection's transport as values and are turned into axum
//! [`SseEvent`]s where the HTTP body is produced.

use crate::error::Error;
use axum::response::sse::Event as SseEvent;
use chrono::SecondsFormat;
use events::Event;
use serde_json::{Map, Value};
use std::time::Duration;

/// Builds the `data:` object for an event.
///
/// Payload fields are spread at the top level; a non-object payload lands
/// under `value`. The envelope keys always win over payload keys.
pub fn data_object(event: &Event) -> Result<Map<String, Value>, Error> {
    let mut data = match &event.payload {
        Value::Object(fields) => fields.clone(),
        Value::Null => Map::new(),
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("value".to_string(), other.clone());
            wrapped
        }
    };

    data.insert(
        "timestamp".to_string(),
        Value::String(event.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    data.insert(
        "tenantId".to_string(),
        Value::String(event.tenant_id.clone()),
    );
    data.insert(
        "userId".to_string(),
        event
            .user_id
            .as_ref()
            .map(|user_id| Value::String(user_id.clone()))
            .unwrap_or(Value::Null),
    );
    if !event.metadata.is_empty() {
        data.insert(
            "metadata".to_string(),
            serde_json::to_value(&event.metadata)?,
        );
    }

    Ok(data)
}

/// One event as the client will see it.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: Option<String>,
    pub event: String,
    pub data: Value,
    pub retry_ms: Option<u64>,
}

impl Frame {
    pub fn from_event(event: &Event) -> Result<Frame, Error> {
        Ok(Frame {
            id: event.id.as_deref().map(single_line),
            event: single_line(&event.name),
            data: Value::Object(data_object(event)?),
            retry_ms: event.retry_ms,
        })
    }

    /// Builds the axum SSE event for this frame.
    pub fn into_sse_event(self) -> Result<SseEvent, Error> {
        let mut sse_event = SseEvent::default();
        if let Some(id) = self.id {
            sse_event = sse_event.id(id);
        }
        sse_event = sse_event.event(self.event);
        if let Some(retry_ms) = self.retry_ms {
            sse_event = sse_event.retry(Duration::from_millis(retry_ms));
        }
        sse_event
            .json_data(self.data)
            .map_err(|e| Error::Serialization(e.to_string()))
    }
}

// axum rejects SSE field values containing line breaks.
fn single_line(value: &str) -> String {
    value.replace(|c: char| c == '\r' || c == '\n', "")
}
