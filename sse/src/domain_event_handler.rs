use crate::filter::EventFilter;
use crate::Manager;
use async_trait::async_trait;
use events::{Event, EventHandler};
use log::*;
use std::sync::Arc;

/// Routes published events to connected clients.
///
/// Backend services publish through [`events::EventPublisher`]; this handler
/// delivers each event to the connections of the event's tenant, narrowed to
/// the event's user when one is set. Events without a tenant are dropped,
/// since nothing may be delivered outside a tenant boundary.
pub struct SseEventHandler {
    sse_manager: Arc<Manager>,
}

impl SseEventHandler {
    pub fn new(sse_manager: Arc<Manager>) -> Self {
        Self { sse_manager }
    }
}

#[async_trait]
impl EventHandler for SseEventHandler {
    async fn handle(&self, event: &Event) {
        if event.tenant_id.is_empty() {
            warn!("Dropping published event {} without a tenant", event.name);
            return;
        }

        let delivered = self
            .sse_manager
            .send_with_filter(event, &EventFilter::default())
            .await;

        debug!(
            "Published {} for tenant {} to {} connection(s)",
            event.name, event.tenant_id, delivered
        );
    }
}
