use config::Config;
use events::EventPublisher;
use sse::{Manager, SseEventHandler};
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub sse_manager: Arc<Manager>,
    /// Backend code publishes here; published events reach connected clients.
    pub event_publisher: EventPublisher,
    pub config: Config,
}

impl AppState {
    pub fn new(app_config: Config, sse_manager: &Arc<Manager>) -> Self {
        let event_publisher = EventPublisher::new()
            .with_handler(Arc::new(SseEventHandler::new(Arc::clone(sse_manager))));

        Self {
            sse_manager: Arc::clone(sse_manager),
            event_publisher,
            config: app_config,
        }
    }

    pub fn sse_manager_ref(&self) -> &Manager {
        self.sse_manager.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use events::{names, Event};
    use serde_json::json;
    use sse::transport::ChannelTransport;
    use sse::ConnectionOptions;

    #[tokio::test]
    async fn test_published_events_reach_the_tenant_connections() {
        let config = Config::parse_from(["tenant_push_rs"]);
        let manager = Arc::new(Manager::new(config.engine_config()));
        let app_state = AppState::new(config, &manager);
        assert_eq!(app_state.event_publisher.handler_count(), 1);

        let (transport, mut rx) = ChannelTransport::new(8);
        app_state
            .sse_manager_ref()
            .create_connection("acme", Arc::new(transport), None, ConnectionOptions::default())
            .await
            .unwrap();

        app_state
            .event_publisher
            .publish(Event::new("job.completed", "acme", json!({"jobId": "j-1"})))
            .await;
        app_state
            .event_publisher
            .publish(Event::new("job.completed", "globex", json!({"jobId": "j-2"})))
            .await;

        assert_eq!(rx.recv().await.unwrap().event, names::CONNECTION_ESTABLISHED);
        let published = rx.recv().await.unwrap();
        assert_eq!(published.event, "job.completed");
        assert_eq!(published.data["jobId"], "j-1");
        assert!(rx.try_recv().is_err());
    }
}
