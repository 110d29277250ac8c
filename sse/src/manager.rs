use crate::config::EngineConfig;
use crate::connection::{
    Connection, ConnectionId, ConnectionRegistry, ConnectionSummary, DeregisterReason,
    Registration, TenantId, UserId,
};
use crate::error::Error;
use crate::filter::EventFilter;
use crate::heartbeat::{self, HeartbeatHandle, HeartbeatReport};
use crate::message::Frame;
use crate::stats::{self, DeliveryCounters, EngineStats};
use crate::transport::Transport;
use events::{names, Event};
use futures::future::join_all;
use log::*;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Options a client may pass when opening a stream.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    /// Initial allow-list; empty subscribes to everything.
    pub event_filters: Vec<String>,
    /// Requested heartbeat interval, clamped to the configured range.
    pub heartbeat_interval_ms: Option<u64>,
    /// Resume hint from a reconnecting client. Opaque to the engine.
    pub last_event_id: Option<String>,
    pub metadata: Map<String, Value>,
}

/// The push engine: owns the registry and performs every delivery.
pub struct Manager {
    registry: ConnectionRegistry,
    config: EngineConfig,
    counters: DeliveryCounters,
    started_at: Instant,
    heartbeat: Mutex<Option<HeartbeatHandle>>,
}

impl Manager {
    /// Builds an engine without a heartbeat monitor.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(config.max_connections),
            config,
            counters: DeliveryCounters::default(),
            started_at: Instant::now(),
            heartbeat: Mutex::new(None),
        }
    }

    /// Builds an engine and starts its heartbeat monitor on the current runtime.
    pub fn start(config: EngineConfig) -> Arc<Self> {
        let manager = Arc::new(Self::new(config));
        let handle = heartbeat::spawn(Arc::downgrade(&manager), manager.config.heartbeat_tick());
        *manager
            .heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
        info!(
            "Push engine started: max_connections={}, heartbeat_interval={:?}, connection_timeout={:?}",
            manager.config.max_connections,
            manager.config.heartbeat_interval,
            manager.config.connection_timeout
        );
        manager
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register a new connection and greet it with a `connection.established` event.
    pub async fn create_connection(
        &self,
        tenant_id: impl Into<TenantId>,
        transport: Arc<dyn Transport>,
        user_id: Option<UserId>,
        options: ConnectionOptions,
    ) -> Result<ConnectionId, Error> {
        let tenant_id = tenant_id.into();
        if tenant_id.is_empty() {
            return Err(Error::MissingTenant);
        }

        let heartbeat_interval = self
            .config
            .clamp_heartbeat_interval(options.heartbeat_interval_ms);

        let connection = self
            .registry
            .register(Registration {
                tenant_id,
                user_id,
                transport,
                event_filters: options.event_filters,
                heartbeat_interval,
                metadata: options.metadata,
            })
            .inspect_err(|e| warn!("Rejected new connection: {}", e))?;

        info!(
            "Registered connection {} for tenant {}",
            connection.id(),
            connection.tenant_id()
        );

        let mut payload = json!({
            "connectionId": connection.id().as_str(),
            "heartbeatInterval": heartbeat_interval.as_millis() as u64,
            "eventFilters": connection.event_filters(),
        });
        if let Some(last_event_id) = options.last_event_id {
            payload["lastEventId"] = Value::String(last_event_id);
        }
        let established = Event::new(names::CONNECTION_ESTABLISHED, "", payload)
            .stamped(connection.tenant_id(), connection.user_id());

        // Part of the handshake, so it bypasses the connection's allow-list.
        self.deliver(&connection, &established).await;

        Ok(connection.id().clone())
    }

    /// Send one event to one connection. False when the connection is unknown,
    /// inactive, filtered out, belongs to another tenant, or the write failed.
    pub async fn send_to_connection(&self, connection_id: &ConnectionId, event: &Event) -> bool {
        match self.registry.get(connection_id) {
            Some(connection) => self.dispatch(&connection, event).await,
            None => {
                debug!("Dropping event {} for unknown connection {}", event.name, connection_id);
                false
            }
        }
    }

    /// Send an event to every active connection of one tenant.
    /// Returns the number of successful deliveries.
    pub async fn broadcast_to_tenant(&self, tenant_id: &str, event: &Event) -> usize {
        if !event.tenant_id.is_empty() && event.tenant_id != tenant_id {
            warn!(
                "Refusing to broadcast event {} scoped to tenant {} into tenant {}",
                event.name, event.tenant_id, tenant_id
            );
            return 0;
        }

        let scoped;
        let event = if event.tenant_id.is_empty() {
            scoped = Event {
                tenant_id: tenant_id.to_string(),
                ..event.clone()
            };
            &scoped
        } else {
            event
        };

        let delivered = self
            .fan_out(self.registry.get_by_tenant(tenant_id), event)
            .await;
        debug!(
            "Broadcast {} to tenant {}: {} delivered",
            event.name, tenant_id, delivered
        );
        delivered
    }

    /// Send an event to every active connection regardless of tenant.
    /// Each copy is stamped with the receiving connection's identity.
    pub async fn broadcast_to_all(&self, event: &Event) -> usize {
        let unscoped = Event {
            tenant_id: String::new(),
            ..event.clone()
        };
        let delivered = self.fan_out(self.registry.all(), &unscoped).await;
        debug!("Broadcast {} to all tenants: {} delivered", event.name, delivered);
        delivered
    }

    /// Send an event to every connection matching the event's tenant and user
    /// (when set) and the structured filter.
    pub async fn send_with_filter(&self, event: &Event, filter: &EventFilter) -> usize {
        if !filter.matches(event) {
            trace!("Event {} excluded by structured filter", event.name);
            return 0;
        }

        let targets: Vec<Arc<Connection>> = self
            .registry
            .all()
            .into_iter()
            .filter(|connection| {
                event.tenant_id.is_empty() || connection.tenant_id() == event.tenant_id
            })
            .filter(|connection| match event.user_id.as_deref() {
                Some(user_id) => connection.user_id() == Some(user_id),
                None => true,
            })
            .collect();

        let delivered = self.fan_out(targets, event).await;
        debug!("Filtered send of {}: {} delivered", event.name, delivered);
        delivered
    }

    /// Administrative close. Returns false if the connection was not registered.
    pub fn remove_connection(&self, connection_id: &ConnectionId) -> bool {
        self.registry
            .unregister(connection_id, DeregisterReason::Administrative)
            .is_some()
    }

    /// Called when the client side of a stream goes away.
    pub fn release_connection(&self, connection_id: &ConnectionId) -> bool {
        self.registry
            .unregister(connection_id, DeregisterReason::ClientDisconnected)
            .is_some()
    }

    /// Replace a connection's allow-list. Returns false if the connection is unknown.
    pub fn update_connection_filters(
        &self,
        connection_id: &ConnectionId,
        filters: Vec<String>,
    ) -> bool {
        let updated = self.registry.update_filters(connection_id, filters);
        if updated {
            debug!("Updated event filters for connection {}", connection_id);
        }
        updated
    }

    pub fn get_connection(&self, connection_id: &ConnectionId) -> Option<ConnectionSummary> {
        self.registry
            .get(connection_id)
            .filter(|connection| connection.is_active())
            .map(|connection| connection.summary())
    }

    pub fn get_tenant_connections(&self, tenant_id: &str) -> Vec<ConnectionSummary> {
        self.registry
            .get_by_tenant(tenant_id)
            .iter()
            .map(|connection| connection.summary())
            .collect()
    }

    pub fn get_stats(&self) -> EngineStats {
        stats::collect(&self.registry, &self.counters, self.started_at)
    }

    /// One heartbeat tick: heartbeat every connection whose interval is due,
    /// then evict stale ones.
    pub async fn run_heartbeat_cycle(&self) -> HeartbeatReport {
        heartbeat::run_cycle(self).await
    }

    /// Stop the heartbeat monitor and close every connection.
    pub fn shutdown(&self) -> usize {
        if let Some(handle) = self
            .heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            handle.stop();
        }

        let closed = self.registry.close_all();
        info!("Push engine shut down, closed {} connection(s)", closed);
        closed
    }

    /// Deliver to many connections concurrently; one slow or broken
    /// connection never holds up or aborts the others.
    pub(crate) async fn fan_out(&self, targets: Vec<Arc<Connection>>, event: &Event) -> usize {
        join_all(
            targets
                .iter()
                .map(|connection| self.dispatch(connection, event)),
        )
        .await
        .into_iter()
        .filter(|delivered| *delivered)
        .count()
    }

    async fn dispatch(&self, connection: &Connection, event: &Event) -> bool {
        if !connection.is_active() {
            return false;
        }
        if !event.tenant_id.is_empty() && event.tenant_id != connection.tenant_id() {
            warn!(
                "Refusing to send event {} for tenant {} to connection {} of tenant {}",
                event.name,
                event.tenant_id,
                connection.id(),
                connection.tenant_id()
            );
            return false;
        }
        if !connection.accepts(&event.name) {
            trace!(
                "Connection {} does not subscribe to {}",
                connection.id(),
                event.name
            );
            return false;
        }

        self.deliver(connection, event).await
    }

    /// Render and write one frame. Any write failure deregisters the connection.
    async fn deliver(&self, connection: &Connection, event: &Event) -> bool {
        let stamped;
        let event = if event.tenant_id.is_empty() {
            stamped = event.stamped(connection.tenant_id(), connection.user_id());
            &stamped
        } else {
            event
        };

        let frame = match Frame::from_event(event) {
            Ok(frame) => frame,
            Err(e) => {
                error!("Failed to render event {}: {}", event.name, e);
                return false;
            }
        };

        let started = Instant::now();
        let outcome =
            tokio::time::timeout(self.config.write_timeout, connection.transport().write(frame))
                .await;

        match outcome {
            Ok(Ok(())) => {
                self.counters.record(started.elapsed());
                if event.is_heartbeat() {
                    connection.touch_heartbeat();
                }
                true
            }
            Ok(Err(e)) => {
                warn!(
                    "Failed to send event {} to connection {}: {}. Connection will be cleaned up.",
                    event.name,
                    connection.id(),
                    e
                );
                self.registry
                    .unregister(connection.id(), DeregisterReason::DeliveryFailure);
                false
            }
            Err(_) => {
                warn!(
                    "Write of event {} to connection {} exceeded {:?}. Connection will be cleaned up.",
                    event.name,
                    connection.id(),
                    self.config.write_timeout
                );
                self.registry
                    .unregister(connection.id(), DeregisterReason::DeliveryFailure);
                false
            }
        }
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
