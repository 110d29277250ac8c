use crate::error::Error;
use crate::filter;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::*;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::time::Instant;

pub type TenantId = String;
pub type UserId = String;

/// Unique identifier for a connection (server-generated)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for ConnectionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a connection left the registry. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeregisterReason {
    ClientDisconnected,
    DeliveryFailure,
    Stale,
    Administrative,
    Shutdown,
}

impl fmt::Display for DeregisterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            DeregisterReason::ClientDisconnected => "client_disconnected",
            DeregisterReason::DeliveryFailure => "delivery_failure",
            DeregisterReason::Stale => "stale",
            DeregisterReason::Administrative => "administrative",
            DeregisterReason::Shutdown => "shutdown",
        };
        f.write_str(reason)
    }
}

/// Everything needed to open a connection.
pub struct Registration {
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
    pub transport: Arc<dyn Transport>,
    pub event_filters: Vec<String>,
    pub heartbeat_interval: Duration,
    pub metadata: Map<String, Value>,
}

struct Liveness {
    at: Instant,
    wall: DateTime<Utc>,
}

/// One open push stream.
///
/// Shared as `Arc<Connection>` so fan-out can work from a snapshot without
/// holding any registry lock while writing.
pub struct Connection {
    id: ConnectionId,
    tenant_id: TenantId,
    user_id: Option<UserId>,
    transport: Arc<dyn Transport>,
    active: AtomicBool,
    connected_at: DateTime<Utc>,
    last_heartbeat: Mutex<Liveness>,
    event_filters: RwLock<Vec<String>>,
    heartbeat_interval: Duration,
    metadata: Map<String, Value>,
}

impl Connection {
    fn new(registration: Registration) -> Self {
        let now = Utc::now();
        Self {
            id: ConnectionId::new(),
            tenant_id: registration.tenant_id,
            user_id: registration.user_id,
            transport: registration.transport,
            active: AtomicBool::new(true),
            connected_at: now,
            last_heartbeat: Mutex::new(Liveness {
                at: Instant::now(),
                wall: now,
            }),
            event_filters: RwLock::new(registration.event_filters),
            heartbeat_interval: registration.heartbeat_interval,
            metadata: registration.metadata,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Flips the connection to inactive. Returns false if it already was,
    /// which means another caller owns the teardown.
    fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn last_heartbeat_at(&self) -> DateTime<Utc> {
        self.liveness().wall
    }

    /// Time since the last successful heartbeat write (or since connecting).
    pub fn since_last_heartbeat(&self) -> Duration {
        self.liveness().at.elapsed()
    }

    pub(crate) fn touch_heartbeat(&self) {
        let mut liveness = self
            .last_heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        liveness.at = Instant::now();
        liveness.wall = Utc::now();
    }

    fn liveness(&self) -> std::sync::MutexGuard<'_, Liveness> {
        self.last_heartbeat
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn event_filters(&self) -> Vec<String> {
        self.event_filters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn set_event_filters(&self, filters: Vec<String>) {
        *self
            .event_filters
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = filters;
    }

    /// Connection allow-list check for an event name.
    pub fn accepts(&self, event_name: &str) -> bool {
        let filters = self
            .event_filters
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        filter::allows(&filters, event_name)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub(crate) fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn summary(&self) -> ConnectionSummary {
        ConnectionSummary {
            id: self.id.clone(),
            tenant_id: self.tenant_id.clone(),
            user_id: self.user_id.clone(),
            is_active: self.is_active(),
            connected_at: self.connected_at,
            last_heartbeat_at: self.last_heartbeat_at(),
            event_filters: self.event_filters(),
            heartbeat_interval_ms: self.heartbeat_interval.as_millis() as u64,
            metadata: self.metadata.clone(),
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("active", &self.is_active())
            .finish_non_exhaustive()
    }
}

/// Read-only view of a connection, without the transport handle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: ConnectionId,
    pub tenant_id: TenantId,
    pub user_id: Option<UserId>,
    pub is_active: bool,
    pub connected_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
    pub event_filters: Vec<String>,
    pub heartbeat_interval_ms: u64,
    pub metadata: Map<String, Value>,
}

/// Connection registry with dual indices for O(1) lookups by id and by tenant.
///
/// Every change to a connection's primary entry is made while holding its
/// tenant's bucket in `tenant_index`, so the two indices change together.
/// Lock order is always `tenant_index` then `connections`.
pub struct ConnectionRegistry {
    /// Primary storage: lookup by connection_id for registration/cleanup - O(1)
    connections: DashMap<ConnectionId, Arc<Connection>>,

    /// Secondary index: lookup by tenant_id for tenant fan-out - O(1)
    tenant_index: DashMap<TenantId, HashSet<ConnectionId>>,

    max_connections: usize,

    /// Slots taken, reserved before either index is touched.
    reserved: AtomicUsize,
}

impl ConnectionRegistry {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: DashMap::new(),
            tenant_index: DashMap::new(),
            max_connections,
            reserved: AtomicUsize::new(0),
        }
    }

    /// Register a new connection - O(1)
    pub fn register(&self, registration: Registration) -> Result<Arc<Connection>, Error> {
        self.reserve_slot()?;

        let connection = Arc::new(Connection::new(registration));
        let connection_id = connection.id().clone();

        let mut bucket = self
            .tenant_index
            .entry(connection.tenant_id().to_string())
            .or_default();
        self.connections
            .insert(connection_id.clone(), Arc::clone(&connection));
        bucket.insert(connection_id);
        drop(bucket);

        Ok(connection)
    }

    fn reserve_slot(&self) -> Result<(), Error> {
        let limit = self.max_connections;
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |taken| {
                (taken < limit).then_some(taken + 1)
            })
            .map(|_| ())
            .map_err(|_| Error::CapacityExceeded { limit })
    }

    /// Unregister a connection and close its transport - O(1)
    ///
    /// Idempotent: only the first caller for a given id gets the connection
    /// back and closes it; every later call is a no-op returning `None`.
    pub fn unregister(
        &self,
        connection_id: &ConnectionId,
        reason: DeregisterReason,
    ) -> Option<Arc<Connection>> {
        let connection = self.connections.get(connection_id)?.value().clone();
        if !connection.deactivate() {
            return None;
        }

        let tenant_id = connection.tenant_id();
        match self.tenant_index.get_mut(tenant_id) {
            Some(mut bucket) => {
                self.connections.remove(connection_id);
                bucket.remove(connection_id);

                // Clean up empty tenant entries
                if bucket.is_empty() {
                    drop(bucket); // Release lock before removal
                    self.tenant_index
                        .remove_if(tenant_id, |_, ids| ids.is_empty());
                }
            }
            None => {
                self.connections.remove(connection_id);
            }
        }
        self.reserved.fetch_sub(1, Ordering::AcqRel);

        // The connection is gone either way; closing is best effort.
        connection.transport().close();
        info!(
            "Deregistered connection {} for tenant {} ({})",
            connection_id, tenant_id, reason
        );

        Some(connection)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<Arc<Connection>> {
        self.connections
            .get(connection_id)
            .map(|entry| entry.value().clone())
    }

    /// Active connections for one tenant, as a snapshot.
    pub fn get_by_tenant(&self, tenant_id: &str) -> Vec<Arc<Connection>> {
        let ids: Vec<ConnectionId> = match self.tenant_index.get(tenant_id) {
            Some(bucket) => bucket.iter().cloned().collect(),
            None => return Vec::new(),
        };

        ids.iter()
            .filter_map(|id| self.get(id))
            .filter(|connection| connection.is_active())
            .collect()
    }

    /// Every active connection, as a snapshot.
    pub fn all(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|connection| connection.is_active())
            .collect()
    }

    /// Replace a connection's allow-list. Returns false if the id is unknown.
    pub fn update_filters(&self, connection_id: &ConnectionId, filters: Vec<String>) -> bool {
        match self.get(connection_id) {
            Some(connection) if connection.is_active() => {
                connection.set_event_filters(filters);
                true
            }
            _ => false,
        }
    }

    /// Deregister everything. Returns how many connections were closed.
    pub fn close_all(&self) -> usize {
        let ids: Vec<ConnectionId> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        ids.iter()
            .filter(|id| self.unregister(id, DeregisterReason::Shutdown).is_some())
            .count()
    }

    /// Entries in the primary index, including ones mid-teardown.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Active connection count per tenant.
    pub fn counts_by_tenant(&self) -> HashMap<TenantId, usize> {
        let mut counts = HashMap::new();
        for connection in self.all() {
            *counts.entry(connection.tenant_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Tenants that currently own a bucket in the secondary index.
    pub fn tenant_ids(&self) -> Vec<TenantId> {
        self.tenant_index
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::RecordingTransport;

    fn registration(tenant_id: &str, transport: Arc<dyn Transport>) -> Registration {
        Registration {
            tenant_id: tenant_id.to_string(),
            user_id: None,
            transport,
            event_filters: Vec::new(),
            heartbeat_interval: Duration::from_secs(30),
            metadata: Map::new(),
        }
    }

    fn register(registry: &ConnectionRegistry, tenant_id: &str) -> Arc<Connection> {
        registry
            .register(registration(tenant_id, RecordingTransport::new()))
            .unwrap()
    }

    fn ids(connections: &[Arc<Connection>]) -> HashSet<ConnectionId> {
        connections.iter().map(|c| c.id().clone()).collect()
    }

    fn assert_indices_consistent(registry: &ConnectionRegistry) {
        let global = ids(&registry.all());
        let mut union = HashSet::new();
        for tenant_id in registry.tenant_ids() {
            let tenant = ids(&registry.get_by_tenant(&tenant_id));
            assert!(tenant.is_subset(&global));
            for connection in registry.get_by_tenant(&tenant_id) {
                assert_eq!(connection.tenant_id(), tenant_id);
            }
            union.extend(tenant);
        }
        assert_eq!(union, global);
    }

    #[test]
    fn test_register_indexes_by_id_and_tenant() {
        let registry = ConnectionRegistry::new(10);
        let connection = register(&registry, "t1");

        assert!(registry.get(connection.id()).is_some());
        assert_eq!(ids(&registry.get_by_tenant("t1")), ids(&[connection]));
        assert!(registry.get_by_tenant("t2").is_empty());
        assert_indices_consistent(&registry);
    }

    #[test]
    fn test_indices_stay_consistent_across_register_and_unregister() {
        let registry = ConnectionRegistry::new(100);
        let mut live = Vec::new();
        for round in 0..30 {
            let tenant_id = format!("t{}", round % 4);
            live.push(register(&registry, &tenant_id));
            if round % 3 == 0 {
                let victim = live.remove(round % live.len());
                registry.unregister(victim.id(), DeregisterReason::Administrative);
            }
            assert_indices_consistent(&registry);
        }
        assert_eq!(registry.len(), live.len());
    }

    #[test]
    fn test_unregister_is_idempotent_and_closes_once() {
        let registry = ConnectionRegistry::new(10);
        let transport = RecordingTransport::new();
        let connection = registry
            .register(registration("t1", transport.clone()))
            .unwrap();

        assert!(registry
            .unregister(connection.id(), DeregisterReason::Administrative)
            .is_some());
        assert!(registry
            .unregister(connection.id(), DeregisterReason::Administrative)
            .is_none());

        assert_eq!(transport.close_count(), 1);
        assert!(!connection.is_active());
        assert!(registry.get(connection.id()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unregister_unknown_id_is_noop() {
        let registry = ConnectionRegistry::new(10);
        assert!(registry
            .unregister(&ConnectionId::new(), DeregisterReason::Administrative)
            .is_none());
    }

    #[test]
    fn test_last_connection_removes_tenant_bucket() {
        let registry = ConnectionRegistry::new(10);
        let first = register(&registry, "t1");
        let second = register(&registry, "t1");

        registry.unregister(first.id(), DeregisterReason::ClientDisconnected);
        assert_eq!(registry.tenant_ids(), vec!["t1".to_string()]);

        registry.unregister(second.id(), DeregisterReason::ClientDisconnected);
        assert!(registry.tenant_ids().is_empty());
    }

    #[test]
    fn test_capacity_exceeded_leaves_indices_untouched() {
        let registry = ConnectionRegistry::new(2);
        register(&registry, "t1");
        register(&registry, "t1");

        let err = registry
            .register(registration("t2", RecordingTransport::new()))
            .unwrap_err();
        assert_eq!(err, Error::CapacityExceeded { limit: 2 });
        assert_eq!(registry.len(), 2);
        assert!(registry.get_by_tenant("t2").is_empty());
        assert_eq!(registry.tenant_ids(), vec!["t1".to_string()]);
    }

    #[test]
    fn test_capacity_is_released_on_unregister() {
        let registry = ConnectionRegistry::new(1);
        let connection = register(&registry, "t1");
        assert!(registry
            .register(registration("t1", RecordingTransport::new()))
            .is_err());

        registry.unregister(connection.id(), DeregisterReason::Administrative);
        assert!(registry
            .register(registration("t1", RecordingTransport::new()))
            .is_ok());
    }

    #[test]
    fn test_update_filters() {
        let registry = ConnectionRegistry::new(10);
        let connection = register(&registry, "t1");
        assert!(connection.accepts("customer.created"));

        assert!(registry.update_filters(connection.id(), vec!["campaign.updated".to_string()]));
        assert!(!connection.accepts("customer.created"));
        assert!(connection.accepts("campaign.updated"));

        assert!(!registry.update_filters(&ConnectionId::new(), Vec::new()));
    }

    #[test]
    fn test_close_all_empties_both_indices() {
        let registry = ConnectionRegistry::new(10);
        for tenant_id in ["t1", "t1", "t2"] {
            register(&registry, tenant_id);
        }

        assert_eq!(registry.close_all(), 3);
        assert!(registry.is_empty());
        assert!(registry.tenant_ids().is_empty());
        assert_eq!(registry.close_all(), 0);
    }

    #[test]
    fn test_counts_by_tenant() {
        let registry = ConnectionRegistry::new(10);
        for tenant_id in ["t1", "t1", "t1", "t2", "t2"] {
            register(&registry, tenant_id);
        }

        let counts = registry.counts_by_tenant();
        assert_eq!(counts.get("t1"), Some(&3));
        assert_eq!(counts.get("t2"), Some(&2));
    }

    #[test]
    fn test_concurrent_register_and_unregister_keep_indices_consistent() {
        let registry = Arc::new(ConnectionRegistry::new(10_000));
        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for round in 0..200 {
                        let tenant_id = format!("t{}", (worker + round) % 5);
                        let connection = register(&registry, &tenant_id);
                        if round % 2 == 0 {
                            registry
                                .unregister(connection.id(), DeregisterReason::ClientDisconnected);
                        }
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(registry.len(), 8 * 100);
        assert_indices_consistent(&registry);
    }
}
