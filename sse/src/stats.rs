use crate::connection::{ConnectionRegistry, TenantId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Running delivery counters, global since the engine started.
#[derive(Debug, Default)]
pub(crate) struct DeliveryCounters {
    events_sent: AtomicU64,
    latency_micros_total: AtomicU64,
}

impl DeliveryCounters {
    /// Records one successful write and how long it took.
    pub(crate) fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latency_micros_total
            .fetch_add(micros, Ordering::Relaxed);
        self.events_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn events_sent(&self) -> u64 {
        self.events_sent.load(Ordering::Relaxed)
    }

    /// Mean write time in milliseconds; zero before the first send.
    pub(crate) fn average_latency_ms(&self) -> f64 {
        let sent = self.events_sent();
        if sent == 0 {
            return 0.0;
        }
        let total = self.latency_micros_total.load(Ordering::Relaxed);
        total as f64 / sent as f64 / 1000.0
    }
}

/// Point-in-time engine statistics, derived on demand.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub total_connections: usize,
    pub active_connections: usize,
    pub connections_by_tenant: HashMap<TenantId, usize>,
    pub events_sent_total: u64,
    /// Milliseconds.
    #[serde(rename = "averageLatency")]
    pub average_latency_ms: f64,
    /// Seconds.
    #[serde(rename = "uptime")]
    pub uptime_secs: u64,
}

pub(crate) fn collect(
    registry: &ConnectionRegistry,
    counters: &DeliveryCounters,
    started_at: Instant,
) -> EngineStats {
    let connections_by_tenant = registry.counts_by_tenant();
    EngineStats {
        total_connections: registry.len(),
        active_connections: connections_by_tenant.values().sum(),
        connections_by_tenant,
        events_sent_total: counters.events_sent(),
        average_latency_ms: counters.average_latency_ms(),
        uptime_secs: started_at.elapsed().as_secs(),
    }
}
