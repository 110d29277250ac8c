//! Heartbeat and liveness monitor.
//!
//! The monitor ticks at the smallest interval a client may request. Each
//! tick pushes a heartbeat to every active connection whose own interval
//! will have run out before the next tick, stamped with that connection's
//! tenant and user. A heartbeat is at most one tick early and never late.
//! A successful write advances the connection's `last_heartbeat_at`. The same tick then evicts every
//! connection whose last successful heartbeat is older than the configured
//! timeout. This is a liveness timeout, not an acknowledgement protocol:
//! the backstop for connections that stop reflecting activity without
//! producing a write error (a half-open TCP connection, or a client whose
//! allow-list filters heartbeats out).

use crate::connection::DeregisterReason;
use crate::manager::Manager;
use events::Event;
use log::*;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Outcome of one heartbeat tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    /// Heartbeats written successfully.
    pub delivered: usize,
    /// Connections evicted as stale.
    pub evicted: usize,
}

/// Stops the monitor task when `stop` is called or when dropped.
pub(crate) struct HeartbeatHandle {
    shutdown: Option<oneshot::Sender<()>>,
}

impl HeartbeatHandle {
    pub(crate) fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub(crate) async fn run_cycle(manager: &Manager) -> HeartbeatReport {
    let registry = manager.registry();
    let tick = manager.config().heartbeat_tick();
    let due = registry
        .all()
        .into_iter()
        .filter(|connection| {
            connection.since_last_heartbeat() + tick > connection.heartbeat_interval()
        })
        .collect();
    let delivered = manager.fan_out(due, &Event::heartbeat()).await;

    let timeout = manager.config().connection_timeout;
    let mut evicted = 0;
    for connection in registry.all() {
        let idle = connection.since_last_heartbeat();
        if idle > timeout {
            warn!(
                "Evicting stale connection {} for tenant {}: no heartbeat for {:?}",
                connection.id(),
                connection.tenant_id(),
                idle
            );
            if registry
                .unregister(connection.id(), DeregisterReason::Stale)
                .is_some()
            {
                evicted += 1;
            }
        }
    }

    HeartbeatReport { delivered, evicted }
}

/// Runs the monitor until the handle is stopped or dropped, or the engine is gone.
pub(crate) fn spawn(manager: Weak<Manager>, period: Duration) -> HeartbeatHandle {
    let period = period.max(Duration::from_millis(1));
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        debug!("Heartbeat monitor running every {:?}", period);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    let Some(manager) = manager.upgrade() else {
                        break;
                    };
                    let report = run_cycle(&manager).await;
                    if report.evicted > 0 {
                        info!(
                            "Heartbeat tick: {} delivered, {} stale connection(s) evicted",
                            report.delivered, report.evicted
                        );
                    } else {
                        trace!("Heartbeat tick: {} delivered", report.delivered);
                    }
                }
            }
        }

        debug!("Heartbeat monitor stopped");
    });

    HeartbeatHandle {
        shutdown: Some(shutdown_tx),
    }
}
