//! Server-Sent Events (SSE) push engine for tenant-scoped real-time updates.
//!
//! This crate holds the connection registry and broadcast engine that pushes
//! backend events to browser clients over long-lived HTTP streams, without
//! leaking events across tenant boundaries.
//!
//! # Architecture
//!
//! - **Dual-index registry**: O(1) lookups by connection id and by tenant via
//!   separate DashMap indices that are always changed together.
//! - **Two filter layers**: a connection's own allow-list of event names, and
//!   an optional sender-supplied structured filter. They never interfere.
//! - **Self-healing delivery**: a failed or timed-out write deregisters that
//!   one connection; fan-out to everyone else carries on.
//! - **Heartbeat monitor**: periodic keep-alive events plus eviction of
//!   connections whose last successful heartbeat is too old.
//! - **Ephemeral events**: nothing is stored or replayed. A client that
//!   reconnects gets a fresh connection id and a `connection.established` event.
//!
//! # Message Flow
//!
//! 1. The web layer opens a stream and calls `Manager::create_connection`
//!    with the already-resolved tenant/user and a [`transport::ChannelTransport`]
//! 2. Backend code calls `broadcast_to_tenant`, `send_to_connection`,
//!    `send_with_filter` or `broadcast_to_all` (directly or via an
//!    [`events::EventPublisher`] wired to [`SseEventHandler`])
//! 3. Targets are snapshotted from the registry, filtered, and written
//!    concurrently as [`message::Frame`]s, each write bounded by the
//!    configured deadline; the web layer serves them with axum's `Sse`
//! 4. When the client goes away the stream's drop guard (or the next failed
//!    write) removes the connection from both indices
//!
//! # Modules
//!
//! - `connection`: ConnectionRegistry, Connection and type-safe ConnectionId
//! - `manager`: Delivery engine and the public engine API
//! - `filter`: Allow-list and structured EventFilter evaluation
//! - `heartbeat`: Keep-alive and stale-connection eviction
//! - `message`: Frames and their axum SSE form
//! - `stats`: On-demand engine statistics
//! - `transport`: The writable side of a client stream

pub mod config;
pub mod connection;
pub mod domain_event_handler;
pub mod error;
pub mod filter;
pub mod heartbeat;
pub mod manager;
pub mod message;
pub mod stats;
pub mod transport;


pub use config::EngineConfig;
pub use connection::{ConnectionId, ConnectionSummary};
pub use domain_event_handler::SseEventHandler;
pub use error::Error;
pub use filter::EventFilter;
pub use manager::{ConnectionOptions, Manager};
pub use stats::EngineStats;
