//! SSE HTTP handler for the web layer.
//!
//! This module contains only the Axum handler for the stream endpoint.
//! The push engine itself (Manager, ConnectionRegistry, wire format)
//! lives in the `sse` crate.

pub mod handler;
