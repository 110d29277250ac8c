//! Event model and publishing seam for the tenant push platform.
//!
//! This crate provides the types backend services use to hand events to the
//! push engine without depending on it directly.
//!
//! # Architecture
//!
//! - **Event**: One unit pushed to clients, always scoped to a tenant
//! - **EventMetadata**: Typed correlation fields (customer, account, campaign,
//!   job type, severity) plus an opaque annotation bag
//! - **EventHandler**: Trait for implementing event consumers (the SSE engine is one)
//! - **EventPublisher**: Publishes events to registered handlers
//!
//! Events are never stored. They are constructed, delivered zero or more
//! times and discarded.

use async_trait::async_trait;
use std::sync::Arc;

pub mod event;

pub use event::{names, Event, EventMetadata, Severity};

/// Trait for handling published events.
/// Implementations perform side effects like pushing to connected clients.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event);
}

/// Publishes events to registered handlers.
/// Handlers are called sequentially in registration order.
#[derive(Clone)]
pub struct EventPublisher {
    handlers: Arc<Vec<Arc<dyn EventHandler>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(Vec::new()),
        }
    }

    /// Register a new event handler.
    /// Note: This creates a new publisher instance with the additional handler.
    /// Store the returned publisher in your application state.
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        let mut handlers = (*self.handlers).clone();
        handlers.push(handler);
        self.handlers = Arc::new(handlers);
        self
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Publish an event to all registered handlers, sequentially.
    pub async fn publish(&self, event: Event) {
        for handler in self.handlers.iter() {
            handler.handle(&event).await;
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}
