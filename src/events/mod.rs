//! Transition events and event handling.
//!
//! The transition executor emits an [`Event`] for every service it changes,
//! every per-service failure and every tag value it has to rewrite. Handlers
//! registered on an [`EventBus`] observe a batch while it is in progress.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

use crate::core::resource::ServiceState;
use crate::core::types::ServiceId;

/// Events emitted while starting and stopping services.
#[derive(Debug, Clone)]
pub enum Event {
    /// A service was scaled to zero.
    ServiceStopped {
        service_id: ServiceId,
        /// Desired count saved for the next start.
        previous_capacity: u32,
        timestamp: Instant,
    },

    /// A service was scaled back up.
    ServiceStarted {
        service_id: ServiceId,
        restored_capacity: u32,
        timestamp: Instant,
    },

    /// Starting a service without a usable saved desired count.
    SavedCapacityMissing {
        service_id: ServiceId,
        /// Raw tag value, if the tag existed but did not parse.
        raw_value: Option<String>,
        timestamp: Instant,
    },

    /// A provider call failed; the service was skipped.
    TransitionFailed {
        service_id: ServiceId,
        /// State the service was being moved to.
        target: ServiceState,
        error: String,
        timestamp: Instant,
    },

    /// A configured tag value contained characters the provider rejects.
    TagValueSanitized {
        key: String,
        original: String,
        sanitized: String,
        timestamp: Instant,
    },

    /// Start/stop tags could not be updated. The capacity change stands.
    TagReconcileFailed {
        service_id: ServiceId,
        target: ServiceState,
        error: String,
        timestamp: Instant,
    },
}

impl Event {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> Instant {
        match self {
            Event::ServiceStopped { timestamp, .. } => *timestamp,
            Event::ServiceStarted { timestamp, .. } => *timestamp,
            Event::SavedCapacityMissing { timestamp, .. } => *timestamp,
            Event::TransitionFailed { timestamp, .. } => *timestamp,
            Event::TagValueSanitized { timestamp, .. } => *timestamp,
            Event::TagReconcileFailed { timestamp, .. } => *timestamp,
        }
    }

    /// Service the event refers to, if any.
    pub fn service_id(&self) -> Option<&ServiceId> {
        match self {
            Event::ServiceStopped { service_id, .. }
            | Event::ServiceStarted { service_id, .. }
            | Event::SavedCapacityMissing { service_id, .. }
            | Event::TransitionFailed { service_id, .. }
            | Event::TagReconcileFailed { service_id, .. } => Some(service_id),
            Event::TagValueSanitized { .. } => None,
        }
    }

    /// Create a ServiceStopped event.
    pub fn service_stopped(service_id: ServiceId, previous_capacity: u32) -> Self {
        Event::ServiceStopped {
            service_id,
            previous_capacity,
            timestamp: Instant::now(),
        }
    }

    /// Create a ServiceStarted event.
    pub fn service_started(service_id: ServiceId, restored_capacity: u32) -> Self {
        Event::ServiceStarted {
            service_id,
            restored_capacity,
            timestamp: Instant::now(),
        }
    }

    /// Create a SavedCapacityMissing event.
    pub fn saved_capacity_missing(service_id: ServiceId, raw_value: Option<String>) -> Self {
        Event::SavedCapacityMissing {
            service_id,
            raw_value,
            timestamp: Instant::now(),
        }
    }

    /// Create a TransitionFailed event.
    pub fn transition_failed(service_id: ServiceId, target: ServiceState, error: String) -> Self {
        Event::TransitionFailed {
            service_id,
            target,
            error,
            timestamp: Instant::now(),
        }
    }

    /// Create a TagValueSanitized event.
    pub fn tag_value_sanitized(key: String, original: String, sanitized: String) -> Self {
        Event::TagValueSanitized {
            key,
            original,
            sanitized,
            timestamp: Instant::now(),
        }
    }

    /// Create a TagReconcileFailed event.
    pub fn tag_reconcile_failed(service_id: ServiceId, target: ServiceState, error: String) -> Self {
        Event::TagReconcileFailed {
            service_id,
            target,
            error,
            timestamp: Instant::now(),
        }
    }
}

/// Handler for receiving transition events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
