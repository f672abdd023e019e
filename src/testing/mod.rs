//! Testing utilities for users of the tagsched library.
//!
//! This module provides helpers for testing scheduling against an
//! [`InMemoryEcs`] fleet:
//!
//! - [`RecordingHandler`]: An event handler that captures every event
//! - [`discover`]: Runs discovery and panics on failure
//! - [`scheduled_service`]: A service fixture already carrying the schedule tag

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::config::SchedulerConfig;
use crate::core::resource::ScheduledResource;
use crate::discovery::Discoverer;
use crate::events::{Event, EventHandler};
use crate::provider::{InMemoryEcs, ServiceFixture};

/// An event handler that records every event it receives.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use tagsched::EventBus;
/// use tagsched::testing::RecordingHandler;
///
/// let handler = Arc::new(RecordingHandler::new());
/// let bus = EventBus::new();
/// tokio::runtime::Runtime::new().unwrap().block_on(async {
///     bus.register(handler.clone()).await;
///     assert!(handler.events().await.is_empty());
/// });
/// ```
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<Event>>,
}

impl RecordingHandler {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far, in order.
    pub async fn events(&self) -> Vec<Event> {
        self.events.lock().await.clone()
    }

    /// Number of recorded events matching `predicate`.
    pub async fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().await.iter().filter(|e| predicate(e)).count()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    async fn handle(&self, event: &Event) {
        self.events.lock().await.push(event.clone());
    }
}

/// Discover the schedulable services of `ecs` using `config.tag_name`.
///
/// # Panics
///
/// Panics if discovery fails.
pub async fn discover(ecs: &InMemoryEcs, config: &SchedulerConfig) -> Vec<ScheduledResource> {
    Discoverer::new(ecs, &config.tag_name)
        .discover()
        .await
        .expect("discovery failed")
}

/// A service fixture tagged with `config.tag_name` = `schedule`.
pub fn scheduled_service(
    config: &SchedulerConfig,
    cluster: &str,
    name: &str,
    desired_count: u32,
    schedule: &str,
) -> ServiceFixture {
    ServiceFixture::new(cluster, name, desired_count).with_tag(config.tag_name.clone(), schedule)
}
