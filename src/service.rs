//! The container service adapter exposed to the scheduling engine.
//!
//! [`EcsService`] offers the four operations the engine drives: discovery,
//! stop, start and (unsupported) resize. Every call works on the client and
//! configuration carried by its [`SchedulerContext`]; nothing is cached
//! between calls.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::resource::{SERVICE_KIND, ScheduledResource};
use crate::discovery::{Discoverer, DiscoveryError};
use crate::events::EventBus;
use crate::provider::EcsClient;
use crate::transition::{TransitionExecutor, TransitionResult};

/// Everything one scheduling pass needs for one account and region.
#[derive(Clone)]
pub struct SchedulerContext {
    pub account: String,
    pub region: String,
    pub client: Arc<dyn EcsClient>,
    pub config: Arc<SchedulerConfig>,
    pub event_bus: Arc<EventBus>,
}

impl SchedulerContext {
    /// Create a context with an empty event bus.
    pub fn new(
        account: impl Into<String>,
        region: impl Into<String>,
        client: Arc<dyn EcsClient>,
        config: Arc<SchedulerConfig>,
    ) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
            client,
            config,
            event_bus: Arc::new(EventBus::new()),
        }
    }

    /// Builder: use an existing event bus.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }
}

/// Adapter that makes cluster services schedulable.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcsService;

impl EcsService {
    pub fn new() -> Self {
        Self
    }

    /// Resource kind handled by this adapter.
    pub fn service_name(&self) -> &'static str {
        SERVICE_KIND
    }

    /// Services cannot be resized.
    pub fn allow_resize(&self) -> bool {
        false
    }

    /// Discover every service that carries the configured schedule tag.
    pub async fn discover_resources(
        &self,
        ctx: &SchedulerContext,
    ) -> Result<Vec<ScheduledResource>, DiscoveryError> {
        tracing::info!(
            account = %ctx.account,
            region = %ctx.region,
            "Fetching ecs services"
        );
        Discoverer::new(ctx.client.as_ref(), &ctx.config.tag_name)
            .discover()
            .await
    }

    /// Stop the services the engine selected. Returns those actually stopped.
    pub async fn stop_resources(
        &self,
        ctx: &SchedulerContext,
        resources: &[ScheduledResource],
    ) -> Vec<TransitionResult> {
        self.executor(ctx).stop_all(resources).await
    }

    /// Start the services the engine selected. Returns those actually started.
    pub async fn start_resources(
        &self,
        ctx: &SchedulerContext,
        resources: &[ScheduledResource],
    ) -> Vec<TransitionResult> {
        self.executor(ctx).start_all(resources).await
    }

    /// Resizing is not supported for services; this does nothing.
    pub async fn resize_resource(
        &self,
        _ctx: &SchedulerContext,
        _resource: &ScheduledResource,
        _instance_type: &str,
    ) {
    }

    fn executor<'a>(&self, ctx: &'a SchedulerContext) -> TransitionExecutor<'a> {
        TransitionExecutor::new(ctx.client.as_ref(), &ctx.config).with_event_bus(&ctx.event_bus)
    }
}
