//! Start and stop transitions.
//!
//! The executor scales services to zero and back, saving the pre-stop desired
//! count in a tag so the next start can restore it. Each service is handled
//! independently: a provider failure is logged and the batch moves on. Tag
//! reconciliation afterwards is best effort and never fails a transition.

use serde::{Deserialize, Serialize};

use crate::config::SchedulerConfig;
use crate::core::resource::{ScheduledResource, ServiceState};
use crate::core::tags::{SAVED_CAPACITY_TAG, Tag, TagPair, sanitize_tags, stale_keys};
use crate::core::types::ServiceId;
use crate::events::{Event, EventBus};
use crate::provider::{EcsClient, ProviderError};

/// Desired count used when a stopped service has no usable saved value.
pub const DEFAULT_RESTORE_CAPACITY: u32 = 1;

/// A service that changed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionResult {
    pub service_id: ServiceId,
    pub state: ServiceState,
}

impl TransitionResult {
    /// State label reported to the scheduling engine ("stopped" / "running").
    pub fn label(&self) -> &'static str {
        self.state.label()
    }
}

/// Desired count to restore on start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreCapacity {
    /// Parsed from the saved-capacity tag.
    Saved(u32),
    /// No usable saved value.
    Default,
}

impl RestoreCapacity {
    /// Interpret the raw saved-capacity tag value.
    ///
    /// Any non-negative integer counts, zero included; anything else falls
    /// back to [`DEFAULT_RESTORE_CAPACITY`].
    pub fn from_tag(raw: Option<&str>) -> Self {
        match raw.map(str::trim).and_then(|v| v.parse::<u32>().ok()) {
            Some(count) => RestoreCapacity::Saved(count),
            None => RestoreCapacity::Default,
        }
    }

    /// The desired count to apply.
    pub fn count(&self) -> u32 {
        match self {
            RestoreCapacity::Saved(count) => *count,
            RestoreCapacity::Default => DEFAULT_RESTORE_CAPACITY,
        }
    }
}

/// Applies start and stop transitions to already-selected services.
pub struct TransitionExecutor<'a> {
    client: &'a dyn EcsClient,
    config: &'a SchedulerConfig,
    events: Option<&'a EventBus>,
}

impl<'a> TransitionExecutor<'a> {
    /// Create an executor using the tag lists in `config`.
    pub fn new(client: &'a dyn EcsClient, config: &'a SchedulerConfig) -> Self {
        Self {
            client,
            config,
            events: None,
        }
    }

    /// Builder: emit transition events on `events`.
    pub fn with_event_bus(mut self, events: &'a EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Stop every running service in `resources`, in order.
    ///
    /// Services already at zero are skipped without any provider call.
    /// Only services that were actually stopped are returned.
    pub async fn stop_all(&self, resources: &[ScheduledResource]) -> Vec<TransitionResult> {
        let mut results = Vec::new();
        for resource in resources {
            if resource.current_capacity == 0 {
                continue;
            }
            match self.stop(resource).await {
                Ok(()) => results.push(TransitionResult {
                    service_id: resource.id.clone(),
                    state: ServiceState::Stopped,
                }),
                Err(e) => self.transition_failed(resource, ServiceState::Stopped, e).await,
            }
        }
        results
    }

    /// Start every stopped service in `resources`, in order.
    ///
    /// Services with a non-zero desired count are skipped without any
    /// provider call. Only services that were actually started are returned.
    pub async fn start_all(&self, resources: &[ScheduledResource]) -> Vec<TransitionResult> {
        let mut results = Vec::new();
        for resource in resources {
            if resource.current_capacity != 0 {
                continue;
            }
            match self.start(resource).await {
                Ok(()) => results.push(TransitionResult {
                    service_id: resource.id.clone(),
                    state: ServiceState::Running,
                }),
                Err(e) => self.transition_failed(resource, ServiceState::Running, e).await,
            }
        }
        results
    }

    async fn stop(&self, resource: &ScheduledResource) -> Result<(), ProviderError> {
        let previous = resource.current_capacity;

        self.client
            .update_service(resource.cluster_name.as_str(), &resource.name, 0)
            .await?;
        self.client
            .tag_resource(
                resource.arn.as_str(),
                &[Tag::new(SAVED_CAPACITY_TAG, previous.to_string())],
            )
            .await?;

        self.reconcile_tags(
            resource,
            ServiceState::Stopped,
            &self.config.stopped_tags,
            &self.config.started_tags,
        )
        .await;

        tracing::info!(service = %resource.id, cluster = %resource.cluster_name, previous, "Stopped ecs service");
        self.emit(Event::service_stopped(resource.id.clone(), previous))
            .await;
        Ok(())
    }

    async fn start(&self, resource: &ScheduledResource) -> Result<(), ProviderError> {
        let restore = RestoreCapacity::from_tag(resource.saved_capacity.as_deref());
        if restore == RestoreCapacity::Default {
            tracing::warn!(
                service = %resource.id,
                saved = ?resource.saved_capacity,
                default_count = DEFAULT_RESTORE_CAPACITY,
                "No saved desiredCount in ecs service tags, using default count"
            );
            self.emit(Event::saved_capacity_missing(
                resource.id.clone(),
                resource.saved_capacity.clone(),
            ))
            .await;
        }
        let count = restore.count();

        self.client
            .update_service(resource.cluster_name.as_str(), &resource.name, count)
            .await?;
        self.client
            .untag_resource(resource.arn.as_str(), &[SAVED_CAPACITY_TAG.to_string()])
            .await?;

        self.reconcile_tags(
            resource,
            ServiceState::Running,
            &self.config.started_tags,
            &self.config.stopped_tags,
        )
        .await;

        tracing::info!(service = %resource.id, cluster = %resource.cluster_name, count, "Started ecs service");
        self.emit(Event::service_started(resource.id.clone(), count))
            .await;
        Ok(())
    }

    /// Bring a service's start/stop tags in line with `target`.
    ///
    /// Removes keys of `opposite` that `apply` does not also set, then writes
    /// `apply` with sanitized values. Failures are logged and swallowed.
    pub async fn reconcile_tags(
        &self,
        resource: &ScheduledResource,
        target: ServiceState,
        apply: &[TagPair],
        opposite: &[TagPair],
    ) {
        let direction = target.label();
        let (apply, sanitized) = sanitize_tags(apply);
        for change in sanitized {
            tracing::warn!(
                key = %change.key,
                original = %change.original,
                sanitized = %change.sanitized,
                "Tag value changed because it contained characters that are not allowed in ecs tag values"
            );
            self.emit(Event::tag_value_sanitized(
                change.key,
                change.original,
                change.sanitized,
            ))
            .await;
        }

        if let Err(e) = self.apply_tags(resource, direction, &apply, opposite).await {
            tracing::warn!(
                service = %resource.id,
                direction,
                error = %e,
                "Error setting start or stop tags on ecs service"
            );
            self.emit(Event::tag_reconcile_failed(
                resource.id.clone(),
                target,
                e.to_string(),
            ))
            .await;
        }
    }

    async fn apply_tags(
        &self,
        resource: &ScheduledResource,
        direction: &str,
        apply: &[TagPair],
        opposite: &[TagPair],
    ) -> Result<(), ProviderError> {
        let remove = stale_keys(apply, opposite);
        if !remove.is_empty() {
            tracing::info!(
                arn = %resource.arn,
                direction,
                keys = ?remove,
                "Removing stale tag keys from ecs service"
            );
            self.client
                .untag_resource(resource.arn.as_str(), &remove)
                .await?;
        }

        if !apply.is_empty() {
            let tags: Vec<Tag> = apply.iter().map(Tag::from).collect();
            tracing::info!(
                arn = %resource.arn,
                direction,
                tags = ?tags,
                "Adding tags to ecs service"
            );
            self.client.tag_resource(resource.arn.as_str(), &tags).await?;
        }
        Ok(())
    }

    async fn transition_failed(
        &self,
        resource: &ScheduledResource,
        target: ServiceState,
        error: ProviderError,
    ) {
        tracing::error!(
            service = %resource.id,
            cluster = %resource.cluster_name,
            target = %target,
            error = %error,
            "Failed to change ecs service state"
        );
        self.emit(Event::transition_failed(
            resource.id.clone(),
            target,
            error.to_string(),
        ))
        .await;
    }

    async fn emit(&self, event: Event) {
        if let Some(events) = self.events {
            events.emit(event).await;
        }
    }
}
