//! tagsched - tag-driven start/stop scheduling for container cluster services.
//!
//! Services tagged with the configured schedule tag are discovered, reported
//! as running or stopped, and scaled to zero or back to their saved desired
//! count when the scheduling engine decides so.

pub mod config;
pub mod core;
pub mod discovery;
pub mod events;
pub mod provider;
pub mod service;
pub mod testing;
pub mod transition;

pub use config::{ConfigError, SchedulerConfig, YamlLoader};
pub use crate::core::resource::{ScheduledResource, ServiceState};
pub use crate::core::tags::{SAVED_CAPACITY_TAG, Tag, TagPair, sanitize_tag_value};
pub use crate::core::types::{ClusterName, ResourceArn, ServiceId};
pub use discovery::{Discoverer, DiscoveryError};
pub use events::{Event, EventBus, EventHandler};
pub use provider::{
    ClusterPage, EcsClient, FleetFixture, InMemoryEcs, Operation, ProviderError,
    ServiceDescription, ServiceFixture, ServicePage,
};
pub use service::{EcsService, SchedulerContext};
pub use transition::{RestoreCapacity, TransitionExecutor, TransitionResult};
