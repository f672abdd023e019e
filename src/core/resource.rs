//! Schedulable resource records.
//!
//! A [`ScheduledResource`] is the normalized view of a cluster service that the
//! scheduling engine consumes. Records are projected from raw
//! [`ServiceDescription`]s at discovery time and never cached.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::tags::SAVED_CAPACITY_TAG;
use super::types::{ClusterName, ResourceArn, ServiceId};
use crate::provider::ServiceDescription;

/// Resource kind reported to the scheduling engine.
pub const SERVICE_KIND: &str = "ecs";

/// Running state of a service, derived from its desired count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// Desired count is above zero.
    Running,
    /// Desired count is zero.
    Stopped,
}

impl ServiceState {
    /// Derive the state from a desired count.
    pub fn from_capacity(capacity: u32) -> Self {
        if capacity == 0 {
            ServiceState::Stopped
        } else {
            ServiceState::Running
        }
    }

    /// Label reported back to the scheduling engine.
    pub fn label(&self) -> &'static str {
        match self {
            ServiceState::Running => "running",
            ServiceState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A service that carries the schedule tag and can be started or stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledResource {
    /// Service name, used as the resource id.
    pub id: ServiceId,
    /// Service name.
    pub name: String,
    /// Fully-qualified service ARN.
    pub arn: ResourceArn,
    /// Cluster the service belongs to.
    pub cluster_name: ClusterName,
    /// Desired count reported by the provider at discovery time.
    pub current_capacity: u32,
    /// Raw value of the saved-capacity tag, parsed only when starting.
    pub saved_capacity: Option<String>,
    /// Derived from `current_capacity`.
    pub state: ServiceState,
    /// Value of the schedule tag.
    pub schedule_name: String,
    /// All tags on the service at discovery time.
    pub tags: HashMap<String, String>,
    /// Launch type (FARGATE, EC2, ...), informational only.
    pub launch_type: Option<String>,
    /// Provider status string (ACTIVE, DRAINING, ...).
    pub status: String,
    /// Services cannot be resized by the scheduler.
    pub allow_resize: bool,
    pub hibernate: bool,
    pub is_terminated: bool,
    pub maintenance_window: Option<String>,
}

impl ScheduledResource {
    /// Project a raw service description into a schedulable record.
    ///
    /// Returns `None` when the service has no tags at all or lacks
    /// `schedule_tag`. Never touches the provider.
    pub fn from_description(service: &ServiceDescription, schedule_tag: &str) -> Option<Self> {
        let tags: HashMap<String, String> = service
            .tags
            .as_ref()?
            .iter()
            .map(|t| (t.key.clone(), t.value.clone()))
            .collect();
        if tags.is_empty() {
            return None;
        }

        let schedule_name = tags.get(schedule_tag)?.clone();
        let saved_capacity = tags.get(SAVED_CAPACITY_TAG).cloned();

        Some(Self {
            id: ServiceId::new(service.service_name.clone()),
            name: service.service_name.clone(),
            arn: ResourceArn::new(service.service_arn.clone()),
            cluster_name: ClusterName::from_arn(&service.cluster_arn),
            current_capacity: service.desired_count,
            saved_capacity,
            state: ServiceState::from_capacity(service.desired_count),
            schedule_name,
            tags,
            launch_type: service.launch_type.clone(),
            status: service.status.clone(),
            allow_resize: false,
            hibernate: false,
            is_terminated: false,
            maintenance_window: None,
        })
    }

    /// Whether the service is currently running.
    pub fn is_running(&self) -> bool {
        self.state == ServiceState::Running
    }

    /// Instance type label reported to the scheduling engine.
    pub fn instance_type(&self) -> &str {
        self.launch_type.as_deref().unwrap_or("")
    }

    /// Resource kind of this record.
    pub fn kind(&self) -> &'static str {
        SERVICE_KIND
    }
}
