//! Configuration type definitions.

use serde::{Deserialize, Serialize};

use crate::core::tags::TagPair;

/// Tag key that binds a service to a schedule unless configured otherwise.
pub const DEFAULT_TAG_NAME: &str = "Schedule";

/// Scheduler configuration (tagsched.yaml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Tag key whose presence makes a service schedulable.
    pub tag_name: String,
    /// Tags applied when a service is started.
    pub started_tags: Vec<TagPair>,
    /// Tags applied when a service is stopped.
    pub stopped_tags: Vec<TagPair>,
    /// Regions to process.
    pub regions: Vec<String>,
    /// Account the scheduler runs for.
    pub account: Option<String>,
    /// Name of the deployment stack, informational.
    pub stack_name: Option<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tag_name: DEFAULT_TAG_NAME.to_string(),
            started_tags: Vec::new(),
            stopped_tags: Vec::new(),
            regions: Vec::new(),
            account: None,
            stack_name: None,
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration using `tag_name` as the schedule tag.
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Self::default()
        }
    }

    /// Builder: set the tags applied on start.
    pub fn with_started_tags(mut self, tags: Vec<TagPair>) -> Self {
        self.started_tags = tags;
        self
    }

    /// Builder: set the tags applied on stop.
    pub fn with_stopped_tags(mut self, tags: Vec<TagPair>) -> Self {
        self.stopped_tags = tags;
        self
    }

    /// Builder: add a region.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(region.into());
        self
    }
}
