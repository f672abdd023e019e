//! Core identifier types for scheduled services.
//!
//! These types provide type-safe identifiers for services, clusters and
//! the fully-qualified resource names used by tagging calls.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a scheduled service (the provider-assigned service name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceId(String);

/// Short name of the cluster that owns a service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClusterName(String);

/// Fully-qualified resource name, the primary key for tagging calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceArn(String);

impl ServiceId {
    /// Create a new ServiceId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServiceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ServiceId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl ClusterName {
    /// Create a new ClusterName from a string.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Extract the short cluster name from a qualified cluster reference.
    ///
    /// `arn:aws:ecs:eu-west-1:123456789012:cluster/prod` yields `prod`. A bare
    /// name without any `/` is returned as-is.
    pub fn from_arn(arn: &str) -> Self {
        Self::new(last_segment(arn))
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClusterName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl ResourceArn {
    /// Create a new ResourceArn from a string.
    pub fn new(arn: impl Into<String>) -> Self {
        Self(arn.into())
    }

    /// Short name carried in the last path segment of the ARN.
    ///
    /// Works for both the old `service/NAME` and the newer
    /// `service/CLUSTER/NAME` service ARN formats.
    pub fn short_name(&self) -> &str {
        last_segment(&self.0)
    }

    /// Get the underlying string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceArn {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ResourceArn {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

fn last_segment(qualified: &str) -> &str {
    qualified.rsplit('/').next().unwrap_or(qualified)
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ClusterName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ResourceArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
