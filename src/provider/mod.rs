//! Container service client abstraction.
//!
//! The scheduler talks to the cluster provider through the [`EcsClient`]
//! trait. Transport, credentials and retry policy live behind the trait; the
//! crate ships an [`InMemoryEcs`] backend for tests and dry runs.

mod memory;

pub use memory::{Call, FleetFixture, InMemoryEcs, ServiceFixture};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::tags::Tag;

/// Errors returned by the provider client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// Connection or protocol level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The caller is not allowed to perform the operation.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The cluster, service or resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A request parameter was rejected.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Request rate exceeded after the transport gave up retrying.
    #[error("throttled: {0}")]
    Throttled(String),
}

/// Provider operations, used to label calls and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    ListClusters,
    ListServices,
    DescribeServices,
    UpdateService,
    TagResource,
    UntagResource,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::ListClusters => "ListClusters",
            Operation::ListServices => "ListServices",
            Operation::DescribeServices => "DescribeServices",
            Operation::UpdateService => "UpdateService",
            Operation::TagResource => "TagResource",
            Operation::UntagResource => "UntagResource",
        };
        f.write_str(name)
    }
}

/// One page of cluster ARNs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterPage {
    pub cluster_arns: Vec<String>,
    /// Present while more pages remain.
    pub next_token: Option<String>,
}

/// One page of service ARNs within a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePage {
    pub service_arns: Vec<String>,
    /// Present while more pages remain.
    pub next_token: Option<String>,
}

/// Raw service description as returned by the describe call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDescription {
    pub service_name: String,
    pub service_arn: String,
    pub cluster_arn: String,
    pub desired_count: u32,
    pub status: String,
    pub launch_type: Option<String>,
    /// Only populated when tags were requested.
    pub tags: Option<Vec<Tag>>,
}

/// Client for the container service API.
#[async_trait]
pub trait EcsClient: Send + Sync {
    /// List one page of cluster ARNs.
    async fn list_clusters(&self, next_token: Option<&str>) -> Result<ClusterPage, ProviderError>;

    /// List one page of service ARNs in `cluster`.
    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> Result<ServicePage, ProviderError>;

    /// Describe services in `cluster`, optionally including their tags.
    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
        include_tags: bool,
    ) -> Result<Vec<ServiceDescription>, ProviderError>;

    /// Set the desired count of a service.
    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
    ) -> Result<(), ProviderError>;

    /// Add or overwrite tags on a resource.
    async fn tag_resource(&self, resource_arn: &str, tags: &[Tag]) -> Result<(), ProviderError>;

    /// Remove tag keys from a resource.
    async fn untag_resource(
        &self,
        resource_arn: &str,
        tag_keys: &[String],
    ) -> Result<(), ProviderError>;
}
