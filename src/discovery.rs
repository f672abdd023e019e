//! Discovery of schedulable services.
//!
//! Walks clusters, then the services of each cluster, then describes every
//! service with its tags. Each listing follows its continuation token until
//! the provider omits it. Provider failures abort the whole walk: a partial
//! inventory is not safe to schedule against.

use thiserror::Error;

use crate::core::resource::ScheduledResource;
use crate::core::types::{ClusterName, ResourceArn};
use crate::provider::{EcsClient, Operation, ProviderError};

/// Errors that abort discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A provider call failed.
    #[error("{operation} failed: {source}")]
    Provider {
        operation: Operation,
        #[source]
        source: ProviderError,
    },

    /// The provider returned something that cannot be interpreted.
    #[error("malformed response from {operation}: {message}")]
    MalformedResponse {
        operation: Operation,
        message: String,
    },
}

impl DiscoveryError {
    fn provider(operation: Operation) -> impl FnOnce(ProviderError) -> Self {
        move |source| DiscoveryError::Provider { operation, source }
    }
}

/// A service found while listing a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterService {
    pub cluster: ClusterName,
    pub service: String,
}

/// Enumerates services carrying the schedule tag.
pub struct Discoverer<'a> {
    client: &'a dyn EcsClient,
    tag_name: &'a str,
}

impl<'a> Discoverer<'a> {
    /// Create a discoverer using `tag_name` as the schedule tag.
    pub fn new(client: &'a dyn EcsClient, tag_name: &'a str) -> Self {
        Self { client, tag_name }
    }

    /// Discover all schedulable services.
    ///
    /// Services without the schedule tag are silently left out.
    pub async fn discover(&self) -> Result<Vec<ScheduledResource>, DiscoveryError> {
        let clusters = self.list_clusters().await?;

        let mut pairs = Vec::new();
        for cluster in &clusters {
            pairs.extend(self.list_services(cluster).await?);
        }

        let mut resources = Vec::new();
        for pair in &pairs {
            if let Some(resource) = self.describe(pair).await? {
                resources.push(resource);
            }
        }

        tracing::debug!(
            clusters = clusters.len(),
            services = pairs.len(),
            schedulable = resources.len(),
            "Discovery finished"
        );
        Ok(resources)
    }

    /// List the short names of all clusters.
    pub async fn list_clusters(&self) -> Result<Vec<ClusterName>, DiscoveryError> {
        let mut clusters = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_clusters(token.as_deref())
                .await
                .map_err(DiscoveryError::provider(Operation::ListClusters))?;

            for arn in &page.cluster_arns {
                let name = ClusterName::from_arn(arn);
                if name.as_str().is_empty() {
                    return Err(DiscoveryError::MalformedResponse {
                        operation: Operation::ListClusters,
                        message: format!("cluster ARN without a name: '{}'", arn),
                    });
                }
                clusters.push(name);
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(clusters)
    }

    /// List all services of one cluster.
    ///
    /// The continuation token is local to this call, so pagination of one
    /// cluster never leaks into another.
    pub async fn list_services(
        &self,
        cluster: &ClusterName,
    ) -> Result<Vec<ClusterService>, DiscoveryError> {
        let mut services = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page = self
                .client
                .list_services(cluster.as_str(), token.as_deref())
                .await
                .map_err(DiscoveryError::provider(Operation::ListServices))?;

            for arn in page.service_arns {
                let arn = ResourceArn::new(arn);
                let service = arn.short_name();
                if service.is_empty() {
                    return Err(DiscoveryError::MalformedResponse {
                        operation: Operation::ListServices,
                        message: format!("service ARN without a name: '{}'", arn),
                    });
                }
                services.push(ClusterService {
                    cluster: cluster.clone(),
                    service: service.to_string(),
                });
            }

            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }
        Ok(services)
    }

    /// Describe one service with its tags and project it.
    ///
    /// Returns `None` when the service is not schedulable or vanished
    /// between listing and describing.
    pub async fn describe(
        &self,
        pair: &ClusterService,
    ) -> Result<Option<ScheduledResource>, DiscoveryError> {
        let described = self
            .client
            .describe_services(pair.cluster.as_str(), std::slice::from_ref(&pair.service), true)
            .await
            .map_err(DiscoveryError::provider(Operation::DescribeServices))?;

        let Some(service) = described.first() else {
            tracing::warn!(
                cluster = %pair.cluster,
                service = %pair.service,
                "Service disappeared before it could be described"
            );
            return Ok(None);
        };

        let resource = ScheduledResource::from_description(service, self.tag_name);
        if resource.is_none() {
            tracing::debug!(
                cluster = %pair.cluster,
                service = %pair.service,
                tag_name = %self.tag_name,
                "Skipping ecs service without schedule tag"
            );
        }
        Ok(resource)
    }
}
