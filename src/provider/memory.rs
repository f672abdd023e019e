//! In-memory container service backend.
//!
//! Provides a thread-safe fleet of clusters and services for testing, dry
//! runs and benchmarks. Listing calls are paginated with opaque continuation
//! tokens, every call is recorded, and failures can be injected per
//! operation and target.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::RwLock;

use super::{ClusterPage, EcsClient, Operation, ProviderError, ServiceDescription, ServicePage};
use crate::config::ConfigError;
use crate::core::tags::Tag;

const DEFAULT_PAGE_SIZE: usize = 10;

/// A service to seed into an [`InMemoryEcs`] fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceFixture {
    pub cluster: String,
    pub name: String,
    #[serde(default)]
    pub desired_count: u32,
    #[serde(default)]
    pub launch_type: Option<String>,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_status() -> String {
    "ACTIVE".to_string()
}

impl ServiceFixture {
    /// Create an untagged, active service with the given desired count.
    pub fn new(cluster: impl Into<String>, name: impl Into<String>, desired_count: u32) -> Self {
        Self {
            cluster: cluster.into(),
            name: name.into(),
            desired_count,
            launch_type: Some("FARGATE".to_string()),
            status: default_status(),
            tags: BTreeMap::new(),
        }
    }

    /// Builder: add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builder: set the launch type.
    pub fn with_launch_type(mut self, launch_type: impl Into<String>) -> Self {
        self.launch_type = Some(launch_type.into());
        self
    }
}

/// A whole fleet loaded from YAML, used by the command line dry runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FleetFixture {
    pub region: Option<String>,
    pub account: Option<String>,
    pub page_size: Option<usize>,
    /// Clusters to create even when no service references them.
    pub clusters: Vec<String>,
    pub services: Vec<ServiceFixture>,
}

impl FleetFixture {
    /// Load a fleet fixture from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadError {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(&content)
    }

    /// Parse a fleet fixture from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Build an in-memory backend seeded with this fleet.
    pub fn build(&self) -> InMemoryEcs {
        let ecs = InMemoryEcs::new(
            self.region.as_deref().unwrap_or("us-east-1"),
            self.account.as_deref().unwrap_or("123456789012"),
        )
        .with_page_size(self.page_size.unwrap_or(DEFAULT_PAGE_SIZE));
        for cluster in &self.clusters {
            ecs.add_cluster(cluster);
        }
        for service in &self.services {
            ecs.add_service(service.clone());
        }
        ecs
    }
}

/// A recorded provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub operation: Operation,
    /// Cluster for listing, service for describe/update, ARN for tagging.
    pub target: String,
    /// Continuation token passed with a listing call.
    pub token: Option<String>,
    /// Desired count for updates, tag keys for tagging calls.
    pub detail: Vec<String>,
}

struct Fault {
    operation: Operation,
    target: Option<String>,
    error: ProviderError,
}

struct ServiceRecord {
    name: String,
    arn: String,
    cluster_arn: String,
    desired_count: u32,
    status: String,
    launch_type: Option<String>,
}

#[derive(Default)]
struct Fleet {
    /// Cluster names in creation order.
    clusters: Vec<String>,
    /// Service names per cluster in creation order.
    services: HashMap<String, Vec<String>>,
    records: HashMap<(String, String), ServiceRecord>,
    tags: HashMap<String, BTreeMap<String, String>>,
}

/// In-memory container service backend.
///
/// Thread-safe storage using RwLock. Cluster and service listings are
/// returned `page_size` entries at a time.
pub struct InMemoryEcs {
    region: String,
    account: String,
    page_size: usize,
    fleet: RwLock<Fleet>,
    calls: RwLock<Vec<Call>>,
    faults: RwLock<Vec<Fault>>,
}

impl InMemoryEcs {
    /// Create an empty fleet for the given region and account.
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            account: account.into(),
            page_size: DEFAULT_PAGE_SIZE,
            fleet: RwLock::new(Fleet::default()),
            calls: RwLock::new(Vec::new()),
            faults: RwLock::new(Vec::new()),
        }
    }

    /// Builder: set the number of entries per listing page (minimum 1).
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// ARN of a cluster in this fleet.
    pub fn cluster_arn(&self, cluster: &str) -> String {
        format!("arn:aws:ecs:{}:{}:cluster/{}", self.region, self.account, cluster)
    }

    /// ARN of a service in this fleet.
    pub fn service_arn(&self, cluster: &str, service: &str) -> String {
        format!(
            "arn:aws:ecs:{}:{}:service/{}/{}",
            self.region, self.account, cluster, service
        )
    }

    /// Create a cluster if it does not exist yet.
    pub fn add_cluster(&self, cluster: &str) {
        let mut fleet = self.fleet.write().unwrap_or_else(|e| e.into_inner());
        if !fleet.clusters.iter().any(|c| c == cluster) {
            fleet.clusters.push(cluster.to_string());
            fleet.services.insert(cluster.to_string(), Vec::new());
        }
    }

    /// Add a service (creating its cluster on demand) and return its ARN.
    pub fn add_service(&self, fixture: ServiceFixture) -> String {
        self.add_cluster(&fixture.cluster);
        let arn = self.service_arn(&fixture.cluster, &fixture.name);
        let record = ServiceRecord {
            name: fixture.name.clone(),
            arn: arn.clone(),
            cluster_arn: self.cluster_arn(&fixture.cluster),
            desired_count: fixture.desired_count,
            status: fixture.status,
            launch_type: fixture.launch_type,
        };

        let mut fleet = self.fleet.write().unwrap_or_else(|e| e.into_inner());
        let key = (fixture.cluster.clone(), fixture.name.clone());
        if fleet.records.insert(key, record).is_none() {
            fleet
                .services
                .entry(fixture.cluster)
                .or_default()
                .push(fixture.name);
        }
        fleet.tags.insert(arn.clone(), fixture.tags);
        arn
    }

    /// Fail every `operation` call aimed at `target`.
    ///
    /// The target is the cluster name for service listings, the service name
    /// for describe and update calls, and the resource ARN for tagging calls.
    pub fn fail_on(&self, operation: Operation, target: impl Into<String>, error: ProviderError) {
        self.push_fault(Fault {
            operation,
            target: Some(target.into()),
            error,
        });
    }

    /// Fail every `operation` call regardless of target.
    pub fn fail_all(&self, operation: Operation, error: ProviderError) {
        self.push_fault(Fault {
            operation,
            target: None,
            error,
        });
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.faults.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.calls.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Calls of a single operation, in order.
    pub fn calls_for(&self, operation: Operation) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.operation == operation)
            .collect()
    }

    /// Calls that change state (update, tag, untag).
    pub fn mutating_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c.operation,
                    Operation::UpdateService | Operation::TagResource | Operation::UntagResource
                )
            })
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.calls.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Current desired count of a service.
    pub fn desired_count(&self, cluster: &str, service: &str) -> Option<u32> {
        let fleet = self.fleet.read().unwrap_or_else(|e| e.into_inner());
        fleet
            .records
            .get(&(cluster.to_string(), service.to_string()))
            .map(|r| r.desired_count)
    }

    /// Current tags of a resource.
    pub fn tags(&self, resource_arn: &str) -> BTreeMap<String, String> {
        let fleet = self.fleet.read().unwrap_or_else(|e| e.into_inner());
        fleet.tags.get(resource_arn).cloned().unwrap_or_default()
    }

    /// Describe every service in the fleet, in creation order.
    pub fn snapshot(&self) -> Vec<ServiceDescription> {
        let fleet = self.fleet.read().unwrap_or_else(|e| e.into_inner());
        let mut out = Vec::new();
        for cluster in &fleet.clusters {
            for name in fleet.services.get(cluster).into_iter().flatten() {
                if let Some(record) = fleet.records.get(&(cluster.clone(), name.clone())) {
                    out.push(describe(record, fleet.tags.get(&record.arn)));
                }
            }
        }
        out
    }

    fn push_fault(&self, fault: Fault) {
        self.faults
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(fault);
    }

    fn record(
        &self,
        operation: Operation,
        target: &str,
        token: Option<&str>,
        detail: Vec<String>,
    ) -> Result<(), ProviderError> {
        self.calls
            .write()
            .map_err(|_| lock_poisoned())?
            .push(Call {
                operation,
                target: target.to_string(),
                token: token.map(str::to_string),
                detail,
            });

        let faults = self.faults.read().map_err(|_| lock_poisoned())?;
        match faults.iter().find(|f| {
            f.operation == operation && f.target.as_deref().is_none_or(|t| t == target)
        }) {
            Some(fault) => Err(fault.error.clone()),
            None => Ok(()),
        }
    }

    /// Return the window `[offset, offset + page_size)` and the token for the rest.
    fn page<'a>(
        &self,
        items: &'a [String],
        scope: &str,
        token: Option<&str>,
    ) -> Result<(&'a [String], Option<String>), ProviderError> {
        let offset = match token {
            None => 0,
            Some(token) => decode_token(token, scope)?,
        };
        let start = offset.min(items.len());
        let end = (start + self.page_size).min(items.len());
        let next = (end < items.len()).then(|| format!("{}#{}", scope, end));
        Ok((&items[start..end], next))
    }
}

fn decode_token(token: &str, scope: &str) -> Result<usize, ProviderError> {
    token
        .strip_prefix(scope)
        .and_then(|rest| rest.strip_prefix('#'))
        .and_then(|offset| offset.parse().ok())
        .ok_or_else(|| {
            ProviderError::InvalidParameter(format!("invalid continuation token: {}", token))
        })
}

fn lock_poisoned() -> ProviderError {
    ProviderError::Transport("fleet state lock poisoned".to_string())
}

fn describe(record: &ServiceRecord, tags: Option<&BTreeMap<String, String>>) -> ServiceDescription {
    ServiceDescription {
        service_name: record.name.clone(),
        service_arn: record.arn.clone(),
        cluster_arn: record.cluster_arn.clone(),
        desired_count: record.desired_count,
        status: record.status.clone(),
        launch_type: record.launch_type.clone(),
        tags: tags.map(|tags| tags.iter().map(|(k, v)| Tag::new(k, v)).collect()),
    }
}

#[async_trait]
impl EcsClient for InMemoryEcs {
    async fn list_clusters(&self, next_token: Option<&str>) -> Result<ClusterPage, ProviderError> {
        self.record(Operation::ListClusters, "", next_token, Vec::new())?;
        let fleet = self.fleet.read().map_err(|_| lock_poisoned())?;
        let (names, next_token) = self.page(&fleet.clusters, "clusters", next_token)?;
        Ok(ClusterPage {
            cluster_arns: names.iter().map(|c| self.cluster_arn(c)).collect(),
            next_token,
        })
    }

    async fn list_services(
        &self,
        cluster: &str,
        next_token: Option<&str>,
    ) -> Result<ServicePage, ProviderError> {
        self.record(Operation::ListServices, cluster, next_token, Vec::new())?;
        let fleet = self.fleet.read().map_err(|_| lock_poisoned())?;
        let names = fleet
            .services
            .get(cluster)
            .ok_or_else(|| ProviderError::NotFound(format!("cluster: {}", cluster)))?;
        let scope = format!("services/{}", cluster);
        let (names, next_token) = self.page(names, &scope, next_token)?;
        Ok(ServicePage {
            service_arns: names.iter().map(|s| self.service_arn(cluster, s)).collect(),
            next_token,
        })
    }

    async fn describe_services(
        &self,
        cluster: &str,
        services: &[String],
        include_tags: bool,
    ) -> Result<Vec<ServiceDescription>, ProviderError> {
        for service in services {
            self.record(Operation::DescribeServices, service, None, vec![cluster.to_string()])?;
        }
        let fleet = self.fleet.read().map_err(|_| lock_poisoned())?;
        if !fleet.services.contains_key(cluster) {
            return Err(ProviderError::NotFound(format!("cluster: {}", cluster)));
        }
        // Unknown services are reported as failures by the real API, not as an error.
        Ok(services
            .iter()
            .filter_map(|name| fleet.records.get(&(cluster.to_string(), name.clone())))
            .map(|record| {
                let tags = if include_tags {
                    Some(fleet.tags.get(&record.arn).cloned().unwrap_or_default())
                } else {
                    None
                };
                describe(record, tags.as_ref())
            })
            .collect())
    }

    async fn update_service(
        &self,
        cluster: &str,
        service: &str,
        desired_count: u32,
    ) -> Result<(), ProviderError> {
        self.record(
            Operation::UpdateService,
            service,
            None,
            vec![desired_count.to_string()],
        )?;
        let mut fleet = self.fleet.write().map_err(|_| lock_poisoned())?;
        let record = fleet
            .records
            .get_mut(&(cluster.to_string(), service.to_string()))
            .ok_or_else(|| ProviderError::NotFound(format!("service: {}/{}", cluster, service)))?;
        record.desired_count = desired_count;
        Ok(())
    }

    async fn tag_resource(&self, resource_arn: &str, tags: &[Tag]) -> Result<(), ProviderError> {
        let keys = tags.iter().map(|t| t.key.clone()).collect();
        self.record(Operation::TagResource, resource_arn, None, keys)?;
        let mut fleet = self.fleet.write().map_err(|_| lock_poisoned())?;
        let current = fleet
            .tags
            .get_mut(resource_arn)
            .ok_or_else(|| ProviderError::NotFound(format!("resource: {}", resource_arn)))?;
        for tag in tags {
            current.insert(tag.key.clone(), tag.value.clone());
        }
        Ok(())
    }

    async fn untag_resource(
        &self,
        resource_arn: &str,
        tag_keys: &[String],
    ) -> Result<(), ProviderError> {
        self.record(Operation::UntagResource, resource_arn, None, tag_keys.to_vec())?;
        let mut fleet = self.fleet.write().map_err(|_| lock_poisoned())?;
        let current = fleet
            .tags
            .get_mut(resource_arn)
            .ok_or_else(|| ProviderError::NotFound(format!("resource: {}", resource_arn)))?;
        for key in tag_keys {
            current.remove(key);
        }
        Ok(())
    }
}
