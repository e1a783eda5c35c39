//! Cloud provider boundary for the EKS chaos actions.
//!
//! The actions only talk to the provider through [`ClusterProvider`] and
//! [`InstanceProvider`]; [`aws::AwsProvider`] is the production backend.

pub mod aws;
pub mod types;

use async_trait::async_trait;
use types::{ClusterInfo, ClusterSpec, InstanceFilter, InstanceId, Reservation};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ec2 api error: {0}")]
    Ec2Api(String),

    #[error("eks api error: {0}")]
    EksApi(String),

    #[error("provider response missing field: {0}")]
    MissingField(&'static str),

    #[error("missing env var: {0}")]
    MissingEnv(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Managed Kubernetes control-plane operations.
#[async_trait]
pub trait ClusterProvider: Send + Sync + 'static {
    /// Request creation of a cluster. Returns as soon as the request is accepted.
    async fn create_cluster(&self, spec: &ClusterSpec) -> Result<ClusterInfo>;

    /// Request deletion of a cluster. Returns as soon as the request is accepted.
    async fn delete_cluster(&self, name: &str) -> Result<ClusterInfo>;
}

/// Compute instance operations, scoped per region.
#[async_trait]
pub trait InstanceProvider: Send + Sync + 'static {
    /// Describe instances matching all `filters`, preserving reservation nesting.
    async fn describe_instances(
        &self,
        region: &str,
        filters: &[InstanceFilter],
    ) -> Result<Vec<Reservation>>;

    /// Request termination of a single instance.
    async fn terminate_instance(&self, region: &str, id: &InstanceId) -> Result<()>;
}
