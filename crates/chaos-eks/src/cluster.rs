//! Fire-and-forget cluster actions. Each issues exactly one provider request
//! and returns what the provider reported; nothing waits for the cluster to
//! reach a steady state.

use chaos_infra::ClusterProvider;
use chaos_infra::types::{ClusterInfo, ClusterSpec};
use tracing::debug;

use crate::{Error, Result};

/// Create a new EKS cluster.
pub async fn create_cluster(provider: &dyn ClusterProvider, spec: &ClusterSpec) -> Result<ClusterInfo> {
    if spec.name.is_empty() {
        return Err(Error::InvalidRequest("cluster name must not be empty".into()));
    }
    if spec.role_arn.is_empty() {
        return Err(Error::InvalidRequest("role ARN must not be empty".into()));
    }

    debug!(cluster = %spec.name, version = ?spec.version, "creating EKS cluster");
    Ok(provider.create_cluster(spec).await?)
}

/// Delete the given EKS cluster.
pub async fn delete_cluster(provider: &dyn ClusterProvider, name: &str) -> Result<ClusterInfo> {
    if name.is_empty() {
        return Err(Error::InvalidRequest("cluster name must not be empty".into()));
    }

    debug!(cluster = %name, "deleting EKS cluster");
    Ok(provider.delete_cluster(name).await?)
}
