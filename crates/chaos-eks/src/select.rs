//! Candidate discovery and random sampling of worker nodes.

use chaos_infra::InstanceProvider;
use chaos_infra::types::{InstanceDescriptor, InstanceFilter, InstanceId, InstanceState};
use rand::Rng;
use tracing::debug;

use crate::{Error, Result};

/// Security group name shared by a cluster's worker nodes.
pub fn worker_group_name(cluster_name: &str) -> String {
    format!("{cluster_name}-workers")
}

/// Running and attached to `group_name`.
pub fn is_candidate(instance: &InstanceDescriptor, group_name: &str) -> bool {
    instance.state == InstanceState::Running && instance.in_group(group_name)
}

/// List the running instances of `group_name`, in the order the provider returned them.
///
/// The provider is asked to filter server-side; results are re-checked here
/// so a lax provider cannot widen the candidate set.
pub async fn select_running(
    provider: &dyn InstanceProvider,
    region: &str,
    group_name: &str,
) -> Result<Vec<InstanceId>> {
    let filters = [
        InstanceFilter::state(InstanceState::Running),
        InstanceFilter::group_name(group_name),
    ];
    let reservations = provider.describe_instances(region, &filters).await?;

    let candidates: Vec<InstanceId> = reservations
        .into_iter()
        .flat_map(|r| r.instances)
        .filter(|i| is_candidate(i, group_name))
        .map(|i| i.instance_id)
        .collect();

    debug!(region, group_name, candidates = candidates.len(), "selected running instances");
    Ok(candidates)
}

/// Draw `count` distinct candidates uniformly at random, in random order.
pub fn sample<R: Rng + ?Sized>(
    candidates: &[InstanceId],
    count: usize,
    rng: &mut R,
) -> Result<Vec<InstanceId>> {
    if count > candidates.len() {
        return Err(Error::InsufficientCandidates {
            requested: count,
            available: candidates.len(),
        });
    }

    Ok(rand::seq::index::sample(rng, candidates.len(), count)
        .into_iter()
        .map(|i| candidates[i].clone())
        .collect())
}
