use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chaos_infra::InstanceProvider;
use chaos_infra::types::{InstanceDescriptor, InstanceFilter, InstanceId, InstanceState, Reservation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{error, info};

use crate::config::ChaosConfig;
use crate::poll::{self, PollSettings};
use crate::select::{sample, select_running, worker_group_name};
use crate::{Error, Result};

pub const DEFAULT_TERMINATION_TIMEOUT: Duration = Duration::from_secs(60);

/// What to do with the remaining selected nodes once one of them fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Abort on the first failure; later nodes are never touched.
    #[default]
    FailFast,
    /// Attempt every node and report all failures together.
    Continue,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailFast => "fail-fast",
            Self::Continue => "continue",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "fail-fast" => Ok(Self::FailFast),
            "continue" => Ok(Self::Continue),
            other => Err(Error::InvalidConfig(format!("unknown failure policy: {other}"))),
        }
    }
}

/// One node that could not be terminated.
#[derive(Debug)]
pub struct NodeFailure {
    pub instance_id: InstanceId,
    pub error: Box<Error>,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.instance_id, self.error)
    }
}

pub(crate) fn summarize(failures: &[NodeFailure]) -> String {
    failures
        .iter()
        .map(NodeFailure::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parameters of a random node termination run.
#[derive(Debug, Clone)]
pub struct TerminateNodes {
    pub cluster_name: String,
    pub region: String,
    pub node_count: usize,
    /// Per node, measured from its termination request.
    pub termination_timeout: Duration,
    pub poll: PollSettings,
    pub failure_policy: FailurePolicy,
}

impl TerminateNodes {
    pub fn new(cluster_name: impl Into<String>, region: impl Into<String>, node_count: usize) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            region: region.into(),
            node_count,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
            poll: PollSettings::default(),
            failure_policy: FailurePolicy::default(),
        }
    }

    /// Apply environment-level defaults.
    pub fn with_config(mut self, config: &ChaosConfig) -> Self {
        self.termination_timeout = config.termination_timeout;
        self.poll = PollSettings {
            interval: config.poll_interval,
            final_check: config.final_check,
        };
        self.failure_policy = config.failure_policy;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.cluster_name.is_empty() {
            return Err(Error::InvalidRequest("cluster name must not be empty".into()));
        }
        if self.region.is_empty() {
            return Err(Error::InvalidRequest("region must not be empty".into()));
        }
        if self.poll.interval.is_zero() {
            return Err(Error::InvalidRequest("poll interval must be positive".into()));
        }
        Ok(())
    }
}

/// Terminate `node_count` random running worker nodes of a cluster and wait
/// for each to reach the terminated state.
///
/// Nodes are handled one at a time in sampling order. Returns the ids that
/// were terminated, in that order.
pub async fn terminate_random_nodes<R: Rng + ?Sized>(
    provider: &dyn InstanceProvider,
    rng: &mut R,
    req: &TerminateNodes,
) -> Result<Vec<InstanceId>> {
    req.validate()?;

    let group_name = worker_group_name(&req.cluster_name);
    let candidates = select_running(provider, &req.region, &group_name).await?;
    let selected = sample(&candidates, req.node_count, rng)?;

    info!(
        cluster = %req.cluster_name,
        region = %req.region,
        candidates = candidates.len(),
        selected = selected.len(),
        policy = %req.failure_policy,
        "selected worker nodes to terminate"
    );

    let attempted = selected.len();
    let mut terminated = Vec::with_capacity(attempted);
    let mut failures = Vec::new();

    for instance_id in selected {
        match terminate_and_wait(provider, req, &instance_id).await {
            Ok(()) => terminated.push(instance_id),
            Err(e) => {
                error!(instance_id = %instance_id, error = %e, "node termination failed");
                match req.failure_policy {
                    FailurePolicy::FailFast => return Err(e),
                    FailurePolicy::Continue => failures.push(NodeFailure {
                        instance_id,
                        error: Box::new(e),
                    }),
                }
            }
        }
    }

    if !failures.is_empty() {
        return Err(Error::Aggregate {
            attempted,
            failures,
        });
    }

    info!(cluster = %req.cluster_name, terminated = terminated.len(), "worker nodes terminated");
    Ok(terminated)
}

async fn terminate_and_wait(
    provider: &dyn InstanceProvider,
    req: &TerminateNodes,
    instance_id: &InstanceId,
) -> Result<()> {
    info!(instance_id = %instance_id, "terminating instance");
    provider.terminate_instance(&req.region, instance_id).await?;

    let deadline = Instant::now() + req.termination_timeout;
    let description = format!("waiting for instance {instance_id} to reach a terminated state");
    poll::wait_with(deadline, &req.poll, &description, || {
        instance_terminated(provider, &req.region, instance_id)
    })
    .await?;

    info!(instance_id = %instance_id, "instance terminated");
    Ok(())
}

/// Query a single instance by id and report whether it is terminated.
pub async fn instance_terminated(
    provider: &dyn InstanceProvider,
    region: &str,
    instance_id: &InstanceId,
) -> Result<bool> {
    let reservations = provider
        .describe_instances(region, &[InstanceFilter::instance_id(instance_id)])
        .await?;
    let instance = single_instance(instance_id, reservations)?;
    Ok(instance.state == InstanceState::Terminated)
}

/// Unwrap a by-id describe response: exactly one reservation holding exactly
/// one instance with the requested id.
pub fn single_instance(
    instance_id: &InstanceId,
    reservations: Vec<Reservation>,
) -> Result<InstanceDescriptor> {
    let [reservation] = <[Reservation; 1]>::try_from(reservations).map_err(|r| {
        Error::UnexpectedResponseShape(format!(
            "expected 1 reservation for instance {instance_id}, got {}",
            r.len()
        ))
    })?;

    let [instance] = <[InstanceDescriptor; 1]>::try_from(reservation.instances).map_err(|i| {
        Error::UnexpectedResponseShape(format!(
            "expected 1 instance for filter instance-id={instance_id}, got {}",
            i.len()
        ))
    })?;

    if &instance.instance_id != instance_id {
        return Err(Error::UnexpectedResponseShape(format!(
            "asked for instance {instance_id}, got {}",
            instance.instance_id
        )));
    }

    Ok(instance)
}
