use std::time::Duration;

use chaos_eks::cluster;
use chaos_eks::{ChaosConfig, TerminateNodes, terminate_random_nodes};
use chaos_infra::aws::AwsProvider;
use chaos_infra::types::ClusterSpec;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to read activity: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid activity: {0}")]
    Activity(#[from] serde_json::Error),

    #[error(transparent)]
    Chaos(#[from] chaos_eks::Error),

    #[error(transparent)]
    Infra(#[from] chaos_infra::Error),
}

/// One action invocation as handed over by the experiment runner.
#[derive(Debug, Clone, Deserialize)]
pub struct Activity {
    pub action: ActionName,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub configuration: Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    CreateCluster,
    DeleteCluster,
    TerminateRandomNodes,
}

/// Opaque experiment configuration. Only the region is read here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub aws_region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteClusterArgs {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TerminateRandomNodesArgs {
    pub cluster_name: String,
    pub aws_region: String,
    pub node_count: usize,
    /// Seconds; falls back to the configured default.
    #[serde(default)]
    pub termination_timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    CreateCluster(ClusterSpec),
    DeleteCluster(DeleteClusterArgs),
    TerminateRandomNodes(TerminateRandomNodesArgs),
}

impl Activity {
    /// Decode the arguments for the named action.
    pub fn action(&self) -> Result<Action, RunError> {
        let args = self.arguments.clone();
        Ok(match self.action {
            ActionName::CreateCluster => Action::CreateCluster(serde_json::from_value(args)?),
            ActionName::DeleteCluster => Action::DeleteCluster(serde_json::from_value(args)?),
            ActionName::TerminateRandomNodes => {
                Action::TerminateRandomNodes(serde_json::from_value(args)?)
            }
        })
    }
}

impl TerminateRandomNodesArgs {
    pub fn request(&self, config: &ChaosConfig) -> TerminateNodes {
        let mut req =
            TerminateNodes::new(&self.cluster_name, &self.aws_region, self.node_count).with_config(config);
        if let Some(secs) = self.termination_timeout {
            req.termination_timeout = Duration::from_secs(secs);
        }
        req
    }
}

/// Result line written to stdout.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded { output: Value },
    Failed { error: String },
}

/// Run the activity against AWS.
pub async fn run(activity: &Activity, config: &ChaosConfig, seed: Option<u64>) -> Result<Value, RunError> {
    let region = activity.configuration.aws_region.as_deref();

    match activity.action()? {
        Action::CreateCluster(spec) => {
            let provider = AwsProvider::from_env(region).await?;
            let info = cluster::create_cluster(&provider, &spec).await?;
            Ok(serde_json::to_value(info)?)
        }
        Action::DeleteCluster(args) => {
            let provider = AwsProvider::from_env(region).await?;
            let info = cluster::delete_cluster(&provider, &args.name).await?;
            Ok(serde_json::to_value(info)?)
        }
        Action::TerminateRandomNodes(args) => {
            let provider = AwsProvider::from_env(Some(&args.aws_region)).await?;
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let terminated = terminate_random_nodes(&provider, &mut rng, &args.request(config)).await?;
            Ok(json!({ "terminated": terminated }))
        }
    }
}

#[cfg(test)]
mod tests {
    use chaos_eks::FailurePolicy;

    use super::*;

    fn parse(value: Value) -> Activity {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_parses_terminate_random_nodes() {
        let activity = parse(json!({
            "action": "terminate_random_nodes",
            "arguments": {
                "cluster_name": "demo",
                "aws_region": "eu-west-1",
                "node_count": 2
            },
            "configuration": { "aws_region": "eu-west-1", "other": "ignored" }
        }));

        assert_eq!(activity.configuration.aws_region.as_deref(), Some("eu-west-1"));
        assert_eq!(
            activity.action().unwrap(),
            Action::TerminateRandomNodes(TerminateRandomNodesArgs {
                cluster_name: "demo".into(),
                aws_region: "eu-west-1".into(),
                node_count: 2,
                termination_timeout: None,
            })
        );
    }

    #[test]
    fn test_parses_create_cluster() {
        let activity = parse(json!({
            "action": "create_cluster",
            "arguments": {
                "name": "demo",
                "role_arn": "arn:aws:iam::123456789012:role/eks",
                "vpc_config": { "subnet_ids": ["subnet-1"] },
                "version": "1.30"
            }
        }));

        let Action::CreateCluster(spec) = activity.action().unwrap() else {
            panic!("expected create_cluster");
        };
        assert_eq!(spec.name, "demo");
        assert_eq!(spec.version.as_deref(), Some("1.30"));
        assert_eq!(spec.vpc_config.subnet_ids, vec!["subnet-1"]);
        assert!(activity.configuration.aws_region.is_none());
    }

    #[test]
    fn test_parses_delete_cluster() {
        let activity = parse(json!({
            "action": "delete_cluster",
            "arguments": { "name": "demo" }
        }));
        assert_eq!(
            activity.action().unwrap(),
            Action::DeleteCluster(DeleteClusterArgs { name: "demo".into() })
        );
    }

    #[test]
    fn test_rejects_unknown_action() {
        let result = serde_json::from_value::<Activity>(json!({ "action": "reboot_nodes" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_missing_arguments() {
        let activity = parse(json!({ "action": "delete_cluster" }));
        assert!(matches!(activity.action(), Err(RunError::Activity(_))));
    }

    #[test]
    fn test_request_uses_config_and_overrides_timeout() {
        let args = TerminateRandomNodesArgs {
            cluster_name: "demo".into(),
            aws_region: "eu-west-1".into(),
            node_count: 3,
            termination_timeout: Some(90),
        };
        let config = ChaosConfig {
            poll_interval: Duration::from_secs(2),
            failure_policy: FailurePolicy::Continue,
            ..Default::default()
        };

        let req = args.request(&config);
        assert_eq!(req.cluster_name, "demo");
        assert_eq!(req.node_count, 3);
        assert_eq!(req.termination_timeout, Duration::from_secs(90));
        assert_eq!(req.poll.interval, Duration::from_secs(2));
        assert_eq!(req.failure_policy, FailurePolicy::Continue);

        let req = TerminateRandomNodesArgs {
            termination_timeout: None,
            ..args
        }
        .request(&config);
        assert_eq!(req.termination_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_outcome_shape() {
        let ok = serde_json::to_value(Outcome::Succeeded {
            output: json!({ "terminated": ["i-1"] }),
        })
        .unwrap();
        assert_eq!(ok, json!({ "status": "succeeded", "output": { "terminated": ["i-1"] } }));

        let failed = serde_json::to_value(Outcome::Failed {
            error: "timed out".into(),
        })
        .unwrap();
        assert_eq!(failed, json!({ "status": "failed", "error": "timed out" }));
    }
}
