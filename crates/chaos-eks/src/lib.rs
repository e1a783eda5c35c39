//! Chaos actions against EKS clusters and their EC2 worker nodes.
//!
//! - [`cluster`]: fire-and-forget cluster create/delete
//! - [`nodes`]: terminate a random sample of worker nodes and wait for each
//! - [`select`]: candidate discovery and sampling
//! - [`poll`]: bounded "wait until true or time out" primitive

pub mod cluster;
pub mod config;
pub mod nodes;
pub mod poll;
pub mod select;

pub use chaos_infra::types::InstanceId;
pub use config::ChaosConfig;
pub use nodes::{FailurePolicy, NodeFailure, TerminateNodes, terminate_random_nodes};
pub use poll::{PollSettings, TimedOut, wait_until};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Timeout(#[from] TimedOut),

    #[error("requested {requested} nodes but only {available} candidates are running")]
    InsufficientCandidates { requested: usize, available: usize },

    #[error("unexpected response shape: {0}")]
    UnexpectedResponseShape(String),

    #[error("provider error: {0}")]
    Provider(#[from] chaos_infra::Error),

    #[error(
        "{} of {} node terminations failed: {}",
        .failures.len(),
        .attempted,
        nodes::summarize(.failures)
    )]
    Aggregate {
        attempted: usize,
        failures: Vec<NodeFailure>,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
