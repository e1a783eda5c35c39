use std::env;
use std::time::Duration;

use crate::nodes::{DEFAULT_TERMINATION_TIMEOUT, FailurePolicy};
use crate::poll::DEFAULT_POLL_INTERVAL;
use crate::{Error, Result};

/// Process-wide defaults for the node termination action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChaosConfig {
    pub poll_interval: Duration,
    pub termination_timeout: Duration,
    pub final_check: bool,
    pub failure_policy: FailurePolicy,
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            termination_timeout: DEFAULT_TERMINATION_TIMEOUT,
            final_check: false,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl ChaosConfig {
    /// Create from env vars:
    ///
    /// - `CHAOS_EKS_POLL_INTERVAL_SECS` (default: `5`, must be > 0)
    /// - `CHAOS_EKS_TERMINATION_TIMEOUT_SECS` (default: `60`)
    /// - `CHAOS_EKS_FINAL_CHECK` (`true`/`false`, default: `false`)
    /// - `CHAOS_EKS_FAILURE_POLICY` (`fail-fast` or `continue`, default: `fail-fast`)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Same as [`ChaosConfig::from_env`] with an arbitrary variable source.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let poll_interval = match var("CHAOS_EKS_POLL_INTERVAL_SECS") {
            Some(raw) => secs("CHAOS_EKS_POLL_INTERVAL_SECS", &raw)?,
            None => defaults.poll_interval,
        };
        if poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "CHAOS_EKS_POLL_INTERVAL_SECS must be greater than 0".into(),
            ));
        }

        let termination_timeout = match var("CHAOS_EKS_TERMINATION_TIMEOUT_SECS") {
            Some(raw) => secs("CHAOS_EKS_TERMINATION_TIMEOUT_SECS", &raw)?,
            None => defaults.termination_timeout,
        };

        let final_check = match var("CHAOS_EKS_FINAL_CHECK") {
            Some(raw) => raw.trim().parse::<bool>().map_err(|_| {
                Error::InvalidConfig(format!("CHAOS_EKS_FINAL_CHECK must be true or false: {raw}"))
            })?,
            None => defaults.final_check,
        };

        let failure_policy = match var("CHAOS_EKS_FAILURE_POLICY") {
            Some(raw) => raw.trim().parse()?,
            None => defaults.failure_policy,
        };

        Ok(Self {
            poll_interval,
            termination_timeout,
            final_check,
            failure_policy,
        })
    }
}

fn secs(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| Error::InvalidConfig(format!("{key} must be a whole number of seconds: {raw}")))
}
