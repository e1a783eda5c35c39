mod activity;

use std::path::PathBuf;
use std::process::ExitCode;

use chaos_eks::ChaosConfig;
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use crate::activity::{Activity, Outcome, RunError};

/// Run one EKS chaos action described by an activity document.
#[derive(Debug, Parser)]
#[command(name = "chaos-eks", version)]
struct Args {
    /// Activity document (JSON). Read from stdin when omitted.
    #[arg(long, env = "CHAOS_EKS_ACTIVITY")]
    activity: Option<PathBuf>,

    /// Seed for worker node sampling, for reproducible runs.
    #[arg(long, env = "CHAOS_EKS_SEED")]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries only the outcome
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let (outcome, code) = match execute(&args).await {
        Ok(output) => (Outcome::Succeeded { output }, ExitCode::SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, "activity failed");
            (Outcome::Failed { error: e.to_string() }, ExitCode::FAILURE)
        }
    };

    println!(
        "{}",
        serde_json::to_string(&outcome).expect("outcome is always serializable")
    );
    code
}

async fn execute(args: &Args) -> Result<Value, RunError> {
    let raw = match &args.activity {
        Some(path) => std::fs::read_to_string(path)?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    let activity: Activity = serde_json::from_str(&raw)?;
    let config = ChaosConfig::from_env()?;

    tracing::info!(action = ?activity.action, "running activity");
    activity::run(&activity, &config, args.seed).await
}
