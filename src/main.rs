//! xferorc CLI — transfers a file, directory, or hot database snapshot to
//! one or more target hosts.

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use xferorc::config::{spec_from_cli, CliArgs};
use xferorc::core::{IptablesFirewall, MariaDbReplication, Supervisor};
use xferorc::network::Ssh2Executor;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_logging(args.verbose).expect("failed to install tracing subscriber");

    let spec = match spec_from_cli(&args) {
        Ok(spec) => spec,
        Err(err) => {
            eprintln!("xferorc: {err}");
            std::process::exit(err.exit_code());
        }
    };

    let executor = Ssh2Executor::new(args.user.clone());
    let firewall = IptablesFirewall::new(&executor);
    let replication = MariaDbReplication::new(&executor);
    let supervisor = Supervisor::new(&executor, &firewall, &replication);

    let summary = supervisor.run(&spec).await;
    summary.print_summary();

    for message in &summary.cleanup_errors {
        eprintln!("xferorc: cleanup warning: {message}");
    }

    std::process::exit(summary.exit_code());
}

/// Ambient logging setup, kept separate from `main` so it can return an
/// `anyhow::Result` for top-level ergonomics without touching the
/// orchestrator's own `OrchestratorError` type.
fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .context("installing the tracing subscriber")
}
