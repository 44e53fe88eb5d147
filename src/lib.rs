//! # xferorc — Transfer Orchestrator
//!
//! Orchestrates large payload transfers — files, directory trees, or live
//! database snapshots — to one or more target hosts by composing shell
//! pipelines over a remote-execution backend. The orchestrator never moves
//! payload bytes itself: a producer pipeline on the source streams into a
//! consumer pipeline on each target over a bare socket, with optional
//! compression, encryption, and checksumming interposed on both ends.
//!
//! ## Quick start
//!
//! ```no_run
//! use xferorc::config::{spec_from_cli, CliArgs};
//! use xferorc::core::{IptablesFirewall, MariaDbReplication, Supervisor};
//! use xferorc::network::Ssh2Executor;
//! use clap::Parser;
//!
//! # async fn run() -> xferorc::error::Result<()> {
//! let args = CliArgs::parse();
//! let spec = spec_from_cli(&args)?;
//!
//! let executor = Ssh2Executor::new(args.user.clone());
//! let firewall = IptablesFirewall::new(&executor);
//! let replication = MariaDbReplication::new(&executor);
//! let supervisor = Supervisor::new(&executor, &firewall, &replication);
//!
//! let summary = supervisor.run(&spec).await;
//! summary.print_summary();
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod spec;

pub use error::{OrchestratorError, Result};
pub use spec::{RunSummary, Target, TransferSpec, TransferState};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
