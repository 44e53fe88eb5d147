//! Configuration surface for the transfer orchestrator
//!
//! Defines the CLI argument grammar and the closed `TransferOptions` record
//! the rest of the crate consumes, replacing the loosely-typed options map
//! the distilled design describes with a record whose fields are exactly
//! the enumerated keys from §3 — so the Pipeline Composer's decision table
//! is exhaustive by construction (Design Notes, §9).

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::spec::{Target, TransferSpec};

/// Transfer orchestrator — streams a file, directory, or hot database
/// snapshot from one source host to one or more target hosts.
#[derive(Parser, Debug, Clone)]
#[command(name = "xferorc")]
#[command(author = "SmartCopy Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compose and supervise a shell-pipeline transfer across hosts")]
pub struct CliArgs {
    /// Source, as `host:path`
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// One or more targets, each as `host:path`
    #[arg(value_name = "TARGET", required = true, num_args = 1..)]
    pub targets: Vec<String>,

    /// Fixed TCP port to use for every target (0 = allocate one per target)
    #[arg(long, default_value = "0")]
    pub port: u16,

    /// Interpose parallel-gzip compression on both ends
    #[arg(long, overrides_with = "no_compress", default_value_t = true)]
    pub compress: bool,
    #[arg(long = "no-compress", overrides_with = "compress")]
    pub no_compress: bool,

    /// Interpose symmetric-cipher encryption on both ends
    #[arg(long, overrides_with = "no_encrypt", default_value_t = true)]
    pub encrypt: bool,
    #[arg(long = "no-encrypt", overrides_with = "encrypt")]
    pub no_encrypt: bool,

    /// Pre/post checksum the whole payload (wins over `--parallel-checksum`)
    #[arg(long, overrides_with = "no_checksum", default_value_t = true)]
    pub checksum: bool,
    #[arg(long = "no-checksum", overrides_with = "checksum")]
    pub no_checksum: bool,

    /// Checksum the payload with a streaming tee during transfer instead
    #[arg(long, overrides_with = "no_parallel_checksum")]
    pub parallel_checksum: bool,
    #[arg(long = "no-parallel-checksum", overrides_with = "parallel_checksum")]
    pub no_parallel_checksum: bool,

    /// Transfer mode
    #[arg(long = "type", value_enum, default_value = "file")]
    pub mode: TransferMode,

    /// Pause replication on the source before transfer, resume after
    #[arg(long)]
    pub stop_slave: bool,

    /// Remote execution / xtrabackup user
    #[arg(long, default_value = "root")]
    pub user: String,

    /// Verbose logging (also raises the tracing log level)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse a `host:path` positional argument. Exactly one colon is required;
/// anything else is a usage error (exit code 2 per §6).
pub fn parse_host_path(arg: &str) -> Result<(String, String), OrchestratorError> {
    let parts: Vec<&str> = arg.splitn(2, ':').collect();
    if parts.len() != 2 || arg.matches(':').count() != 1 || parts[0].is_empty() || parts[1].is_empty() {
        return Err(OrchestratorError::Configuration(format!(
            "expected exactly one colon in 'host:path', got '{arg}'"
        )));
    }
    Ok((parts[0].to_string(), parts[1].to_string()))
}

/// Transfer mode, selecting the pipeline family (§3, §4.2).
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Plain file or directory copy
    #[default]
    File,
    /// Hot MariaDB/MySQL snapshot via xtrabackup
    Xtrabackup,
    /// Re-expand a pre-existing compressed archive on the source
    Decompress,
}

/// The closed set of options recognized by the orchestrator (§3). Every
/// field here corresponds 1:1 to a key the Pipeline Composer and Supervisor
/// switch on; there is no stringly-typed fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOptions {
    pub mode: TransferMode,
    pub port: u16,
    pub compress: bool,
    pub encrypt: bool,
    pub checksum: bool,
    pub parallel_checksum: bool,
    pub stop_slave: bool,
    pub verbose: bool,
    pub user: String,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            mode: TransferMode::File,
            port: 0,
            compress: true,
            encrypt: true,
            checksum: true,
            parallel_checksum: false,
            stop_slave: false,
            verbose: false,
            user: "root".to_string(),
        }
    }
}

impl TransferOptions {
    /// Build options from parsed CLI args, applying the §6 mutual-exclusion
    /// rule: `checksum` wins over `parallel_checksum` when both are selected.
    pub fn from_cli(args: &CliArgs) -> Self {
        let compress = if args.no_compress { false } else { args.compress };
        let encrypt = if args.no_encrypt { false } else { args.encrypt };
        let checksum = if args.no_checksum { false } else { args.checksum };
        let mut parallel_checksum = if args.no_parallel_checksum {
            false
        } else {
            args.parallel_checksum
        };
        if checksum {
            parallel_checksum = false;
        }

        Self {
            mode: args.mode,
            port: args.port,
            compress,
            encrypt,
            checksum,
            parallel_checksum,
            stop_slave: args.stop_slave,
            verbose: args.verbose,
            user: args.user.clone(),
        }
    }
}

/// Build a `TransferSpec` from parsed CLI arguments: the thin argument
/// surface §6 calls out, kept separate from `TransferOptions` so the
/// Supervisor never has to know about `clap`.
pub fn spec_from_cli(args: &CliArgs) -> Result<TransferSpec, OrchestratorError> {
    let (source_host, source_path) = parse_host_path(&args.source)?;

    let mut targets = Vec::with_capacity(args.targets.len());
    for raw in &args.targets {
        let (host, path) = parse_host_path(raw)?;
        targets.push(Target::new(host, path));
    }

    let options = TransferOptions::from_cli(args);
    TransferSpec::new(source_host, source_path, targets, options)
}
