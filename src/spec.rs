//! The transfer data model: `TransferSpec` (immutable input), `TransferState`
//! (per-target, mutated by the Supervisor), and `RunSummary` (the aggregated
//! result a caller or the CLI inspects once the run finishes).

use crate::config::TransferOptions;
use std::path::PathBuf;

/// One (host, path) pair a payload is being sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub path: PathBuf,
}

impl Target {
    pub fn new(host: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }
}

/// Immutable description of one transfer run, constructed once from parsed
/// arguments and consumed by exactly one Supervisor run (§3).
#[derive(Debug, Clone)]
pub struct TransferSpec {
    pub source_host: String,
    pub source_path: PathBuf,
    pub targets: Vec<Target>,
    pub options: TransferOptions,
}

impl TransferSpec {
    /// Construct a spec, enforcing the §3 invariant that `targets` is
    /// non-empty.
    pub fn new(
        source_host: impl Into<String>,
        source_path: impl Into<PathBuf>,
        targets: Vec<Target>,
        options: TransferOptions,
    ) -> Result<Self, crate::error::OrchestratorError> {
        if targets.is_empty() {
            return Err(crate::error::OrchestratorError::Configuration(
                "at least one target is required".to_string(),
            ));
        }
        Ok(Self {
            source_host: source_host.into(),
            source_path: source_path.into(),
            targets,
            options,
        })
    }

    /// True when the source is a regular file rather than a directory, as
    /// far as the `file`/`decompress` modes are concerned. Determined by a
    /// remote probe during sanity checks, not by local path inspection —
    /// callers should not guess this ahead of `sanity_checks`.
    pub fn is_file_mode(&self) -> bool {
        matches!(self.options.mode, crate::config::TransferMode::File)
    }
}

/// Phase of a single target's transfer, per the §3 state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Checks,
    ReplicationPaused,
    FirewallOpen,
    Listening,
    Sending,
    Verifying,
    Done,
    Failed,
}

/// Per-target mutable state, created at run start and discarded at run end.
#[derive(Debug, Clone)]
pub struct TransferState {
    pub target: Target,
    pub allocated_port: Option<u16>,
    pub sender_exit_code: Option<i32>,
    pub source_checksum: Option<String>,
    pub target_checksum: Option<String>,
    pub phase: Phase,
    pub error: Option<String>,
    /// The failing error's own `exit_code()` classification (error.rs),
    /// carried through so `RunSummary::exit_code` can surface it instead of
    /// a flat sentinel.
    pub error_code: Option<i32>,
}

impl TransferState {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            allocated_port: None,
            sender_exit_code: None,
            source_checksum: None,
            target_checksum: None,
            phase: Phase::Init,
            error: None,
            error_code: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    pub fn fail(&mut self, error: &crate::error::OrchestratorError) {
        self.phase = Phase::Failed;
        self.error_code = Some(error.exit_code());
        self.error = Some(error.to_string());
    }
}

/// Aggregated outcome of a run over all targets, mirroring the teacher's
/// `CopyResult`/`print_summary` shape but keyed to per-target phases instead
/// of a single-destination byte count.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub per_target: Vec<TransferState>,
    /// Failures from mandatory run-level cleanup (currently: resuming
    /// replication). Recorded but never overwrites an earlier in-flight
    /// failure (§7).
    pub cleanup_errors: Vec<String>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.per_target.iter().all(TransferState::is_success)
    }

    /// The overall process exit code: 0 if every target finished `Done`,
    /// otherwise the first failure's own `OrchestratorError::exit_code()`
    /// (§6/§7), or a sentinel value (1) if a target failed without one
    /// recorded.
    pub fn exit_code(&self) -> i32 {
        for state in &self.per_target {
            if !state.is_success() {
                return state.error_code.filter(|c| *c != 0).unwrap_or(1);
            }
        }
        0
    }

    pub fn print_summary(&self) {
        for state in &self.per_target {
            match state.phase {
                Phase::Done => println!("{}: OK ({})", state.target.host, state.target.path.display()),
                _ => println!(
                    "{}: FAILED ({}){}",
                    state.target.host,
                    state.target.path.display(),
                    state
                        .error
                        .as_ref()
                        .map(|e| format!(" — {e}"))
                        .unwrap_or_default()
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferOptions;

    #[test]
    fn construction_rejects_empty_targets() {
        let result = TransferSpec::new("src", "/a/b", vec![], TransferOptions::default());
        assert!(result.is_err());
    }

    #[test]
    fn run_summary_exit_code_is_zero_when_all_done() {
        let mut s1 = TransferState::new(Target::new("t1", "/x"));
        s1.phase = Phase::Done;
        let mut s2 = TransferState::new(Target::new("t2", "/y"));
        s2.phase = Phase::Done;
        let summary = RunSummary {
            per_target: vec![s1, s2],
            ..Default::default()
        };
        assert!(summary.is_success());
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn run_summary_exit_code_reflects_first_failure() {
        let mut s1 = TransferState::new(Target::new("t1", "/x"));
        s1.phase = Phase::Done;
        let mut s2 = TransferState::new(Target::new("t2", "/y"));
        s2.sender_exit_code = Some(13);
        s2.fail(&crate::error::OrchestratorError::Transfer {
            host: "t2".to_string(),
            code: 13,
        });
        let summary = RunSummary {
            per_target: vec![s1, s2],
            ..Default::default()
        };
        assert!(!summary.is_success());
        assert_eq!(summary.exit_code(), 13);
    }

    #[test]
    fn run_summary_exit_code_uses_the_error_kind_classifier_for_non_transfer_failures() {
        let mut s1 = TransferState::new(Target::new("t1", "/x"));
        s1.fail(&crate::error::OrchestratorError::precondition("t1", "unreachable"));
        let summary = RunSummary {
            per_target: vec![s1],
            ..Default::default()
        };
        assert_eq!(summary.exit_code(), 70);
    }
}
