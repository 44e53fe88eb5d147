//! Transfer Supervisor (§4.5)
//!
//! Drives the per-target state machine: sanity checks, optional replication
//! pause, firewall lifecycle, listener/sender coordination, and
//! post-transfer verification. Cleanup runs as a stack of registered
//! compensating actions so a failing cleanup step never stops the rest
//! (Design Notes).
//!
//! Cancellation is cooperative: an `Arc<AtomicBool>` flag (teacher's
//! `core/copier.rs` pattern) is checked at every suspension point — before
//! sanity checks, between replication-pause and fan-out, before and after
//! the listener job starts, and after the listener-startup delay. Once
//! noticed, the same cleanup a normal failure triggers runs unconditionally:
//! the listener job is killed if started, the firewall hole is closed if
//! opened, and replication is resumed if it was paused.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::TransferMode;
use crate::core::controllers::{FirewallController, ReplicationController};
use crate::core::password::SessionPassword;
use crate::core::pipeline::{self, ChecksumPaths};
use crate::core::ports::PortAllocator;
use crate::core::probes;
use crate::error::{OrchestratorError, Result};
use crate::network::RemoteExecutor;
use crate::spec::{Phase, RunSummary, Target, TransferSpec, TransferState};

/// Facts established once per run during the shared portion of sanity
/// checks, reused by every target (§3: "source_checksum is computed at
/// most once per run and reused for all targets").
struct SharedFacts {
    source_is_dir: bool,
    source_size: u64,
    source_checksum: Option<String>,
}

pub struct Supervisor<'a> {
    executor: &'a dyn RemoteExecutor,
    firewall: &'a dyn FirewallController,
    replication: &'a dyn ReplicationController,
    ports: PortAllocator,
    password: SessionPassword,
    listener_startup_delay: Duration,
    cancelled: Arc<AtomicBool>,
}

impl<'a> Supervisor<'a> {
    pub fn new(
        executor: &'a dyn RemoteExecutor,
        firewall: &'a dyn FirewallController,
        replication: &'a dyn ReplicationController,
    ) -> Self {
        Self {
            executor,
            firewall,
            replication,
            ports: PortAllocator::default(),
            password: SessionPassword::new(),
            listener_startup_delay: Duration::from_secs(3),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the listener startup delay — production default is 3s
    /// (§5); tests set this to zero.
    pub fn with_listener_startup_delay(mut self, delay: Duration) -> Self {
        self.listener_startup_delay = delay;
        self
    }

    /// A clone of the cancellation flag, shared with the caller so external
    /// code can request a stop while `run` is in flight (§4.5/§5). Checked
    /// at every suspension point; when set, the listener job is killed, any
    /// opened firewall hole is closed, and replication is resumed if it was
    /// paused — the same cleanup a normal failure triggers.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Request cancellation directly, equivalent to setting the flag
    /// returned by [`Self::cancellation_flag`].
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn failed_states(spec: &TransferSpec, err: &OrchestratorError) -> Vec<TransferState> {
        spec.targets
            .iter()
            .map(|target| {
                let mut state = TransferState::new(target.clone());
                state.fail(err);
                state
            })
            .collect()
    }

    pub async fn run(&self, spec: &TransferSpec) -> RunSummary {
        let run_id: String = {
            use rand::distributions::Alphanumeric;
            use rand::Rng;
            rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(8)
                .map(char::from)
                .collect()
        };
        let checksum_paths = ChecksumPaths::for_run(&run_id);

        info!(source = %spec.source_host, targets = spec.targets.len(), "starting transfer run");

        if self.is_cancelled() {
            return RunSummary {
                per_target: Self::failed_states(spec, &OrchestratorError::Cancelled),
                ..Default::default()
            };
        }

        let facts = match self.shared_sanity_checks(spec).await {
            Ok(facts) => facts,
            Err(err) => {
                return RunSummary {
                    per_target: Self::failed_states(spec, &err),
                    ..Default::default()
                };
            }
        };

        if self.is_cancelled() {
            return RunSummary {
                per_target: Self::failed_states(spec, &OrchestratorError::Cancelled),
                ..Default::default()
            };
        }

        let mut replication_paused = false;
        if spec.options.stop_slave {
            match self.replication.stop_replication(&spec.source_host).await {
                Ok(paused) => replication_paused = paused,
                Err(err) => {
                    return RunSummary {
                        per_target: Self::failed_states(spec, &err),
                        ..Default::default()
                    };
                }
            }
        }

        if self.is_cancelled() {
            let mut cleanup_errors = Vec::new();
            if replication_paused {
                if let Err(err) = self.replication.start_replication(&spec.source_host).await {
                    warn!(source = %spec.source_host, error = %err, "failed to resume replication during cleanup");
                    cleanup_errors.push(
                        OrchestratorError::Cleanup {
                            host: spec.source_host.clone(),
                            message: err.to_string(),
                        }
                        .to_string(),
                    );
                }
            }
            return RunSummary {
                per_target: Self::failed_states(spec, &OrchestratorError::Cancelled),
                cleanup_errors,
            };
        }

        let per_target = if spec.options.port != 0 {
            self.ports.fixed(spec.options.port);
            let mut results = Vec::with_capacity(spec.targets.len());
            for target in &spec.targets {
                if self.is_cancelled() {
                    let mut state = TransferState::new(target.clone());
                    state.fail(&OrchestratorError::Cancelled);
                    results.push(state);
                    continue;
                }
                results.push(
                    self.process_target(spec, target, &facts, spec.options.port, &checksum_paths)
                        .await,
                );
            }
            results
        } else {
            let futures = spec.targets.iter().map(|target| async {
                if self.is_cancelled() {
                    let mut state = TransferState::new(target.clone());
                    state.fail(&OrchestratorError::Cancelled);
                    return state;
                }
                let port = match self.ports.allocate(self.executor, &target.host).await {
                    Ok(port) => port,
                    Err(err) => {
                        let mut state = TransferState::new(target.clone());
                        state.fail(&err);
                        return state;
                    }
                };
                self.process_target(spec, target, &facts, port, &checksum_paths).await
            });
            join_all(futures).await
        };

        let mut cleanup_errors = Vec::new();
        if replication_paused {
            if let Err(err) = self.replication.start_replication(&spec.source_host).await {
                warn!(source = %spec.source_host, error = %err, "failed to resume replication during cleanup");
                cleanup_errors.push(
                    OrchestratorError::Cleanup {
                        host: spec.source_host.clone(),
                        message: err.to_string(),
                    }
                    .to_string(),
                );
            }
        }

        RunSummary {
            per_target,
            cleanup_errors,
        }
    }

    async fn shared_sanity_checks(&self, spec: &TransferSpec) -> Result<SharedFacts> {
        if !probes::host_exists(self.executor, &spec.source_host).await? {
            return Err(OrchestratorError::precondition(&spec.source_host, "source host unreachable"));
        }

        let source_path = spec.source_path.to_string_lossy().to_string();
        let source_is_dir = if spec.options.mode == TransferMode::Xtrabackup {
            if !probes::file_exists(self.executor, &spec.source_host, &source_path).await? {
                return Err(OrchestratorError::precondition(
                    &spec.source_host,
                    format!("source socket '{source_path}' does not exist"),
                ));
            }
            if !probes::is_socket(self.executor, &spec.source_host, &source_path).await? {
                return Err(OrchestratorError::precondition(
                    &spec.source_host,
                    format!("'{source_path}' is not a socket"),
                ));
            }
            false
        } else {
            if !probes::file_exists(self.executor, &spec.source_host, &source_path).await? {
                return Err(OrchestratorError::precondition(
                    &spec.source_host,
                    format!("source path '{source_path}' does not exist"),
                ));
            }
            probes::is_dir(self.executor, &spec.source_host, &source_path).await?
        };

        let source_size = probes::disk_usage(self.executor, &spec.source_host, &source_path).await?;

        let source_checksum = if spec.options.checksum {
            Some(probes::calculate_checksum(self.executor, &spec.source_host, &source_path, source_is_dir).await?)
        } else {
            None
        };

        Ok(SharedFacts {
            source_is_dir,
            source_size,
            source_checksum,
        })
    }

    async fn target_sanity_checks(&self, spec: &TransferSpec, target: &Target, facts: &SharedFacts) -> Result<()> {
        if !probes::host_exists(self.executor, &target.host).await? {
            return Err(OrchestratorError::precondition(&target.host, "target host unreachable"));
        }

        let target_path = target.path.to_string_lossy().to_string();
        if !probes::file_exists(self.executor, &target.host, &target_path).await? {
            return Err(OrchestratorError::precondition(
                &target.host,
                format!("target path '{target_path}' does not exist"),
            ));
        }
        if !probes::is_dir(self.executor, &target.host, &target_path).await? {
            return Err(OrchestratorError::precondition(
                &target.host,
                format!("target path '{target_path}' is not a directory"),
            ));
        }

        if spec.options.mode == TransferMode::Xtrabackup
            && !probes::dir_is_empty(self.executor, &target.host, &target_path).await?
        {
            return Err(OrchestratorError::precondition(
                &target.host,
                format!("target directory '{target_path}' is not empty"),
            ));
        }

        if spec.is_file_mode() && !facts.source_is_dir {
            let final_path = final_target_path(&spec.source_path, &target.path);
            let final_path_str = final_path.to_string_lossy().to_string();
            if probes::file_exists(self.executor, &target.host, &final_path_str).await? {
                return Err(OrchestratorError::precondition(
                    &target.host,
                    format!("destination '{final_path_str}' already exists"),
                ));
            }
        }

        if !probes::has_available_disk_space(self.executor, &target.host, &target_path, facts.source_size).await? {
            return Err(OrchestratorError::precondition(
                &target.host,
                format!("insufficient free space at '{target_path}' for {} bytes", facts.source_size),
            ));
        }

        Ok(())
    }

    async fn process_target(
        &self,
        spec: &TransferSpec,
        target: &Target,
        facts: &SharedFacts,
        port: u16,
        checksum_paths: &ChecksumPaths,
    ) -> TransferState {
        let mut state = TransferState::new(target.clone());
        state.allocated_port = Some(port);

        if let Err(err) = self.target_sanity_checks(spec, target, facts).await {
            state.fail(&err);
            return state;
        }
        state.phase = Phase::Checks;

        if self.is_cancelled() {
            state.fail(&OrchestratorError::Cancelled);
            return state;
        }

        if let Err(err) = self
            .firewall
            .open(&target.host, &spec.source_host, port)
            .await
        {
            state.fail(&err);
            return state;
        }
        state.phase = Phase::FirewallOpen;

        let result = self.run_transfer(spec, target, facts, port, checksum_paths, &mut state).await;

        if let Err(err) = self.firewall.close(&target.host, &spec.source_host, port).await {
            warn!(target = %target.host, error = %err, "failed to close firewall during cleanup");
        }

        if let Err(err) = result {
            state.fail(&err);
        }
        state
    }

    async fn run_transfer(
        &self,
        spec: &TransferSpec,
        target: &Target,
        facts: &SharedFacts,
        port: u16,
        checksum_paths: &ChecksumPaths,
        state: &mut TransferState,
    ) -> Result<()> {
        let password = if spec.options.encrypt {
            Some(self.password.get())
        } else {
            None
        };

        if self.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let target_command = pipeline::compose_target(
            &spec.options,
            facts.source_is_dir,
            &target.path,
            port,
            password,
            checksum_paths,
        );
        debug!(target = %target.host, "starting listener job");
        let job = self.executor.start_job(&target.host, &target_command).await?;
        state.phase = Phase::Listening;

        if self.is_cancelled() {
            self.executor.kill_job(&target.host, job).await?;
            return Err(OrchestratorError::Cancelled);
        }

        tokio::time::sleep(self.listener_startup_delay).await;

        if self.is_cancelled() {
            self.executor.kill_job(&target.host, job).await?;
            return Err(OrchestratorError::Cancelled);
        }

        let source_command = pipeline::compose_source(
            &spec.options,
            &spec.source_path,
            facts.source_is_dir,
            &target.host,
            port,
            password,
            checksum_paths,
        );
        state.phase = Phase::Sending;
        debug!(source = %spec.source_host, "running sender command");
        let sender_output = self.executor.run(&spec.source_host, &source_command).await?;
        state.sender_exit_code = Some(sender_output.exit_code);

        if sender_output.success() {
            self.executor.wait_job(&target.host, job).await?;
        } else {
            self.executor.kill_job(&target.host, job).await?;
            return Err(OrchestratorError::Transfer {
                host: target.host.clone(),
                code: sender_output.exit_code,
            });
        }

        state.phase = Phase::Verifying;
        if self.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }
        self.after_transfer_checks(spec, target, facts, checksum_paths, state).await?;
        state.phase = Phase::Done;
        Ok(())
    }

    async fn after_transfer_checks(
        &self,
        spec: &TransferSpec,
        target: &Target,
        facts: &SharedFacts,
        checksum_paths: &ChecksumPaths,
        state: &mut TransferState,
    ) -> Result<()> {
        let final_path = if spec.is_file_mode() && !facts.source_is_dir {
            final_target_path(&spec.source_path, &target.path)
        } else {
            target.path.clone()
        };
        let final_path_str = final_path.to_string_lossy().to_string();

        let size = probes::disk_usage(self.executor, &target.host, &final_path_str).await?;
        if size == 0 {
            return Err(OrchestratorError::integrity(
                &target.host,
                final_path,
                "transferred payload is empty",
            ));
        }

        if spec.options.checksum {
            let target_digest =
                probes::calculate_checksum(self.executor, &target.host, &final_path_str, facts.source_is_dir).await?;
            state.target_checksum = Some(target_digest.clone());
            state.source_checksum = facts.source_checksum.clone();
            if facts.source_checksum.as_deref() != Some(target_digest.as_str()) {
                return Err(OrchestratorError::integrity(
                    &target.host,
                    final_path,
                    "target checksum does not match source checksum",
                ));
            }
        } else if spec.options.parallel_checksum {
            let source_digest =
                probes::read_checksum(self.executor, &spec.source_host, &checksum_paths.source).await?;
            let target_digest = probes::read_checksum(self.executor, &target.host, &checksum_paths.target).await?;
            state.source_checksum = Some(source_digest.clone());
            state.target_checksum = Some(target_digest.clone());
            if source_digest != target_digest {
                return Err(OrchestratorError::integrity(
                    &target.host,
                    final_path,
                    "streamed source/target digests do not match",
                ));
            }
        }

        Ok(())
    }
}

/// For `file` mode transferring a single regular file into a target
/// directory, the final path is the target directory joined with the
/// source file's name.
fn final_target_path(source_path: &Path, target_path: &Path) -> std::path::PathBuf {
    match source_path.file_name() {
        Some(name) => target_path.join(name),
        None => target_path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TransferMode, TransferOptions};
    use crate::core::controllers::fakes::{FakeFirewall, FakeReplication};
    use crate::network::{CommandOutput, FakeExecutor};

    fn ok() -> CommandOutput {
        CommandOutput {
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn ok_with(stdout: &str) -> CommandOutput {
        CommandOutput {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn stub_happy_path(exec: &FakeExecutor, source: &str, source_path: &str, target: &str, target_path: &str) {
        exec.stub(source, "/bin/true", ok());
        exec.stub(target, "/bin/true", ok());
        exec.stub(source, &format!("/bin/bash -c '[ -e \"{source_path}\" ]'"), ok());
        exec.stub(source, &format!("/bin/bash -c '[ -d \"{source_path}\" ]'"), ok());
        exec.stub(source, &format!("/bin/du -sb {source_path}"), ok_with("10\tx"));
        exec.stub(target, &format!("/bin/bash -c '[ -e \"{target_path}\" ]'"), ok());
        exec.stub(target, &format!("/bin/bash -c '[ -d \"{target_path}\" ]'"), ok());
        exec.stub(
            target,
            &format!("/bin/df --output=avail -B1 {target_path} | tail -n1"),
            ok_with("1000"),
        );
        let final_path = format!("{target_path}/x.bin");
        exec.stub(target, &format!("/bin/bash -c '[ -e \"{final_path}\" ]'"), CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: String::new(),
        });
        exec.stub(target, &format!("/bin/du -sb {final_path}"), ok_with("10\tx"));
    }

    #[tokio::test]
    async fn plain_file_copy_succeeds_with_all_optional_stages_disabled() {
        let exec = FakeExecutor::new();
        stub_happy_path(&exec, "src", "/a/x.bin", "tgt", "/dst");

        let firewall = FakeFirewall::default();
        let replication = FakeReplication::default();
        let supervisor = Supervisor::new(&exec, &firewall, &replication)
            .with_listener_startup_delay(Duration::from_millis(0));

        let mut options = TransferOptions::default();
        options.compress = false;
        options.encrypt = false;
        options.checksum = false;
        options.mode = TransferMode::File;
        let spec = TransferSpec::new(
            "src",
            "/a/x.bin",
            vec![Target::new("tgt", "/dst")],
            options,
        )
        .unwrap();

        let summary = supervisor.run(&spec).await;
        assert!(summary.is_success(), "{summary:?}");
        assert_eq!(summary.exit_code(), 0);
        assert_eq!(firewall.opened.lock().unwrap().len(), 1);
        assert_eq!(firewall.closed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sanity_failure_never_opens_the_firewall() {
        let exec = FakeExecutor::new();
        exec.stub("src", "/bin/true", ok());
        exec.stub("tgt", "/bin/true", ok());
        exec.stub("src", "/bin/bash -c '[ -e \"/a/x.bin\" ]'", CommandOutput {
            exit_code: 1,
            stdout: String::new(),
            stderr: String::new(),
        });

        let firewall = FakeFirewall::default();
        let replication = FakeReplication::default();
        let supervisor = Supervisor::new(&exec, &firewall, &replication);

        let mut options = TransferOptions::default();
        options.checksum = false;
        let spec = TransferSpec::new("src", "/a/x.bin", vec![Target::new("tgt", "/dst")], options).unwrap();

        let summary = supervisor.run(&spec).await;
        assert!(!summary.is_success());
        assert!(firewall.opened.lock().unwrap().is_empty());
        assert!(replication.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sender_failure_kills_listener_and_still_closes_firewall() {
        let exec = FakeExecutor::new();
        stub_happy_path(&exec, "src", "/a/x.bin", "tgt", "/dst");
        exec.stub(
            "src",
            "/bin/cat /a/x.bin | /bin/nc -q 0 -w 300 tgt 4400",
            CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "boom".to_string(),
            },
        );

        let firewall = FakeFirewall::default();
        let replication = FakeReplication::default();
        let supervisor = Supervisor::new(&exec, &firewall, &replication)
            .with_listener_startup_delay(Duration::from_millis(0));

        let mut options = TransferOptions::default();
        options.compress = false;
        options.encrypt = false;
        options.checksum = false;
        options.port = 4400;
        let spec = TransferSpec::new("src", "/a/x.bin", vec![Target::new("tgt", "/dst")], options).unwrap();

        let summary = supervisor.run(&spec).await;
        assert!(!summary.is_success());
        assert_eq!(summary.exit_code(), 1);
        assert_eq!(firewall.closed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replication_is_resumed_after_a_successful_run_when_stopped() {
        let exec = FakeExecutor::new();
        stub_happy_path(&exec, "src", "/a/x.bin", "tgt", "/dst");

        let firewall = FakeFirewall::default();
        let replication = FakeReplication::default();
        *replication.stop_returns.lock().unwrap() = true;
        let supervisor = Supervisor::new(&exec, &firewall, &replication)
            .with_listener_startup_delay(Duration::from_millis(0));

        let mut options = TransferOptions::default();
        options.compress = false;
        options.encrypt = false;
        options.checksum = false;
        options.stop_slave = true;
        let spec = TransferSpec::new("src", "/a/x.bin", vec![Target::new("tgt", "/dst")], options).unwrap();

        let summary = supervisor.run(&spec).await;
        assert!(summary.is_success(), "{summary:?}");
        assert_eq!(replication.stopped.lock().unwrap().len(), 1);
        assert_eq!(replication.started.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_targets_each_get_their_own_port_and_one_can_fail_checksum() {
        let exec = FakeExecutor::new();
        stub_happy_path(&exec, "src", "/a/x.bin", "good", "/dst");
        stub_happy_path(&exec, "src", "/a/x.bin", "bad", "/dst");
        exec.stub("src", "/bin/md5sum /a/x.bin", ok_with("deadbeef  /a/x.bin"));
        exec.stub("good", "/bin/md5sum /dst/x.bin", ok_with("deadbeef  /dst/x.bin"));
        exec.stub("bad", "/bin/md5sum /dst/x.bin", ok_with("0000000  /dst/x.bin"));

        let firewall = FakeFirewall::default();
        let replication = FakeReplication::default();
        let supervisor = Supervisor::new(&exec, &firewall, &replication)
            .with_listener_startup_delay(Duration::from_millis(0));

        let mut options = TransferOptions::default();
        options.compress = false;
        options.encrypt = false;
        options.checksum = true;
        options.port = 0;
        let spec = TransferSpec::new(
            "src",
            "/a/x.bin",
            vec![Target::new("good", "/dst"), Target::new("bad", "/dst")],
            options,
        )
        .unwrap();

        let summary = supervisor.run(&spec).await;
        assert!(!summary.is_success(), "{summary:?}");
        let good = summary.per_target.iter().find(|t| t.host == "good").unwrap();
        let bad = summary.per_target.iter().find(|t| t.host == "bad").unwrap();
        assert_eq!(good.phase, Phase::Done);
        assert_ne!(bad.phase, Phase::Done);
        assert_eq!(firewall.closed.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn cancelling_before_the_run_starts_fails_every_target_without_opening_anything() {
        let exec = FakeExecutor::new();
        stub_happy_path(&exec, "src", "/a/x.bin", "tgt", "/dst");

        let firewall = FakeFirewall::default();
        let replication = FakeReplication::default();
        let supervisor = Supervisor::new(&exec, &firewall, &replication)
            .with_listener_startup_delay(Duration::from_millis(0));
        supervisor.cancel();

        let mut options = TransferOptions::default();
        options.checksum = false;
        let spec = TransferSpec::new("src", "/a/x.bin", vec![Target::new("tgt", "/dst")], options).unwrap();

        let summary = supervisor.run(&spec).await;
        assert!(!summary.is_success());
        assert_eq!(summary.exit_code(), 75);
        assert!(firewall.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelling_mid_transfer_kills_the_listener_and_still_closes_the_firewall() {
        let exec = FakeExecutor::new();
        stub_happy_path(&exec, "src", "/a/x.bin", "tgt", "/dst");

        let firewall = FakeFirewall::default();
        let replication = FakeReplication::default();
        let supervisor = Supervisor::new(&exec, &firewall, &replication)
            .with_listener_startup_delay(Duration::from_millis(30));
        let flag = supervisor.cancellation_flag();

        let mut options = TransferOptions::default();
        options.compress = false;
        options.encrypt = false;
        options.checksum = false;
        let spec = TransferSpec::new("src", "/a/x.bin", vec![Target::new("tgt", "/dst")], options).unwrap();

        // The listener-startup sleep is an uninterruptible suspension point
        // (cancellation is cooperative, checked at its boundaries — not a
        // `select!` race) so the setter only needs to fire before it elapses.
        let run_fut = supervisor.run(&spec);
        let setter_fut = async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            flag.store(true, Ordering::SeqCst);
        };
        let (summary, _) = tokio::join!(run_fut, setter_fut);

        assert!(!summary.is_success(), "{summary:?}");
        assert_eq!(summary.exit_code(), 75);
        assert_eq!(firewall.closed.lock().unwrap().len(), 1);
        assert!(replication.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn xtrabackup_shared_sanity_checks_require_both_file_exists_and_is_socket() {
        let exec = FakeExecutor::new();
        exec.stub("src", "/bin/true", ok());
        exec.stub("src", "/bin/bash -c '[ -e \"/tmp/mysqld.sock\" ]'", ok());
        exec.stub("src", "/bin/bash -c '[ -S \"/tmp/mysqld.sock\" ]'", ok());
        exec.stub("src", "/bin/du -sb /tmp/mysqld.sock", ok_with("10\tx"));

        let firewall = FakeFirewall::default();
        let replication = FakeReplication::default();
        let supervisor = Supervisor::new(&exec, &firewall, &replication);

        let mut options = TransferOptions::default();
        options.mode = TransferMode::Xtrabackup;
        options.checksum = false;
        let spec = TransferSpec::new(
            "src",
            "/tmp/mysqld.sock",
            vec![Target::new("tgt", "/dst")],
            options,
        )
        .unwrap();

        let facts = supervisor.shared_sanity_checks(&spec).await.unwrap();
        assert!(!facts.source_is_dir);
    }
}
