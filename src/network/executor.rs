//! Remote command execution backend
//!
//! The orchestrator never moves payload bytes itself — every byte stream
//! runs between two remote shell pipelines connected over a bare socket.
//! This module only ever ships short-lived commands to an endpoint and
//! collects their exit status, matching the `RemoteExecutor` contract from
//! the design (§6): `run`, `start_job`, `wait_job`, `kill_job`.

use async_trait::async_trait;
use ssh2::Session;
use std::collections::HashMap;
use std::io::Read;
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::warn;

use crate::error::{OrchestratorError, Result};

/// Outcome of a command that ran to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Opaque handle to a command started in the background with [`RemoteExecutor::start_job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobHandle(u64);

/// Command execution backend, abstracted over the transport (§6). The real
/// adapter below drives commands over an SSH exec channel; tests drive a
/// fake that only ever records command strings.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Run a command on `host` and block until it completes.
    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput>;

    /// Start a long-running command (a listener, a sender pipeline) in the
    /// background and return immediately with a handle to join later.
    async fn start_job(&self, host: &str, command: &str) -> Result<JobHandle>;

    /// Block until the job started by `start_job` finishes.
    async fn wait_job(&self, host: &str, job: JobHandle) -> Result<CommandOutput>;

    /// Best-effort termination of a still-running job, used during cleanup.
    async fn kill_job(&self, host: &str, job: JobHandle) -> Result<()>;
}

/// SSH-exec-channel-based executor: one session per host, opened lazily and
/// reused for every command against that host. This purposely uses exec
/// channels rather than SFTP — the orchestrator only ever runs shell
/// commands, it never reads or writes remote file contents directly.
pub struct Ssh2Executor {
    user: String,
    port: u16,
    sessions: Mutex<HashMap<String, Session>>,
    jobs: Mutex<HashMap<JobHandle, Job>>,
    next_job_id: AtomicU64,
}

/// A backgrounded job, tracked so `kill_job` knows which host it ran on and
/// which command to look for — the real adapter signals the remote process
/// by command-line pattern rather than the channel that started it (see
/// `kill_job` below for why).
struct Job {
    host: String,
    command: String,
    handle: std::thread::JoinHandle<Result<CommandOutput>>,
}

impl Ssh2Executor {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            port: 22,
            sessions: Mutex::new(HashMap::new()),
            jobs: Mutex::new(HashMap::new()),
            next_job_id: AtomicU64::new(1),
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Open a fresh, uncached SSH session to `host`. Used both for the
    /// per-host session cache and, separately, for the one-off kill-signal
    /// connection in `kill_job` — libssh2 sessions are not safe to drive
    /// from two threads at once, so the kill path never reuses a session
    /// that a backgrounded job's thread might still be blocked inside.
    fn connect(user: &str, port: u16, host: &str) -> Result<Session> {
        let addr = format!("{host}:{port}");
        let tcp =
            TcpStream::connect(&addr).map_err(|e| OrchestratorError::remote(host, e.to_string()))?;

        let mut session =
            Session::new().map_err(|e| OrchestratorError::remote(host, e.to_string()))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;

        let mut agent = session
            .agent()
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;
        agent
            .connect()
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;
        agent
            .list_identities()
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;

        let mut authenticated = false;
        for identity in agent.identities().unwrap_or_default() {
            if agent.userauth(user, &identity).is_ok() {
                authenticated = true;
                break;
            }
        }
        if !authenticated || !session.authenticated() {
            return Err(OrchestratorError::remote(
                host,
                format!("no SSH agent identity authenticated as '{user}'"),
            ));
        }

        Ok(session)
    }

    fn session_for(&self, host: &str) -> Result<Session> {
        {
            let sessions = self.sessions.lock().expect("executor session lock poisoned");
            if let Some(session) = sessions.get(host) {
                return Ok(session.clone());
            }
        }
        let session = Self::connect(&self.user, self.port, host)?;
        self.sessions
            .lock()
            .expect("executor session lock poisoned")
            .insert(host.to_string(), session.clone());
        Ok(session)
    }

    fn exec(session: &Session, host: &str, command: &str) -> Result<CommandOutput> {
        let mut channel = session
            .channel_session()
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;
        channel
            .exec(command)
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;

        let mut stdout = String::new();
        channel
            .read_to_string(&mut stdout)
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;
        let mut stderr = String::new();
        channel
            .stderr()
            .read_to_string(&mut stderr)
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;

        channel
            .wait_close()
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;
        let exit_code = channel
            .exit_status()
            .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}

#[async_trait]
impl RemoteExecutor for Ssh2Executor {
    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput> {
        let session = self.session_for(host)?;
        let host = host.to_string();
        let command = command.to_string();
        tokio::task::spawn_blocking(move || Self::exec(&session, &host, &command))
            .await
            .map_err(|e| OrchestratorError::remote("local", e.to_string()))?
    }

    async fn start_job(&self, host: &str, command: &str) -> Result<JobHandle> {
        let session = self.session_for(host)?;
        let host_owned = host.to_string();
        let command_owned = command.to_string();
        let handle = {
            let host_owned = host_owned.clone();
            let command_owned = command_owned.clone();
            std::thread::spawn(move || Self::exec(&session, &host_owned, &command_owned))
        };

        let id = JobHandle(self.next_job_id.fetch_add(1, Ordering::SeqCst));
        self.jobs.lock().expect("executor job lock poisoned").insert(
            id,
            Job {
                host: host_owned,
                command: command_owned,
                handle,
            },
        );
        Ok(id)
    }

    async fn wait_job(&self, host: &str, job: JobHandle) -> Result<CommandOutput> {
        let entry = self
            .jobs
            .lock()
            .expect("executor job lock poisoned")
            .remove(&job)
            .ok_or_else(|| OrchestratorError::remote(host, "no such job"))?;
        tokio::task::spawn_blocking(move || {
            entry
                .handle
                .join()
                .unwrap_or_else(|_| Err(OrchestratorError::remote("local", "job thread panicked")))
        })
        .await
        .map_err(|e| OrchestratorError::remote("local", e.to_string()))?
    }

    /// Signals the remote listener/sender process by command-line pattern
    /// over a throwaway SSH session, rather than through the channel that
    /// started it: that channel's background thread is blocked inside
    /// `read_to_string`/`wait_close` on the cached session, and libssh2
    /// sessions cannot be driven from two threads concurrently. Once the
    /// remote process dies, the channel sees EOF on its own and the
    /// background thread exits without needing to be joined here.
    async fn kill_job(&self, host: &str, job: JobHandle) -> Result<()> {
        let entry = self.jobs.lock().expect("executor job lock poisoned").remove(&job);
        let Some(entry) = entry else {
            return Ok(());
        };

        let user = self.user.clone();
        let port = self.port;
        let host_owned = entry.host.clone();
        let pattern = entry.command.replace('\'', r#"'\''"#);

        let result = tokio::task::spawn_blocking(move || -> Result<CommandOutput> {
            let session = Self::connect(&user, port, &host_owned)?;
            let cmd = format!("/usr/bin/pkill -f '{pattern}'");
            Self::exec(&session, &host_owned, &cmd)
        })
        .await
        .map_err(|e| OrchestratorError::remote(host, e.to_string()))?;

        if let Err(err) = result {
            warn!(host, error = %err, "failed to send kill signal to listener job");
        }
        Ok(())
    }
}

/// In-memory executor for tests: records every command issued per host and
/// returns caller-supplied canned responses, so Supervisor/Probe tests never
/// touch the network.
#[derive(Default)]
pub struct FakeExecutor {
    pub calls: Mutex<Vec<(String, String)>>,
    pub responses: Mutex<HashMap<String, CommandOutput>>,
    next_job_id: AtomicU64,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the output to return the next time `command` (exact match)
    /// is issued against `host`.
    pub fn stub(&self, host: &str, command: &str, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .insert(format!("{host}\u{0}{command}"), output);
    }

    fn lookup(&self, host: &str, command: &str) -> CommandOutput {
        self.calls
            .lock()
            .unwrap()
            .push((host.to_string(), command.to_string()));
        self.responses
            .lock()
            .unwrap()
            .get(&format!("{host}\u{0}{command}"))
            .cloned()
            .unwrap_or(CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            })
    }
}

#[async_trait]
impl RemoteExecutor for FakeExecutor {
    async fn run(&self, host: &str, command: &str) -> Result<CommandOutput> {
        Ok(self.lookup(host, command))
    }

    async fn start_job(&self, host: &str, command: &str) -> Result<JobHandle> {
        let output = self.lookup(host, command);
        self.responses
            .lock()
            .unwrap()
            .insert(format!("__job__{host}\u{0}{command}"), output);
        Ok(JobHandle(self.next_job_id.fetch_add(1, Ordering::SeqCst)))
    }

    async fn wait_job(&self, host: &str, _job: JobHandle) -> Result<CommandOutput> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(k, _)| k.starts_with(&format!("__job__{host}")))
            .map(|(_, v)| v.clone())
            .unwrap_or(CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            }))
    }

    async fn kill_job(&self, _host: &str, _job: JobHandle) -> Result<()> {
        Ok(())
    }
}

impl Clone for CommandOutput {
    fn clone(&self) -> Self {
        Self {
            exit_code: self.exit_code,
            stdout: self.stdout.clone(),
            stderr: self.stderr.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_executor_replays_stubbed_output() {
        let exec = FakeExecutor::new();
        exec.stub(
            "host1",
            "test -d /x",
            CommandOutput {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
            },
        );
        let out = exec.run("host1", "test -d /x").await.unwrap();
        assert!(out.success());
        assert_eq!(exec.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fake_executor_defaults_to_success_when_unstubbed() {
        let exec = FakeExecutor::new();
        let out = exec.run("host1", "anything").await.unwrap();
        assert!(out.success());
    }
}
