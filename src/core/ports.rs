//! Port Allocator (§4.4)
//!
//! A fixed nonzero `options.port` is reused for every target, which forces
//! the Supervisor to process targets serially. `port == 0` allocates a
//! distinct free port per target from a configured range, confirmed free on
//! the target host via a remote probe, under mutual exclusion so two
//! concurrent targets never race on the same candidate.

use std::collections::HashSet;
use std::ops::RangeInclusive;
use std::sync::Mutex;

use crate::error::{OrchestratorError, Result};
use crate::network::RemoteExecutor;

const DEFAULT_RANGE: RangeInclusive<u16> = 4400..=4500;
const MAX_ATTEMPTS: usize = 32;

pub struct PortAllocator {
    range: RangeInclusive<u16>,
    reserved: Mutex<HashSet<u16>>,
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_RANGE)
    }
}

impl PortAllocator {
    pub fn new(range: RangeInclusive<u16>) -> Self {
        Self {
            range,
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Reserve the fixed port for every target in a serial run. Never
    /// confirmed free remotely — the caller already committed to this port.
    pub fn fixed(&self, port: u16) {
        self.reserved.lock().expect("port allocator lock poisoned").insert(port);
    }

    /// Allocate a fresh port on `host`, confirmed free via a remote probe,
    /// distinct from every other port reserved so far in this run.
    pub async fn allocate(&self, executor: &dyn RemoteExecutor, host: &str) -> Result<u16> {
        for _ in 0..MAX_ATTEMPTS {
            let candidate = {
                let mut reserved = self.reserved.lock().expect("port allocator lock poisoned");
                let Some(candidate) = self.range.clone().find(|p| !reserved.contains(p)) else {
                    return Err(OrchestratorError::Resource(
                        "no unreserved ports remain in the configured range".to_string(),
                    ));
                };
                reserved.insert(candidate);
                candidate
            };

            if self.is_free_on_host(executor, host, candidate).await? {
                return Ok(candidate);
            }
            self.release(candidate);
        }
        Err(OrchestratorError::Resource(format!(
            "exhausted {MAX_ATTEMPTS} attempts allocating a port on '{host}'"
        )))
    }

    pub fn release(&self, port: u16) {
        self.reserved.lock().expect("port allocator lock poisoned").remove(&port);
    }

    async fn is_free_on_host(&self, executor: &dyn RemoteExecutor, host: &str, port: u16) -> Result<bool> {
        let cmd = format!("/bin/bash -c '! /bin/ss -ltn | /bin/grep -q \":{port} \"'");
        let out = executor.run(host, &cmd).await?;
        Ok(out.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{CommandOutput, FakeExecutor};

    #[tokio::test]
    async fn fixed_port_is_reused_without_a_remote_probe() {
        let allocator = PortAllocator::default();
        allocator.fixed(4444);
        assert!(allocator.reserved.lock().unwrap().contains(&4444));
    }

    #[tokio::test]
    async fn concurrent_targets_never_get_the_same_port() {
        let allocator = PortAllocator::new(4400..=4401);
        let exec = FakeExecutor::new();
        // Neither candidate is reported in use, so both attempts succeed.
        let p1 = allocator.allocate(&exec, "t1").await.unwrap();
        let p2 = allocator.allocate(&exec, "t2").await.unwrap();
        assert_ne!(p1, p2);
    }

    #[tokio::test]
    async fn exhaustion_after_bounded_retries_is_a_resource_error() {
        let allocator = PortAllocator::new(4400..=4400);
        let exec = FakeExecutor::new();
        exec.stub(
            "t1",
            "/bin/bash -c '! /bin/ss -ltn | /bin/grep -q \":4400 \"'",
            CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: String::new(),
            },
        );
        let result = allocator.allocate(&exec, "t1").await;
        assert!(matches!(result, Err(OrchestratorError::Resource(_))));
    }
}
