//! Firewall and Replication controllers (§6)
//!
//! Both are external collaborators in the design: the orchestrator only
//! needs to open/close one inbound port for a peer, and stop/start
//! replication on a host. The default adapters compose their commands
//! through the same [`RemoteExecutor`] used for everything else, since
//! there is no separate firewall/database management channel assumed.

use async_trait::async_trait;

use crate::error::Result;
use crate::network::RemoteExecutor;

#[async_trait]
pub trait FirewallController: Send + Sync {
    /// Idempotent: opening an already-open hole succeeds.
    async fn open(&self, target_host: &str, source_host: &str, port: u16) -> Result<()>;
    /// Idempotent: closing an already-closed hole succeeds.
    async fn close(&self, target_host: &str, source_host: &str, port: u16) -> Result<()>;
}

#[async_trait]
pub trait ReplicationController: Send + Sync {
    /// Returns `true` if replication was actually paused (and therefore
    /// must be resumed in cleanup); `false` if it was already stopped.
    async fn stop_replication(&self, host: &str) -> Result<bool>;
    async fn start_replication(&self, host: &str) -> Result<()>;
}

/// `iptables`-based firewall adapter, run through the same executor as
/// every other command this orchestrator issues.
pub struct IptablesFirewall<'a> {
    executor: &'a dyn RemoteExecutor,
}

impl<'a> IptablesFirewall<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<'a> FirewallController for IptablesFirewall<'a> {
    async fn open(&self, target_host: &str, source_host: &str, port: u16) -> Result<()> {
        let cmd = format!(
            "/sbin/iptables -C INPUT -p tcp -s {source_host} --dport {port} -j ACCEPT 2>/dev/null || \
             /sbin/iptables -I INPUT -p tcp -s {source_host} --dport {port} -j ACCEPT"
        );
        self.executor.run(target_host, &cmd).await.map(|_| ())
    }

    async fn close(&self, target_host: &str, source_host: &str, port: u16) -> Result<()> {
        let cmd =
            format!("/sbin/iptables -D INPUT -p tcp -s {source_host} --dport {port} -j ACCEPT 2>/dev/null; true");
        self.executor.run(target_host, &cmd).await.map(|_| ())
    }
}

/// MariaDB/MySQL replication adapter: `STOP SLAVE` / `START SLAVE` via the
/// local socket client, matching the teacher's MariaDB-oriented stack.
pub struct MariaDbReplication<'a> {
    executor: &'a dyn RemoteExecutor,
}

impl<'a> MariaDbReplication<'a> {
    pub fn new(executor: &'a dyn RemoteExecutor) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl<'a> ReplicationController for MariaDbReplication<'a> {
    async fn stop_replication(&self, host: &str) -> Result<bool> {
        let out = self.executor.run(host, "/usr/bin/mysql -e 'STOP SLAVE'").await?;
        Ok(out.success())
    }

    async fn start_replication(&self, host: &str) -> Result<()> {
        self.executor
            .run(host, "/usr/bin/mysql -e 'START SLAVE'")
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
pub mod fakes {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeFirewall {
        pub opened: Mutex<Vec<(String, String, u16)>>,
        pub closed: Mutex<Vec<(String, String, u16)>>,
    }

    #[async_trait]
    impl FirewallController for FakeFirewall {
        async fn open(&self, target_host: &str, source_host: &str, port: u16) -> Result<()> {
            self.opened
                .lock()
                .unwrap()
                .push((target_host.to_string(), source_host.to_string(), port));
            Ok(())
        }

        async fn close(&self, target_host: &str, source_host: &str, port: u16) -> Result<()> {
            self.closed
                .lock()
                .unwrap()
                .push((target_host.to_string(), source_host.to_string(), port));
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct FakeReplication {
        pub stopped: Mutex<Vec<String>>,
        pub started: Mutex<Vec<String>>,
        pub stop_returns: Mutex<bool>,
    }

    #[async_trait]
    impl ReplicationController for FakeReplication {
        async fn stop_replication(&self, host: &str) -> Result<bool> {
            self.stopped.lock().unwrap().push(host.to_string());
            Ok(*self.stop_returns.lock().unwrap())
        }

        async fn start_replication(&self, host: &str) -> Result<()> {
            self.started.lock().unwrap().push(host.to_string());
            Ok(())
        }
    }
}
