//! Endpoint Probes (§4.1)
//!
//! Each probe composes exactly one command and sends it through a
//! [`RemoteExecutor`]. All probes are deterministic given the same endpoint
//! state; directory checksums traverse in a stable sort order so two
//! independent runs agree.

use crate::error::{OrchestratorError, Result};
use crate::network::RemoteExecutor;

fn shell(inner: &str) -> String {
    format!("/bin/bash -c '{inner}'")
}

pub async fn host_exists(executor: &dyn RemoteExecutor, host: &str) -> Result<bool> {
    Ok(executor.run(host, "/bin/true").await?.success())
}

pub async fn file_exists(executor: &dyn RemoteExecutor, host: &str, path: &str) -> Result<bool> {
    let cmd = shell(&format!(r#"[ -e "{path}" ]"#));
    Ok(executor.run(host, &cmd).await?.success())
}

pub async fn is_dir(executor: &dyn RemoteExecutor, host: &str, path: &str) -> Result<bool> {
    let cmd = shell(&format!(r#"[ -d "{path}" ]"#));
    Ok(executor.run(host, &cmd).await?.success())
}

pub async fn is_socket(executor: &dyn RemoteExecutor, host: &str, path: &str) -> Result<bool> {
    let cmd = shell(&format!(r#"[ -S "{path}" ]"#));
    Ok(executor.run(host, &cmd).await?.success())
}

pub async fn dir_is_empty(executor: &dyn RemoteExecutor, host: &str, path: &str) -> Result<bool> {
    let cmd = shell(&format!(r#"[ -z "$(/bin/ls -A {path})" ]"#));
    Ok(executor.run(host, &cmd).await?.success())
}

/// Sum of bytes at `path` (`du -sb`, block-size 1).
pub async fn disk_usage(executor: &dyn RemoteExecutor, host: &str, path: &str) -> Result<u64> {
    let cmd = format!("/bin/du -sb {path}");
    let out = executor.run(host, &cmd).await?;
    if !out.success() {
        return Err(OrchestratorError::precondition(
            host,
            format!("du failed for '{path}': {}", out.stderr),
        ));
    }
    out.stdout
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| OrchestratorError::precondition(host, format!("could not parse du output for '{path}'")))
}

/// True when the free space at `path` is strictly greater than `size`.
pub async fn has_available_disk_space(
    executor: &dyn RemoteExecutor,
    host: &str,
    path: &str,
    size: u64,
) -> Result<bool> {
    let cmd = format!("/bin/df --output=avail -B1 {path} | tail -n1");
    let out = executor.run(host, &cmd).await?;
    if !out.success() {
        return Err(OrchestratorError::precondition(
            host,
            format!("df failed for '{path}': {}", out.stderr),
        ));
    }
    let available: u64 = out
        .stdout
        .split_whitespace()
        .next()
        .and_then(|s| s.parse::<u64>().ok())
        .ok_or_else(|| OrchestratorError::precondition(host, format!("could not parse df output for '{path}'")))?;
    Ok(available > size)
}

/// Checksum a file, or a directory via a stable recursive listing so two
/// independent runs agree on the digest.
pub async fn calculate_checksum(
    executor: &dyn RemoteExecutor,
    host: &str,
    path: &str,
    is_directory: bool,
) -> Result<String> {
    let cmd = if is_directory {
        format!("find {path} -type f | sort | xargs md5sum | md5sum")
    } else {
        format!("/bin/md5sum {path}")
    };
    let out = executor.run(host, &cmd).await?;
    if !out.success() {
        return Err(OrchestratorError::precondition(
            host,
            format!("checksum command failed for '{path}': {}", out.stderr),
        ));
    }
    out.stdout
        .split_whitespace()
        .next()
        .map(|s| s.to_lowercase())
        .ok_or_else(|| OrchestratorError::precondition(host, format!("empty checksum output for '{path}'")))
}

/// Read a stored digest file and return its first whitespace-delimited
/// token (the digest, ignoring any trailing ` -`/filename `md5sum` adds).
pub async fn read_checksum(executor: &dyn RemoteExecutor, host: &str, path: &str) -> Result<String> {
    let cmd = shell(&format!("/bin/cat < {path}"));
    let out = executor.run(host, &cmd).await?;
    if !out.success() {
        return Err(OrchestratorError::precondition(
            host,
            format!("could not read digest file '{path}': {}", out.stderr),
        ));
    }
    out.stdout
        .split_whitespace()
        .next()
        .map(|s| s.to_string())
        .ok_or_else(|| OrchestratorError::precondition(host, format!("empty digest file '{path}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{CommandOutput, FakeExecutor};

    fn ok(stdout: &str) -> CommandOutput {
        CommandOutput {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    #[tokio::test]
    async fn disk_usage_parses_the_leading_byte_count() {
        let exec = FakeExecutor::new();
        exec.stub("h", "/bin/du -sb /data", ok("1024\t/data"));
        assert_eq!(disk_usage(&exec, "h", "/data").await.unwrap(), 1024);
    }

    #[tokio::test]
    async fn has_available_disk_space_compares_strictly_greater() {
        let exec = FakeExecutor::new();
        exec.stub(
            "h",
            "/bin/df --output=avail -B1 /data | tail -n1",
            ok("101"),
        );
        assert!(has_available_disk_space(&exec, "h", "/data", 100).await.unwrap());
    }

    #[tokio::test]
    async fn directory_checksum_uses_a_stable_sorted_listing() {
        let exec = FakeExecutor::new();
        exec.stub(
            "h",
            "find /data -type f | sort | xargs md5sum | md5sum",
            ok("deadbeef  -"),
        );
        let digest = calculate_checksum(&exec, "h", "/data", true).await.unwrap();
        assert_eq!(digest, "deadbeef");
    }

    #[tokio::test]
    async fn read_checksum_returns_only_the_first_token() {
        let exec = FakeExecutor::new();
        exec.stub("h", "/bin/bash -c '/bin/cat < /tmp/d.md5'", ok("checksum - path"));
        let digest = read_checksum(&exec, "h", "/tmp/d.md5").await.unwrap();
        assert_eq!(digest, "checksum");
    }
}
