//! Hot-database snapshot derivations (§4.3)
//!
//! Maps a MariaDB/MySQL socket path to its data directory, and composes the
//! xtrabackup producer / mbstream consumer commands around it.

use crate::core::pipeline::Fragment;
use crate::error::OrchestratorError;

/// Derive the data directory from a socket path.
///
/// `<prefix>.mysqld.sN.sock` (N all-digit) derives `/srv/sqldata.sN`; any
/// other socket ending in `.sock` with no `mysqld.s...` instance marker
/// derives the default `/srv/sqldata`; a socket that carries the instance
/// marker but a non-numeric instance id is a configuration error.
pub fn derive_datadir(socket_path: &str) -> Result<String, OrchestratorError> {
    let basename = socket_path.rsplit('/').next().unwrap_or(socket_path);

    if let Some(before_sock) = basename.strip_suffix(".sock") {
        if let Some(instance_start) = before_sock.rfind(".mysqld.s") {
            let instance = &before_sock[instance_start + ".mysqld.s".len()..];
            return if !instance.is_empty() && instance.chars().all(|c| c.is_ascii_digit()) {
                Ok(format!("/srv/sqldata.s{instance}"))
            } else {
                Err(OrchestratorError::Configuration(format!(
                    "socket '{socket_path}' has a non-numeric instance marker"
                )))
            };
        }
        return Ok("/srv/sqldata".to_string());
    }

    Err(OrchestratorError::Configuration(format!(
        "socket path '{socket_path}' does not end in .sock"
    )))
}

/// Compose the xtrabackup head command: streams an xbstream archive to
/// stdout with replication coordinates embedded (`--slave-info`).
pub fn xtrabackup_command(user: &str, socket: &str, datadir: &str, parallel: u32) -> Fragment {
    Fragment::Head(format!(
        "/usr/bin/xtrabackup --backup --target-dir /tmp --user {user} --socket={socket} \
         --close-files --datadir={datadir} --parallel={parallel} \
         --stream=xbstream --slave-info --skip-ssl"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_socket_uses_default_datadir() {
        assert_eq!(derive_datadir("mysqld.sock").unwrap(), "/srv/sqldata");
    }

    #[test]
    fn numbered_instance_socket_derives_suffixed_datadir() {
        assert_eq!(
            derive_datadir("test.mysqld.s1.sock").unwrap(),
            "/srv/sqldata.s1"
        );
    }

    #[test]
    fn non_numeric_instance_marker_is_a_configuration_error() {
        assert!(derive_datadir("test.mysqld.smx1.sock").is_err());
    }

    #[test]
    fn xtrabackup_command_names_every_required_flag() {
        let cmd = xtrabackup_command("root", "mysqld.sock", "/srv/sqldata", 16);
        let Fragment::Head(cmd) = cmd else { panic!("expected head fragment") };
        assert!(cmd.contains("--user root"));
        assert!(cmd.contains("--socket=mysqld.sock"));
        assert!(cmd.contains("--datadir=/srv/sqldata"));
        assert!(cmd.contains("--parallel=16"));
        assert!(cmd.contains("--stream=xbstream"));
        assert!(cmd.contains("--slave-info"));
    }
}
