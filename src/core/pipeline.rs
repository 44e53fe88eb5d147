//! Pipeline Composer
//!
//! A pure function from `(mode, options, role)` to a shell command string.
//! Fragments are tagged variants rendered by an explicit joiner rather than
//! spliced together as raw strings, so a disabled stage can never leave a
//! stray leading `|` in the rendered command (Design Notes).

use crate::config::{TransferMode, TransferOptions};
use crate::core::xtrabackup;
use std::path::Path;

/// One stage of a composed pipeline. `Head` is the first command in the
/// pipeline and is rendered bare; every `Piped` stage is rendered with a
/// leading `| `.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Head(String),
    Piped(String),
}

/// Render a full pipeline from its ordered stages. A stage contributing an
/// empty string is dropped entirely rather than rendered as a bare `|`.
pub fn render(stages: &[Fragment]) -> String {
    let mut rendered = String::new();
    for stage in stages {
        match stage {
            Fragment::Head(cmd) if !cmd.is_empty() => {
                rendered.push_str(cmd);
            }
            Fragment::Piped(cmd) if !cmd.is_empty() => {
                if !rendered.is_empty() {
                    rendered.push_str(" | ");
                }
                rendered.push_str(cmd);
            }
            _ => {}
        }
    }
    rendered
}

/// Per-run paths for the streaming-checksum tee stage, fixed once per
/// Supervisor run and shared by every target (§6: "temporary digest files
/// at well-known per-run paths").
#[derive(Debug, Clone)]
pub struct ChecksumPaths {
    pub source: String,
    pub target: String,
}

impl ChecksumPaths {
    pub fn for_run(run_id: &str) -> Self {
        Self {
            source: format!("/tmp/.xferorc-{run_id}-src.md5"),
            target: format!("/tmp/.xferorc-{run_id}-tgt.md5"),
        }
    }
}

fn compress_stage(enabled: bool) -> Fragment {
    Fragment::Piped(if enabled { "/usr/bin/pigz -c".to_string() } else { String::new() })
}

fn decompress_stage(enabled: bool) -> Fragment {
    Fragment::Piped(if enabled {
        "/usr/bin/pigz -c -d".to_string()
    } else {
        String::new()
    })
}

fn encrypt_stage(enabled: bool, password: &str) -> Fragment {
    Fragment::Piped(if enabled {
        format!("/usr/bin/openssl enc -aes-256-cbc -salt -pass pass:{password}")
    } else {
        String::new()
    })
}

fn decrypt_stage(enabled: bool, password: &str) -> Fragment {
    Fragment::Piped(if enabled {
        format!("/usr/bin/openssl enc -d -aes-256-cbc -salt -pass pass:{password}")
    } else {
        String::new()
    })
}

fn parallel_checksum_source_stage(enabled: bool, paths: &ChecksumPaths) -> Fragment {
    Fragment::Piped(if enabled {
        format!("tee >(md5sum > {})", paths.source)
    } else {
        String::new()
    })
}

fn parallel_checksum_target_stage(enabled: bool, paths: &ChecksumPaths) -> Fragment {
    Fragment::Piped(if enabled {
        format!("tee >(md5sum > {})", paths.target)
    } else {
        String::new()
    })
}

/// `| /bin/nc -q 0 -w 300 <host> <port>` — bounded quiet-close, bounded
/// receive timeout (§5).
pub fn netcat_send_command(host: &str, port: u16) -> Fragment {
    Fragment::Piped(format!("/bin/nc -q 0 -w 300 {host} {port}"))
}

/// `/bin/nc -l -w 300 -p <port>` — the listener head.
pub fn netcat_listen_command(port: u16) -> Fragment {
    Fragment::Head(format!("/bin/nc -l -w 300 -p {port}"))
}

fn tar_archive_head(path: &Path) -> Fragment {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let name = path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    Fragment::Head(format!("/bin/tar cf - -C {} {}", parent.display(), name))
}

fn cat_file_head(path: &Path) -> Fragment {
    Fragment::Head(format!("/bin/cat {}", path.display()))
}

fn tar_extract_sink(target_path: &Path, strip_one_component: bool) -> Fragment {
    let flag = if strip_one_component { "--strip-components=1 -xf -" } else { "xf -" };
    Fragment::Piped(format!("/bin/tar {flag} -C {}", target_path.display()))
}

fn write_file_sink(target_path: &Path) -> Fragment {
    Fragment::Piped(format!("/bin/cat > {}", target_path.display()))
}

/// Build the producer (source-side) pipeline for one target.
///
/// `source_is_dir` is always a probe result from sanity checks, never
/// guessed locally — the caller must have already resolved it.
pub fn compose_source(
    options: &TransferOptions,
    source_path: &Path,
    source_is_dir: bool,
    target_host: &str,
    port: u16,
    password: Option<&str>,
    checksum_paths: &ChecksumPaths,
) -> String {
    let head = match options.mode {
        TransferMode::Xtrabackup => {
            let socket = source_path.to_string_lossy();
            let datadir = xtrabackup::derive_datadir(&socket).unwrap_or_default();
            xtrabackup::xtrabackup_command(&options.user, &socket, &datadir, 16)
        }
        TransferMode::Decompress => cat_file_head(source_path),
        TransferMode::File if source_is_dir => tar_archive_head(source_path),
        TransferMode::File => cat_file_head(source_path),
    };

    let password = password.unwrap_or("");
    let stages = [
        head,
        compress_stage(options.compress),
        encrypt_stage(options.encrypt, password),
        parallel_checksum_source_stage(options.parallel_checksum, checksum_paths),
        netcat_send_command(target_host, port),
    ];
    render(&stages)
}

/// Build the consumer (target-side) pipeline for one target.
pub fn compose_target(
    options: &TransferOptions,
    source_is_dir: bool,
    target_path: &Path,
    port: u16,
    password: Option<&str>,
    checksum_paths: &ChecksumPaths,
) -> String {
    let password = password.unwrap_or("");

    let sink = match options.mode {
        TransferMode::Xtrabackup => Fragment::Piped("/usr/bin/mbstream -x".to_string()),
        TransferMode::Decompress => tar_extract_sink(target_path, true),
        TransferMode::File if source_is_dir => tar_extract_sink(target_path, false),
        TransferMode::File => write_file_sink(target_path),
    };

    let stages = [
        netcat_listen_command(port),
        parallel_checksum_target_stage(options.parallel_checksum, checksum_paths),
        decrypt_stage(options.encrypt, password),
        decompress_stage(options.compress),
        sink,
    ];
    render(&stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransferOptions;
    use std::path::PathBuf;

    fn opts(mode: TransferMode) -> TransferOptions {
        TransferOptions {
            mode,
            ..TransferOptions::default()
        }
    }

    #[test]
    fn disabled_stages_never_leave_a_stray_pipe() {
        let mut options = opts(TransferMode::File);
        options.compress = false;
        options.encrypt = false;
        options.checksum = false;
        options.parallel_checksum = false;
        let paths = ChecksumPaths::for_run("t1");

        let source = compose_source(&options, &PathBuf::from("/a/b.bin"), false, "tgt", 4400, None, &paths);
        assert!(!source.contains("||"));
        assert!(!source.trim_start().starts_with('|'));
        assert!(source.contains("/bin/cat /a/b.bin"));
        assert!(source.ends_with("/bin/nc -q 0 -w 300 tgt 4400"));
        assert!(!source.contains("tar"));

        let target = compose_target(&options, false, &PathBuf::from("/dst/b.bin"), 4400, None, &paths);
        assert!(!target.contains("||"));
        assert!(!target.contains("tar"));
    }

    #[test]
    fn plain_file_target_pipes_into_cat_not_a_bare_redirect() {
        let options = opts(TransferMode::File);
        let paths = ChecksumPaths::for_run("t1");
        let target = compose_target(&options, false, &PathBuf::from("/dst/b.bin"), 4400, None, &paths);
        assert!(target.ends_with("| /bin/cat > /dst/b.bin"));
    }

    #[test]
    fn directory_source_always_uses_tar_on_both_sides() {
        let options = opts(TransferMode::File);
        let paths = ChecksumPaths::for_run("t1");
        let source = compose_source(&options, &PathBuf::from("/data/dir"), true, "tgt", 0, Some("pw"), &paths);
        assert!(source.starts_with("/bin/tar cf -"));

        let target = compose_target(&options, true, &PathBuf::from("/restore"), 0, Some("pw"), &paths);
        assert!(target.contains("/bin/tar xf -"));
    }

    #[test]
    fn toggles_are_symmetric_between_source_and_target() {
        let options = opts(TransferMode::File);
        let paths = ChecksumPaths::for_run("t1");
        let source = compose_source(&options, &PathBuf::from("/data/dir"), true, "tgt", 0, Some("pw"), &paths);
        let target = compose_target(&options, true, &PathBuf::from("/restore"), 0, Some("pw"), &paths);

        assert_eq!(source.contains("pigz"), target.contains("pigz"));
        assert_eq!(source.contains("openssl"), target.contains("openssl"));
    }

    #[test]
    fn xtrabackup_mode_uses_mbstream_extractor_not_tar() {
        let options = opts(TransferMode::Xtrabackup);
        let paths = ChecksumPaths::for_run("t1");
        let target = compose_target(&options, false, &PathBuf::from("/srv/sqldata"), 4400, None, &paths);
        assert!(target.contains("mbstream -x"));
        assert!(!target.contains("/bin/tar"));
    }

    #[test]
    fn decompress_mode_strips_one_leading_component() {
        let options = opts(TransferMode::Decompress);
        let paths = ChecksumPaths::for_run("t1");
        let target = compose_target(&options, false, &PathBuf::from("/restore"), 4400, None, &paths);
        assert!(target.contains("--strip-components=1"));
    }
}
