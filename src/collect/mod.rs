use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use time::OffsetDateTime;

use crate::config::LogsConfig;
use crate::core::TimeWindow;
use crate::logs::{self, CollectionManifest, CommandAttemptLog};
use crate::platform;

#[derive(Debug, Clone)]
pub struct CollectRequest {
    pub window: TimeWindow,
    pub out_dir: PathBuf,
}

#[derive(Debug, Clone)]
pub struct CollectOutcome {
    pub bundle_dir: PathBuf,
    pub archive_path: PathBuf,
    pub journal_detected: bool,
    pub status: String,
}

/// Exports the journal window (or copies legacy flat files) into a fresh
/// `syslog_local_<stamp>` bundle and packs it next to the bundle as
/// `<bundle>.tar.gz`. Collaborator failures are recorded in the bundle
/// manifest and never abort the run.
pub fn collect_local(
    req: &CollectRequest,
    cfg: &LogsConfig,
    started_at: OffsetDateTime,
) -> Result<CollectOutcome> {
    std::fs::create_dir_all(&req.out_dir).with_context(|| {
        format!("failed to create output directory: {}", req.out_dir.display())
    })?;

    let bundle_name = format!("syslog_local_{}", logs::utc_stamp(started_at));
    let bundle_dir = req.out_dir.join(&bundle_name);
    std::fs::create_dir_all(&bundle_dir)
        .with_context(|| format!("failed to create bundle: {}", bundle_dir.display()))?;

    let journal_detected = platform::find_in_path("journalctl").is_some();
    tracing::debug!(journal_detected, window = %req.window, "collecting local logs");

    let attempts = if journal_detected {
        export_journal(&req.window, cfg, &bundle_dir)
    } else {
        copy_legacy_files(&cfg.legacy_files, cfg.sudo, &bundle_dir)
    };

    let manifest = CollectionManifest::new(
        "collect-logs",
        None,
        started_at,
        OffsetDateTime::now_utc(),
        &req.window,
        journal_detected,
        attempts,
    );
    let status = manifest.status().to_string();
    if let Err(err) = manifest.write_to(&bundle_dir) {
        tracing::warn!("{err:#}");
    }

    let archive_path = req.out_dir.join(format!("{bundle_name}.tar.gz"));
    logs::archive::create_tar_gz(&bundle_dir, &archive_path)?;

    Ok(CollectOutcome {
        bundle_dir,
        archive_path,
        journal_detected,
        status,
    })
}

fn export_journal(
    window: &TimeWindow,
    cfg: &LogsConfig,
    bundle_dir: &Path,
) -> Vec<CommandAttemptLog> {
    export_journal_with(
        window,
        platform::wants_sudo(cfg.sudo),
        cfg.journal_timeout(),
        bundle_dir,
        platform::run_command_to_file,
    )
}

/// Writes both journal renderings. A sudo export that fails or cannot start
/// is retried with plain `journalctl`, which works for members of the
/// `systemd-journal` and `adm` groups; the failed sudo attempt stays in the
/// manifest marked as superseded.
fn export_journal_with<F>(
    window: &TimeWindow,
    use_sudo: bool,
    timeout: Duration,
    bundle_dir: &Path,
    mut run: F,
) -> Vec<CommandAttemptLog>
where
    F: FnMut(&str, &[&str], Duration, &Path) -> Result<i32>,
{
    let mut attempts = Vec::new();
    for export in logs::journal_exports(window) {
        let args: Vec<&str> = export.args.iter().map(String::as_str).collect();
        let out_path = bundle_dir.join(&export.file_name);

        if use_sudo {
            let full = platform::sudo_args("journalctl", &args);
            let attempt = run_export(&mut run, "sudo", &full, timeout, &out_path, &export.file_name);
            if !attempt.failed() {
                attempts.push(attempt);
                continue;
            }
            tracing::info!("retrying {} without sudo", export.file_name);
            attempts.push(attempt.superseded());
        }

        attempts.push(run_export(
            &mut run,
            "journalctl",
            &args,
            timeout,
            &out_path,
            &export.file_name,
        ));
    }
    attempts
}

fn run_export<F>(
    run: &mut F,
    cmd: &str,
    args: &[&str],
    timeout: Duration,
    out_path: &Path,
    file_name: &str,
) -> CommandAttemptLog
where
    F: FnMut(&str, &[&str], Duration, &Path) -> Result<i32>,
{
    let attempt = CommandAttemptLog::new(cmd, args).with_output_file(file_name);
    match run(cmd, args, timeout, out_path) {
        Ok(0) => attempt.with_exit_code(0),
        Ok(code) => {
            tracing::warn!("journal export {file_name} via {cmd} exited with code {code}");
            attempt.with_exit_code(code)
        }
        Err(err) => {
            tracing::warn!("journal export {file_name} via {cmd} failed: {err:#}");
            attempt.with_error(&err)
        }
    }
}

fn copy_legacy_files(files: &[PathBuf], use_sudo: bool, bundle_dir: &Path) -> Vec<CommandAttemptLog> {
    let mut attempts = Vec::new();
    for src in files {
        if !src.exists() {
            continue;
        }
        let Some(name) = src.file_name() else {
            continue;
        };
        let dest = bundle_dir.join(name);
        let src_s = src.display().to_string();
        let dest_s = dest.display().to_string();
        let file_name = name.to_string_lossy();

        match std::fs::copy(src, &dest) {
            Ok(_) => attempts.push(
                CommandAttemptLog::new("copy", &[src_s.as_str(), dest_s.as_str()])
                    .with_output_file(&file_name)
                    .with_exit_code(0),
            ),
            Err(err) if platform::wants_sudo(use_sudo) => {
                tracing::debug!("direct copy of {src_s} failed ({err}); retrying with sudo");
                let dest_dir = bundle_dir.display().to_string();
                let args = ["-n", "cp", "-a", src_s.as_str(), dest_dir.as_str()];
                let attempt = CommandAttemptLog::new("sudo", &args).with_output_file(&file_name);
                let attempt = match platform::run_command("sudo", &args, Duration::from_secs(30)) {
                    Ok(out) => attempt.with_output(&out),
                    Err(err) => attempt.with_error(&err),
                };
                attempts.push(attempt);
            }
            Err(err) => {
                let err = anyhow::Error::new(err).context(format!("failed to copy {src_s}"));
                attempts.push(
                    CommandAttemptLog::new("copy", &[src_s.as_str(), dest_s.as_str()])
                        .with_output_file(&file_name)
                        .with_error(&err),
                );
            }
        }
    }
    attempts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn temp_root(tag: &str) -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let root = std::env::temp_dir().join(format!(
            "reconkit-collect-{tag}-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).expect("create root");
        root
    }

    #[test]
    fn copy_legacy_files_skips_missing_and_copies_present() {
        let root = temp_root("legacy");
        let present = root.join("syslog");
        std::fs::write(&present, "Jan 1 host kernel: hello\n").expect("write");
        let missing = root.join("messages");
        let bundle = root.join("bundle");
        std::fs::create_dir_all(&bundle).expect("bundle");

        let attempts = copy_legacy_files(&[present, missing], false, &bundle);
        assert_eq!(attempts.len(), 1);
        assert!(!attempts[0].failed());
        assert_eq!(
            std::fs::read_to_string(bundle.join("syslog")).expect("copied"),
            "Jan 1 host kernel: hello\n"
        );
        assert!(!bundle.join("messages").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn failed_sudo_export_is_retried_without_sudo() {
        let root = temp_root("sudo-retry");
        let mut calls: Vec<(String, Vec<String>)> = Vec::new();
        let attempts = export_journal_with(
            &TimeWindow::CurrentBoot,
            true,
            Duration::from_secs(5),
            &root,
            |cmd: &str, args: &[&str], _timeout: Duration, out: &Path| {
                calls.push((cmd.to_string(), args.iter().map(|a| a.to_string()).collect()));
                match cmd {
                    "sudo" if args.contains(&"json") => {
                        Err(anyhow::anyhow!("failed to start process: sudo"))
                    }
                    "sudo" => Ok(1),
                    _ => {
                        std::fs::write(out, "boot line\n")?;
                        Ok(0)
                    }
                }
            },
        );

        let cmds: Vec<&str> = calls.iter().map(|(c, _)| c.as_str()).collect();
        assert_eq!(cmds, vec!["sudo", "journalctl", "sudo", "journalctl"]);
        assert_eq!(calls[0].1, vec!["-n", "journalctl", "-o", "short-iso", "-b", "0"]);
        assert_eq!(calls[1].1, vec!["-o", "short-iso", "-b", "0"]);

        assert_eq!(attempts.len(), 4);
        assert!(attempts[0].superseded && attempts[0].exit_code == Some(1));
        assert!(attempts[2].superseded && attempts[2].error.is_some());
        assert!(!attempts[1].failed() && !attempts[3].failed());
        assert_eq!(
            std::fs::read_to_string(root.join("journal_boot.json")).expect("json export"),
            "boot line\n"
        );

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn successful_sudo_export_is_not_repeated() {
        let root = temp_root("sudo-ok");
        let mut cmds = Vec::new();
        let attempts = export_journal_with(
            &TimeWindow::LastHours(1),
            true,
            Duration::from_secs(5),
            &root,
            |cmd: &str, _args: &[&str], _timeout: Duration, _out: &Path| {
                cmds.push(cmd.to_string());
                Ok(0)
            },
        );
        assert_eq!(cmds, vec!["sudo", "sudo"]);
        assert!(attempts.iter().all(|a| !a.failed() && !a.superseded));
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn export_without_sudo_runs_journalctl_directly() {
        let root = temp_root("nosudo");
        let mut cmds = Vec::new();
        let attempts = export_journal_with(
            &TimeWindow::CurrentBoot,
            false,
            Duration::from_secs(5),
            &root,
            |cmd: &str, _args: &[&str], _timeout: Duration, _out: &Path| {
                cmds.push(cmd.to_string());
                Ok(1)
            },
        );
        assert_eq!(cmds, vec!["journalctl", "journalctl"]);
        assert!(attempts.iter().all(|a| a.failed() && !a.superseded));
        let _ = std::fs::remove_dir_all(&root);
    }
}
