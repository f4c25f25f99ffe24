use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use time::OffsetDateTime;

use crate::config::RemoteConfig;
use crate::core::{HostSpec, TimeWindow};
use crate::logs::{self, CollectionManifest, CommandAttemptLog};
use crate::platform;

/// Remote-side log files copied when the host has no journal.
const FALLBACK_GLOBS: [&str; 2] = ["/var/log/syslog*", "/var/log/messages*"];

/// ssh exits with 255 when the connection itself fails.
const SSH_CONNECT_FAILURE: i32 = 255;

#[derive(Debug, Clone)]
pub struct PullRequest {
    pub window: TimeWindow,
    pub out_dir: PathBuf,
    pub hosts: Vec<HostSpec>,
}

#[derive(Debug, Clone)]
pub struct HostOutcome {
    pub host: String,
    pub journal_detected: bool,
    pub reachable: bool,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct PullOutcome {
    pub session_dir: PathBuf,
    pub hosts: Vec<HostOutcome>,
}

/// Pulls logs from every host in order. A failing host never stops the rest.
pub fn pull_all(
    req: &PullRequest,
    cfg: &RemoteConfig,
    started_at: OffsetDateTime,
) -> Result<PullOutcome> {
    let session_dir = req
        .out_dir
        .join(format!("syslog_multi_{}", logs::utc_stamp(started_at)));
    std::fs::create_dir_all(&session_dir)
        .with_context(|| format!("failed to create session dir: {}", session_dir.display()))?;

    let mut hosts = Vec::with_capacity(req.hosts.len());
    for spec in &req.hosts {
        let host_dir = session_dir.join(spec.dir_name());
        if let Err(err) = std::fs::create_dir_all(&host_dir) {
            tracing::warn!(host = %spec, "failed to create {}: {err}", host_dir.display());
            hosts.push(HostOutcome {
                host: spec.to_string(),
                journal_detected: false,
                reachable: false,
                status: "error".to_string(),
            });
            continue;
        }
        let outcome = pull_host(spec, &req.window, cfg, &host_dir);
        if outcome.status != "ok" {
            tracing::warn!(
                host = %spec,
                reachable = outcome.reachable,
                journal = outcome.journal_detected,
                "host finished with status {}",
                outcome.status
            );
        } else {
            tracing::info!(host = %spec, journal = outcome.journal_detected, "host collected");
        }
        hosts.push(outcome);
    }

    Ok(PullOutcome { session_dir, hosts })
}

pub fn pull_host(
    spec: &HostSpec,
    window: &TimeWindow,
    cfg: &RemoteConfig,
    host_dir: &Path,
) -> HostOutcome {
    let started_at = OffsetDateTime::now_utc();
    let mut attempts = Vec::new();

    let detect_args = ssh_args(cfg, spec, "command -v journalctl >/dev/null");
    let detect_refs: Vec<&str> = detect_args.iter().map(String::as_str).collect();
    let detect_timeout = cfg.connect_timeout() + Duration::from_secs(10);
    let detect = platform::run_command("ssh", &detect_refs, detect_timeout);
    let (journal_detected, mut reachable) = match &detect {
        Ok(out) => (out.success(), out.exit_code != SSH_CONNECT_FAILURE),
        Err(_) => (false, false),
    };
    let attempt = CommandAttemptLog::new("ssh", &detect_refs);
    attempts.push(match &detect {
        Ok(out) => attempt.with_output(out),
        Err(err) => attempt.with_error(err),
    });

    if journal_detected {
        for export in logs::journal_exports(window) {
            let remote_cmd = remote_journal_command(cfg.sudo, spec.user(), &export.args);
            let args = ssh_args(cfg, spec, &remote_cmd);
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let out_path = host_dir.join(&export.file_name);
            let attempt = CommandAttemptLog::new("ssh", &refs).with_output_file(&export.file_name);
            attempts.push(
                match platform::run_command_to_file("ssh", &refs, cfg.command_timeout(), &out_path)
                {
                    Ok(code) => attempt.with_exit_code(code),
                    Err(err) => attempt.with_error(&err),
                },
            );
        }
    } else {
        let dest = format!("{}/", host_dir.display());
        for glob in FALLBACK_GLOBS {
            let mut args = ssh_options(cfg);
            args.push(format!("{spec}:{glob}"));
            args.push(dest.clone());
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            let attempt = CommandAttemptLog::new("scp", &refs);
            attempts.push(
                match platform::run_command("scp", &refs, cfg.command_timeout()) {
                    Ok(out) => {
                        if out.success() {
                            reachable = true;
                        }
                        attempt.with_output(&out)
                    }
                    Err(err) => attempt.with_error(&err),
                },
            );
        }
    }

    let manifest = CollectionManifest::new(
        "pull-logs",
        Some(spec.to_string()),
        started_at,
        OffsetDateTime::now_utc(),
        window,
        journal_detected,
        attempts,
    );
    let status = manifest.status().to_string();
    if let Err(err) = manifest.write_to(host_dir) {
        tracing::warn!(host = %spec, "{err:#}");
    }

    HostOutcome {
        host: spec.to_string(),
        journal_detected,
        reachable,
        status,
    }
}

/// Options shared by ssh and scp: never prompt, bounded connect, explicit
/// host key policy.
pub fn ssh_options(cfg: &RemoteConfig) -> Vec<String> {
    vec![
        "-o".to_string(),
        "BatchMode=yes".to_string(),
        "-o".to_string(),
        format!("ConnectTimeout={}", cfg.connect_timeout_secs),
        "-o".to_string(),
        format!(
            "StrictHostKeyChecking={}",
            cfg.host_key_checking.ssh_value()
        ),
    ]
}

fn ssh_args(cfg: &RemoteConfig, spec: &HostSpec, remote_cmd: &str) -> Vec<String> {
    let mut args = ssh_options(cfg);
    args.push(spec.to_string());
    args.push(remote_cmd.to_string());
    args
}

/// The remote side receives a single shell string, so every argument is
/// quoted.
pub fn remote_journal_command(use_sudo: bool, user: Option<&str>, args: &[String]) -> String {
    let mut parts: Vec<&str> = Vec::with_capacity(args.len() + 3);
    if use_sudo && user != Some("root") {
        parts.extend(["sudo", "-n"]);
    }
    parts.push("journalctl");
    parts.extend(args.iter().map(String::as_str));
    platform::shell_join(&parts)
}
