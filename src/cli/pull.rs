use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use time::OffsetDateTime;

use super::{CommonArgs, WindowArgs};
use crate::core::{HostLine, parse_hosts_file};
use crate::remote::{PullRequest, pull_all};

#[derive(Debug, Parser)]
#[command(
    name = "pull-logs",
    version,
    about = "Pull system logs from many hosts over ssh into one session directory"
)]
pub struct Cli {
    /// File with one host per line, e.g. admin@host1 or root@10.0.0.5
    pub hosts_file: PathBuf,
    #[command(flatten)]
    pub window: WindowArgs,
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.common.init()?;

    let contents = std::fs::read_to_string(&cli.hosts_file)
        .with_context(|| format!("failed to read hosts file: {}", cli.hosts_file.display()))
        .map_err(crate::exit::invalid_args_err)?;

    let mut hosts = Vec::new();
    for line in parse_hosts_file(&contents) {
        match line {
            HostLine::Host(spec) => hosts.push(spec),
            HostLine::Rejected { line, reason } => {
                tracing::warn!("skipping host entry {line:?}: {reason}");
            }
            HostLine::Skip => {}
        }
    }
    if hosts.is_empty() {
        tracing::warn!("no hosts in {}", cli.hosts_file.display());
    }

    std::fs::create_dir_all(&cli.window.out).with_context(|| {
        format!("failed to create output directory: {}", cli.window.out.display())
    })?;

    let req = PullRequest {
        window: cli.window.window(),
        out_dir: cli.window.out.clone(),
        hosts,
    };
    let outcome = pull_all(&req, &cfg.remote, OffsetDateTime::now_utc())?;

    let failed: Vec<&str> = outcome
        .hosts
        .iter()
        .filter(|h| h.status != "ok")
        .map(|h| h.host.as_str())
        .collect();
    if !failed.is_empty() {
        tracing::warn!(
            "{} of {} hosts had errors: {}",
            failed.len(),
            outcome.hosts.len(),
            failed.join(", ")
        );
    }

    println!("{}", outcome.session_dir.display());
    Ok(())
}
