use anyhow::Result;
use clap::Parser;
use time::OffsetDateTime;

use super::{CommonArgs, WindowArgs};
use crate::collect::{CollectRequest, collect_local};

#[derive(Debug, Parser)]
#[command(
    name = "collect-logs",
    version,
    about = "Export a window of local system logs and pack it into a timestamped tar.gz"
)]
pub struct Cli {
    #[command(flatten)]
    pub window: WindowArgs,
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.common.init()?;

    let req = CollectRequest {
        window: cli.window.window(),
        out_dir: cli.window.out.clone(),
    };
    let outcome = collect_local(&req, &cfg.logs, OffsetDateTime::now_utc())?;
    tracing::info!(
        bundle = %outcome.bundle_dir.display(),
        journal = outcome.journal_detected,
        status = outcome.status.as_str(),
        "bundle packed"
    );

    // The archive path is the only thing on stdout.
    println!("{}", outcome.archive_path.display());
    Ok(())
}
