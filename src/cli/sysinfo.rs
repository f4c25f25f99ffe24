use std::io;

use anyhow::{Context, Result};
use clap::Parser;
use time::OffsetDateTime;

use super::CommonArgs;

#[derive(Debug, Parser)]
#[command(
    name = "sysinfo-report",
    version,
    about = "Print host, hardware, and resource-usage facts as a report plus JSON"
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let _cfg = cli.common.init()?;

    let info = crate::sysinfo::collect(OffsetDateTime::now_utc());
    let mut out = io::stdout().lock();
    crate::ui::write_system_report(&mut out, &info).context("failed to write report")?;
    Ok(())
}
