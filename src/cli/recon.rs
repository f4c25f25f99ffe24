use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use time::OffsetDateTime;

use super::CommonArgs;
use crate::recon;

#[derive(Debug, Parser)]
#[command(name = "recon-scan", version, about = "Multi-tool recon scanner")]
pub struct Cli {
    /// Target IP or domain
    pub target: String,
    /// Gobuster wordlist path
    #[arg(long = "gobuster-wordlist", default_value = "wordlists/common.txt")]
    pub gobuster_wordlist: PathBuf,
    /// Output JSON file name (written under the configured output directory)
    #[arg(long, default_value = "scan_results.json")]
    pub output: String,
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.common.init()?;

    let target = cli.target.trim();
    if target.is_empty() {
        return Err(crate::exit::invalid_args("target must not be empty"));
    }
    if target.starts_with('-') {
        return Err(crate::exit::invalid_args(format!(
            "target {target:?} would be read as a tool option"
        )));
    }
    recon::validate_output_name(&cli.output).map_err(crate::exit::invalid_args_err)?;

    let plan = recon::invocations(target, &cli.gobuster_wordlist, &cfg.recon);
    let timestamp = crate::logs::rfc3339(OffsetDateTime::now_utc());
    let progress = super::progress_enabled(&cli.common);

    let mut out = io::stdout().lock();
    let report = recon::run_recon(
        target,
        &timestamp,
        &plan,
        &mut out,
        progress,
        crate::platform::run_command,
    );

    let path = recon::save_report(&report, &cfg.recon.output_dir, &cli.output)?;
    writeln!(out, "[✓] Results saved to {}", path.display())?;
    Ok(())
}
