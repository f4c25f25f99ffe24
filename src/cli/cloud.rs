use std::io;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use super::CommonArgs;
use crate::cloud::{self, AwsCli};

#[derive(Debug, Parser)]
#[command(
    name = "cloud-scan",
    version,
    about = "Enumerate EC2 instances, S3 buckets, and IAM users and flag public exposure"
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let cfg = cli.common.init()?;

    if crate::platform::find_in_path("aws").is_none() {
        return Err(crate::exit::external_cmd_err(anyhow::anyhow!(
            "the `aws` command-line client was not found in PATH"
        )));
    }

    let api = AwsCli::new(&cfg.cloud);
    let probe_timeout = Duration::from_secs(cfg.cloud.probe_timeout_secs);
    let mut nmap = |ip: &str| cloud::nmap_first_line(ip, probe_timeout);
    let probe: Option<cloud::PortProbe<'_>> = if cfg.cloud.probe_public_ips {
        Some(&mut nmap as cloud::PortProbe<'_>)
    } else {
        None
    };

    let mut out = io::stdout().lock();
    cloud::scan_all(&api, &mut out, probe);
    Ok(())
}
