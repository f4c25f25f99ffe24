use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::Level;

use crate::config::EffectiveConfig;

pub mod cloud;
pub mod collect;
pub mod pull;
pub mod recon;
pub mod sysinfo;

/// Flags every program accepts.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// TOML config file (default: ~/.config/reconkit/config.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Log each external command to stderr
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,
    /// Only log errors to stderr
    #[arg(long)]
    pub quiet: bool,
}

/// Time-window flags shared by the two log collectors.
#[derive(Debug, Clone, Args)]
pub struct WindowArgs {
    /// Start time, e.g. "2025-08-12 00:00:00"
    #[arg(long, conflicts_with = "hours")]
    pub since: Option<String>,
    /// Collect the last N hours
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub hours: Option<u32>,
    /// Output directory
    #[arg(long, default_value = "./out")]
    pub out: PathBuf,
}

impl WindowArgs {
    pub fn window(&self) -> crate::core::TimeWindow {
        crate::core::TimeWindow::from_args(self.since.clone(), self.hours)
    }
}

impl CommonArgs {
    fn log_level(&self) -> Level {
        if self.verbose {
            Level::DEBUG
        } else if self.quiet {
            Level::ERROR
        } else {
            Level::WARN
        }
    }

    /// Installs the stderr logger and loads the effective config.
    pub fn init(&self) -> Result<EffectiveConfig> {
        init_logging(self.log_level());
        let home = crate::platform::home_dir();
        let cfg = crate::config::load(self.config.as_deref(), home.as_deref())
            .map_err(crate::exit::invalid_args_err)?;
        if let Some(path) = &cfg.config_path {
            tracing::debug!(path = path.as_str(), "loaded config");
        }
        Ok(cfg)
    }
}

fn init_logging(level: Level) {
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .with_target(false)
        .with_ansi(io::stderr().is_terminal())
        .try_init();
}

pub fn progress_enabled(common: &CommonArgs) -> bool {
    !common.quiet && io::stderr().is_terminal()
}
