use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub recon: ReconConfig,
    pub logs: LogsConfig,
    pub remote: RemoteConfig,
    pub cloud: CloudConfig,
    pub config_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReconConfig {
    pub output_dir: PathBuf,
    pub nmap_timeout_secs: u64,
    pub whatweb_timeout_secs: u64,
    pub nikto_timeout_secs: u64,
    pub gobuster_timeout_secs: u64,
    pub whois_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LogsConfig {
    pub sudo: bool,
    pub journal_timeout_secs: u64,
    pub legacy_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostKeyChecking {
    /// Only hosts already present in known_hosts are accepted.
    Strict,
    /// Unknown hosts are pinned on first contact; changed keys are refused.
    AcceptNew,
}

impl HostKeyChecking {
    pub const fn ssh_value(self) -> &'static str {
        match self {
            HostKeyChecking::Strict => "yes",
            HostKeyChecking::AcceptNew => "accept-new",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub host_key_checking: HostKeyChecking,
    pub sudo: bool,
}

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub profile: Option<String>,
    pub region: Option<String>,
    pub api_timeout_secs: u64,
    pub probe_public_ips: bool,
    pub probe_timeout_secs: u64,
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            recon: ReconConfig {
                output_dir: PathBuf::from("output"),
                nmap_timeout_secs: 60,
                whatweb_timeout_secs: 30,
                nikto_timeout_secs: 90,
                gobuster_timeout_secs: 90,
                whois_timeout_secs: 30,
            },
            logs: LogsConfig {
                sudo: true,
                journal_timeout_secs: 90,
                legacy_files: vec![
                    PathBuf::from("/var/log/syslog"),
                    PathBuf::from("/var/log/messages"),
                ],
            },
            remote: RemoteConfig {
                connect_timeout_secs: 8,
                command_timeout_secs: 90,
                host_key_checking: HostKeyChecking::AcceptNew,
                sudo: true,
            },
            cloud: CloudConfig {
                profile: None,
                region: None,
                api_timeout_secs: 60,
                probe_public_ips: true,
                probe_timeout_secs: 30,
            },
            config_path: None,
        }
    }
}

impl LogsConfig {
    pub fn journal_timeout(&self) -> Duration {
        Duration::from_secs(self.journal_timeout_secs)
    }
}

impl RemoteConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    recon: Option<RawReconConfig>,
    logs: Option<RawLogsConfig>,
    remote: Option<RawRemoteConfig>,
    cloud: Option<RawCloudConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReconConfig {
    output_dir: Option<PathBuf>,
    nmap_timeout_secs: Option<u64>,
    whatweb_timeout_secs: Option<u64>,
    nikto_timeout_secs: Option<u64>,
    gobuster_timeout_secs: Option<u64>,
    whois_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLogsConfig {
    sudo: Option<bool>,
    journal_timeout_secs: Option<u64>,
    legacy_files: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRemoteConfig {
    connect_timeout_secs: Option<u64>,
    command_timeout_secs: Option<u64>,
    host_key_checking: Option<HostKeyChecking>,
    sudo: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCloudConfig {
    profile: Option<String>,
    region: Option<String>,
    api_timeout_secs: Option<u64>,
    probe_public_ips: Option<bool>,
    probe_timeout_secs: Option<u64>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/reconkit/config.toml")
}

/// An explicit path must exist; the default path is optional.
pub fn load(config_path: Option<&Path>, home_dir: Option<&Path>) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = match (config_path, home_dir) {
        (Some(p), _) => Some(p.to_path_buf()),
        (None, Some(home)) => Some(default_config_path(home)).filter(|p| p.exists()),
        (None, None) => None,
    };

    if let Some(path) = path {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        cfg = from_toml_str(&s)
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        cfg.config_path = Some(path.display().to_string());
    }

    validate(&cfg)?;
    Ok(cfg)
}

pub fn from_toml_str(s: &str) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();
    let raw: RawConfig = toml::from_str(s).context("failed to parse config (TOML)")?;
    apply_raw_config(&mut cfg, raw);
    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(recon) = raw.recon {
        if let Some(v) = recon.output_dir {
            cfg.recon.output_dir = v;
        }
        if let Some(v) = recon.nmap_timeout_secs {
            cfg.recon.nmap_timeout_secs = v;
        }
        if let Some(v) = recon.whatweb_timeout_secs {
            cfg.recon.whatweb_timeout_secs = v;
        }
        if let Some(v) = recon.nikto_timeout_secs {
            cfg.recon.nikto_timeout_secs = v;
        }
        if let Some(v) = recon.gobuster_timeout_secs {
            cfg.recon.gobuster_timeout_secs = v;
        }
        if let Some(v) = recon.whois_timeout_secs {
            cfg.recon.whois_timeout_secs = v;
        }
    }

    if let Some(logs) = raw.logs {
        if let Some(v) = logs.sudo {
            cfg.logs.sudo = v;
        }
        if let Some(v) = logs.journal_timeout_secs {
            cfg.logs.journal_timeout_secs = v;
        }
        if let Some(v) = logs.legacy_files {
            cfg.logs.legacy_files = v;
        }
    }

    if let Some(remote) = raw.remote {
        if let Some(v) = remote.connect_timeout_secs {
            cfg.remote.connect_timeout_secs = v;
        }
        if let Some(v) = remote.command_timeout_secs {
            cfg.remote.command_timeout_secs = v;
        }
        if let Some(v) = remote.host_key_checking {
            cfg.remote.host_key_checking = v;
        }
        if let Some(v) = remote.sudo {
            cfg.remote.sudo = v;
        }
    }

    if let Some(cloud) = raw.cloud {
        if cloud.profile.is_some() {
            cfg.cloud.profile = cloud.profile;
        }
        if cloud.region.is_some() {
            cfg.cloud.region = cloud.region;
        }
        if let Some(v) = cloud.api_timeout_secs {
            cfg.cloud.api_timeout_secs = v;
        }
        if let Some(v) = cloud.probe_public_ips {
            cfg.cloud.probe_public_ips = v;
        }
        if let Some(v) = cloud.probe_timeout_secs {
            cfg.cloud.probe_timeout_secs = v;
        }
    }
}

fn validate(cfg: &EffectiveConfig) -> Result<()> {
    let timeouts = [
        ("recon.nmap_timeout_secs", cfg.recon.nmap_timeout_secs),
        ("recon.whatweb_timeout_secs", cfg.recon.whatweb_timeout_secs),
        ("recon.nikto_timeout_secs", cfg.recon.nikto_timeout_secs),
        ("recon.gobuster_timeout_secs", cfg.recon.gobuster_timeout_secs),
        ("recon.whois_timeout_secs", cfg.recon.whois_timeout_secs),
        ("logs.journal_timeout_secs", cfg.logs.journal_timeout_secs),
        ("remote.connect_timeout_secs", cfg.remote.connect_timeout_secs),
        ("remote.command_timeout_secs", cfg.remote.command_timeout_secs),
        ("cloud.api_timeout_secs", cfg.cloud.api_timeout_secs),
        ("cloud.probe_timeout_secs", cfg.cloud.probe_timeout_secs),
    ];
    for (key, secs) in timeouts {
        if secs == 0 {
            anyhow::bail!("{key} must be greater than 0");
        }
    }
    Ok(())
}
