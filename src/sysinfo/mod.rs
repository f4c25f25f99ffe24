use std::collections::BTreeSet;
use std::path::Path;
use std::time::Duration;

use time::OffsetDateTime;

use crate::core::{DiskUsage, MachineType, SystemInfo};
use crate::platform;

/// Gap between the two `/proc/stat` snapshots.
pub const CPU_SAMPLE_GAP: Duration = Duration::from_millis(500);

/// Filesystems above this utilization are reported.
pub const DISK_USAGE_THRESHOLD_PCT: u8 = 80;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const DF_TIMEOUT: Duration = Duration::from_secs(10);
const DMI_DIR: &str = "/sys/class/dmi/id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

/// Parses the aggregate `cpu` line of `/proc/stat`. Idle time is idle +
/// iowait; non-idle is user + nice + system + irq + softirq + steal. Guest
/// time is already counted in user and is left out.
pub fn parse_cpu_times(stat: &str) -> Option<CpuTimes> {
    let line = stat.lines().find(|l| l.starts_with("cpu "))?;
    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .take(8)
        .map(|f| f.parse().ok())
        .collect::<Option<_>>()?;
    if fields.len() < 4 {
        return None;
    }
    let field = |i: usize| fields.get(i).copied().unwrap_or(0);
    let (user, nice, system, idle) = (field(0), field(1), field(2), field(3));
    let (iowait, irq, softirq, steal) = (field(4), field(5), field(6), field(7));

    let idle_all = idle + iowait;
    let non_idle = user + nice + system + irq + softirq + steal;
    Some(CpuTimes {
        idle: idle_all,
        total: idle_all + non_idle,
    })
}

/// `(Δnon-idle / Δtotal) × 100`, rounded to two places; `None` when no time
/// elapsed between the snapshots.
pub fn cpu_busy_pct(first: CpuTimes, second: CpuTimes) -> Option<f64> {
    let total = second.total.checked_sub(first.total)?;
    let idle = second.idle.saturating_sub(first.idle);
    if total == 0 {
        return None;
    }
    let busy = total.saturating_sub(idle);
    Some(round2(busy as f64 * 100.0 / total as f64))
}

pub fn sample_cpu_usage<F>(mut read: F, gap: Duration) -> Option<f64>
where
    F: FnMut() -> Option<CpuTimes>,
{
    let first = read()?;
    std::thread::sleep(gap);
    let second = read()?;
    cpu_busy_pct(first, second)
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn used_pct(total: u64, used: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    Some(round2(used as f64 * 100.0 / total as f64))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub mem_total_kb: u64,
    pub mem_available_kb: u64,
    pub swap_total_kb: u64,
    pub swap_free_kb: u64,
}

impl MemInfo {
    pub fn memory_used_pct(&self) -> Option<f64> {
        used_pct(
            self.mem_total_kb,
            self.mem_total_kb.saturating_sub(self.mem_available_kb),
        )
    }

    pub fn swap_used_pct(&self) -> Option<f64> {
        used_pct(
            self.swap_total_kb,
            self.swap_total_kb.saturating_sub(self.swap_free_kb),
        )
    }
}

pub fn parse_meminfo(s: &str) -> MemInfo {
    let mut info = MemInfo::default();
    let mut available = None;
    let (mut free, mut buffers, mut cached) = (0, 0, 0);
    for line in s.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let Some(kb) = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<u64>().ok())
        else {
            continue;
        };
        match key.trim() {
            "MemTotal" => info.mem_total_kb = kb,
            "MemAvailable" => available = Some(kb),
            "MemFree" => free = kb,
            "Buffers" => buffers = kb,
            "Cached" => cached = kb,
            "SwapTotal" => info.swap_total_kb = kb,
            "SwapFree" => info.swap_free_kb = kb,
            _ => {}
        }
    }
    // Kernels before 3.14 have no MemAvailable.
    info.mem_available_kb = available.unwrap_or(free + buffers + cached);
    info
}

pub fn parse_os_release(s: &str) -> Option<String> {
    s.lines().find_map(|line| {
        let value = line.strip_prefix("PRETTY_NAME=")?;
        let value = value.trim().trim_matches('"').trim_matches('\'').trim();
        (!value.is_empty()).then(|| value.to_string())
    })
}

pub fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        (key.trim() == "model name" && !value.is_empty()).then(|| value.to_string())
    })
}

/// User names from `who`, deduplicated and sorted.
pub fn parse_who(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|l| l.split_whitespace().next())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// `systemd-detect-virt` prints `none` on bare metal.
pub fn parse_detect_virt(stdout: &str) -> (MachineType, Option<String>) {
    match stdout.trim() {
        "" | "none" => (MachineType::Physical, None),
        name => (MachineType::Virtual, Some(name.to_string())),
    }
}

/// Rows of `df -P -h` whose Use% is strictly above `threshold`.
pub fn parse_df(stdout: &str, threshold: u8) -> Vec<DiskUsage> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            if cols.len() < 6 {
                return None;
            }
            let use_pct = cols[4].trim_end_matches('%').parse::<u8>().ok()?;
            Some(DiskUsage {
                filesystem: cols[0].to_string(),
                size: cols[1].to_string(),
                used: cols[2].to_string(),
                available: cols[3].to_string(),
                use_pct,
                mounted_on: cols[5..].join(" "),
            })
        })
        .filter(|d| d.use_pct > threshold)
        .collect()
}

fn read_trimmed(path: &Path) -> Option<String> {
    let bytes = std::fs::read(path).ok()?;
    let s = String::from_utf8_lossy(&bytes).trim().to_string();
    (!s.is_empty()).then_some(s)
}

fn dmi(field: &str) -> Option<String> {
    read_trimmed(&Path::new(DMI_DIR).join(field))
}

fn command_stdout(cmd: &str, args: &[&str], timeout: Duration) -> Option<String> {
    match platform::run_command(cmd, args, timeout) {
        Ok(out) => {
            let s = out.stdout.trim().to_string();
            (!s.is_empty()).then_some(s)
        }
        Err(err) => {
            tracing::debug!("{cmd} unavailable: {err:#}");
            None
        }
    }
}

fn read_proc_cpu_times() -> Option<CpuTimes> {
    let stat = std::fs::read_to_string("/proc/stat").ok()?;
    parse_cpu_times(&stat)
}

/// Gathers every fact in one pass. Nothing here fails; unreadable facts
/// come back as `None`.
pub fn collect(now: OffsetDateTime) -> SystemInfo {
    let uname = platform::uname();

    // `systemd-detect-virt` exits 1 on bare metal, so stdout is read
    // regardless of the exit code.
    let virt = platform::run_command("systemd-detect-virt", &[], PROBE_TIMEOUT)
        .map(|o| o.stdout)
        .unwrap_or_default();
    let (machine_type, hypervisor) = parse_detect_virt(&virt);

    let mem = std::fs::read_to_string("/proc/meminfo")
        .map(|s| parse_meminfo(&s))
        .ok();

    let disk_usage_gt80 = command_stdout("df", &["-P", "-h"], DF_TIMEOUT)
        .map(|s| parse_df(&s, DISK_USAGE_THRESHOLD_PCT))
        .unwrap_or_default();

    SystemInfo {
        timestamp: crate::logs::rfc3339(now),
        hostname: uname
            .as_ref()
            .map(|u| u.nodename.clone())
            .filter(|s| !s.is_empty()),
        uptime_pretty: command_stdout("uptime", &["-p"], PROBE_TIMEOUT),
        manufacturer: dmi("sys_vendor").or_else(|| dmi("chassis_vendor")),
        product_name: dmi("product_name"),
        version: dmi("product_version"),
        serial_number: dmi("product_serial"),
        machine_type,
        hypervisor,
        operating_system: std::fs::read_to_string("/etc/os-release")
            .ok()
            .and_then(|s| parse_os_release(&s)),
        kernel: uname
            .as_ref()
            .map(|u| u.release.clone())
            .filter(|s| !s.is_empty()),
        architecture: uname
            .as_ref()
            .map(|u| u.machine.clone())
            .filter(|s| !s.is_empty()),
        processor_name: std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|s| parse_cpu_model(&s)),
        active_users: command_stdout("who", &[], PROBE_TIMEOUT)
            .map(|s| parse_who(&s))
            .unwrap_or_default(),
        main_ip: command_stdout("hostname", &["-I"], PROBE_TIMEOUT)
            .and_then(|s| s.split_whitespace().next().map(str::to_string)),
        memory_used_pct: mem.and_then(|m| m.memory_used_pct()),
        swap_used_pct: mem.and_then(|m| m.swap_used_pct()),
        cpu_used_pct: sample_cpu_usage(read_proc_cpu_times, CPU_SAMPLE_GAP),
        disk_usage_gt80,
    }
}
