use std::io::{self, Write};
use std::time::Duration;

use anyhow::Error;
use indicatif::{ProgressBar, ProgressDrawTarget};

use crate::core::SystemInfo;

const REPORT_LABEL_WIDTH: usize = 24;

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for command-level details");
    let _ = writeln!(stderr, "  - see `--help` for the accepted options");
}

/// Spinner on stderr; callers only create one when stderr is a terminal.
pub fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn rule(out: &mut impl Write, title: &str, side: usize) -> io::Result<()> {
    let dashes = "-".repeat(side);
    writeln!(out, "{dashes} {title} {dashes}")
}

fn row(out: &mut impl Write, label: &str, value: &str) -> io::Result<()> {
    writeln!(out, "{label:<width$}{value}", width = REPORT_LABEL_WIDTH)
}

fn or_na(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("N/A")
}

fn pct(v: Option<f64>) -> String {
    match v {
        Some(v) => format!("{v:.2}%"),
        None => "N/A".to_string(),
    }
}

pub fn write_system_report(out: &mut impl Write, info: &SystemInfo) -> io::Result<()> {
    rule(out, "System Information", 31)?;
    row(out, "Hostname:", or_na(&info.hostname))?;
    row(out, "Uptime:", or_na(&info.uptime_pretty))?;
    row(out, "Manufacturer:", or_na(&info.manufacturer))?;
    row(out, "Product Name:", or_na(&info.product_name))?;
    row(out, "Version:", or_na(&info.version))?;
    row(out, "Serial Number:", or_na(&info.serial_number))?;
    row(out, "Machine Type:", &info.machine_type_label())?;
    row(out, "Operating System:", or_na(&info.operating_system))?;
    row(out, "Kernel:", or_na(&info.kernel))?;
    row(out, "Architecture:", or_na(&info.architecture))?;
    row(out, "Processor Name:", or_na(&info.processor_name))?;
    let users = if info.active_users.is_empty() {
        "none".to_string()
    } else {
        info.active_users.join(", ")
    };
    row(out, "Active Users:", &users)?;
    row(out, "System Main IP:", or_na(&info.main_ip))?;

    rule(out, "CPU/Memory Usage", 31)?;
    row(out, "Memory Usage:", &pct(info.memory_used_pct))?;
    row(out, "Swap Usage:", &pct(info.swap_used_pct))?;
    row(out, "CPU Usage:", &pct(info.cpu_used_pct))?;

    rule(out, "Disk Usage > 80%", 29)?;
    if info.disk_usage_gt80.is_empty() {
        writeln!(out, "none")?;
    } else {
        writeln!(
            out,
            "{:<24} {:>6} {:>6} {:>6} {:>5}  Mounted on",
            "Filesystem", "Size", "Used", "Avail", "Use%"
        )?;
        for d in &info.disk_usage_gt80 {
            writeln!(
                out,
                "{:<24} {:>6} {:>6} {:>6} {:>4}%  {}",
                d.filesystem, d.size, d.used, d.available, d.use_pct, d.mounted_on
            )?;
        }
    }

    writeln!(out)?;
    writeln!(out, "--JSON--")?;
    let json = serde_json::to_string_pretty(info).map_err(io::Error::other)?;
    writeln!(out, "{json}")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DiskUsage, MachineType};

    fn sample() -> SystemInfo {
        SystemInfo {
            timestamp: "2026-01-01T00:00:00Z".to_string(),
            hostname: Some("web01".to_string()),
            uptime_pretty: None,
            manufacturer: Some("QEMU".to_string()),
            product_name: None,
            version: None,
            serial_number: None,
            machine_type: MachineType::Virtual,
            hypervisor: Some("kvm".to_string()),
            operating_system: Some("Debian GNU/Linux 12 (bookworm)".to_string()),
            kernel: Some("6.1.0-18-amd64".to_string()),
            architecture: Some("x86_64".to_string()),
            processor_name: None,
            active_users: vec![],
            main_ip: Some("10.0.0.5".to_string()),
            memory_used_pct: Some(41.5),
            swap_used_pct: None,
            cpu_used_pct: Some(3.0),
            disk_usage_gt80: vec![DiskUsage {
                filesystem: "/dev/vda1".to_string(),
                size: "20G".to_string(),
                used: "18G".to_string(),
                available: "2.0G".to_string(),
                use_pct: 90,
                mounted_on: "/".to_string(),
            }],
        }
    }

    #[test]
    fn report_has_fixed_width_rows_and_json_tail() {
        let mut buf = Vec::new();
        write_system_report(&mut buf, &sample()).expect("write");
        let text = String::from_utf8(buf).expect("utf8");

        assert!(text.contains(&format!("{:<24}web01\n", "Hostname:")), "text={text}");
        assert!(text.contains(&format!("{:<24}N/A\n", "Uptime:")), "text={text}");
        assert!(text.contains(&format!("{:<24}VM (kvm)\n", "Machine Type:")), "text={text}");
        assert!(text.contains(&format!("{:<24}none\n", "Active Users:")), "text={text}");
        assert!(text.contains(&format!("{:<24}41.50%\n", "Memory Usage:")), "text={text}");
        assert!(text.contains(&format!("{:<24}N/A\n", "Swap Usage:")), "text={text}");
        assert!(text.contains("/dev/vda1"), "text={text}");

        let (_, json) = text.split_once("--JSON--\n").expect("json marker");
        let v: serde_json::Value = serde_json::from_str(json).expect("parse json");
        assert_eq!(v["hostname"], "web01");
        assert_eq!(v["machine_type"], "virtual");
        assert!(v["swap_used_pct"].is_null());
        assert_eq!(v["disk_usage_gt80"][0]["use_pct"], 90);
    }

    struct FailAfter(usize);

    impl Write for FailAfter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.0 == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            self.0 -= 1;
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn report_write_error_surfaces_from_the_first_section() {
        let err = write_system_report(&mut FailAfter(0), &sample()).expect_err("closed stdout");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);

        let err = write_system_report(&mut FailAfter(3), &sample()).expect_err("closed stdout");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
