use std::process::Command;

fn run_report() -> (String, serde_json::Value) {
    let out = Command::new(env!("CARGO_BIN_EXE_sysinfo-report"))
        .arg("--quiet")
        .output()
        .expect("run sysinfo-report");
    assert_eq!(
        out.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let stdout = String::from_utf8(out.stdout).expect("utf8 stdout");
    let (report, json) = stdout.split_once("\n--JSON--\n").expect("json marker");
    let json: serde_json::Value = serde_json::from_str(json).expect("json section");
    (report.to_string(), json)
}

#[test]
fn report_has_every_section_and_a_complete_json_object() {
    let (report, json) = run_report();

    assert!(report.contains("System Information"));
    assert!(report.contains("CPU/Memory Usage"));
    assert!(report.contains("Disk Usage > 80%"));
    for label in ["Hostname:", "Kernel:", "Memory Usage:", "CPU Usage:"] {
        assert!(report.contains(label), "missing {label}: {report}");
    }

    let obj = json.as_object().expect("object");
    for key in [
        "timestamp",
        "hostname",
        "uptime_pretty",
        "manufacturer",
        "product_name",
        "version",
        "serial_number",
        "machine_type",
        "hypervisor",
        "operating_system",
        "kernel",
        "architecture",
        "processor_name",
        "active_users",
        "main_ip",
        "memory_used_pct",
        "swap_used_pct",
        "cpu_used_pct",
        "disk_usage_gt80",
    ] {
        assert!(obj.contains_key(key), "missing key {key}");
    }

    let machine_type = json["machine_type"].as_str().expect("machine_type");
    assert!(matches!(machine_type, "physical" | "virtual"));
    for disk in json["disk_usage_gt80"].as_array().expect("disks") {
        assert!(disk["use_pct"].as_u64().expect("use_pct") > 80);
    }
    if let Some(cpu) = json["cpu_used_pct"].as_f64() {
        assert!((0.0..=100.0).contains(&cpu), "{cpu}");
    }
}

#[test]
fn static_facts_are_stable_across_runs() {
    let (_, first) = run_report();
    let (_, second) = run_report();
    for key in ["hostname", "kernel", "architecture", "operating_system", "machine_type"] {
        assert_eq!(first[key], second[key], "{key} changed between runs");
    }
}
