use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::ReconConfig;
use crate::core::{ReconReport, SlotShape, Tool, ToolOutput};
use crate::platform::CommandOutput;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub tool: Tool,
    pub args: Vec<String>,
    pub timeout: Duration,
}

pub fn gobuster_url(target: &str) -> String {
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("http://{target}")
    }
}

pub fn invocations(target: &str, wordlist: &Path, cfg: &ReconConfig) -> Vec<ToolInvocation> {
    Tool::ALL
        .iter()
        .map(|&tool| {
            let (args, secs) = match tool {
                Tool::Nmap => (
                    vec!["-sV".to_string(), "-T4".to_string(), target.to_string()],
                    cfg.nmap_timeout_secs,
                ),
                Tool::WhatWeb => (vec![target.to_string()], cfg.whatweb_timeout_secs),
                Tool::Nikto => (
                    vec!["-h".to_string(), target.to_string()],
                    cfg.nikto_timeout_secs,
                ),
                Tool::Gobuster => (
                    vec![
                        "dir".to_string(),
                        "-u".to_string(),
                        gobuster_url(target),
                        "-w".to_string(),
                        wordlist.display().to_string(),
                        "-q".to_string(),
                    ],
                    cfg.gobuster_timeout_secs,
                ),
                Tool::Whois => (vec![target.to_string()], cfg.whois_timeout_secs),
            };
            ToolInvocation {
                tool,
                args,
                timeout: Duration::from_secs(secs),
            }
        })
        .collect()
}

/// Turns one invocation result into a slot value. Spawn failures, timeouts,
/// and non-zero exits with nothing on stdout become `Error: ...`; a non-zero
/// exit that still printed output keeps the output.
pub fn slot_from_result(shape: SlotShape, program: &str, result: Result<CommandOutput>) -> ToolOutput {
    match result {
        Ok(out) if out.success() || !out.stdout.trim().is_empty() => {
            ToolOutput::from_stdout(shape, &out.stdout)
        }
        Ok(out) => {
            let mut msg = format!("{program} exited with code {}", out.exit_code);
            if let Some(line) = out.stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
                msg.push_str(&format!(": {line}"));
            }
            ToolOutput::error(shape, &msg)
        }
        Err(err) => ToolOutput::error(shape, &format!("{err:#}")),
    }
}

/// Runs every tool once, in order, filling each slot with output or an
/// error. `run` is the process runner (`platform::run_command` in
/// production).
pub fn run_recon<W, F>(
    target: &str,
    timestamp: &str,
    plan: &[ToolInvocation],
    out: &mut W,
    progress: bool,
    mut run: F,
) -> ReconReport
where
    W: Write,
    F: FnMut(&str, &[&str], Duration) -> Result<CommandOutput>,
{
    let mut report = ReconReport::new(target, timestamp);

    for inv in plan {
        let program = inv.tool.program();
        let _ = writeln!(out, "[+] Running {program} on {target}");
        let _ = out.flush();

        let spinner = progress.then(|| crate::ui::spinner(format!("{program} {target}")));
        let args: Vec<&str> = inv.args.iter().map(String::as_str).collect();
        let result = run(program, &args, inv.timeout);
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        let slot = slot_from_result(inv.tool.shape(), program, result);
        if slot.is_error() {
            tracing::warn!(tool = program, "{slot:?}");
        }
        *report.slot_mut(inv.tool) = slot;
    }

    report
}

/// Rejects anything but a bare file name so the report cannot be written
/// outside the output directory.
pub fn validate_output_name(name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        anyhow::bail!("--output must be a file name, got {name:?}");
    }
    if trimmed.contains('/') || trimmed.contains('\\') {
        anyhow::bail!("--output must be a file name without directories, got {name:?}");
    }
    Ok(())
}

pub fn save_report(report: &ReconReport, output_dir: &Path, name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;
    let path = output_dir.join(name.trim());
    let buf = serde_json::to_vec_pretty(report).context("failed to serialize scan results")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write scan results: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EffectiveConfig;

    fn ok(stdout: &str) -> Result<CommandOutput> {
        Ok(CommandOutput {
            exit_code: 0,
            stdout: stdout.to_string(),
            stderr: String::new(),
        })
    }

    #[test]
    fn gobuster_url_adds_scheme_only_when_missing() {
        assert_eq!(gobuster_url("10.0.0.5"), "http://10.0.0.5");
        assert_eq!(gobuster_url("https://example.com"), "https://example.com");
        assert_eq!(gobuster_url("http://example.com:8080"), "http://example.com:8080");
        assert_eq!(gobuster_url("httpbin.org"), "http://httpbin.org");
    }

    #[test]
    fn invocations_follow_tool_order_and_timeouts() {
        let cfg = EffectiveConfig::default().recon;
        let plan = invocations("example.com", Path::new("wordlists/common.txt"), &cfg);
        let tools: Vec<Tool> = plan.iter().map(|i| i.tool).collect();
        assert_eq!(tools, Tool::ALL.to_vec());
        assert_eq!(plan[0].args, vec!["-sV", "-T4", "example.com"]);
        assert_eq!(plan[0].timeout, Duration::from_secs(60));
        assert_eq!(
            plan[3].args,
            vec!["dir", "-u", "http://example.com", "-w", "wordlists/common.txt", "-q"]
        );
        assert_eq!(plan[2].timeout, Duration::from_secs(90));
    }

    #[test]
    fn timed_out_tool_still_fills_every_slot() {
        let cfg = EffectiveConfig::default().recon;
        let plan = invocations("10.0.0.5", Path::new("w.txt"), &cfg);
        let mut console = Vec::new();
        let report = run_recon("10.0.0.5", "2026-01-01T00:00:00Z", &plan, &mut console, false, |cmd, _, timeout| {
            match cmd {
                "nikto" => Err(anyhow::anyhow!("timed out after {timeout:?}: nikto")),
                "nmap" => ok("22/tcp open ssh\n80/tcp open http\n"),
                "gobuster" => ok("/admin (Status: 301)\n"),
                _ => ok("  some text  \n"),
            }
        });

        let v = serde_json::to_value(&report).expect("serialize");
        for key in ["nmap", "nikto", "gobuster", "whatweb", "whois"] {
            assert!(v.get(key).is_some(), "missing {key}: {v}");
        }
        assert!(
            v["nikto"]
                .as_str()
                .is_some_and(|s| s.starts_with("Error: ") && s.contains("timed out")),
            "nikto={}",
            v["nikto"]
        );
        assert_eq!(v["nmap"][1], "80/tcp open http");
        assert_eq!(v["whatweb"], "some text");

        let console = String::from_utf8(console).expect("utf8");
        assert_eq!(console.matches("[+] Running ").count(), 5, "console={console}");
    }

    #[test]
    fn line_slot_failure_is_single_error_line() {
        let slot = slot_from_result(
            SlotShape::Lines,
            "gobuster",
            Err(anyhow::anyhow!("failed to start process: gobuster")),
        );
        assert_eq!(
            slot,
            ToolOutput::Lines(vec!["Error: failed to start process: gobuster".to_string()])
        );
    }

    #[test]
    fn nonzero_exit_keeps_output_when_present() {
        let with_output = Ok(CommandOutput {
            exit_code: 1,
            stdout: "Domain Name: EXAMPLE.COM\n".to_string(),
            stderr: String::new(),
        });
        assert_eq!(
            slot_from_result(SlotShape::Text, "whois", with_output),
            ToolOutput::Text("Domain Name: EXAMPLE.COM".to_string())
        );

        let empty = Ok(CommandOutput {
            exit_code: 2,
            stdout: String::new(),
            stderr: "\nError: wordlist not found\n".to_string(),
        });
        assert_eq!(
            slot_from_result(SlotShape::Lines, "gobuster", empty),
            ToolOutput::Lines(vec![
                "Error: gobuster exited with code 2: Error: wordlist not found".to_string()
            ])
        );
    }

    #[test]
    fn output_name_must_be_plain_file_name() {
        assert!(validate_output_name("scan_results.json").is_ok());
        assert!(validate_output_name("../etc/passwd").is_err());
        assert!(validate_output_name("a/b.json").is_err());
        assert!(validate_output_name("..").is_err());
        assert!(validate_output_name("  ").is_err());
    }
}
