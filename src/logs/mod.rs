use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

use crate::core::TimeWindow;
use crate::platform::CommandOutput;

pub mod archive;

pub const MANIFEST_FILE: &str = "collection.json";

const MAX_CMD_OUTPUT_BYTES: usize = 64 * 1024;

/// `YYYYMMDDTHHMMSSZ`, used in bundle and session directory names.
pub fn utc_stamp(now: OffsetDateTime) -> String {
    let fmt = format_description!("[year][month][day]T[hour][minute][second]Z");
    now.to_offset(time::UtcOffset::UTC)
        .format(&fmt)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

pub fn rfc3339(now: OffsetDateTime) -> String {
    now.format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalExport {
    pub file_name: String,
    /// Arguments for `journalctl`, not including the program itself.
    pub args: Vec<String>,
}

/// Human-readable and structured renderings of the same window.
pub fn journal_exports(window: &TimeWindow) -> [JournalExport; 2] {
    let stem = window.file_stem();
    let render = |format: &str, ext: &str| {
        let mut args = vec!["-o".to_string(), format.to_string()];
        args.extend(window.journal_args());
        JournalExport {
            file_name: format!("{stem}.{ext}"),
            args,
        }
    };
    [render("short-iso", "log"), render("json", "json")]
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandAttemptLog {
    pub cmd: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// A later attempt redid this one, so its failure does not count.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub superseded: bool,
}

impl CommandAttemptLog {
    pub fn new(cmd: &str, args: &[&str]) -> Self {
        Self {
            cmd: cmd.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            output_file: None,
            exit_code: None,
            stderr: String::new(),
            error: None,
            superseded: false,
        }
    }

    pub fn with_output_file(mut self, name: &str) -> Self {
        self.output_file = Some(name.to_string());
        self
    }

    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    pub fn with_output(mut self, output: &CommandOutput) -> Self {
        self.exit_code = Some(output.exit_code);
        self.stderr = truncate_string(&output.stderr, MAX_CMD_OUTPUT_BYTES);
        self
    }

    pub fn with_error(mut self, err: &anyhow::Error) -> Self {
        self.error = Some(format!("{err:#}"));
        self
    }

    pub fn superseded(mut self) -> Self {
        self.superseded = true;
        self
    }

    pub fn failed(&self) -> bool {
        self.error.is_some() || self.exit_code.is_some_and(|c| c != 0)
    }
}

#[derive(Debug, Serialize)]
pub struct CollectionManifest {
    schema_version: &'static str,
    tool_version: String,
    command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    started_at: String,
    finished_at: String,
    window: TimeWindow,
    journal_detected: bool,
    status: String,
    attempts: Vec<CommandAttemptLog>,
}

impl CollectionManifest {
    pub fn new(
        command: &'static str,
        host: Option<String>,
        started_at: OffsetDateTime,
        finished_at: OffsetDateTime,
        window: &TimeWindow,
        journal_detected: bool,
        attempts: Vec<CommandAttemptLog>,
    ) -> Self {
        let status = if attempts.iter().any(|a| a.failed() && !a.superseded) {
            "partial_error"
        } else {
            "ok"
        };
        Self {
            schema_version: "1.0",
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            command,
            host,
            started_at: rfc3339(started_at),
            finished_at: rfc3339(finished_at),
            window: window.clone(),
            journal_detected,
            status: status.to_string(),
            attempts,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(MANIFEST_FILE);
        let buf =
            serde_json::to_vec_pretty(self).context("failed to serialize collection manifest")?;
        std::fs::write(&path, buf)
            .with_context(|| format!("failed to write manifest: {}", path.display()))?;
        Ok(path)
    }
}

fn truncate_string(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx = idx.saturating_sub(1);
    }
    let head = &s[..idx];
    format!("{head}\n...(truncated, total={} bytes)", s.len())
}
