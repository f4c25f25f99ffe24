use std::fmt;

use serde::Serialize;

/// Slice of the system journal to export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TimeWindow {
    /// Explicit start time in any form `journalctl -S` accepts.
    Since(String),
    LastHours(u32),
    CurrentBoot,
}

impl TimeWindow {
    pub fn from_args(since: Option<String>, hours: Option<u32>) -> Self {
        match (since, hours) {
            (Some(since), _) => TimeWindow::Since(since),
            (None, Some(hours)) => TimeWindow::LastHours(hours),
            (None, None) => TimeWindow::CurrentBoot,
        }
    }

    pub fn journal_args(&self) -> Vec<String> {
        match self {
            TimeWindow::Since(since) => vec!["-S".to_string(), since.clone()],
            TimeWindow::LastHours(hours) => {
                vec!["--since".to_string(), format!("{hours} hours ago")]
            }
            TimeWindow::CurrentBoot => vec!["-b".to_string(), "0".to_string()],
        }
    }

    pub fn file_stem(&self) -> &'static str {
        match self {
            TimeWindow::Since(_) | TimeWindow::LastHours(_) => "journal_since",
            TimeWindow::CurrentBoot => "journal_boot",
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::Since(since) => write!(f, "since {since}"),
            TimeWindow::LastHours(hours) => write!(f, "last {hours} hours"),
            TimeWindow::CurrentBoot => f.write_str("current boot"),
        }
    }
}
