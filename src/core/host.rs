use std::fmt;

/// One line of a hosts file: `[user@]host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostLine {
    Host(HostSpec),
    Skip,
    Rejected { line: String, reason: &'static str },
}

impl HostSpec {
    pub fn parse(line: &str) -> HostLine {
        let target = line.trim();
        if target.is_empty() || target.starts_with('#') {
            return HostLine::Skip;
        }
        if target.starts_with('-') {
            return HostLine::Rejected {
                line: target.to_string(),
                reason: "would be read as an ssh option",
            };
        }
        if target.chars().any(char::is_whitespace) {
            return HostLine::Rejected {
                line: target.to_string(),
                reason: "contains whitespace",
            };
        }
        if target.ends_with('@') {
            return HostLine::Rejected {
                line: target.to_string(),
                reason: "missing host after '@'",
            };
        }
        HostLine::Host(HostSpec {
            raw: target.to_string(),
        })
    }

    pub fn user(&self) -> Option<&str> {
        self.raw.rsplit_once('@').map(|(user, _)| user)
    }

    pub fn dir_name(&self) -> String {
        sanitize_host_dir(&self.raw)
    }
}

impl fmt::Display for HostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Keeps ASCII alphanumerics and `._-`; everything else becomes `_`.
pub fn sanitize_host_dir(spec: &str) -> String {
    spec.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

pub fn parse_hosts_file(contents: &str) -> Vec<HostLine> {
    contents
        .lines()
        .map(HostSpec::parse)
        .filter(|l| *l != HostLine::Skip)
        .collect()
}
