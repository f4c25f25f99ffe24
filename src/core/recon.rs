use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Nmap,
    WhatWeb,
    Nikto,
    Gobuster,
    Whois,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotShape {
    Lines,
    Text,
}

impl Tool {
    /// Invocation order.
    pub const ALL: [Tool; 5] = [
        Tool::Nmap,
        Tool::WhatWeb,
        Tool::Nikto,
        Tool::Gobuster,
        Tool::Whois,
    ];

    pub const fn program(self) -> &'static str {
        match self {
            Tool::Nmap => "nmap",
            Tool::WhatWeb => "whatweb",
            Tool::Nikto => "nikto",
            Tool::Gobuster => "gobuster",
            Tool::Whois => "whois",
        }
    }

    pub const fn shape(self) -> SlotShape {
        match self {
            Tool::Nmap | Tool::Gobuster => SlotShape::Lines,
            Tool::WhatWeb | Tool::Nikto | Tool::Whois => SlotShape::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Lines(Vec<String>),
    Text(String),
}

impl ToolOutput {
    pub fn empty(shape: SlotShape) -> Self {
        match shape {
            SlotShape::Lines => ToolOutput::Lines(Vec::new()),
            SlotShape::Text => ToolOutput::Text(String::new()),
        }
    }

    pub fn from_stdout(shape: SlotShape, stdout: &str) -> Self {
        match shape {
            SlotShape::Lines => ToolOutput::Lines(stdout.lines().map(str::to_string).collect()),
            SlotShape::Text => ToolOutput::Text(stdout.trim().to_string()),
        }
    }

    pub fn error(shape: SlotShape, message: &str) -> Self {
        let msg = format!("Error: {message}");
        match shape {
            SlotShape::Lines => ToolOutput::Lines(vec![msg]),
            SlotShape::Text => ToolOutput::Text(msg),
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            ToolOutput::Lines(lines) => {
                lines.len() == 1 && lines[0].starts_with("Error: ")
            }
            ToolOutput::Text(text) => text.starts_with("Error: "),
        }
    }
}

/// Merged result of one recon run. Field order is the JSON key order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconReport {
    pub target: String,
    pub timestamp: String,
    pub nmap: ToolOutput,
    pub nikto: ToolOutput,
    pub gobuster: ToolOutput,
    pub whatweb: ToolOutput,
    pub whois: ToolOutput,
}

impl ReconReport {
    pub fn new(target: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            timestamp: timestamp.into(),
            nmap: ToolOutput::empty(Tool::Nmap.shape()),
            nikto: ToolOutput::empty(Tool::Nikto.shape()),
            gobuster: ToolOutput::empty(Tool::Gobuster.shape()),
            whatweb: ToolOutput::empty(Tool::WhatWeb.shape()),
            whois: ToolOutput::empty(Tool::Whois.shape()),
        }
    }

    pub fn slot_mut(&mut self, tool: Tool) -> &mut ToolOutput {
        match tool {
            Tool::Nmap => &mut self.nmap,
            Tool::WhatWeb => &mut self.whatweb,
            Tool::Nikto => &mut self.nikto,
            Tool::Gobuster => &mut self.gobuster,
            Tool::Whois => &mut self.whois,
        }
    }
}
