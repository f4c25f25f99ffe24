use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineType {
    Physical,
    Virtual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    pub filesystem: String,
    pub size: String,
    pub used: String,
    pub available: String,
    pub use_pct: u8,
    pub mounted_on: String,
}

/// One snapshot of host facts. Absent facts are `None` (JSON `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    pub timestamp: String,
    pub hostname: Option<String>,
    pub uptime_pretty: Option<String>,
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub version: Option<String>,
    pub serial_number: Option<String>,
    pub machine_type: MachineType,
    pub hypervisor: Option<String>,
    pub operating_system: Option<String>,
    pub kernel: Option<String>,
    pub architecture: Option<String>,
    pub processor_name: Option<String>,
    pub active_users: Vec<String>,
    pub main_ip: Option<String>,
    pub memory_used_pct: Option<f64>,
    pub swap_used_pct: Option<f64>,
    pub cpu_used_pct: Option<f64>,
    pub disk_usage_gt80: Vec<DiskUsage>,
}

impl SystemInfo {
    pub fn machine_type_label(&self) -> String {
        match (self.machine_type, self.hypervisor.as_deref()) {
            (MachineType::Virtual, Some(h)) => format!("VM ({h})"),
            (MachineType::Virtual, None) => "VM".to_string(),
            (MachineType::Physical, _) => "Physical".to_string(),
        }
    }
}
