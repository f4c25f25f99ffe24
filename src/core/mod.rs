mod cloud;
mod host;
mod recon;
mod system;
mod window;

pub use cloud::{BucketGrant, Instance, IpPermission, IpRange, Ipv6Range, SecurityGroup};
pub use host::{HostLine, HostSpec, parse_hosts_file, sanitize_host_dir};
pub use recon::{ReconReport, SlotShape, Tool, ToolOutput};
pub use system::{DiskUsage, MachineType, SystemInfo};
pub use window::TimeWindow;
