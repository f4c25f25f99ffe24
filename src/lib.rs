pub mod cli;
pub mod cloud;
pub mod collect;
pub mod config;
pub mod core;
pub mod exit;
pub mod logs;
pub mod platform;
pub mod recon;
pub mod remote;
pub mod sysinfo;
pub mod ui;
