// core/src/utils/mod.rs
pub mod logging;
pub mod models;

// Defaults shared by the CLI and config validation
pub const DEFAULT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_UTIL_THRESHOLD_PCT: u32 = 5;
pub const DEFAULT_MEM_THRESHOLD_MB: u64 = 500;
pub const DEFAULT_SMI_PROGRAM: &str = "nvidia-smi";
pub const DEFAULT_SMI_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 30;
