// cli/src/cli/mod.rs
pub mod output;

use anyhow::{Context, Result};
use clap::Parser;
use idlegpu_core::config::RawSettings;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Monitor GPUs and alert when any GPU is idle.
#[derive(Parser, Debug, Default)]
#[command(name = "idlegpu", version)]
pub struct Args {
    /// Seconds between checks
    #[arg(long)]
    pub interval: Option<u64>,

    /// Utilization threshold in percent (<= considered idle)
    #[arg(long = "util-th", visible_alias = "util_th")]
    pub util_th: Option<u32>,

    /// Memory used threshold in MB (<= considered idle)
    #[arg(long = "mem-th", visible_alias = "mem_th")]
    pub mem_th: Option<u64>,

    /// Check once and exit (0 if an idle GPU was found, 1 otherwise)
    #[arg(long)]
    pub once: bool,

    /// Print each cycle's status as one JSON line
    #[arg(long)]
    pub json: bool,

    /// Stop after this many cycles (0 = run forever)
    #[arg(long)]
    pub max_cycles: Option<u64>,

    /// Exit non-zero after this many failed cycles in a row (0 = never)
    #[arg(long = "max-failures")]
    pub max_failures: Option<u32>,

    /// Do not ring the terminal bell on alerts
    #[arg(long)]
    pub no_bell: bool,

    /// Minimum seconds between two alerts (0 = alert every cycle)
    #[arg(long)]
    pub cooldown: Option<u64>,

    /// Enable email notification
    #[arg(long)]
    pub email: bool,

    /// Comma-separated recipients
    #[arg(long = "email-to", visible_alias = "email_to", env = "SMTP_TO")]
    pub email_to: Option<String>,

    /// SMTP host
    #[arg(long = "smtp-host", visible_alias = "smtp_host", env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// SMTP port (defaults to 25, 465 with --smtp-ssl, 587 with --smtp-tls)
    #[arg(long = "smtp-port", visible_alias = "smtp_port", env = "SMTP_PORT")]
    pub smtp_port: Option<u16>,

    /// SMTP user
    #[arg(long = "smtp-user", visible_alias = "smtp_user", env = "SMTP_USER")]
    pub smtp_user: Option<String>,

    /// SMTP password or app password
    #[arg(long = "smtp-pass", visible_alias = "smtp_pass", env = "SMTP_PASS", hide_env_values = true)]
    pub smtp_pass: Option<String>,

    /// Sender address (defaults to the SMTP user)
    #[arg(long = "smtp-sender", visible_alias = "smtp_sender", env = "SMTP_SENDER")]
    pub smtp_sender: Option<String>,

    /// Use implicit TLS (SMTPS)
    #[arg(long = "smtp-ssl", visible_alias = "smtp_ssl")]
    pub smtp_ssl: bool,

    /// Use STARTTLS
    #[arg(long = "smtp-tls", visible_alias = "smtp_tls")]
    pub smtp_tls: bool,

    /// SMTP connection timeout in seconds
    #[arg(long)]
    pub smtp_timeout: Option<u64>,

    /// Sampling backend: smi (run nvidia-smi) or nvml
    #[arg(long)]
    pub backend: Option<String>,

    /// Path to nvidia-smi
    #[arg(long)]
    pub smi_path: Option<String>,

    /// Seconds before a hung nvidia-smi is killed
    #[arg(long)]
    pub smi_timeout: Option<u64>,

    /// Optional JSON config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// trace, debug, info, warn or error
    #[arg(long)]
    pub log_level: Option<String>,

    /// Also append log lines to this file
    #[arg(long)]
    pub log_path: Option<PathBuf>,
}

/// Settings file, every key optional. Flags and environment take precedence.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileConfig {
    pub interval: Option<u64>,
    pub util_th: Option<u32>,
    pub mem_th: Option<u64>,
    pub once: Option<bool>,
    pub json: Option<bool>,
    pub max_cycles: Option<u64>,
    pub max_failures: Option<u32>,
    pub bell: Option<bool>,
    pub cooldown: Option<u64>,
    pub email: Option<bool>,
    pub email_to: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub smtp_sender: Option<String>,
    pub smtp_ssl: Option<bool>,
    pub smtp_tls: Option<bool>,
    pub smtp_timeout: Option<u64>,
    pub backend: Option<String>,
    pub smi_path: Option<String>,
    pub smi_timeout: Option<u64>,
    pub log_level: Option<String>,
    pub log_path: Option<PathBuf>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    pub level: String,
    pub path: Option<PathBuf>,
}

impl Args {
    /// Merges flags/env over the config file over built-in defaults.
    pub fn resolve(self, file: FileConfig) -> (RawSettings, LogOptions) {
        let d = RawSettings::default();
        let settings = RawSettings {
            interval_secs: self.interval.or(file.interval).unwrap_or(d.interval_secs),
            util_threshold: self.util_th.or(file.util_th).unwrap_or(d.util_threshold),
            mem_threshold: self.mem_th.or(file.mem_th).unwrap_or(d.mem_threshold),
            once: self.once || file.once.unwrap_or(d.once),
            json: self.json || file.json.unwrap_or(d.json),
            max_cycles: self.max_cycles.or(file.max_cycles),
            max_failures: self.max_failures.or(file.max_failures),
            bell: !self.no_bell && file.bell.unwrap_or(d.bell),
            cooldown_secs: self.cooldown.or(file.cooldown).unwrap_or(d.cooldown_secs),
            email: self.email || file.email.unwrap_or(d.email),
            email_to: self.email_to.or(file.email_to),
            smtp_host: self.smtp_host.or(file.smtp_host),
            smtp_port: self.smtp_port.or(file.smtp_port),
            smtp_user: self.smtp_user.or(file.smtp_user),
            smtp_pass: self.smtp_pass.or(file.smtp_pass),
            smtp_sender: self.smtp_sender.or(file.smtp_sender),
            smtp_ssl: self.smtp_ssl || file.smtp_ssl.unwrap_or(d.smtp_ssl),
            smtp_tls: self.smtp_tls || file.smtp_tls.unwrap_or(d.smtp_tls),
            smtp_timeout_secs: self.smtp_timeout.or(file.smtp_timeout).unwrap_or(d.smtp_timeout_secs),
            backend: self.backend.or(file.backend).unwrap_or(d.backend),
            smi_path: self.smi_path.or(file.smi_path).unwrap_or(d.smi_path),
            smi_timeout_secs: self.smi_timeout.or(file.smi_timeout).unwrap_or(d.smi_timeout_secs),
        };
        let log = LogOptions {
            level: self.log_level.or(file.log_level).unwrap_or_else(|| "info".to_string()),
            path: self.log_path.or(file.log_path),
        };
        (settings, log)
    }
}
