// core/src/config.rs
use crate::error::ConfigError;
use crate::notify::email::{parse_mailbox, EmailConfig, Encryption, SmtpCredentials, SmtpSettings};
use crate::notify::NotificationConfig;
use crate::utils::models::ThresholdConfig;
use crate::utils::{
    DEFAULT_INTERVAL_SECS, DEFAULT_MEM_THRESHOLD_MB, DEFAULT_SMI_PROGRAM, DEFAULT_SMI_TIMEOUT_SECS,
    DEFAULT_SMTP_TIMEOUT_SECS, DEFAULT_UTIL_THRESHOLD_PCT,
};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Smi,
    Nvml,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smi" | "nvidia-smi" => Ok(Backend::Smi),
            "nvml" => Ok(Backend::Nvml),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    pub backend: Backend,
    pub program: String,
    pub timeout: Duration,
}

/// How the cycle driver repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    pub once: bool,
    pub max_cycles: Option<u64>,
    pub max_consecutive_failures: Option<u32>,
}

/// Validated configuration, built once before the first cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub schedule: Schedule,
    pub output: OutputMode,
    pub thresholds: ThresholdConfig,
    pub sampler: SamplerConfig,
    pub notification: NotificationConfig,
}

/// Unvalidated settings as merged from flags, environment and config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSettings {
    pub interval_secs: u64,
    pub util_threshold: u32,
    pub mem_threshold: u64,
    pub once: bool,
    pub json: bool,
    pub max_cycles: Option<u64>,
    pub max_failures: Option<u32>,
    pub bell: bool,
    pub cooldown_secs: u64,
    pub email: bool,
    pub email_to: Option<String>,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub smtp_sender: Option<String>,
    pub smtp_ssl: bool,
    pub smtp_tls: bool,
    pub smtp_timeout_secs: u64,
    pub backend: String,
    pub smi_path: String,
    pub smi_timeout_secs: u64,
}

impl Default for RawSettings {
    fn default() -> Self {
        RawSettings {
            interval_secs: DEFAULT_INTERVAL_SECS,
            util_threshold: DEFAULT_UTIL_THRESHOLD_PCT,
            mem_threshold: DEFAULT_MEM_THRESHOLD_MB,
            once: false,
            json: false,
            max_cycles: None,
            max_failures: None,
            bell: true,
            cooldown_secs: 0,
            email: false,
            email_to: None,
            smtp_host: None,
            smtp_port: None,
            smtp_user: None,
            smtp_pass: None,
            smtp_sender: None,
            smtp_ssl: false,
            smtp_tls: false,
            smtp_timeout_secs: DEFAULT_SMTP_TIMEOUT_SECS,
            backend: "smi".to_string(),
            smi_path: DEFAULT_SMI_PROGRAM.to_string(),
            smi_timeout_secs: DEFAULT_SMI_TIMEOUT_SECS,
        }
    }
}

// Empty strings from the environment count as unset.
fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Splits `a@x.com, b@y.com` into addresses, dropping blanks and duplicates.
pub fn split_recipients(list: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for r in list.split(',').map(str::trim).filter(|r| !r.is_empty()) {
        if !out.iter().any(|seen| seen == r) {
            out.push(r.to_string());
        }
    }
    out
}

fn positive_secs(secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::InvalidInterval);
    }
    Ok(Duration::from_secs(secs))
}

impl RawSettings {
    pub fn validate(self) -> Result<MonitorConfig, ConfigError> {
        let thresholds = ThresholdConfig::new(self.util_threshold, self.mem_threshold)?;
        let schedule = Schedule {
            interval: positive_secs(self.interval_secs)?,
            once: self.once,
            max_cycles: self.max_cycles.filter(|&n| n > 0),
            max_consecutive_failures: self.max_failures.filter(|&n| n > 0),
        };
        let sampler = SamplerConfig {
            backend: self.backend.parse()?,
            program: self.smi_path.clone(),
            timeout: positive_secs(self.smi_timeout_secs)?,
        };
        let notification = NotificationConfig {
            local_alert: self.bell,
            email: self.email_config()?,
            cooldown: (self.cooldown_secs > 0).then(|| Duration::from_secs(self.cooldown_secs)),
        };

        Ok(MonitorConfig {
            schedule,
            output: if self.json { OutputMode::Json } else { OutputMode::Human },
            thresholds,
            sampler,
            notification,
        })
    }

    fn email_config(&self) -> Result<Option<EmailConfig>, ConfigError> {
        if self.smtp_ssl && self.smtp_tls {
            return Err(ConfigError::ConflictingEncryption);
        }
        if !self.email {
            return Ok(None);
        }

        let recipients = split_recipients(non_empty(&self.email_to).as_deref().unwrap_or(""));
        if recipients.is_empty() {
            return Err(ConfigError::NoRecipients);
        }
        for r in &recipients {
            parse_mailbox(r)?;
        }

        let host = non_empty(&self.smtp_host).ok_or(ConfigError::MissingSmtpHost)?;
        let user = non_empty(&self.smtp_user);
        let password = non_empty(&self.smtp_pass);
        let sender = non_empty(&self.smtp_sender)
            .or_else(|| user.clone())
            .ok_or(ConfigError::MissingSender)?;
        parse_mailbox(&sender)?;

        let encryption = match (self.smtp_ssl, self.smtp_tls) {
            (true, _) => Encryption::Ssl,
            (_, true) => Encryption::StartTls,
            _ => Encryption::None,
        };

        let credentials = match (user, password) {
            (Some(user), Some(password)) => Some(SmtpCredentials { user, password }),
            (Some(user), None) => {
                log::warn!("SMTP user {} given without a password, sending unauthenticated", user);
                None
            }
            (None, Some(_)) => {
                log::warn!("SMTP password given without a user, sending unauthenticated");
                None
            }
            (None, None) => None,
        };

        Ok(Some(EmailConfig {
            sender,
            recipients,
            smtp: SmtpSettings {
                host,
                port: self.smtp_port.filter(|&p| p != 0).unwrap_or(encryption.default_port()),
                credentials,
                encryption,
                timeout: positive_secs(self.smtp_timeout_secs)?,
            },
        }))
    }
}
