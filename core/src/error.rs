// core/src/error.rs
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures while invoking the diagnostic tool (or NVML).
#[derive(Debug, Error)]
pub enum SamplerError {
    #[error("diagnostic command `{program}` not found")]
    NotFound { program: String },

    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to wait for `{program}`")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read output of `{program}`")]
    Read {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("output of `{program}` is not valid UTF-8")]
    Decode {
        program: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("NVML {step} failed")]
    Nvml {
        step: String,
        #[source]
        source: nvml_wrapper::error::NvmlError,
    },
}

/// Unexpected shape of the sampler output. Line numbers are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line_no}: expected 4 fields, found {found} in {line:?}")]
    FieldCount {
        line_no: usize,
        line: String,
        found: usize,
    },

    #[error("line {line_no}: field `{field}` is not a number: {value:?}")]
    InvalidNumber {
        line_no: usize,
        field: &'static str,
        value: String,
    },

    #[error("line {line_no}: utilization {value}% is above 100%")]
    UtilizationOutOfRange { line_no: usize, value: u32 },
}

/// Invalid or conflicting settings, reported before the first cycle.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--smtp-ssl and --smtp-tls are mutually exclusive")]
    ConflictingEncryption,

    #[error("email alerts are enabled but no recipients were given (--email-to or SMTP_TO)")]
    NoRecipients,

    #[error("email alerts are enabled but no SMTP host was given (--smtp-host or SMTP_HOST)")]
    MissingSmtpHost,

    #[error("email alerts are enabled but no sender was given (--smtp-sender, SMTP_SENDER or --smtp-user)")]
    MissingSender,

    #[error("invalid email address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("interval must be a positive number of seconds")]
    InvalidInterval,

    #[error("utilization threshold must be within 0-100, got {0}")]
    UtilizationThreshold(u32),

    #[error("unknown log level {0:?} (expected trace, debug, info, warn or error)")]
    InvalidLogLevel(String),

    #[error("unknown sampler backend {0:?} (expected smi or nvml)")]
    UnknownBackend(String),

    #[error("failed to set up SMTP transport for {host}: {reason}")]
    TransportSetup { host: String, reason: String },
}

/// Which part of the SMTP exchange failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStep {
    Connect,
    Authenticate,
    Send,
}

impl fmt::Display for TransportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            TransportStep::Connect => "connect",
            TransportStep::Authenticate => "authenticate",
            TransportStep::Send => "send",
        };
        f.write_str(step)
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("email transport failure during {step}: {detail}")]
    EmailTransportFailure { step: TransportStep, detail: String },

    #[error("failed to compose alert email: {0}")]
    Compose(String),
}

/// Why a monitoring cycle (or the whole run) stopped.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("sampling failed")]
    Sample(#[from] SamplerError),

    #[error("failed to parse sampler output")]
    Parse(#[from] ParseError),

    #[error("{count} consecutive cycles failed, last error: {last}")]
    RepeatedFailures { count: u32, last: String },
}
