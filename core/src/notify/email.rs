// core/src/notify/email.rs
use crate::error::{ConfigError, NotifyError, TransportStep};
use crate::utils::models::{join_ids, GpuRecord, ThresholdConfig};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encryption {
    None,
    /// Implicit TLS from the first byte (SMTPS).
    Ssl,
    /// Plaintext connect, mandatory STARTTLS upgrade before AUTH.
    StartTls,
}

impl Encryption {
    pub fn default_port(self) -> u16 {
        match self {
            Encryption::None => 25,
            Encryption::Ssl => 465,
            Encryption::StartTls => 587,
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpCredentials {
    pub user: String,
    pub password: String,
}

// Keep the password out of debug logs.
impl std::fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub credentials: Option<SmtpCredentials>,
    pub encryption: Encryption,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub sender: String,
    pub recipients: Vec<String>,
    pub smtp: SmtpSettings,
}

/// A fully composed alert, independent of the transport that delivers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEmail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Delivers one message to all of its recipients in a single call.
pub trait MailTransport {
    fn deliver(&self, email: &AlertEmail) -> Result<(), NotifyError>;
}

pub fn compose_alert(
    idle: &[&GpuRecord],
    sender: &str,
    recipients: &[String],
    host: Option<&str>,
    thresholds: &ThresholdConfig,
    timestamp: &str,
) -> AlertEmail {
    let ids = join_ids(idle.iter().map(|g| g.index));
    let (subject, intro) = match host {
        Some(host) => (
            format!("GPU idle alert on {}: {}", host, ids),
            format!("Idle GPU(s) detected on {} at {}:", host, timestamp),
        ),
        None => (
            format!("GPU idle alert: {}", ids),
            format!("Idle GPU(s) detected at {}:", timestamp),
        ),
    };

    let mut body = intro;
    body.push_str("\n\n");
    for gpu in idle {
        body.push_str(&format!("GPU {}: {}\n", gpu.index, gpu.usage_summary()));
    }
    body.push_str(&format!(
        "\nIdle thresholds: util <= {}%, mem <= {} MB\n",
        thresholds.utilization_threshold_pct, thresholds.memory_threshold_mb
    ));

    AlertEmail {
        from: sender.to_string(),
        to: recipients.to_vec(),
        subject,
        body,
    }
}

pub(crate) fn parse_mailbox(address: &str) -> Result<Mailbox, ConfigError> {
    address.parse::<Mailbox>().map_err(|e| ConfigError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

/// lettre-backed SMTP delivery.
pub struct SmtpMailer {
    transport: SmtpTransport,
    host: String,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, ConfigError> {
        let setup_err = |e: lettre::transport::smtp::Error| ConfigError::TransportSetup {
            host: settings.host.clone(),
            reason: e.to_string(),
        };

        let mut builder = match settings.encryption {
            Encryption::None => SmtpTransport::builder_dangerous(&settings.host),
            Encryption::Ssl => SmtpTransport::relay(&settings.host).map_err(setup_err)?,
            Encryption::StartTls => SmtpTransport::starttls_relay(&settings.host).map_err(setup_err)?,
        }
        .port(settings.port)
        .timeout(Some(settings.timeout));

        // Only authenticate when both halves are present
        if let Some(creds) = &settings.credentials {
            builder = builder.credentials(Credentials::new(creds.user.clone(), creds.password.clone()));
        }

        Ok(SmtpMailer {
            transport: builder.build(),
            host: settings.host.clone(),
        })
    }

    fn build_message(email: &AlertEmail) -> Result<Message, NotifyError> {
        let compose = |e: String| NotifyError::Compose(e);
        let from = parse_mailbox(&email.from).map_err(|e| compose(e.to_string()))?;
        let mut builder = Message::builder()
            .from(from)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for to in &email.to {
            builder = builder.to(parse_mailbox(to).map_err(|e| compose(e.to_string()))?);
        }
        builder.body(email.body.clone()).map_err(|e| compose(e.to_string()))
    }
}

// SMTP 530/534/535/538 are authentication rejections; any other reply code
// means the server answered but refused the message. No reply at all means
// the connection (or TLS handshake) never got that far.
fn failed_step(err: &lettre::transport::smtp::Error) -> TransportStep {
    match err.status() {
        Some(code) => match code.to_string().as_str() {
            "530" | "534" | "535" | "538" => TransportStep::Authenticate,
            _ => TransportStep::Send,
        },
        None => TransportStep::Connect,
    }
}

impl MailTransport for SmtpMailer {
    fn deliver(&self, email: &AlertEmail) -> Result<(), NotifyError> {
        let message = Self::build_message(email)?;
        self.transport.send(&message).map_err(|e| {
            let step = failed_step(&e);
            NotifyError::EmailTransportFailure {
                step,
                detail: format!("{} ({})", e, self.host),
            }
        })?;
        Ok(())
    }
}
