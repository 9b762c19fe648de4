// core/src/notify/mod.rs
pub mod email;

use crate::error::{ConfigError, NotifyError};
use crate::utils::models::{GpuRecord, ThresholdConfig};
use email::{compose_alert, EmailConfig, MailTransport, SmtpMailer};
use log::{debug, info, warn};
use std::io::{self, Write};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Ring the terminal bell when idle GPUs are found.
    pub local_alert: bool,
    /// `Some` iff email alerts are enabled.
    pub email: Option<EmailConfig>,
    /// Minimum time between two alerts. `None` re-alerts every cycle.
    pub cooldown: Option<Duration>,
}

/// Local, best-effort alert signal.
pub trait AlertSignal {
    fn emit(&mut self) -> io::Result<()>;
}

/// Writes BEL to stderr, leaving stdout to the cycle output.
pub struct TerminalBell;

impl AlertSignal for TerminalBell {
    fn emit(&mut self) -> io::Result<()> {
        let mut stderr = io::stderr().lock();
        stderr.write_all(b"\x07")?;
        stderr.flush()
    }
}

pub struct EmailChannel {
    pub transport: Box<dyn MailTransport>,
    pub sender: String,
    pub recipients: Vec<String>,
    pub host: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyOutcome {
    NoAlert,
    /// Idle GPUs found, but the last alert is still within the cooldown.
    Suppressed { idle: Vec<u32> },
    Alerted {
        idle: Vec<u32>,
        signalled: bool,
        emailed: bool,
    },
}

pub struct Notifier {
    thresholds: ThresholdConfig,
    signal: Option<Box<dyn AlertSignal>>,
    email: Option<EmailChannel>,
    cooldown: Option<Duration>,
    last_alert: Option<Instant>,
}

impl Notifier {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Notifier {
            thresholds,
            signal: None,
            email: None,
            cooldown: None,
            last_alert: None,
        }
    }

    pub fn with_signal(mut self, signal: Box<dyn AlertSignal>) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn with_email(mut self, channel: EmailChannel) -> Self {
        self.email = Some(channel);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = (!cooldown.is_zero()).then_some(cooldown);
        self
    }

    /// Wires the real bell and SMTP transport.
    pub fn from_config(config: &NotificationConfig, thresholds: ThresholdConfig) -> Result<Self, ConfigError> {
        let mut notifier = Notifier::new(thresholds);
        if config.local_alert {
            notifier = notifier.with_signal(Box::new(TerminalBell));
        }
        if let Some(email) = &config.email {
            let mailer = SmtpMailer::new(&email.smtp)?;
            notifier = notifier.with_email(EmailChannel {
                transport: Box::new(mailer),
                sender: email.sender.clone(),
                recipients: email.recipients.clone(),
                host: sysinfo::System::host_name(),
            });
        }
        if let Some(cooldown) = config.cooldown {
            notifier = notifier.with_cooldown(cooldown);
        }
        Ok(notifier)
    }

    fn in_cooldown(&self) -> bool {
        match (self.cooldown, self.last_alert) {
            (Some(cooldown), Some(last)) => last.elapsed() < cooldown,
            _ => false,
        }
    }

    pub fn notify(&mut self, records: &[GpuRecord]) -> Result<NotifyOutcome, NotifyError> {
        let idle: Vec<&GpuRecord> = records.iter().filter(|g| g.is_idle).collect();
        if idle.is_empty() {
            return Ok(NotifyOutcome::NoAlert);
        }
        let idle_ids: Vec<u32> = idle.iter().map(|g| g.index).collect();

        if self.in_cooldown() {
            debug!("Idle GPU(s) {:?} still within alert cooldown, not alerting", idle_ids);
            return Ok(NotifyOutcome::Suppressed { idle: idle_ids });
        }

        let mut signalled = false;
        if let Some(signal) = self.signal.as_mut() {
            match signal.emit() {
                Ok(()) => signalled = true,
                Err(e) => warn!("Failed to emit local alert signal: {}", e),
            }
        }

        let mut emailed = false;
        if let Some(channel) = &self.email {
            let email = compose_alert(
                &idle,
                &channel.sender,
                &channel.recipients,
                channel.host.as_deref(),
                &self.thresholds,
                &chrono::Local::now().to_rfc3339(),
            );
            channel.transport.deliver(&email)?;
            info!("Email alert sent to {} recipient(s).", channel.recipients.len());
            emailed = true;
        }

        self.last_alert = Some(Instant::now());
        Ok(NotifyOutcome::Alerted {
            idle: idle_ids,
            signalled,
            emailed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportStep;
    use email::AlertEmail;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Outbox {
        sent: Rc<RefCell<Vec<AlertEmail>>>,
        fail: bool,
    }

    impl MailTransport for Outbox {
        fn deliver(&self, email: &AlertEmail) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::EmailTransportFailure {
                    step: TransportStep::Connect,
                    detail: "connection refused".to_string(),
                });
            }
            self.sent.borrow_mut().push(email.clone());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CountingBell {
        rings: Rc<RefCell<u32>>,
        broken: bool,
    }

    impl AlertSignal for CountingBell {
        fn emit(&mut self) -> io::Result<()> {
            if self.broken {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"));
            }
            *self.rings.borrow_mut() += 1;
            Ok(())
        }
    }

    fn gpu(index: u32, is_idle: bool) -> GpuRecord {
        GpuRecord {
            index,
            utilization_pct: if is_idle { 0 } else { 90 },
            memory_used_mb: if is_idle { 10 } else { 7000 },
            memory_total_mb: 8192,
            is_idle,
        }
    }

    fn notifier(outbox: &Outbox, bell: &CountingBell) -> Notifier {
        Notifier::new(ThresholdConfig::default())
            .with_signal(Box::new(bell.clone()))
            .with_email(EmailChannel {
                transport: Box::new(outbox.clone()),
                sender: "monitor@example.com".to_string(),
                recipients: vec!["a@example.com".to_string(), "b@example.com".to_string()],
                host: None,
            })
    }

    #[test]
    fn no_idle_gpus_means_no_side_effects() {
        let (outbox, bell) = (Outbox::default(), CountingBell::default());
        let mut n = notifier(&outbox, &bell);
        assert_eq!(n.notify(&[gpu(0, false), gpu(1, false)]).unwrap(), NotifyOutcome::NoAlert);
        assert_eq!(n.notify(&[]).unwrap(), NotifyOutcome::NoAlert);
        assert!(outbox.sent.borrow().is_empty());
        assert_eq!(*bell.rings.borrow(), 0);
    }

    #[test]
    fn one_email_covers_all_idle_gpus() {
        let (outbox, bell) = (Outbox::default(), CountingBell::default());
        let mut n = notifier(&outbox, &bell);
        let outcome = n.notify(&[gpu(0, true), gpu(1, false), gpu(3, true)]).unwrap();
        assert_eq!(
            outcome,
            NotifyOutcome::Alerted {
                idle: vec![0, 3],
                signalled: true,
                emailed: true,
            }
        );
        let sent = outbox.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to.len(), 2);
        assert!(sent[0].body.contains("GPU 0:"));
        assert!(sent[0].body.contains("GPU 3:"));
        assert!(!sent[0].body.contains("GPU 1:"));
    }

    #[test]
    fn alerts_repeat_every_cycle_without_cooldown() {
        let (outbox, bell) = (Outbox::default(), CountingBell::default());
        let mut n = notifier(&outbox, &bell);
        for _ in 0..3 {
            n.notify(&[gpu(0, true)]).unwrap();
        }
        assert_eq!(outbox.sent.borrow().len(), 3);
        assert_eq!(*bell.rings.borrow(), 3);
    }

    #[test]
    fn cooldown_suppresses_repeat_alerts() {
        let (outbox, bell) = (Outbox::default(), CountingBell::default());
        let mut n = notifier(&outbox, &bell).with_cooldown(Duration::from_secs(3600));
        assert!(matches!(n.notify(&[gpu(0, true)]).unwrap(), NotifyOutcome::Alerted { .. }));
        assert_eq!(
            n.notify(&[gpu(0, true)]).unwrap(),
            NotifyOutcome::Suppressed { idle: vec![0] }
        );
        assert_eq!(outbox.sent.borrow().len(), 1);
        assert_eq!(*bell.rings.borrow(), 1);
    }

    #[test]
    fn failed_email_does_not_start_cooldown() {
        let bell = CountingBell::default();
        let failing = Outbox {
            fail: true,
            ..Outbox::default()
        };
        let mut n = notifier(&failing, &bell).with_cooldown(Duration::from_secs(3600));

        let err = n.notify(&[gpu(0, true)]).unwrap_err();
        assert!(matches!(
            err,
            NotifyError::EmailTransportFailure { step: TransportStep::Connect, .. }
        ));
        // The bell still rang before the send was attempted
        assert_eq!(*bell.rings.borrow(), 1);
        // Next cycle tries again instead of being suppressed
        assert!(n.notify(&[gpu(0, true)]).is_err());
        assert_eq!(*bell.rings.borrow(), 2);
    }

    #[test]
    fn broken_bell_is_not_fatal() {
        let outbox = Outbox::default();
        let bell = CountingBell {
            broken: true,
            ..CountingBell::default()
        };
        let mut n = notifier(&outbox, &bell);
        let outcome = n.notify(&[gpu(2, true)]).unwrap();
        assert_eq!(
            outcome,
            NotifyOutcome::Alerted {
                idle: vec![2],
                signalled: false,
                emailed: true,
            }
        );
    }

    #[test]
    fn local_only_alert() {
        let bell = CountingBell::default();
        let mut n = Notifier::new(ThresholdConfig::default()).with_signal(Box::new(bell.clone()));
        assert_eq!(
            n.notify(&[gpu(0, true)]).unwrap(),
            NotifyOutcome::Alerted {
                idle: vec![0],
                signalled: true,
                emailed: false,
            }
        );
    }

    #[test]
    fn zero_cooldown_is_no_cooldown() {
        let (outbox, bell) = (Outbox::default(), CountingBell::default());
        let mut n = notifier(&outbox, &bell).with_cooldown(Duration::ZERO);
        n.notify(&[gpu(0, true)]).unwrap();
        n.notify(&[gpu(0, true)]).unwrap();
        assert_eq!(outbox.sent.borrow().len(), 2);
    }
}
