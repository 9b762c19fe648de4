// core/src/watch/mod.rs
use crate::config::Schedule;
use crate::error::WatchError;
use crate::gpu::{parse_and_classify, Sampler};
use crate::notify::{Notifier, NotifyOutcome};
use crate::utils::models::{CycleReport, ThresholdConfig};
use log::{debug, error, info, warn};
use std::thread;

/// Receives each successfully classified cycle (console, JSON, tests).
pub trait Reporter {
    fn report(&mut self, report: &CycleReport);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cycles: u64,
    pub failures: u64,
    pub last_report: Option<CycleReport>,
}

/// Sample → parse/classify → report → notify, on a schedule.
pub struct Monitor {
    sampler: Box<dyn Sampler>,
    thresholds: ThresholdConfig,
    notifier: Notifier,
    reporter: Box<dyn Reporter>,
    schedule: Schedule,
}

impl Monitor {
    pub fn new(
        sampler: Box<dyn Sampler>,
        thresholds: ThresholdConfig,
        notifier: Notifier,
        reporter: Box<dyn Reporter>,
        schedule: Schedule,
    ) -> Self {
        Monitor {
            sampler,
            thresholds,
            notifier,
            reporter,
            schedule,
        }
    }

    /// One full cycle. Notification failures are logged here and never returned.
    pub fn run_cycle(&mut self) -> Result<CycleReport, WatchError> {
        let raw = self.sampler.sample()?;
        let gpus = parse_and_classify(&raw, &self.thresholds)?;
        if gpus.is_empty() {
            warn!("{} reported no GPUs", self.sampler.name());
        }

        let report = CycleReport::new(gpus);
        self.reporter.report(&report);

        match self.notifier.notify(&report.gpus) {
            Ok(NotifyOutcome::NoAlert) => debug!("No idle GPUs this cycle"),
            Ok(NotifyOutcome::Suppressed { idle }) => debug!("Alert for idle GPU(s) {:?} suppressed", idle),
            Ok(NotifyOutcome::Alerted { idle, .. }) => info!("Idle GPU(s) detected: {:?}", idle),
            Err(e) => error!("Alert for idle GPU(s) {} failed: {}", report.idle_ids(), e),
        }
        Ok(report)
    }

    pub fn run(&mut self) -> Result<RunSummary, WatchError> {
        let mut summary = RunSummary::default();

        if self.schedule.once {
            let report = self.run_cycle()?;
            summary.cycles = 1;
            summary.last_report = Some(report);
            return Ok(summary);
        }

        info!(
            "Monitoring GPUs via {} every {:?} (idle: util <= {}%, mem <= {} MB)",
            self.sampler.name(),
            self.schedule.interval,
            self.thresholds.utilization_threshold_pct,
            self.thresholds.memory_threshold_mb
        );

        let mut consecutive_failures: u32 = 0;
        loop {
            match self.run_cycle() {
                Ok(report) => {
                    consecutive_failures = 0;
                    summary.last_report = Some(report);
                }
                // The first sample doubles as the startup check for the tool itself
                Err(e @ WatchError::Sample(_)) if summary.cycles == 0 => return Err(e),
                Err(e) => {
                    consecutive_failures += 1;
                    summary.failures += 1;
                    error!("Monitoring cycle failed: {}", error_chain(&e));
                    if let Some(limit) = self.schedule.max_consecutive_failures {
                        if consecutive_failures >= limit {
                            return Err(WatchError::RepeatedFailures {
                                count: consecutive_failures,
                                last: error_chain(&e),
                            });
                        }
                    }
                }
            }
            summary.cycles += 1;

            if let Some(max) = self.schedule.max_cycles {
                if summary.cycles >= max {
                    info!("Reached {} cycle(s), stopping.", max);
                    return Ok(summary);
                }
            }
            thread::sleep(self.schedule.interval);
        }
    }
}

/// `outer: inner: root` for log lines.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}
