// cli/src/main.rs
use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cli::output::ConsoleReporter;
use cli::{Args, FileConfig};
use idlegpu_core::gpu::build_sampler;
use idlegpu_core::notify::Notifier;
use idlegpu_core::utils::logging;
use idlegpu_core::watch::{error_chain, Monitor};
use std::io::IsTerminal;
use std::process::ExitCode;

mod cli;

// --once exit codes, kept compatible with the original script
const EXIT_IDLE_FOUND: u8 = 0;
const EXIT_NO_IDLE: u8 = 1;
const EXIT_FATAL: u8 = 2;

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("ERROR: {:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(args: Args) -> Result<ExitCode> {
    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let (settings, log_opts) = args.resolve(file);

    let level = logging::parse_level(&log_opts.level)?;
    logging::init(level, log_opts.path.as_deref())?;

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    let config = settings.validate().context("Invalid configuration")?;
    let notifier = Notifier::from_config(&config.notification, config.thresholds)
        .context("Failed to set up notifications")?;
    let sampler = build_sampler(&config.sampler).map_err(|e| anyhow!(error_chain(&e)))?;

    let mut monitor = Monitor::new(
        sampler,
        config.thresholds,
        notifier,
        Box::new(ConsoleReporter::new(config.output)),
        config.schedule,
    );
    let summary = monitor.run().map_err(|e| anyhow!(error_chain(&e)))?;

    if config.schedule.once {
        let found = summary.last_report.as_ref().is_some_and(|r| r.has_idle());
        return Ok(ExitCode::from(if found { EXIT_IDLE_FOUND } else { EXIT_NO_IDLE }));
    }
    log::info!(
        "Stopped after {} cycle(s), {} failed.",
        summary.cycles,
        summary.failures
    );
    Ok(ExitCode::SUCCESS)
}
