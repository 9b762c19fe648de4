// cli/src/cli/output.rs
use colored::*;
use idlegpu_core::config::OutputMode;
use idlegpu_core::utils::models::CycleReport;
use idlegpu_core::watch::Reporter;

/// Prints each cycle to stdout, as text or as one JSON line.
pub struct ConsoleReporter {
    mode: OutputMode,
}

impl ConsoleReporter {
    pub fn new(mode: OutputMode) -> Self {
        Self { mode }
    }
}

impl Reporter for ConsoleReporter {
    fn report(&mut self, report: &CycleReport) {
        match self.mode {
            OutputMode::Json => match serde_json::to_string(report) {
                Ok(line) => println!("{}", line),
                Err(e) => log::error!("Failed to serialize cycle report: {}", e),
            },
            OutputMode::Human => {
                for line in render_human(report) {
                    println!("{}", line);
                }
            }
        }
    }
}

pub fn render_human(report: &CycleReport) -> Vec<String> {
    if report.gpus.is_empty() {
        return vec![format!("{} No GPUs reported.", "[WARN]".yellow())];
    }

    let mut lines: Vec<String> = report
        .gpus
        .iter()
        .map(|gpu| {
            let line = format!("GPU {}: {}", gpu.index, gpu.usage_summary());
            if gpu.is_idle {
                format!("{} {}", line, "[idle]".green().bold())
            } else {
                line
            }
        })
        .collect();

    if report.has_idle() {
        lines.push(format!(
            "{} idle GPU(s) detected -> {}",
            "ALERT:".red().bold(),
            report.idle_ids()
        ));
    }
    lines
}
