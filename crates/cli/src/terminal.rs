use anyhow::Result;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::io::{self, Write};

use rmsched_core::SimulationConfig;
use rmsched_engine::{
    AdmissionReport, EngineReport, Notification, NotificationKind, SchedulerSnapshot,
    UtilizationHistory,
};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const DISPATCHED: Color = Color::Cyan;
    const RETIRED: Color = Color::Green;
    const HALTED: Color = Color::Red;
    const REPORT: Color = Color::Yellow;
    const DIM: Color = Color::DarkGrey;
    const HEADER: Color = Color::Magenta;
}

/// Writes simulator output to stdout, as text or JSON.
///
/// Shared between the notification and monitor threads; each call writes
/// one complete block.
#[derive(Debug, Clone, Copy)]
pub struct Terminal {
    json: bool,
}

impl Terminal {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Print the startup banner.
    pub fn print_banner(&self, config: &SimulationConfig, admission: &AdmissionReport) -> Result<()> {
        if self.json {
            return self.print_json(&serde_json::json!({
                "event": "started",
                "processors": config.processors,
                "resource_capacity": config.resource_capacity,
                "admission": admission,
            }));
        }

        let mut stdout = io::stdout().lock();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print("rmsched"),
            ResetColor,
            Print(" - rate-monotonic scheduler\n"),
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "Processors: {} | Resources: {} | Time unit: {}ms\n",
                config.processors,
                config.capacity(),
                config.time_unit_ms
            )),
            Print(format!(
                "Admitted: [{}] | Waiting: [{}] | Skipped: [{}]\n",
                admission.admitted.join(", "),
                admission.injected.join(", "),
                admission.skipped.join(", ")
            )),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print one progress notification.
    pub fn print_notification(&self, notification: &Notification) -> Result<()> {
        if self.json {
            return self.print_json(&serde_json::json!({
                "event": "notification",
                "notification": notification,
            }));
        }

        let color = match notification.kind {
            NotificationKind::Dispatched => Colors::DISPATCHED,
            NotificationKind::Retired => Colors::RETIRED,
            NotificationKind::Halted => Colors::HALTED,
        };
        let mut stdout = io::stdout().lock();
        execute!(
            stdout,
            SetForegroundColor(color),
            Print(format!("{notification}\n")),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print the periodic metrics report.
    pub fn print_snapshot(&self, snapshot: &SchedulerSnapshot) -> Result<()> {
        if self.json {
            return self.print_json(&serde_json::json!({
                "event": "snapshot",
                "snapshot": snapshot,
            }));
        }

        let mut stdout = io::stdout().lock();
        execute!(
            stdout,
            SetForegroundColor(Colors::REPORT),
            Print(format!("{snapshot}\n")),
            ResetColor,
            SetForegroundColor(Colors::DIM),
            Print("---\n"),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print the end-of-run summary.
    pub fn print_summary(&self, report: &EngineReport, history: &UtilizationHistory) -> Result<()> {
        let outcomes: Vec<String> = report.outcomes.iter().map(|o| o.to_string()).collect();

        if self.json {
            return self.print_json(&serde_json::json!({
                "event": "finished",
                "elapsed_secs": report.elapsed.as_secs_f64(),
                "total_runs": report.total_runs(),
                "halted_processors": report.halted_processors(),
                "outcomes": outcomes,
                "snapshot": report.snapshot,
                "history": history,
            }));
        }

        let mut stdout = io::stdout().lock();
        execute!(
            stdout,
            SetForegroundColor(Colors::HEADER),
            Print(format!(
                "Finished in {:.2}s, {} runs completed\n",
                report.elapsed.as_secs_f64(),
                report.total_runs()
            )),
            ResetColor,
        )?;
        for (p, outcome) in report.snapshot.processors.iter().zip(&outcomes) {
            let peak = history
                .series(p.id)
                .iter()
                .copied()
                .fold(0.0_f64, f64::max);
            let color = if report.outcomes[p.id].is_halted() {
                Colors::HALTED
            } else {
                Colors::DIM
            };
            execute!(
                stdout,
                SetForegroundColor(color),
                Print(format!(
                    "CPU{}: {:.2}% utilization (peak {:.2}%), {} runs, {}\n",
                    p.id + 1,
                    p.utilization_pct,
                    peak,
                    p.runs_completed,
                    outcome
                )),
                ResetColor,
            )?;
        }
        execute!(
            stdout,
            SetForegroundColor(Colors::DIM),
            Print(format!(
                "Resources: {} of {}\n",
                report.snapshot.available_resources, report.snapshot.resource_capacity
            )),
            ResetColor,
        )?;
        stdout.flush()?;
        Ok(())
    }

    /// Print an error message in red.
    pub fn print_error(&self, msg: &str) -> Result<()> {
        let mut stderr = io::stderr().lock();
        execute!(
            stderr,
            SetForegroundColor(Colors::HALTED),
            Print(format!("error: {msg}\n")),
            ResetColor,
        )?;
        stderr.flush()?;
        Ok(())
    }

    fn print_json(&self, value: &serde_json::Value) -> Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", serde_json::to_string(value)?)?;
        stdout.flush()?;
        Ok(())
    }
}
