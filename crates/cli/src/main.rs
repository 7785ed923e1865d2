mod cli;
mod terminal;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::{info, warn};

use rmsched_core::SimulationConfig;
use rmsched_engine::{
    ChannelSink, FanoutSink, NotificationSink, SchedulerEngine, TracingSink, UtilizationHistory,
};

use crate::cli::CliArgs;
use crate::terminal::Terminal;

/// How often the duration timer checks whether the run already ended.
const TIMER_TICK: Duration = Duration::from_millis(100);

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    rmsched_core::config::load_dotenv();

    let args = CliArgs::parse();
    let terminal = Terminal::new(args.json);

    if let Err(e) = run(&args, terminal) {
        terminal.print_error(&format!("{:#}", e))?;
        std::process::exit(1);
    }
    Ok(())
}

fn load_config(args: &CliArgs) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => {
            info!("No config file given, using the reference task set");
            let mut config = SimulationConfig::reference();
            config.apply_env_overrides();
            config
        }
    };

    // CLI flags win over file and environment
    if let Some(ms) = args.monitor_interval_ms {
        config.monitor_interval_ms = ms;
    }
    if let Some(policy) = args.exhaustion_policy {
        config.exhaustion_policy = policy;
    }
    if args.exit_when_drained {
        config.exit_when_drained = true;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(args: &CliArgs, terminal: Terminal) -> Result<()> {
    let config = load_config(args)?;
    config.log_summary();

    if args.duration_secs.is_none() && !config.exit_when_drained {
        warn!("Neither --duration-secs nor exit_when_drained is set; processors idle until halted");
    }

    let (channel, notifications) = ChannelSink::new();
    let sinks: Vec<Arc<dyn NotificationSink>> = vec![Arc::new(TracingSink), Arc::new(channel)];
    let (mut engine, admission) = SchedulerEngine::from_config(config, Arc::new(FanoutSink::new(sinks)))
        .context("failed to admit task set")?;
    terminal.print_banner(engine.config(), &admission)?;

    // Ends once the engine, and with it the channel sender, is dropped.
    let printer = thread::Builder::new()
        .name("notifications".into())
        .spawn(move || -> Result<()> {
            for notification in notifications {
                terminal.print_notification(&notification)?;
            }
            Ok(())
        })
        .context("failed to spawn notification printer")?;

    engine.start().context("failed to start scheduler")?;

    let finished = Arc::new(AtomicBool::new(false));

    let monitor = engine.monitor();
    let interval = engine.config().monitor_interval();
    let monitor_done = Arc::clone(&finished);
    let reporter = thread::Builder::new()
        .name("monitor".into())
        .spawn(move || -> Result<UtilizationHistory> {
            let mut history = UtilizationHistory::new();
            loop {
                thread::sleep(interval);
                if monitor_done.load(Ordering::Relaxed) {
                    break;
                }
                let snapshot = monitor.snapshot();
                history.record(&snapshot);
                terminal.print_snapshot(&snapshot)?;
            }
            Ok(history)
        })
        .context("failed to spawn monitor")?;

    let timer = match args.duration_secs {
        Some(secs) => {
            let shutdown = engine.shutdown_signal();
            let timer_done = Arc::clone(&finished);
            let handle = thread::Builder::new()
                .name("timer".into())
                .spawn(move || {
                    let deadline = Instant::now() + Duration::from_secs(secs);
                    while !timer_done.load(Ordering::Relaxed) {
                        let now = Instant::now();
                        if now >= deadline {
                            info!("Run duration of {}s reached, stopping", secs);
                            shutdown.store(true, Ordering::Relaxed);
                            break;
                        }
                        thread::sleep(TIMER_TICK.min(deadline - now));
                    }
                })
                .context("failed to spawn timer")?;
            Some(handle)
        }
        None => None,
    };

    let report = engine.wait_for_completion().context("scheduler run failed")?;
    finished.store(true, Ordering::Relaxed);
    drop(engine);

    if let Some(timer) = timer {
        timer.join().map_err(|_| anyhow!("timer thread panicked"))?;
    }
    let history = reporter
        .join()
        .map_err(|_| anyhow!("monitor thread panicked"))??;
    printer
        .join()
        .map_err(|_| anyhow!("notification printer panicked"))??;

    if !report.halted_processors().is_empty() {
        warn!(halted = ?report.halted_processors(), "Some processors halted");
    }
    terminal.print_summary(&report, &history)?;
    Ok(())
}
