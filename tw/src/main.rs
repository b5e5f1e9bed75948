//! tw - Tickwork CLI
//!
//! Runs the throttle, debounce and next-tick primitives on a burst of calls
//! and reports what actually executed.

use std::cell::Cell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tickwork::cli::{BurstArgs, Cli, Command};
use tickwork::config::Config;
use tickwork::{
    Callable, ClockMode, DebounceEngine, EventLoop, LoopConfig, ThrottleEngine, TimerService, delay_from_secs,
    identity,
};

/// Environment variable holding a tracing filter for the log file
const LOG_ENV: &str = "TICKWORK_LOG";

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tickwork")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // $TICKWORK_LOG overrides the level picked by --verbose
    let level = if verbose { "tw=debug,tickwork=debug" } else { "tw=info,tickwork=info" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));

    let log_path = log_dir.join("tickwork.log");
    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    info!(verbose, log = %log_path.display(), "Logging initialized");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Throttle,
    Debounce,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let loop_config = if cli.paused {
        LoopConfig {
            clock: ClockMode::Paused,
            ..config.event_loop.clone()
        }
    } else {
        config.event_loop.clone()
    };
    info!(?loop_config, "tw loaded config");

    match cli.command {
        Command::Throttle(args) => cmd_burst(&config, loop_config, &args, Mode::Throttle),
        Command::Debounce(args) => cmd_burst(&config, loop_config, &args, Mode::Debounce),
        Command::Tick { cancel } => cmd_tick(loop_config, cancel),
        Command::Identity { name } => {
            println!("{}", identity(&Callable::function(name)));
            Ok(())
        }
    }
}

/// Fire a burst of calls through the throttle or debounce engine
fn cmd_burst(config: &Config, loop_config: LoopConfig, args: &BurstArgs, mode: Mode) -> Result<()> {
    let delay = args.delay.map(delay_from_secs).unwrap_or_else(|| config.demo.delay());
    let period = args.period.map(delay_from_secs).unwrap_or_else(|| config.demo.period());
    let calls = args.calls.unwrap_or(config.demo.calls).max(1);
    info!(?mode, ?delay, ?period, calls, "cmd_burst: starting");

    let event_loop = EventLoop::new(loop_config)?;
    let timers = TimerService::new(&event_loop);
    let throttle = ThrottleEngine::<()>::new(&timers);
    let debounce = DebounceEngine::<()>::new(&timers);

    let made = Rc::new(Cell::new(0u32));
    let runs = Rc::new(Cell::new(0u32));

    let m = made.clone();
    let r = runs.clone();
    timers.every(period, move |timer| {
        m.set(m.get() + 1);
        if m.get() >= calls {
            timer.cancel();
        }

        let r = r.clone();
        let callback = move || {
            r.set(r.get() + 1);
            Ok(())
        };
        match mode {
            Mode::Throttle => throttle.throttle(delay, callback),
            Mode::Debounce => debounce.debounce(delay, callback),
        };
        Ok(())
    });

    let start = event_loop.now();
    event_loop.run()?;
    let elapsed = event_loop.now().duration_since(start);

    let label = match mode {
        Mode::Throttle => "throttle".green(),
        Mode::Debounce => "debounce".cyan(),
    };
    println!(
        "{}: {} calls every {:?} with delay {:?} -> callback ran {} time(s) in {:?}",
        label,
        made.get(),
        period,
        delay,
        runs.get().to_string().bold(),
        elapsed
    );
    Ok(())
}

/// Schedule a next-tick callback and report its outcome
fn cmd_tick(loop_config: LoopConfig, cancel: bool) -> Result<()> {
    let event_loop = EventLoop::new(loop_config)?;
    let timers = TimerService::new(&event_loop);

    let promise = timers.next_tick(|| Ok("tick ran"));
    if cancel {
        promise.cancel();
    }

    match event_loop.wait(&promise, None) {
        Ok(value) => println!("{}", value.green()),
        Err(e) => println!("{}", e.to_string().red()),
    }
    Ok(())
}
