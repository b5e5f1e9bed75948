//! CLI command definitions and subcommands

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// tw - exercise throttle, debounce and timer primitives
#[derive(Parser)]
#[command(
    name = "tw",
    about = "Throttle, debounce and timer primitives on a single-threaded loop",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Run on a paused clock (virtual time, returns instantly)
    #[arg(long, global = true)]
    pub paused: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Throttle a burst of calls and report how often the callback ran
    Throttle(BurstArgs),

    /// Debounce a burst of calls and report how often the callback ran
    Debounce(BurstArgs),

    /// Schedule a next-tick callback, optionally cancelling it first
    Tick {
        /// Cancel the promise before the loop runs
        #[arg(long)]
        cancel: bool,
    },

    /// Print the identity key for a named function
    Identity {
        /// Function name
        name: String,
    },
}

/// Burst parameters; unset values come from config
#[derive(Debug, Clone, Args)]
pub struct BurstArgs {
    /// Throttle/debounce delay in seconds
    #[arg(short, long)]
    pub delay: Option<f64>,

    /// Seconds between calls
    #[arg(short, long)]
    pub period: Option<f64>,

    /// Number of calls in the burst
    #[arg(short = 'n', long)]
    pub calls: Option<u32>,
}
