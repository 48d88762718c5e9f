//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "feeder", version, about = "Automated pet feeder controller")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when the file is absent
    #[arg(long, value_name = "FILE", default_value = "etc/feeder_config.toml")]
    pub config: PathBuf,

    /// Optional bowl load cell calibration CSV (raw,grams)
    #[arg(long, value_name = "FILE")]
    pub bowl_calibration: Option<PathBuf>,

    /// Optional tank load cell calibration CSV (raw,grams)
    #[arg(long, value_name = "FILE")]
    pub tank_calibration: Option<PathBuf>,

    /// Directory for settings.bin and events.jsonl (overrides [persistence])
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the control loop, reading console commands from stdin
    Run {
        /// Stop after this many ticks (runs until Ctrl-C when unset)
        #[arg(long, value_name = "N")]
        ticks: Option<u64>,
        /// Loop period in milliseconds
        #[arg(long, value_name = "MS", default_value_t = 100)]
        tick_ms: u64,
        /// Advance a simulated clock by --tick-ms per tick instead of sleeping
        #[arg(long, action = ArgAction::SetTrue)]
        virtual_time: bool,
        /// Ignore stdin (for running as a service)
        #[arg(long, action = ArgAction::SetTrue)]
        no_console: bool,
    },
    /// Execute one console command and exit (e.g. `feeder exec set portion 60`)
    Exec {
        #[arg(required = true, num_args = 1.., value_name = "WORDS")]
        words: Vec<String>,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
