//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "liftctl", version, about = "Cable-machine session CLI")]
pub struct Cli {
    /// Path to config TOML (defaults are used when the file is absent)
    #[arg(long, value_name = "FILE", default_value = "etc/liftctl.toml")]
    pub config: PathBuf,

    /// Directory holding routine TOML files
    #[arg(long, value_name = "DIR", default_value = "routines")]
    pub routines: PathBuf,

    /// Log and report as JSON lines instead of pretty
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
    /// Run a routine against a simulated machine link
    Run {
        /// Routine name (in the routines directory) or path to a routine TOML
        #[arg(long)]
        routine: String,
        /// Simulated rep duration in ms
        #[arg(long, value_name = "MS", default_value_t = 1_000)]
        rep_ms: u64,
        /// Reps replayed for AMRAP sets before the handles are released
        #[arg(long, value_name = "REPS")]
        amrap_reps: Option<u32>,
        /// Print the per-set records on completion
        #[arg(long, action = ArgAction::SetTrue)]
        print_sets: bool,
    },
    /// Open-ended lifting: count reps until the handles go down
    JustLift {
        /// Weight per cable in kg
        #[arg(long, value_name = "KG", default_value_t = 20.0)]
        weight: f32,
        /// Simulated reps before the handles are released
        #[arg(long, value_name = "REPS", default_value_t = 10)]
        reps: u32,
        /// Simulated rep duration in ms
        #[arg(long, value_name = "MS", default_value_t = 1_000)]
        rep_ms: u64,
    },
    /// Manage the routine library
    Routines {
        #[command(subcommand)]
        action: RoutineAction,
    },
    /// Validate the config and every routine in the library
    Check,
}

#[derive(Subcommand, Debug)]
pub enum RoutineAction {
    /// List stored routines
    List,
    /// Validate a routine file and add it to the library
    Add {
        /// Path to the routine TOML
        file: PathBuf,
    },
    /// Remove a routine by name
    Remove {
        /// Routine name
        name: String,
    },
}
