//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "labby", version, about = "Talk to lab hardware")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "labby.toml")]
    pub config: PathBuf,

    /// Emit results, errors and logs as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured devices and whether they answer
    Devices,
    /// Show the state of one device
    Status {
        /// Device name from the config
        device: String,
    },
    /// Send commands to a device, in order
    #[command(
        long_about = "Send commands to a device, in order.\n\nCommands are key=value pairs: voltage=4.25, current=1.2, output=on|off, query=<raw text>, write=<raw text>. All commands are parsed before anything is sent."
    )]
    Send {
        /// Device name from the config
        device: String,
        /// One or more key=value commands
        #[arg(required = true, value_name = "COMMAND")]
        commands: Vec<String>,
    },
    /// Run an experiment sequence file
    Run {
        /// Sequence TOML with [[sequence]] entries
        sequence_filename: PathBuf,
        /// Output root; defaults to [experiments].output_dir
        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },
    /// Print a greeting; needs no config
    Hello,
}
