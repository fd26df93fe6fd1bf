mod cli;
mod commands;
mod error_fmt;
mod logging;

use clap::Parser;
use labby_config::Config;
use labby_core::DeviceController;
use labby_hardware::{DriverRegistry, PortRegistry};

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    // Usage errors exit with 2 from inside clap.
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;

    if let Commands::Hello = cli.cmd {
        println!("Hello world");
        return Ok(());
    }

    let cfg = Config::from_path(&cli.config)?;
    logging::init(cli.log_level.as_deref(), cli.json, &cfg.logging)?;
    tracing::debug!(config = %cli.config.display(), devices = cfg.devices.len(), "config loaded");

    let drivers = DriverRegistry::with_builtin(PortRegistry::system());
    let mut controller = DeviceController::from_config(&cfg, &drivers)?;

    match cli.cmd {
        Commands::Devices => commands::devices(&mut controller, cli.json),
        Commands::Status { device } => commands::status(&mut controller, &device, cli.json),
        Commands::Send {
            device,
            commands: raw,
        } => commands::send(&mut controller, &device, &raw, cli.json),
        Commands::Run {
            sequence_filename,
            output_dir,
        } => commands::run(
            &mut controller,
            &cfg,
            &sequence_filename,
            output_dir,
            cli.json,
        ),
        Commands::Hello => Ok(()),
    }
}
