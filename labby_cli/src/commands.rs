//! Subcommand handlers. Each prints to stdout; logs go to stderr.
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use labby_config::Config;
use labby_core::{
    Command, CommandOutcome, ConnectionState, DeviceController, DeviceStatus, ExperimentRegistry,
    ExperimentSequence, RunOptions, run_sequence,
};
use labby_traits::MonotonicClock;
use serde_json::json;
use tracing::info;

pub fn devices(controller: &mut DeviceController, json: bool) -> eyre::Result<()> {
    let probes = controller.probe_devices();
    if json {
        println!("{}", json!({ "devices": probes }));
        return Ok(());
    }
    for p in &probes {
        if p.is_available {
            println!("[+] {}", p.name);
        } else {
            println!(
                "[x] {} ({}: {})",
                p.name,
                p.error_type.as_deref().unwrap_or("Error"),
                p.error_message.as_deref().unwrap_or("unavailable")
            );
        }
    }
    Ok(())
}

fn print_status(status: &DeviceStatus) {
    println!("name: {}", status.name);
    println!("type: {}", status.device_type);
    if let Some(model) = &status.model {
        println!("model: {model}");
    }
    match &status.connection {
        ConnectionState::Connected { .. } => println!("connected: yes"),
        ConnectionState::Disconnected {
            error_type,
            error_message,
        } => println!("connected: no ({error_type}: {error_message})"),
    }
    if let Some(psu) = status.power_supply() {
        println!("output: {}", if psu.is_output_on { "on" } else { "off" });
        println!("mode: {}", psu.mode);
        println!(
            "voltage: {} V (target {} V)",
            psu.actual_voltage, psu.target_voltage
        );
        println!(
            "current: {} A (target {} A)",
            psu.actual_current, psu.target_current
        );
    }
}

pub fn status(controller: &mut DeviceController, device: &str, json: bool) -> eyre::Result<()> {
    let status = controller.get_status(device)?;
    if json {
        println!("{}", serde_json::to_string(&status)?);
    } else {
        print_status(&status);
    }
    Ok(())
}

pub fn send(
    controller: &mut DeviceController,
    device: &str,
    raw: &[String],
    json: bool,
) -> eyre::Result<()> {
    // Parse everything up front so a typo sends nothing.
    let commands = raw
        .iter()
        .map(|c| c.parse::<Command>())
        .collect::<Result<Vec<_>, _>>()?;
    for command in &commands {
        let outcome = controller.send_command(device, command)?;
        let response = match &outcome {
            CommandOutcome::Done => None,
            CommandOutcome::Response(reply) => Some(reply.as_str()),
        };
        if json {
            println!(
                "{}",
                json!({ "device": device, "command": command.to_string(), "response": response })
            );
        } else {
            match response {
                Some(reply) => println!("{command}: {reply}"),
                None => println!("{command}: ok"),
            }
        }
    }
    Ok(())
}

fn ctrl_c_flag() -> eyre::Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .wrap_err("install Ctrl-C handler")?;
    Ok(shutdown)
}

pub fn run(
    controller: &mut DeviceController,
    cfg: &Config,
    sequence_filename: &Path,
    output_dir: Option<PathBuf>,
    json: bool,
) -> eyre::Result<()> {
    let registry = ExperimentRegistry::with_builtin();
    let mut sequence = ExperimentSequence::from_path(sequence_filename, &registry)?;
    let output_dir = output_dir.unwrap_or_else(|| PathBuf::from(&cfg.experiments.output_dir));
    let opts = RunOptions::new(output_dir).with_shutdown(ctrl_c_flag()?);
    info!(
        sequence = %sequence_filename.display(),
        experiments = sequence.len(),
        "running sequence"
    );

    let reports = run_sequence(&mut sequence, controller, &MonotonicClock::new(), &opts)?;
    for r in &reports {
        if json {
            println!(
                "{}",
                json!({
                    "id": r.id,
                    "experiment_type": r.experiment_type,
                    "path": r.path.display().to_string(),
                    "rows": r.rows,
                })
            );
        } else {
            println!(
                "{} {}: {} rows -> {}",
                r.id,
                r.experiment_type,
                r.rows,
                r.path.display()
            );
        }
    }
    Ok(())
}
