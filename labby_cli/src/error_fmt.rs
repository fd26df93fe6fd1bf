//! Human-readable error descriptions, exit codes and structured JSON errors.

use labby_core::{BuildError, LabbyError};

/// First `LabbyError` anywhere in the report's chain.
fn labby_error(err: &eyre::Report) -> Option<&LabbyError> {
    err.chain().find_map(|e| e.downcast_ref::<LabbyError>())
}

fn build_error(err: &eyre::Report) -> Option<&BuildError> {
    err.chain().find_map(|e| e.downcast_ref::<BuildError>())
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(le) = labby_error(err) {
        return match le {
            LabbyError::DeviceNotFound(id) => format!(
                "What happened: No device named {id:?} is configured.\nLikely causes: Typo in the device name or the wrong --config file.\nHow to fix: Run `labby devices` to list the configured names."
            ),
            LabbyError::UnsupportedCommand { device, command } => format!(
                "What happened: Device {device:?} cannot execute {command}.\nLikely causes: The driver does not offer this capability (virtual supplies have no raw passthrough).\nHow to fix: Use a command the device supports, or a device whose driver offers it."
            ),
            LabbyError::InvalidCommand(msg) => format!(
                "What happened: Invalid command ({msg}).\nLikely causes: Malformed key=value text or a negative setpoint.\nHow to fix: Use voltage=<V>, current=<A>, output=on|off, query=<text> or write=<text>."
            ),
            LabbyError::Timeout { device } => format!(
                "What happened: {device} did not answer in time.\nLikely causes: Wrong port, baud rate or address, or the unit is switched off.\nHow to fix: Check the cable and [devices.args] for {device}, then run `labby devices`."
            ),
            LabbyError::Hardware { device, message } => format!(
                "What happened: Communication with {device} failed ({message}).\nLikely causes: Port busy or missing, device unpowered, or a bad reply on the bus.\nHow to fix: Check the connection and re-run with --log-level=debug for the wire traffic."
            ),
            LabbyError::Interrupted => {
                "What happened: The run was interrupted.\nLikely causes: Ctrl-C was pressed.\nHow to fix: Outputs were switched off; re-run the sequence when ready.".to_string()
            }
            LabbyError::Experiment(msg) => format!(
                "What happened: The experiment could not be set up ({msg}).\nLikely causes: Unknown experiment_type or bad params in the sequence file.\nHow to fix: Edit the sequence file and try again."
            ),
        };
    }

    if let Some(be) = build_error(err) {
        return format!(
            "What happened: The device list could not be built ({be}).\nLikely causes: Unknown driver name or bad [devices.args] in the config.\nHow to fix: Edit the config file, then rerun."
        );
    }

    // String-based heuristics for errors coming from config loading
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Missing file or wrong --config path.\nHow to fix: Pass --config <FILE> or create labby.toml. Details: {msg}"
        );
    }

    if lower.contains("invalid configuration") || lower.contains("invalid sequence") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Misspelled keys, wrong types or out-of-range values.\nHow to fix: Edit the TOML file and try again."
        );
    }

    // Generic fallback
    format!(
        "Something went wrong: {msg}\nHow to fix: Re-run with --log-level=debug for details."
    )
}

/// Stable name for the JSON `reason` field.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(le) = labby_error(err) {
        return match le {
            LabbyError::DeviceNotFound(_) => "DeviceNotFound",
            LabbyError::UnsupportedCommand { .. } => "UnsupportedCommand",
            LabbyError::InvalidCommand(_) => "InvalidCommand",
            LabbyError::Hardware { .. } => "Hardware",
            LabbyError::Timeout { .. } => "Timeout",
            LabbyError::Interrupted => "Interrupted",
            LabbyError::Experiment(_) => "Experiment",
        };
    }
    if build_error(err).is_some() {
        return "Build";
    }
    "Error"
}

/// Exit code for a failed command; clap usage errors exit with 2 before we get here.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match labby_error(err) {
        Some(LabbyError::DeviceNotFound(_)) => 3,
        Some(LabbyError::UnsupportedCommand { .. } | LabbyError::InvalidCommand(_)) => 4,
        Some(LabbyError::Hardware { .. } | LabbyError::Timeout { .. }) => 5,
        Some(LabbyError::Interrupted) => 6,
        Some(LabbyError::Experiment(_)) | None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "message": humanize(err),
        "exit_code": exit_code_for_error(err),
    })
    .to_string()
}
