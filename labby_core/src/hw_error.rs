//! Maps `Box<dyn Error>` from trait boundaries to typed `LabbyError`.
//!
//! The traits in `labby_traits` use `Box<dyn Error + Send + Sync>` so drivers
//! can surface their own errors; this module recovers `HwError` by
//! downcasting and falls back to string heuristics for anything else.

use labby_hardware::HwError;

use crate::error::LabbyError;

/// Map a trait-boundary error raised by `device` to a typed `LabbyError`.
pub fn map_hw_error(device: &str, e: &(dyn std::error::Error + 'static)) -> LabbyError {
    if let Some(hw) = e.downcast_ref::<HwError>() {
        return match hw {
            HwError::Timeout => LabbyError::Timeout {
                device: device.to_string(),
            },
            HwError::Unsupported(what) => LabbyError::UnsupportedCommand {
                device: device.to_string(),
                command: what.clone(),
            },
            other => LabbyError::Hardware {
                device: device.to_string(),
                message: other.to_string(),
            },
        };
    }

    // Fallback: string-based detection
    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        LabbyError::Timeout {
            device: device.to_string(),
        }
    } else {
        LabbyError::Hardware {
            device: device.to_string(),
            message: s,
        }
    }
}

/// Closure form of [`map_hw_error`] for `map_err` on `HwResult`s.
pub fn lift(
    device: &str,
) -> impl Fn(Box<dyn std::error::Error + Send + Sync>) -> LabbyError + '_ {
    move |e| map_hw_error(device, e.as_ref())
}

/// Name shown as `error_type` in status and probe results.
pub fn error_type(e: &(dyn std::error::Error + 'static)) -> String {
    match e.downcast_ref::<HwError>() {
        Some(hw) => hw.kind_name().to_string(),
        None => "HardwareError".to_string(),
    }
}
