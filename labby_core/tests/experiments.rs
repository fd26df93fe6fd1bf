use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use labby_core::{
    DeviceController, ExperimentRegistry, ExperimentSequence, LabbyError, RunOptions,
    run_sequence,
};
use labby_hardware::virtual_psu::{BrokenPowerSupply, VirtualPowerSupply};
use labby_traits::{Clock, Device, ManualClock};
use tempfile::tempdir;

fn controller() -> DeviceController {
    let devices: Vec<Box<dyn Device>> = vec![
        Box::new(VirtualPowerSupply::new("psu", 5.0)),
        Box::new(BrokenPowerSupply::new("broken")),
    ];
    DeviceController::new(devices).unwrap()
}

fn sequence(text: &str) -> ExperimentSequence {
    ExperimentSequence::from_toml("seq", text, &ExperimentRegistry::with_builtin()).unwrap()
}

fn lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

const HOLD_1S_2HZ: &str = r#"
[[sequence]]
experiment_type = "hold"
[sequence.params]
device = "psu"
voltage_in_volts = 15
current_in_amps = 4
sampling_rate_hz = 2
duration_in_seconds = 1
"#;

#[test]
fn hold_writes_a_row_per_sample_including_the_last() {
    let dir = tempdir().unwrap();
    let mut ctl = controller();
    let clock = ManualClock::new();
    let mut seq = sequence(HOLD_1S_2HZ);

    let reports = run_sequence(&mut seq, &mut ctl, &clock, &RunOptions::new(dir.path())).unwrap();

    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id, "000");
    assert_eq!(reports[0].rows, 3);
    assert_eq!(reports[0].path, dir.path().join("seq").join("000.csv"));
    assert_eq!(
        lines(&reports[0].path),
        [
            "seconds,voltage,current",
            "0.0,15.0,3.0",
            "0.5,15.0,3.0",
            "1.0,15.0,3.0"
        ]
    );
    assert_eq!(clock.elapsed(), Duration::from_secs(1));
}

#[test]
fn hold_switches_output_off_when_done() {
    let dir = tempdir().unwrap();
    let mut ctl = controller();
    let mut seq = sequence(HOLD_1S_2HZ);
    run_sequence(&mut seq, &mut ctl, &ManualClock::new(), &RunOptions::new(dir.path())).unwrap();
    let status = ctl.get_status("psu").unwrap();
    assert!(!status.power_supply().unwrap().is_output_on);
}

#[test]
fn ramp_follows_the_interpolated_setpoint() {
    let dir = tempdir().unwrap();
    let mut ctl = controller();
    let mut seq = sequence(
        r#"
[[sequence]]
experiment_type = "ramp"
[sequence.params]
device = "psu"
start_voltage_in_volts = 0
end_voltage_in_volts = 10
current_in_amps = 100
sampling_rate_hz = 2
duration_in_seconds = 1
"#,
    );
    let reports = run_sequence(&mut seq, &mut ctl, &ManualClock::new(), &RunOptions::new(dir.path())).unwrap();
    assert_eq!(
        lines(&reports[0].path),
        [
            "seconds,target_voltage,voltage,current",
            "0.0,0.0,0.0,0.0",
            "0.5,5.0,5.0,1.0",
            "1.0,10.0,10.0,2.0"
        ]
    );
}

#[test]
fn experiments_get_sequential_ids() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("overnight.toml");
    fs::write(
        &path,
        r#"
[[sequence]]
experiment_type = "hold"
[sequence.params]
device = "psu"
current_in_amps = 1
duration_in_seconds = 0

[[sequence]]
experiment_type = "hold"
[sequence.params]
device = "psu"
current_in_amps = 2
duration_in_seconds = 0
"#,
    )
    .unwrap();
    let mut seq = ExperimentSequence::from_path(&path, &ExperimentRegistry::with_builtin()).unwrap();
    assert_eq!(seq.name, "overnight");

    let out = dir.path().join("out");
    let mut ctl = controller();
    let reports = run_sequence(&mut seq, &mut ctl, &ManualClock::new(), &RunOptions::new(&out)).unwrap();
    let ids: Vec<_> = reports.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["000", "001"]);
    assert!(out.join("overnight").join("001.csv").is_file());
    assert_eq!(lines(&reports[1].path), ["seconds,voltage,current", "0.0,6.0,1.2"]);
}

#[test]
fn shutdown_flag_interrupts_and_still_stops() {
    let dir = tempdir().unwrap();
    let mut ctl = controller();
    let mut seq = sequence(HOLD_1S_2HZ);
    let opts = RunOptions::new(dir.path()).with_shutdown(Arc::new(AtomicBool::new(true)));

    let err = run_sequence(&mut seq, &mut ctl, &ManualClock::new(), &opts).unwrap_err();

    assert!(
        err.chain()
            .any(|e| matches!(e.downcast_ref::<LabbyError>(), Some(LabbyError::Interrupted)))
    );
    assert_eq!(
        lines(&dir.path().join("seq").join("000.csv")),
        ["seconds,voltage,current"]
    );
    let status = ctl.get_status("psu").unwrap();
    assert!(!status.power_supply().unwrap().is_output_on);
}

/// Manual clock that raises the shutdown flag the first time the runner sleeps.
struct CtrlCOnSleep {
    inner: ManualClock,
    flag: Arc<AtomicBool>,
}

impl Clock for CtrlCOnSleep {
    fn now(&self) -> Instant {
        self.inner.now()
    }

    fn sleep(&self, d: Duration) {
        self.inner.sleep(d);
        self.flag.store(true, Ordering::Relaxed);
    }
}

#[test]
fn shutdown_is_noticed_during_a_long_sampling_period() {
    let dir = tempdir().unwrap();
    let mut ctl = controller();
    let mut seq = sequence(
        r#"
[[sequence]]
experiment_type = "hold"
[sequence.params]
device = "psu"
current_in_amps = 2
sampling_rate_hz = 0.001
duration_in_seconds = 1000
"#,
    );
    let flag = Arc::new(AtomicBool::new(false));
    let clock = CtrlCOnSleep {
        inner: ManualClock::new(),
        flag: flag.clone(),
    };
    let opts = RunOptions::new(dir.path()).with_shutdown(flag);

    let err = run_sequence(&mut seq, &mut ctl, &clock, &opts).unwrap_err();

    assert!(
        err.chain()
            .any(|e| matches!(e.downcast_ref::<LabbyError>(), Some(LabbyError::Interrupted)))
    );
    assert!(clock.inner.elapsed() <= Duration::from_secs(1));
    assert_eq!(
        lines(&dir.path().join("seq").join("000.csv")),
        ["seconds,voltage,current", "0.0,6.0,1.2"]
    );
    let status = ctl.get_status("psu").unwrap();
    assert!(!status.power_supply().unwrap().is_output_on);
}

#[test]
fn failing_device_aborts_the_sequence() {
    let dir = tempdir().unwrap();
    let mut ctl = controller();
    let mut seq = sequence(
        r#"
[[sequence]]
experiment_type = "hold"
[sequence.params]
device = "broken"
current_in_amps = 1
"#,
    );
    let err = run_sequence(&mut seq, &mut ctl, &ManualClock::new(), &RunOptions::new(dir.path())).unwrap_err();
    assert!(
        err.chain()
            .any(|e| matches!(e.downcast_ref::<LabbyError>(), Some(LabbyError::Hardware { .. })))
    );
}

#[test]
fn unknown_device_in_params_is_reported() {
    let dir = tempdir().unwrap();
    let mut ctl = controller();
    let mut seq = sequence(
        "[[sequence]]\nexperiment_type = \"hold\"\n[sequence.params]\ndevice = \"ghost\"\ncurrent_in_amps = 1\n",
    );
    let err = run_sequence(&mut seq, &mut ctl, &ManualClock::new(), &RunOptions::new(dir.path())).unwrap_err();
    assert!(err.chain().any(|e| matches!(
        e.downcast_ref::<LabbyError>(),
        Some(LabbyError::DeviceNotFound(id)) if id == "ghost"
    )));
}

#[test]
fn unknown_experiment_type_is_rejected_at_load() {
    let err = ExperimentSequence::from_toml(
        "seq",
        "[[sequence]]\nexperiment_type = \"dance\"\n",
        &ExperimentRegistry::with_builtin(),
    )
    .err()
    .unwrap();
    assert!(format!("{err:#}").contains("dance"));
}
