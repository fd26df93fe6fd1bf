//! Test and helper mocks for labby_core

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use labby_hardware::HwError;
use labby_traits::{Device, DeviceType, HwResult};

#[derive(Debug, Default)]
struct BareState {
    opens: AtomicUsize,
    closes: AtomicUsize,
    failure: Mutex<Option<String>>,
}

/// A power-supply-typed device exposing no capabilities.
///
/// Clones share counters, so a test can keep one clone while the controller
/// owns the other.
#[derive(Debug, Clone)]
pub struct BareDevice {
    name: String,
    state: Arc<BareState>,
}

impl BareDevice {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::new(BareState::default()),
        }
    }

    /// Make `test_connection` fail with a connection error from now on.
    pub fn fail_with(&self, message: &str) {
        if let Ok(mut f) = self.state.failure.lock() {
            *f = Some(message.to_string());
        }
    }

    pub fn opens(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

impl Device for BareDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn device_type(&self) -> DeviceType {
        DeviceType::PowerSupply
    }

    fn open(&mut self) -> HwResult<()> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) -> HwResult<()> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn test_connection(&mut self) -> HwResult<()> {
        let failure = self.state.failure.lock().ok().and_then(|f| f.clone());
        match failure {
            Some(message) => Err(HwError::Connection(message).into()),
            None => Ok(()),
        }
    }
}
