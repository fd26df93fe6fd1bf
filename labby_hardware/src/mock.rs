//! In-memory serial port for tests and dry runs.
//!
//! `MockPort` is a cloneable handle onto shared state: everything written to
//! the link is recorded, and reads are served from a queue of scripted
//! responses, falling back to a sticky default.
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{HwError, Result};
use crate::serial::{LinkOpener, SerialLink, SerialSettings};
use crate::util::strip_line_ending;

#[derive(Debug, Default)]
struct MockState {
    writes: Vec<Vec<u8>>,
    responses: VecDeque<String>,
    default_response: Option<String>,
    opens: usize,
    closes: usize,
    last_settings: Option<SerialSettings>,
    fail_open: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct MockPort {
    state: Arc<Mutex<MockState>>,
}

impl MockPort {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn opener(&self) -> MockOpener {
        MockOpener { port: self.clone() }
    }

    /// Every write since construction (or the last `clear_writes`).
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.state().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }

    /// Queue a one-shot response for the next read.
    pub fn push_response(&self, line: impl Into<String>) {
        self.state().responses.push_back(line.into());
    }

    /// Response returned whenever the queue is empty.
    pub fn set_default_response(&self, line: Option<&str>) {
        self.state().default_response = line.map(str::to_string);
    }

    /// Make every subsequent open fail with the given message.
    pub fn fail_open_with(&self, message: impl Into<String>) {
        self.state().fail_open = Some(message.into());
    }

    pub fn open_count(&self) -> usize {
        self.state().opens
    }

    pub fn close_count(&self) -> usize {
        self.state().closes
    }

    pub fn last_settings(&self) -> Option<SerialSettings> {
        self.state().last_settings.clone()
    }
}

#[derive(Debug, Clone)]
pub struct MockOpener {
    port: MockPort,
}

impl LinkOpener for MockOpener {
    fn open(&self, settings: &SerialSettings) -> Result<Box<dyn SerialLink>> {
        let mut st = self.port.state();
        if let Some(msg) = &st.fail_open {
            return Err(HwError::Serial {
                port: settings.port.clone(),
                message: msg.clone(),
            });
        }
        st.opens += 1;
        st.last_settings = Some(settings.clone());
        Ok(Box::new(MockLink {
            port: self.port.clone(),
        }))
    }
}

struct MockLink {
    port: MockPort,
}

impl SerialLink for MockLink {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.state().writes.push(bytes.to_vec());
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        let mut st = self.port.state();
        let line = match st.responses.pop_front() {
            Some(line) => line,
            None => st.default_response.clone().ok_or(HwError::Timeout)?,
        };
        Ok(strip_line_ending(&line).to_string())
    }
}

impl Drop for MockLink {
    fn drop(&mut self) {
        self.port.state().closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queued_responses_take_precedence_over_default() {
        let port = MockPort::new();
        port.set_default_response(Some("DEFAULT\r\n"));
        port.push_response("FIRST\r\n");
        let mut link = port.opener().open(&SerialSettings::new("mock", 9600)).unwrap();
        assert_eq!(link.read_line().unwrap(), "FIRST");
        assert_eq!(link.read_line().unwrap(), "DEFAULT");
    }

    #[test]
    fn empty_port_times_out() {
        let port = MockPort::new();
        let mut link = port.opener().open(&SerialSettings::new("mock", 9600)).unwrap();
        assert!(matches!(link.read_line(), Err(HwError::Timeout)));
    }

    #[test]
    fn dropping_link_counts_as_close() {
        let port = MockPort::new();
        let link = port.opener().open(&SerialSettings::new("mock", 9600)).unwrap();
        assert_eq!(port.open_count(), 1);
        drop(link);
        assert_eq!(port.close_count(), 1);
    }
}
