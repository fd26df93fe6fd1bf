//! Per-port serial workers.
//!
//! Each open port is owned by exactly one worker thread. Callers submit
//! write/query jobs through a channel and block on the reply, so traffic on a
//! port is strictly serialized even when several devices share it (e.g. an
//! RS-485 bus with addressed power supplies).
//!
//! `PortRegistry` hands out reference-counted `PortHandle`s; when the last
//! handle for a port is dropped the worker is shut down and joined, which
//! closes the port.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel as xch;
use tracing::{debug, info, trace, warn};

use crate::error::{HwError, Result};
use crate::serial::{LinkOpener, SerialLink, SerialSettings};

enum JobKind {
    Write(Vec<u8>),
    Query(Vec<u8>),
}

struct Job {
    kind: JobKind,
    reply: xch::Sender<Result<Option<String>>>,
}

pub struct PortController {
    settings: SerialSettings,
    tx: Option<xch::Sender<Job>>,
    join_handle: Option<JoinHandle<()>>,
}

impl PortController {
    pub fn spawn(settings: SerialSettings, opener: Arc<dyn LinkOpener>) -> Self {
        let (tx, rx) = xch::unbounded::<Job>();
        let worker_settings = settings.clone();
        let join_handle = std::thread::spawn(move || {
            run_worker(rx, worker_settings, opener);
        });
        Self {
            settings,
            tx: Some(tx),
            join_handle: Some(join_handle),
        }
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    pub fn write(&self, message: &[u8]) -> Result<()> {
        self.submit(JobKind::Write(message.to_vec())).map(|_| ())
    }

    pub fn query(&self, message: &[u8]) -> Result<String> {
        self.submit(JobKind::Query(message.to_vec()))?
            .ok_or(HwError::Timeout)
    }

    fn submit(&self, kind: JobKind) -> Result<Option<String>> {
        let gone = || HwError::WorkerGone(self.settings.port.clone());
        let tx = self.tx.as_ref().ok_or_else(gone)?;
        let (reply_tx, reply_rx) = xch::bounded(1);
        tx.send(Job {
            kind,
            reply: reply_tx,
        })
        .map_err(|_| gone())?;
        reply_rx.recv().map_err(|_| gone())?
    }
}

fn run_worker(rx: xch::Receiver<Job>, settings: SerialSettings, opener: Arc<dyn LinkOpener>) {
    let mut link: Option<Box<dyn SerialLink>> = None;
    // Ends once every sender (the controller) is gone.
    for job in rx.iter() {
        let result = execute(&mut link, &settings, opener.as_ref(), job.kind);
        if let Err(e) = &result
            && e.is_link_fatal()
            && link.take().is_some()
        {
            warn!(port = %settings.port, error = %e, "dropping serial link after error");
        }
        if job.reply.send(result).is_err() {
            debug!(port = %settings.port, "serial job caller went away");
        }
    }
    if link.take().is_some() {
        info!(port = %settings.port, "serial port closed");
    }
    trace!(port = %settings.port, "serial worker exiting cleanly");
}

fn execute(
    link: &mut Option<Box<dyn SerialLink>>,
    settings: &SerialSettings,
    opener: &dyn LinkOpener,
    kind: JobKind,
) -> Result<Option<String>> {
    if link.is_none() {
        let opened = opener.open(settings)?;
        info!(port = %settings.port, baud = settings.baud_rate, "serial port opened");
        *link = Some(opened);
    }
    let Some(l) = link.as_mut() else {
        return Err(HwError::NotOpen);
    };
    match kind {
        JobKind::Write(message) => {
            debug!(port = %settings.port, msg = %String::from_utf8_lossy(&message), "serial write");
            l.write_all(&message)?;
            pause(settings);
            Ok(None)
        }
        JobKind::Query(message) => {
            debug!(port = %settings.port, msg = %String::from_utf8_lossy(&message), "serial query");
            l.write_all(&message)?;
            pause(settings);
            let line = l.read_line()?;
            debug!(port = %settings.port, response = %line, "serial response");
            Ok(Some(line))
        }
    }
}

#[inline]
fn pause(settings: &SerialSettings) {
    if !settings.write_delay.is_zero() {
        std::thread::sleep(settings.write_delay);
    }
}

impl Drop for PortController {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after any in-flight job.
        drop(self.tx.take());
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => trace!(port = %self.settings.port, "serial worker joined"),
                Err(e) => warn!(?e, "serial worker panicked during shutdown"),
            }
        }
    }
}

struct PortEntry {
    controller: Arc<PortController>,
    clients: usize,
}

/// Shares one `PortController` among all clients of the same port name.
#[derive(Clone)]
pub struct PortRegistry {
    ports: Arc<Mutex<HashMap<String, PortEntry>>>,
    opener: Arc<dyn LinkOpener>,
}

impl PortRegistry {
    pub fn new(opener: impl LinkOpener + 'static) -> Self {
        Self {
            ports: Arc::new(Mutex::new(HashMap::new())),
            opener: Arc::new(opener),
        }
    }

    /// Registry backed by real OS serial ports when built with `hardware`.
    pub fn system() -> Self {
        #[cfg(feature = "hardware")]
        {
            Self::new(crate::serial::SystemOpener)
        }
        #[cfg(not(feature = "hardware"))]
        {
            Self::new(crate::serial::UnavailableOpener)
        }
    }

    pub fn acquire(&self, settings: &SerialSettings) -> Result<PortHandle> {
        let mut ports = self
            .ports
            .lock()
            .map_err(|_| HwError::Connection("port registry lock poisoned".into()))?;
        let entry = ports
            .entry(settings.port.clone())
            .or_insert_with(|| PortEntry {
                controller: Arc::new(PortController::spawn(
                    settings.clone(),
                    self.opener.clone(),
                )),
                clients: 0,
            });
        if entry.controller.settings() != settings {
            warn!(
                port = %settings.port,
                "port already in use with different settings; reusing existing link"
            );
        }
        entry.clients += 1;
        debug!(port = %settings.port, clients = entry.clients, "port acquired");
        Ok(PortHandle {
            controller: entry.controller.clone(),
            registry: self.clone(),
            port: settings.port.clone(),
        })
    }

    /// Number of live handles for `port` (0 when the port is not active).
    pub fn client_count(&self, port: &str) -> usize {
        self.ports
            .lock()
            .ok()
            .and_then(|p| p.get(port).map(|e| e.clients))
            .unwrap_or(0)
    }

    fn release(&self, port: &str) {
        let removed = match self.ports.lock() {
            Ok(mut ports) => {
                let last = match ports.get_mut(port) {
                    Some(entry) => {
                        entry.clients = entry.clients.saturating_sub(1);
                        entry.clients == 0
                    }
                    None => false,
                };
                if last { ports.remove(port) } else { None }
            }
            Err(_) => None,
        };
        // Dropped outside the lock; the final Arc joins the worker.
        if removed.is_some() {
            debug!(port, "last client released port");
        }
    }
}

impl Default for PortRegistry {
    fn default() -> Self {
        Self::system()
    }
}

/// A client's share of a port. Dropping it releases the port.
pub struct PortHandle {
    controller: Arc<PortController>,
    registry: PortRegistry,
    port: String,
}

impl PortHandle {
    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn write(&self, message: &[u8]) -> Result<()> {
        self.controller.write(message)
    }

    pub fn query(&self, message: &[u8]) -> Result<String> {
        self.controller.query(message)
    }
}

impl Drop for PortHandle {
    fn drop(&mut self) {
        self.registry.release(&self.port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockPort;

    fn settings(port: &str) -> SerialSettings {
        SerialSettings::new(port, 9600)
    }

    #[test]
    fn port_opens_lazily_on_first_job() {
        let mock = MockPort::new();
        let registry = PortRegistry::new(mock.opener());
        let handle = registry.acquire(&settings("/dev/ttyMOCK0")).unwrap();
        assert_eq!(mock.open_count(), 0);
        handle.write(b"X").unwrap();
        assert_eq!(mock.open_count(), 1);
        assert_eq!(mock.writes(), vec![b"X".to_vec()]);
    }

    #[test]
    fn handles_share_one_link_until_last_release() {
        let mock = MockPort::new();
        let registry = PortRegistry::new(mock.opener());
        let a = registry.acquire(&settings("/dev/ttyMOCK0")).unwrap();
        let b = registry.acquire(&settings("/dev/ttyMOCK0")).unwrap();
        assert_eq!(registry.client_count("/dev/ttyMOCK0"), 2);
        a.write(b"A").unwrap();
        b.write(b"B").unwrap();
        assert_eq!(mock.open_count(), 1);

        drop(a);
        assert_eq!(mock.close_count(), 0);
        drop(b);
        assert_eq!(registry.client_count("/dev/ttyMOCK0"), 0);
        assert_eq!(mock.close_count(), 1);
    }

    #[test]
    fn query_returns_line_without_terminator() {
        let mock = MockPort::new();
        mock.push_response("V4.2.0\r\n");
        let registry = PortRegistry::new(mock.opener());
        let handle = registry.acquire(&settings("/dev/ttyMOCK0")).unwrap();
        assert_eq!(handle.query(b":REV?;").unwrap(), "V4.2.0");
    }

    #[test]
    fn open_failure_is_reported_to_caller() {
        let mock = MockPort::new();
        mock.fail_open_with("permission denied");
        let registry = PortRegistry::new(mock.opener());
        let handle = registry.acquire(&settings("/dev/ttyMOCK0")).unwrap();
        let err = handle.write(b"X").unwrap_err();
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn distinct_ports_get_distinct_workers() {
        let mock = MockPort::new();
        let registry = PortRegistry::new(mock.opener());
        let a = registry.acquire(&settings("/dev/ttyMOCK0")).unwrap();
        let b = registry.acquire(&settings("/dev/ttyMOCK1")).unwrap();
        a.write(b"A").unwrap();
        b.write(b"B").unwrap();
        assert_eq!(mock.open_count(), 2);
    }
}
