//! Serial link abstraction.
//!
//! A `SerialLink` is an open, exclusively owned port that writes raw bytes and
//! reads CR/LF terminated lines. `LinkOpener` turns `SerialSettings` into a
//! link; the port worker in `controller` calls it lazily on first use.
use std::time::Duration;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    /// 5..=8
    pub data_bits: u8,
    pub parity: Parity,
    /// 1 or 2
    pub stop_bits: u8,
    /// Software (XON/XOFF) flow control
    pub xonxoff: bool,
    /// Read timeout for a single line
    pub timeout: Duration,
    /// Pause after every write before the next job runs
    pub write_delay: Duration,
}

impl SerialSettings {
    /// 8N1, no flow control, 1 s timeout.
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            xonxoff: false,
            timeout: Duration::from_secs(1),
            write_delay: Duration::ZERO,
        }
    }
}

pub trait SerialLink: Send {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;
    /// Read one line with the line ending removed.
    fn read_line(&mut self) -> Result<String>;
}

pub trait LinkOpener: Send + Sync {
    fn open(&self, settings: &SerialSettings) -> Result<Box<dyn SerialLink>>;
}

/// Opener used when the crate is built without the `hardware` feature.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableOpener;

impl LinkOpener for UnavailableOpener {
    fn open(&self, settings: &SerialSettings) -> Result<Box<dyn SerialLink>> {
        Err(crate::error::HwError::Serial {
            port: settings.port.clone(),
            message: "serial support not compiled in (enable the `hardware` feature)".into(),
        })
    }
}

#[cfg(feature = "hardware")]
pub use system::SystemOpener;

#[cfg(feature = "hardware")]
mod system {
    use std::io::{BufRead, BufReader, ErrorKind, Write};

    use serialport::{DataBits, FlowControl, StopBits};
    use tracing::trace;

    use super::{LinkOpener, Parity, SerialLink, SerialSettings};
    use crate::error::{HwError, Result};
    use crate::util::strip_line_ending;

    /// Opens OS serial ports through the `serialport` crate.
    ///
    /// On Unix the port is opened with TIOCEXCL, so a second process
    /// cannot open the same device while we hold it.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SystemOpener;

    struct SystemLink {
        port_name: String,
        reader: BufReader<Box<dyn serialport::SerialPort>>,
    }

    fn serial_err(port: &str, e: impl std::fmt::Display) -> HwError {
        HwError::Serial {
            port: port.to_string(),
            message: e.to_string(),
        }
    }

    impl LinkOpener for SystemOpener {
        fn open(&self, s: &SerialSettings) -> Result<Box<dyn SerialLink>> {
            let data_bits = match s.data_bits {
                5 => DataBits::Five,
                6 => DataBits::Six,
                7 => DataBits::Seven,
                8 => DataBits::Eight,
                other => return Err(serial_err(&s.port, format!("unsupported data bits {other}"))),
            };
            let stop_bits = match s.stop_bits {
                1 => StopBits::One,
                2 => StopBits::Two,
                other => return Err(serial_err(&s.port, format!("unsupported stop bits {other}"))),
            };
            let parity = match s.parity {
                Parity::None => serialport::Parity::None,
                Parity::Odd => serialport::Parity::Odd,
                Parity::Even => serialport::Parity::Even,
            };
            let flow = if s.xonxoff {
                FlowControl::Software
            } else {
                FlowControl::None
            };
            let port = serialport::new(&s.port, s.baud_rate)
                .data_bits(data_bits)
                .stop_bits(stop_bits)
                .parity(parity)
                .flow_control(flow)
                .timeout(s.timeout)
                .open()
                .map_err(|e| serial_err(&s.port, e))?;
            Ok(Box::new(SystemLink {
                port_name: s.port.clone(),
                reader: BufReader::new(port),
            }))
        }
    }

    impl SerialLink for SystemLink {
        fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
            let port = self.reader.get_mut();
            port.write_all(bytes)?;
            port.flush()?;
            Ok(())
        }

        fn read_line(&mut self) -> Result<String> {
            let mut buf = Vec::new();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => Err(HwError::Timeout),
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    trace!(port = %self.port_name, line = %line, "serial line");
                    Ok(strip_line_ending(&line).to_string())
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => Err(HwError::Timeout),
                Err(e) => Err(e.into()),
            }
        }
    }
}
