//! The byte stream under the protocol.

use crate::config::PortSettings;
use crate::{Error, Result};
use log::{debug, trace};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::time::Instant;

/// A duplex byte channel with read-with-timeout semantics.
pub trait Transport {
    /// Send every byte of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read until `terminator` has been received (and included in the result) or
    /// the read timeout elapses.
    ///
    /// Running out of time is not an error: whatever arrived, possibly nothing,
    /// is returned and the caller decides whether it is usable.
    fn read_until(&mut self, terminator: u8) -> Result<Vec<u8>>;

    /// Drop any bytes already waiting to be read, such as the tail of a response
    /// that arrived after its read timed out.
    fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the underlying resource. Calling it again does nothing.
    fn close(&mut self);

    fn is_open(&self) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write_all(bytes)
    }

    fn read_until(&mut self, terminator: u8) -> Result<Vec<u8>> {
        (**self).read_until(terminator)
    }

    fn discard_input(&mut self) -> Result<()> {
        (**self).discard_input()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// A [`Transport`] over a real serial port, 8N1 without flow control.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    settings: PortSettings,
}

impl SerialTransport {
    /// Open and configure the port described by `settings`.
    pub fn open(settings: &PortSettings) -> Result<Self> {
        settings.validate()?;
        let port = serialport::new(&settings.port, settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(settings.read_timeout())
            .open()?;
        debug!("opened {} at {} baud", settings.port, settings.baud_rate);
        Ok(Self::from_port(port, settings.clone()))
    }

    /// Wrap a port that has already been opened elsewhere.
    pub fn from_port(port: Box<dyn SerialPort>, settings: PortSettings) -> Self {
        Self {
            port: Some(port),
            settings,
        }
    }

    pub fn settings(&self) -> &PortSettings {
        &self.settings
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(Error::Closed)
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        Write::write_all(port, bytes)?;
        port.flush()?;
        trace!("-> {}", hex::encode(bytes));
        Ok(())
    }

    fn read_until(&mut self, terminator: u8) -> Result<Vec<u8>> {
        let timeout = self.settings.read_timeout();
        let port = self.port()?;
        let deadline = Instant::now() + timeout;
        let mut frame = Vec::new();
        let mut byte = [0u8; 1];

        // One byte at a time, so nothing past the terminator is consumed.
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            port.set_timeout(remaining).map_err(io::Error::from)?;
            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) => {
                    frame.push(byte[0]);
                    if byte[0] == terminator {
                        break;
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        trace!("<- {}", hex::encode(&frame));
        Ok(frame)
    }

    fn discard_input(&mut self) -> Result<()> {
        self.port()?
            .clear(ClearBuffer::Input)
            .map_err(io::Error::from)?;
        Ok(())
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("closed {}", self.settings.port);
        }
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}
