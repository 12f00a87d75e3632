// The UV-K5 firmware exposes the registers of its BK4819 transceiver over the
// programming cable: a host writes a short command frame, such as `RR\x67;` to
// read register 0x67, and the radio answers with a frame ending in the same `;`
// terminator. This crate is a synchronous client for that link. One request is
// outstanding at a time; a request is fully answered (or times out) before the
// next one goes out.

// One of the critical aspects of this library is error handling. Any exchange
// can find that the cable was unplugged, that the radio stayed silent, or that it
// answered with something we cannot decode, so everything which does such
// communication will return a `Result<T, uvk5::Error>`. The client never retries:
// the caller decides what a timeout means to it.
#[macro_use]
extern crate quick_error;
use std::io;

quick_error! {
    #[derive(Debug)]
    pub enum Error {
        /// The serial port could not be opened or configured. Perhaps an invalid
        /// port was specified, or this program does not have permission to access
        /// it.
        ConnectionFailed(err: serialport::Error) {
            source(err)
            display("Could not open the serial port: {}", err)
            from()
        }
        /// An I/O error on an open port. The cable may have been physically
        /// disconnected; the connection should be reopened.
        Transport(err: io::Error) {
            source(err)
            display("Serial link failure: {}", err)
            from()
        }
        /// No complete frame arrived within the read timeout. `received` holds
        /// whatever partial bytes did arrive.
        Timeout { received: Vec<u8> } {
            display("Timed out waiting for a response ({} bytes received)", received.len())
        }
        /// A complete frame arrived but could not be decoded.
        Protocol { reason: String, frame: Vec<u8> } {
            display("Malformed response {:?}: {}", String::from_utf8_lossy(frame), reason)
        }
        /// The client or transport has already been closed.
        Closed {
            display("The connection is closed")
        }
        /// A value does not fit in the register field it was meant for.
        FieldOverflow { field: &'static str, value: u16, max: u16 } {
            display("Value {:#x} does not fit field {} (max {:#x})", value, field, max)
        }
        /// A configuration file could not be read or parsed.
        Config(reason: String) {
            display("Invalid configuration: {}", reason)
        }
    }
}

impl Error {
    /// Whether the connection is still usable after this error.
    ///
    /// Timeouts and malformed frames leave the link intact; the same request may
    /// simply be sent again.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Timeout { .. } | Error::Protocol { .. })
    }
}

/// Universal `Result` wrapper for the UV-K5 interface.
pub type Result<T> = std::result::Result<T, Error>;

// The byte layout of each request lives in `codec`, behind the `FrameCodec`
// trait, and the byte stream itself behind `Transport`. `RegisterClient` only
// sequences the two. `mock` provides an in-memory radio for tests and demos.
pub mod client;
pub mod codec;
pub mod config;
pub mod mock;
pub mod monitor;
pub mod registers;
pub mod transport;

pub use client::RegisterClient;
pub use codec::{Ack, AsciiHexCodec, FrameCodec, Request, RequestKind, Response, VersionInfo};
pub use config::{Config, MonitorConfig, PortSettings};
pub use mock::{MockHandle, MockTransport};
pub use monitor::Monitor;
pub use registers::{bk4819, rssi_to_dbm, RegisterAddress, RegisterField, RegisterValue};
pub use transport::{SerialTransport, Transport};
