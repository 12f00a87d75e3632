//! Request and response framing.
//!
//! The only frame observed against real firmware is the read request
//! `RR<address>;`, answered by ASCII hex digits up to the next `;`. Write and
//! version frames follow the same shape but are not confirmed against device
//! documentation, so the byte layout sits behind [`FrameCodec`] and can be
//! swapped without touching [`RegisterClient`](crate::RegisterClient).

use crate::registers::{RegisterAddress, RegisterValue};
use crate::{Error, Result};
use core::fmt;

/// The byte that ends every frame in both directions.
pub const TERMINATOR: u8 = b';';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Read,
    Write,
    GetVersion,
}

/// One operation to send to the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Read(RegisterAddress),
    Write(RegisterAddress, RegisterValue),
    GetVersion,
}

impl Request {
    pub fn kind(&self) -> RequestKind {
        match self {
            Request::Read(_) => RequestKind::Read,
            Request::Write(..) => RequestKind::Write,
            Request::GetVersion => RequestKind::GetVersion,
        }
    }

    pub fn address(&self) -> Option<RegisterAddress> {
        match *self {
            Request::Read(address) | Request::Write(address, _) => Some(address),
            Request::GetVersion => None,
        }
    }

    pub fn value(&self) -> Option<RegisterValue> {
        match *self {
            Request::Write(_, value) => Some(value),
            _ => None,
        }
    }
}

/// The radio's answer to a register write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    Accepted,
    /// The firmware refused the write. Holds whatever reason text followed `ER`.
    Rejected(String),
}

impl Ack {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Ack::Accepted)
    }
}

/// Firmware version reported by the radio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub major: u16,
    pub minor: u16,
    pub build: u16,
    /// The response body exactly as received, minus the terminator.
    pub raw: String,
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.build)
    }
}

/// A decoded response, shaped by the request that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Value(RegisterValue),
    Ack(Ack),
    Version(VersionInfo),
}

/// Turns requests into bytes and bytes back into responses.
///
/// `frame` passed to [`decode_response`](FrameCodec::decode_response) is
/// whatever the transport accumulated: it may be empty or lack the terminator
/// when the read timed out.
pub trait FrameCodec {
    fn terminator(&self) -> u8 {
        TERMINATOR
    }

    fn encode_read(&self, address: RegisterAddress) -> Vec<u8>;

    fn encode_write(&self, address: RegisterAddress, value: RegisterValue) -> Vec<u8>;

    fn encode_version_query(&self) -> Vec<u8>;

    fn decode_response(&self, kind: RequestKind, frame: &[u8]) -> Result<Response>;

    fn encode(&self, request: &Request) -> Vec<u8> {
        match *request {
            Request::Read(address) => self.encode_read(address),
            Request::Write(address, value) => self.encode_write(address, value),
            Request::GetVersion => self.encode_version_query(),
        }
    }
}

/// The default codec: two-letter ASCII commands, raw address byte, values as
/// big-endian ASCII hex.
///
/// | request     | bytes                         |
/// |-------------|-------------------------------|
/// | read        | `RR` addr `;`                 |
/// | write       | `RW` addr `HHHH` `;`          |
/// | version     | `VV;`                         |
///
/// Read responses are one to four hex digits (`0103;` is `0x0103`). Write
/// responses are `OK;` or `ER[reason];`. Version responses are
/// `[prefix]major.minor[.build][suffix];`.
///
/// An empty or unterminated frame is reported as [`Error::Timeout`]; a
/// terminated frame that does not parse is [`Error::Protocol`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AsciiHexCodec;

impl AsciiHexCodec {
    /// Split off the terminator and surrounding whitespace, or report a timeout.
    fn body<'a>(&self, frame: &'a [u8]) -> Result<&'a [u8]> {
        match frame.iter().position(|&b| b == self.terminator()) {
            Some(end) => Ok(trim(&frame[..end])),
            None => Err(Error::Timeout {
                received: frame.to_vec(),
            }),
        }
    }

    fn decode_value(&self, frame: &[u8], body: &[u8]) -> Result<RegisterValue> {
        if body.is_empty() || body.len() > 4 || !body.iter().all(u8::is_ascii_hexdigit) {
            return Err(protocol("expected 1 to 4 hex digits", frame));
        }
        // Left-pad to an even number of digits so `hex` can take it.
        let mut padded = [b'0'; 4];
        padded[4 - body.len()..].copy_from_slice(body);
        let mut bytes = [0u8; 2];
        hex::decode_to_slice(padded, &mut bytes).map_err(|e| protocol(&e.to_string(), frame))?;
        Ok(RegisterValue::from_be_bytes(bytes))
    }

    fn decode_ack(&self, frame: &[u8], body: &[u8]) -> Result<Ack> {
        if body == b"OK" {
            Ok(Ack::Accepted)
        } else if let Some(reason) = body.strip_prefix(b"ER") {
            let reason = String::from_utf8_lossy(reason).trim().to_string();
            Ok(Ack::Rejected(reason))
        } else {
            Err(protocol("expected OK or ER acknowledgement", frame))
        }
    }

    fn decode_version(&self, frame: &[u8], body: &[u8]) -> Result<VersionInfo> {
        let raw = core::str::from_utf8(body).map_err(|_| protocol("version is not UTF-8", frame))?;
        let start = raw
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| protocol("no version number", frame))?;
        let numeric: &str = raw[start..]
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or("");
        let parts = numeric
            .trim_end_matches('.')
            .split('.')
            .map(str::parse::<u16>)
            .collect::<core::result::Result<Vec<_>, _>>()
            .map_err(|_| protocol("malformed version number", frame))?;

        let (major, minor, build) = match parts.as_slice() {
            [major, minor] => (*major, *minor, 0),
            [major, minor, build] => (*major, *minor, *build),
            _ => return Err(protocol("expected major.minor[.build]", frame)),
        };
        Ok(VersionInfo {
            major,
            minor,
            build,
            raw: raw.to_string(),
        })
    }
}

impl FrameCodec for AsciiHexCodec {
    fn encode_read(&self, address: RegisterAddress) -> Vec<u8> {
        vec![b'R', b'R', address.get(), self.terminator()]
    }

    fn encode_write(&self, address: RegisterAddress, value: RegisterValue) -> Vec<u8> {
        let mut frame = vec![b'R', b'W', address.get()];
        frame.extend_from_slice(hex::encode_upper(value.to_be_bytes()).as_bytes());
        frame.push(self.terminator());
        frame
    }

    fn encode_version_query(&self) -> Vec<u8> {
        vec![b'V', b'V', self.terminator()]
    }

    fn decode_response(&self, kind: RequestKind, frame: &[u8]) -> Result<Response> {
        let body = self.body(frame)?;
        match kind {
            RequestKind::Read => self.decode_value(frame, body).map(Response::Value),
            RequestKind::Write => self.decode_ack(frame, body).map(Response::Ack),
            RequestKind::GetVersion => self.decode_version(frame, body).map(Response::Version),
        }
    }
}

fn trim(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let end = bytes.iter().rposition(|b| !b.is_ascii_whitespace()).map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn protocol(reason: &str, frame: &[u8]) -> Error {
    Error::Protocol {
        reason: reason.to_string(),
        frame: frame.to_vec(),
    }
}
