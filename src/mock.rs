//! An in-memory [`Transport`] for testing and development.
//!
//! A `MockTransport` either plays back scripted responses, one per request
//! written, or simulates a radio with a bank of 256 registers that answers the
//! [`AsciiHexCodec`](crate::AsciiHexCodec) frames. A [`MockHandle`] shares the
//! mock's state so tests can inspect traffic after the transport has been moved
//! into a client, or after the client has been dropped.

use crate::registers::RegisterValue;
use crate::transport::Transport;
use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

enum Mode {
    Scripted(VecDeque<Vec<u8>>),
    Simulated(Radio),
}

struct Radio {
    registers: [RegisterValue; 256],
    firmware: String,
    read_only: Vec<u8>,
}

impl Radio {
    fn answer(&mut self, request: &[u8]) -> Option<Vec<u8>> {
        match request {
            [b'R', b'R', address, b';'] => {
                Some(format!("{:04X};", self.registers[*address as usize]).into_bytes())
            }
            [b'R', b'W', address, digits @ .., b';'] if digits.len() == 4 => {
                if self.read_only.contains(address) {
                    return Some(b"ER read-only;".to_vec());
                }
                let mut value = [0u8; 2];
                if hex::decode_to_slice(digits, &mut value).is_err() {
                    return Some(b"ER bad value;".to_vec());
                }
                self.registers[*address as usize] = RegisterValue::from_be_bytes(value);
                Some(b"OK;".to_vec())
            }
            b"VV;" => Some(format!("{};", self.firmware).into_bytes()),
            // Unknown commands are ignored by the firmware.
            _ => None,
        }
    }
}

struct State {
    mode: Mode,
    pending: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    open: bool,
    close_calls: usize,
    discards: usize,
    fail_next_write: Option<io::ErrorKind>,
}

/// An in-memory transport. See the [module documentation](self).
pub struct MockTransport {
    state: Rc<RefCell<State>>,
}

/// Shared view of a [`MockTransport`]'s state.
#[derive(Clone)]
pub struct MockHandle {
    state: Rc<RefCell<State>>,
}

impl MockTransport {
    fn with_mode(mode: Mode) -> Self {
        Self {
            state: Rc::new(RefCell::new(State {
                mode,
                pending: VecDeque::new(),
                written: Vec::new(),
                open: true,
                close_calls: 0,
                discards: 0,
                fail_next_write: None,
            })),
        }
    }

    /// A transport that answers the n-th request with the n-th response.
    ///
    /// Once the script runs out, requests go unanswered and reads time out.
    pub fn scripted<I, B>(responses: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let script = responses.into_iter().map(|r| r.as_ref().to_vec()).collect();
        Self::with_mode(Mode::Scripted(script))
    }

    /// A transport backed by a simulated radio whose registers all read zero.
    pub fn simulated<S: Into<String>>(firmware: S) -> Self {
        Self::with_mode(Mode::Simulated(Radio {
            registers: [0; 256],
            firmware: firmware.into(),
            read_only: Vec::new(),
        }))
    }

    /// Preload a register of the simulated radio. No effect on a scripted mock.
    pub fn with_register(self, address: u8, value: RegisterValue) -> Self {
        if let Mode::Simulated(radio) = &mut self.state.borrow_mut().mode {
            radio.registers[address as usize] = value;
        }
        self
    }

    /// Make the simulated radio reject writes to `address`.
    pub fn with_read_only(self, address: u8) -> Self {
        if let Mode::Simulated(radio) = &mut self.state.borrow_mut().mode {
            radio.read_only.push(address);
        }
        self
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Rc::clone(&self.state),
        }
    }
}

impl MockHandle {
    /// Every frame written so far, in order.
    pub fn written(&self) -> Vec<Vec<u8>> {
        self.state.borrow().written.clone()
    }

    pub fn close_calls(&self) -> usize {
        self.state.borrow().close_calls
    }

    pub fn discards(&self) -> usize {
        self.state.borrow().discards
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    /// Queue unsolicited bytes, as if they arrived late from an earlier request.
    pub fn inject(&self, bytes: &[u8]) {
        self.state.borrow_mut().pending.extend(bytes);
    }

    /// Make the next `write_all` fail with an I/O error of this kind.
    pub fn fail_next_write(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().fail_next_write = Some(kind);
    }

    /// Current value of a simulated register, or `None` for a scripted mock.
    pub fn register(&self, address: u8) -> Option<RegisterValue> {
        match &self.state.borrow().mode {
            Mode::Simulated(radio) => Some(radio.registers[address as usize]),
            Mode::Scripted(_) => None,
        }
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(Error::Closed);
        }
        if let Some(kind) = state.fail_next_write.take() {
            return Err(io::Error::from(kind).into());
        }
        state.written.push(bytes.to_vec());
        let reply = match &mut state.mode {
            Mode::Scripted(script) => script.pop_front(),
            Mode::Simulated(radio) => radio.answer(bytes),
        };
        if let Some(reply) = reply {
            state.pending.extend(reply);
        }
        Ok(())
    }

    fn read_until(&mut self, terminator: u8) -> Result<Vec<u8>> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(Error::Closed);
        }
        let len = match state.pending.iter().position(|&b| b == terminator) {
            Some(end) => end + 1,
            // Nothing more is coming: this is where a real port would time out.
            None => state.pending.len(),
        };
        Ok(state.pending.drain(..len).collect())
    }

    fn discard_input(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.pending.clear();
        state.discards += 1;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        state.close_calls += 1;
        state.open = false;
    }

    fn is_open(&self) -> bool {
        self.state.borrow().open
    }
}
