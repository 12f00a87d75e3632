use crate::codec::{Ack, AsciiHexCodec, FrameCodec, Request, Response, VersionInfo};
use crate::config::PortSettings;
use crate::registers::{bk4819, rssi_to_dbm, RegisterAddress, RegisterField, RegisterValue};
use crate::transport::{SerialTransport, Transport};
use crate::{Error, Result};

/// A handle to the register-access link of a UV-K5 radio.
///
/// The client owns its transport exclusively and closes it exactly once, either
/// through [`close`](Self::close) or when the client is dropped, so the port is
/// released on every exit path. Each operation sends one request and blocks
/// until its response arrives or the transport's read timeout elapses. Nothing
/// is cached and nothing is retried.
pub struct RegisterClient<T: Transport = SerialTransport, C: FrameCodec = AsciiHexCodec> {
    transport: T,
    codec: C,
    closed: bool,
}

impl RegisterClient {
    /// Open the radio at the given port with the default wire format.
    ///
    /// No handshake is performed; call [`get_fw_version`](Self::get_fw_version)
    /// to check that something is answering.
    ///
    /// Settings are checked before any device is touched: a zero baud rate or a
    /// non-positive timeout fails with [`Error::Config`]. A device that cannot
    /// be opened fails with [`Error::ConnectionFailed`].
    pub fn connect(settings: &PortSettings) -> Result<Self> {
        Self::with_codec(settings, AsciiHexCodec)
    }
}

impl<C: FrameCodec> RegisterClient<SerialTransport, C> {
    /// Open the radio at the given port, speaking the wire format of `codec`.
    pub fn with_codec(settings: &PortSettings, codec: C) -> Result<Self> {
        let transport = SerialTransport::open(settings)?;
        Ok(Self::new(transport, codec))
    }
}

impl<T: Transport, C: FrameCodec> RegisterClient<T, C> {
    /// Use an already open transport.
    pub fn new(transport: T, codec: C) -> Self {
        Self {
            transport,
            codec,
            closed: false,
        }
    }

    /// Send a raw frame and return the raw response, terminator included.
    ///
    /// A response that timed out comes back short or empty rather than as an
    /// error; only I/O failures are errors here.
    pub fn transact(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::Closed);
        }
        self.transport.discard_input()?;
        self.transport.write_all(frame)?;
        self.transport.read_until(self.codec.terminator())
    }

    /// Returns the decoded response along with the reply it came from.
    fn exchange(&mut self, request: Request) -> Result<(Response, Vec<u8>)> {
        let frame = self.codec.encode(&request);
        let reply = self.transact(&frame)?;
        let response = self.codec.decode_response(request.kind(), &reply)?;
        Ok((response, reply))
    }

    /// Query the firmware for its version.
    pub fn get_fw_version(&mut self) -> Result<VersionInfo> {
        match self.exchange(Request::GetVersion)? {
            (Response::Version(version), _) => Ok(version),
            (other, reply) => Err(unexpected("version", other, reply)),
        }
    }

    /// Read one register.
    pub fn get_reg<A: Into<RegisterAddress>>(&mut self, address: A) -> Result<RegisterValue> {
        match self.exchange(Request::Read(address.into()))? {
            (Response::Value(value), _) => Ok(value),
            (other, reply) => Err(unexpected("register value", other, reply)),
        }
    }

    /// Write one register.
    ///
    /// A write the firmware refuses is not an error: it comes back as
    /// [`Ack::Rejected`].
    pub fn set_reg<A: Into<RegisterAddress>>(&mut self, address: A, value: RegisterValue) -> Result<Ack> {
        match self.exchange(Request::Write(address.into(), value))? {
            (Response::Ack(ack), _) => Ok(ack),
            (other, reply) => Err(unexpected("acknowledgement", other, reply)),
        }
    }

    /// Read the register holding `field` and extract it.
    pub fn get_field(&mut self, field: &RegisterField) -> Result<RegisterValue> {
        Ok(field.extract(self.get_reg(field.address)?))
    }

    /// Change `field` while preserving the other bits of its register.
    ///
    /// This is a read followed by a write; nothing stops the firmware from
    /// changing the register in between.
    pub fn set_field(&mut self, field: &RegisterField, value: RegisterValue) -> Result<Ack> {
        if value > field.max_value {
            return Err(Error::FieldOverflow {
                field: field.name,
                value,
                max: field.max_value,
            });
        }
        let current = self.get_reg(field.address)?;
        self.set_reg(field.address, field.insert(current, value))
    }

    /// Move `field` one [`step`](RegisterField::step) up or down, the way the
    /// firmware's register menu does.
    ///
    /// At either end of the field's range a step that would overshoot is not
    /// taken, but the register is still written back. Returns the field value
    /// that was written and the firmware's answer.
    pub fn adjust_field(&mut self, field: &RegisterField, up: bool) -> Result<(RegisterValue, Ack)> {
        let current = self.get_reg(field.address)?;
        let value = field.stepped(field.extract(current), up);
        let ack = self.set_reg(field.address, field.insert(current, value))?;
        Ok((value, ack))
    }

    /// Current received signal strength in dBm.
    pub fn rssi_dbm(&mut self) -> Result<i16> {
        Ok(rssi_to_dbm(self.get_reg(bk4819::RSSI)?))
    }

    /// Close the transport. Later operations fail with [`Error::Closed`].
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.close();
        }
    }

    pub fn is_open(&self) -> bool {
        !self.closed && self.transport.is_open()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

impl<T: Transport, C: FrameCodec> Drop for RegisterClient<T, C> {
    fn drop(&mut self) {
        self.close();
    }
}

fn unexpected(wanted: &str, got: Response, frame: Vec<u8>) -> Error {
    Error::Protocol {
        reason: format!("expected a {}, decoded {:?}", wanted, got),
        frame,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RequestKind;
    use crate::mock::MockTransport;
    use crate::PortSettings;

    fn client(mock: MockTransport) -> RegisterClient<MockTransport> {
        RegisterClient::new(mock, AsciiHexCodec)
    }

    #[test]
    fn get_reg_sends_one_read_frame() {
        let mock = MockTransport::scripted(["0103;"]);
        let handle = mock.handle();
        let mut radio = client(mock);

        assert_eq!(radio.get_reg(0x67u8).unwrap(), 0x0103);
        assert_eq!(handle.written(), vec![b"RR\x67;".to_vec()]);
    }

    #[test]
    fn every_address_is_framed_verbatim() {
        let mock = MockTransport::simulated("1.0");
        let handle = mock.handle();
        let mut radio = client(mock);
        for address in 0..=255u8 {
            assert_eq!(radio.get_reg(address).unwrap(), 0);
        }
        let written = handle.written();
        assert_eq!(written.len(), 256);
        for (address, frame) in written.iter().enumerate() {
            assert_eq!(frame, &[b'R', b'R', address as u8, b';']);
        }
    }

    #[test]
    fn repeated_reads_are_separate_round_trips() {
        let mock = MockTransport::scripted(["0001;", "0002;"]);
        let handle = mock.handle();
        let mut radio = client(mock);

        assert_eq!(radio.get_reg(0x65u8).unwrap(), 1);
        assert_eq!(radio.get_reg(0x65u8).unwrap(), 2);
        assert_eq!(handle.written().len(), 2);
    }

    #[test]
    fn write_then_read_round_trips_on_simulated_radio() {
        let mut radio = client(MockTransport::simulated("1.0"));
        assert_eq!(radio.set_reg(0x37u8, 0x160F).unwrap(), Ack::Accepted);
        assert_eq!(radio.get_reg(0x37u8).unwrap(), 0x160F);
    }

    #[test]
    fn rejected_write_is_not_an_error() {
        let mut radio = client(MockTransport::simulated("1.0").with_read_only(0x00));
        let ack = radio.set_reg(0x00u8, 0x1234).unwrap();
        assert!(!ack.is_accepted());
        assert_eq!(ack, Ack::Rejected("read-only".to_string()));
    }

    #[test]
    fn silence_is_a_timeout() {
        let mut radio = client(MockTransport::scripted(Vec::<&str>::new()));
        assert!(matches!(radio.get_reg(0x67u8), Err(Error::Timeout { received }) if received.is_empty()));
    }

    #[test]
    fn garbage_is_a_protocol_error_and_link_survives() {
        let mut radio = client(MockTransport::scripted(["garbage;", "00FF;"]));
        let err = radio.get_reg(0x67u8).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.is_recoverable());
        assert_eq!(radio.get_reg(0x67u8).unwrap(), 0xFF);
    }

    #[test]
    fn stale_bytes_are_discarded_before_each_request() {
        let mock = MockTransport::scripted(["0042;"]);
        let handle = mock.handle();
        let mut radio = client(mock);

        handle.inject(b"0BAD;");
        assert_eq!(radio.get_reg(0x67u8).unwrap(), 0x42);
        assert_eq!(handle.discards(), 1);
    }

    #[test]
    fn version() {
        let mut radio = client(MockTransport::simulated("OEFW-2.1.27"));
        let version = radio.get_fw_version().unwrap();
        assert_eq!((version.major, version.minor, version.build), (2, 1, 27));
    }

    #[test]
    fn fields_are_read_modify_write() {
        let agc_idx = bk4819::field_by_name("agc_idx").unwrap();
        let mock = MockTransport::simulated("1.0").with_register(0x7E, 0x8005);
        let handle = mock.handle();
        let mut radio = client(mock);

        assert_eq!(radio.get_field(agc_idx).unwrap(), 0);
        assert!(radio.set_field(agc_idx, 0b101).unwrap().is_accepted());
        assert_eq!(handle.register(0x7E), Some(0xD005));
        assert_eq!(radio.get_field(agc_idx).unwrap(), 0b101);

        assert!(matches!(
            radio.set_field(agc_idx, 8),
            Err(Error::FieldOverflow { max: 0b111, .. })
        ));
    }

    #[test]
    fn rssi_reads_register_0x67() {
        let mock = MockTransport::scripted(["0064;"]);
        let handle = mock.handle();
        let mut radio = client(mock);
        assert_eq!(radio.rssi_dbm().unwrap(), -110);
        assert_eq!(handle.written(), vec![b"RR\x67;".to_vec()]);
    }

    #[test]
    fn close_is_idempotent_and_final() {
        let mock = MockTransport::simulated("1.0");
        let handle = mock.handle();
        let mut radio = client(mock);

        radio.close();
        radio.close();
        assert!(!radio.is_open());
        assert!(matches!(radio.get_reg(0x67u8), Err(Error::Closed)));
        drop(radio);
        assert_eq!(handle.close_calls(), 1);
    }

    #[test]
    fn transport_closed_once_when_an_operation_fails() {
        let mock = MockTransport::scripted(["nope;"]);
        let handle = mock.handle();
        let result = (|| -> Result<RegisterValue> {
            let mut radio = client(mock);
            radio.get_reg(0x67u8)
        })();
        assert!(result.is_err());
        assert!(!handle.is_open());
        assert_eq!(handle.close_calls(), 1);
    }

    #[test]
    fn write_failure_is_a_transport_error() {
        let mock = MockTransport::simulated("1.0");
        mock.handle().fail_next_write(std::io::ErrorKind::BrokenPipe);
        let mut radio = client(mock);
        let err = radio.get_reg(0x67u8).unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(!err.is_recoverable());
    }

    struct EchoValueCodec;

    impl FrameCodec for EchoValueCodec {
        fn encode_read(&self, address: RegisterAddress) -> Vec<u8> {
            vec![b'r', address.get(), b';']
        }
        fn encode_write(&self, address: RegisterAddress, value: RegisterValue) -> Vec<u8> {
            let [hi, lo] = value.to_be_bytes();
            vec![b'w', address.get(), hi, lo, b';']
        }
        fn encode_version_query(&self) -> Vec<u8> {
            b"v;".to_vec()
        }
        fn decode_response(&self, _kind: RequestKind, _frame: &[u8]) -> Result<Response> {
            Ok(Response::Value(7))
        }
    }

    #[test]
    fn codec_is_pluggable() {
        let mock = MockTransport::scripted(["x;", "x;"]);
        let handle = mock.handle();
        let mut radio = RegisterClient::new(mock, EchoValueCodec);

        assert_eq!(radio.get_reg(0x10u8).unwrap(), 7);
        match radio.get_fw_version() {
            Err(Error::Protocol { frame, .. }) => assert_eq!(frame, b"x;"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(handle.written(), vec![b"r\x10;".to_vec(), b"v;".to_vec()]);
    }

    #[test]
    fn adjust_field_steps_within_bounds() {
        let lna = bk4819::field_by_name("lna").unwrap();
        let mock = MockTransport::simulated("1.0").with_register(0x13, 0x03DE);
        let handle = mock.handle();
        let mut radio = client(mock);

        // 0x03DE holds lna = 0b110; the other bits must survive every step.
        assert_eq!(radio.adjust_field(lna, true).unwrap(), (0b111, Ack::Accepted));
        assert_eq!(handle.register(0x13), Some(0x03FE));
        assert_eq!(radio.adjust_field(lna, true).unwrap(), (0b111, Ack::Accepted));
        assert_eq!(handle.register(0x13), Some(0x03FE));

        radio.set_field(lna, 1).unwrap();
        assert_eq!(radio.adjust_field(lna, false).unwrap().0, 0);
        assert_eq!(radio.adjust_field(lna, false).unwrap().0, 0);
        assert_eq!(handle.register(0x13), Some(0x031E));
    }

    #[test]
    fn adjust_field_uses_the_field_step() {
        let intermediate = bk4819::field_by_name("if").unwrap();
        let mock = MockTransport::simulated("1.0").with_register(0x3D, 0x2AAA);
        let handle = mock.handle();
        let mut radio = client(mock);

        assert_eq!(radio.adjust_field(intermediate, true).unwrap().0, 0x5554);
        assert_eq!(radio.adjust_field(intermediate, false).unwrap().0, 0x2AAA);
        assert_eq!(radio.adjust_field(intermediate, false).unwrap().0, 0);
        assert_eq!(radio.adjust_field(intermediate, false).unwrap().0, 0);
        assert_eq!(handle.register(0x3D), Some(0));
    }

    #[test]
    fn boxed_transport_can_be_chosen_at_runtime() {
        let mock = MockTransport::simulated("1.0").with_register(0x67, 0x0103);
        let handle = mock.handle();
        let transport: Box<dyn Transport> = Box::new(mock);
        let mut radio = RegisterClient::new(transport, AsciiHexCodec);

        assert_eq!(radio.get_reg(0x67u8).unwrap(), 0x0103);
        assert!(radio.is_open());
        drop(radio);
        assert_eq!(handle.close_calls(), 1);
    }

    #[test]
    fn connect_rejects_bad_settings_before_opening() {
        let settings = PortSettings {
            baud_rate: 0,
            ..PortSettings::new("/dev/uvk5-not-there")
        };
        assert!(matches!(RegisterClient::connect(&settings), Err(Error::Config(_))));

        let settings = PortSettings::new("/dev/uvk5-not-there");
        assert!(matches!(RegisterClient::connect(&settings), Err(Error::ConnectionFailed(_))));
    }
}
