use std::ops::ControlFlow;
use uvk5::{
    bk4819, Ack, AsciiHexCodec, Config, Error, MockTransport, Monitor, RegisterAddress, RegisterClient,
};

#[test]
fn reads_rssi_like_the_polling_script() {
    let mock = MockTransport::scripted(["0103;"]);
    let handle = mock.handle();
    let mut radio = RegisterClient::new(mock, AsciiHexCodec);

    let raw = radio.get_reg(bk4819::RSSI).unwrap();
    assert_eq!(raw, 0x0103);
    assert_eq!(uvk5::rssi_to_dbm(raw), -31);
    assert_eq!(handle.written(), vec![b"RR\x67;".to_vec()]);
}

#[test]
fn every_write_reads_back_on_a_simulated_radio() {
    let mut radio = RegisterClient::new(MockTransport::simulated("OEFW-2.1.27"), AsciiHexCodec);
    for (address, value) in [(0x00u8, 0x4819u16), (0x30, 0xBFF1), (0x3B, 0x003B), (0xFF, 0xFFFF)] {
        assert_eq!(radio.set_reg(address, value).unwrap(), Ack::Accepted);
        assert_eq!(radio.get_reg(address).unwrap(), value);
    }
}

#[test]
fn client_releases_transport_when_scope_exits_with_an_error() {
    fn read_once(mock: MockTransport) -> uvk5::Result<u16> {
        let mut radio = RegisterClient::new(mock, AsciiHexCodec);
        let value = radio.get_reg(RegisterAddress::new(0x67))?;
        Ok(value)
    }

    let mock = MockTransport::scripted(Vec::<&str>::new());
    let handle = mock.handle();
    assert!(matches!(read_once(mock), Err(Error::Timeout { .. })));
    assert_eq!(handle.close_calls(), 1);
    assert!(!handle.is_open());
}

#[test]
fn partial_frame_is_a_timeout_not_a_value() {
    let mut radio = RegisterClient::new(MockTransport::scripted(["01"]), AsciiHexCodec);
    match radio.get_reg(bk4819::RSSI) {
        Err(Error::Timeout { received }) => assert_eq!(received, b"01"),
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn monitor_driven_by_a_config_file() {
    let config = Config::from_toml_str(
        "[monitor]\ninterval_ms = 0\nregisters = [0x67, 0x63]\niterations = 2\n",
    )
    .unwrap();
    let mock = MockTransport::simulated("1.0")
        .with_register(0x67, 200)
        .with_register(0x63, 7);
    let mut radio = RegisterClient::new(mock, AsciiHexCodec);

    let mut readings = Vec::new();
    let polls = Monitor::new(config.monitor)
        .run(&mut radio, |address, value| {
            readings.push((address, value.unwrap()));
            ControlFlow::Continue(())
        })
        .unwrap();

    assert_eq!(polls, 2);
    assert_eq!(
        readings,
        vec![
            (bk4819::RSSI, 200),
            (bk4819::GLITCH, 7),
            (bk4819::RSSI, 200),
            (bk4819::GLITCH, 7),
        ]
    );
}
