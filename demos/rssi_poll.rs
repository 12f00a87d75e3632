use std::env::args;
use std::process::exit;
use std::thread;
use std::time::Duration;
use uvk5::{bk4819, FrameCodec, PortSettings, RegisterClient};

fn main() {
    let args: Vec<_> = args().collect();
    if args.len() <= 1 {
        eprintln!("rssi_poll <serial port>");
        eprintln!("\tRead the RSSI register once a second and print the raw response.");
        exit(1);
    }

    let mut radio = RegisterClient::connect(&PortSettings::new(&args[1])).expect("Could not open device. Error");
    let frame = radio.codec().encode_read(bk4819::RSSI);

    loop {
        let response = radio.transact(&frame).expect("Could not talk to device. Error");
        println!("b\"{}\"", response.escape_ascii());
        thread::sleep(Duration::from_secs(1));
    }
}
