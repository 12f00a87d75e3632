use std::env::args;
use std::process::exit;
use uvk5::{bk4819, PortSettings, RegisterClient};

fn main() {
    let args: Vec<_> = args().collect();
    if args.len() <= 1 {
        eprintln!("reg_set_get <serial port>");
        eprintln!("\tGet, modify, check, and restore the soft-mute register fields.");
        exit(1);
    }

    let mut radio = RegisterClient::connect(&PortSettings::new(&args[1])).expect("Could not open device. Error");
    println!(
        "Successfully connected. Version: {}",
        radio.get_fw_version()
            .expect("Could not read from device. Error:")
    );

    let field = bk4819::field_by_name("soft_mute_atten").unwrap();

    let prev = radio.get_field(field).unwrap();
    println!("Previous value: {:#x}", prev);

    let ack = radio.set_field(field, prev ^ field.max_value).unwrap();
    println!("Wrote new value: {:?}", ack);

    let new = radio.get_field(field).unwrap();
    println!("New value: {:#x}", new);

    radio.set_field(field, prev).unwrap();
    println!("Restored old value");
}
