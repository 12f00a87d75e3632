use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use log::{info, warn};
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::thread;
use uvk5::{
    bk4819, rssi_to_dbm, Ack, Config, FrameCodec, Monitor, RegisterAddress, RegisterClient, RegisterField,
};

/// Read and write BK4819 registers on a UV-K5 over its programming cable.
#[derive(Parser)]
#[command(name = "regmon", version)]
struct Cli {
    /// TOML file with [port] and [monitor] sections.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Serial device, e.g. /dev/ttyUSB0.
    #[arg(short, long)]
    port: Option<String>,
    #[arg(short, long)]
    baud: Option<u32>,
    /// Read timeout in seconds.
    #[arg(short, long)]
    timeout: Option<f64>,
    /// -v for debug output, -vv to trace every frame.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the firmware version.
    Version,
    /// Read one register.
    Get {
        #[arg(value_parser = parse_number::<u8>)]
        register: u8,
    },
    /// Write one register.
    Set {
        #[arg(value_parser = parse_number::<u8>)]
        register: u8,
        #[arg(value_parser = parse_number::<u16>)]
        value: u16,
    },
    /// Read, or with a value write, a named register field.
    Field {
        name: String,
        #[arg(value_parser = parse_number::<u16>)]
        value: Option<u16>,
    },
    /// Move a named field one step up, or with --down one step down.
    Step {
        name: String,
        #[arg(long)]
        down: bool,
    },
    /// List the named register fields.
    Fields,
    /// Poll registers until interrupted.
    Watch {
        /// Registers to poll; defaults to the config file's list.
        #[arg(value_parser = parse_number::<u8>)]
        registers: Vec<u8>,
        /// Milliseconds between polls.
        #[arg(short, long)]
        interval: Option<u64>,
        /// Stop after this many polls.
        #[arg(short = 'n', long)]
        count: Option<u64>,
        /// Print the undecoded response frames.
        #[arg(long)]
        raw: bool,
    },
}

/// Accept `0x`-prefixed hex or plain decimal.
fn parse_number<T: TryFrom<u32>>(text: &str) -> Result<T, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => text.parse::<u32>(),
    }
    .map_err(|e| format!("{}: {}", text, e))?;
    T::try_from(parsed).map_err(|_| format!("{} is out of range", text))
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(port) = &cli.port {
        config.port.port = port.clone();
    }
    if let Some(baud) = cli.baud {
        config.port.baud_rate = baud;
    }
    if let Some(timeout) = cli.timeout {
        config.port.read_timeout_seconds = timeout;
    }
    config.port.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let config = load_config(&cli)?;
    run(cli.command, config)
}

fn connect(config: &Config) -> anyhow::Result<RegisterClient> {
    let client = RegisterClient::connect(&config.port)
        .with_context(|| format!("connecting to {}", config.port.port))?;
    info!("connected to {} at {} baud", config.port.port, config.port.baud_rate);
    Ok(client)
}

fn lookup_field(name: &str) -> anyhow::Result<&'static RegisterField> {
    match bk4819::field_by_name(name) {
        Some(field) => Ok(field),
        None => bail!("unknown field {:?}; see `regmon fields`", name),
    }
}

fn print_fields() {
    for field in bk4819::FIELDS {
        let width = u16::BITS - field.max_value.leading_zeros();
        let low = u32::from(field.offset);
        println!(
            "{:<24} {} bits {}..={} max {:#x} step {}",
            field.name,
            field.address,
            low,
            low + width.saturating_sub(1),
            field.max_value,
            field.step
        );
    }
}

/// Only `fields` runs without a radio attached.
fn run(command: Command, mut config: Config) -> anyhow::Result<()> {
    match command {
        Command::Fields => print_fields(),
        Command::Version => {
            let version = connect(&config)?.get_fw_version()?;
            println!("{} ({})", version, version.raw);
        }
        Command::Get { register } => {
            let value = connect(&config)?.get_reg(register)?;
            println!("{} = {:#06x} ({})", RegisterAddress::new(register), value, value);
        }
        Command::Set { register, value } => match connect(&config)?.set_reg(register, value)? {
            Ack::Accepted => println!("{} <- {:#06x}", RegisterAddress::new(register), value),
            Ack::Rejected(reason) => bail!("write to {} rejected: {}", RegisterAddress::new(register), reason),
        },
        Command::Step { name, down } => {
            let field = lookup_field(&name)?;
            match connect(&config)?.adjust_field(field, !down)? {
                (value, Ack::Accepted) => println!("{} = {:#x} ({})", field.name, value, value),
                (_, Ack::Rejected(reason)) => bail!("write to {} rejected: {}", field.name, reason),
            }
        }
        Command::Field { name, value } => {
            let field = lookup_field(&name)?;
            let mut client = connect(&config)?;
            if let Some(value) = value {
                if let Ack::Rejected(reason) = client.set_field(field, value)? {
                    bail!("write to {} rejected: {}", field.name, reason);
                }
            }
            let current = client.get_field(field)?;
            println!("{} = {:#x} ({})", field.name, current, current);
        }
        Command::Watch {
            registers,
            interval,
            count,
            raw,
        } => {
            if !registers.is_empty() {
                config.monitor.registers = registers;
            }
            if let Some(interval) = interval {
                config.monitor.interval_ms = interval;
            }
            if count.is_some() {
                config.monitor.iterations = count;
            }
            let mut client = connect(&config)?;
            if raw {
                watch_raw(&mut client, &config)?;
            } else {
                watch(&mut client, &config)?;
            }
        }
    }
    Ok(())
}

fn watch(client: &mut RegisterClient, config: &Config) -> anyhow::Result<()> {
    let mut fatal = None;
    Monitor::new(config.monitor.clone()).run(client, |address, result| match result {
        Ok(value) if address == bk4819::RSSI => {
            println!("{} = {:#06x} ({} dBm)", address, value, rssi_to_dbm(value));
            ControlFlow::Continue(())
        }
        Ok(value) => {
            println!("{} = {:#06x} ({})", address, value, value);
            ControlFlow::Continue(())
        }
        Err(e) if e.is_recoverable() => {
            warn!("reading {}: {}", address, e);
            ControlFlow::Continue(())
        }
        Err(e) => {
            fatal = Some(e);
            ControlFlow::Break(())
        }
    })?;
    match fatal {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

/// Send read frames and print whatever comes back, complete or not.
fn watch_raw(client: &mut RegisterClient, config: &Config) -> anyhow::Result<()> {
    let mut polls = 0;
    while config.monitor.iterations.map_or(true, |limit| polls < limit) {
        polls += 1;
        for &register in &config.monitor.registers {
            let frame = client.codec().encode_read(RegisterAddress::new(register));
            let response = client.transact(&frame)?;
            println!("b\"{}\"", response.escape_ascii());
        }
        thread::sleep(config.monitor.interval());
    }
    Ok(())
}
