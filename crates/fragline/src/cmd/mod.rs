use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use fragline_frame::{SessionDescription, DEFAULT_MAX_FRAME_SIZE};

use crate::exit::{frame_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod recv;
pub mod send;
pub mod session;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fragment a payload into frames and send it over UDP.
    Send(SendArgs),
    /// Receive, reassemble and print frames and events.
    Recv(RecvArgs),
    /// Render or parse a session description.
    Session(SessionArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Recv(args) => recv::run(args, format),
        Command::Session(args) => session::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Destination address.
    pub dest: SocketAddr,
    /// Local address to send from.
    #[arg(long, default_value = "0.0.0.0:0")]
    pub bind: SocketAddr,
    /// Raw string payload.
    #[arg(long, conflicts_with = "file")]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with = "data")]
    pub file: Option<PathBuf>,
    /// Format descriptor announced in-band with the first frame.
    #[arg(long)]
    pub descriptor: Option<String>,
    /// Session attribute string (caps=...;mtu=...) agreed out of band.
    #[arg(long, value_name = "ATTRS")]
    pub session: Option<String>,
    /// Maximum packet size, header included. Overrides the session MTU.
    #[arg(long)]
    pub mtu: Option<usize>,
    /// Split the payload into frames of this many bytes.
    #[arg(long)]
    pub frame_size: Option<usize>,
    /// Mark every frame after the first as a delta unit.
    #[arg(long)]
    pub delta: bool,
    /// Send an event after the payload, as KIND:BODY (tag, custom-downstream, custom-both).
    #[arg(long, value_name = "KIND:BODY")]
    pub event: Option<String>,
    /// Timestamp increment between frames, in clock-rate ticks.
    #[arg(long, default_value = "3000")]
    pub timestamp_step: u32,
}

#[derive(Args, Debug)]
pub struct RecvArgs {
    /// Local address to bind.
    pub bind: SocketAddr,
    /// Session attribute string (caps=...;mtu=...) agreed out of band.
    #[arg(long, value_name = "ATTRS")]
    pub session: Option<String>,
    /// Exit after receiving N frames or events.
    #[arg(long)]
    pub count: Option<usize>,
    /// Give up when nothing arrives for this long (e.g. 5s, 500ms).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Largest frame accepted for reassembly, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
    /// Print reassembly counters on exit.
    #[arg(long)]
    pub stats: bool,
}

#[derive(Args, Debug)]
pub struct SessionArgs {
    /// Format descriptor for version 0.
    #[arg(long, conflicts_with = "parse")]
    pub descriptor: Option<String>,
    /// Maximum packet size, header included.
    #[arg(long, default_value_t = fragline_frame::DEFAULT_MTU)]
    pub mtu: usize,
    /// Clock rate of the carrier timestamps.
    #[arg(long, default_value_t = fragline_transport::DEFAULT_CLOCK_RATE)]
    pub clock_rate: u32,
    /// Parse an existing attribute string instead of building one.
    #[arg(long, value_name = "ATTRS")]
    pub parse: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_session(attrs: Option<&str>) -> CliResult<SessionDescription> {
    match attrs {
        Some(attrs) => SessionDescription::from_attributes(attrs)
            .map_err(|err| frame_error("invalid --session", err)),
        None => Ok(SessionDescription::default()),
    }
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    if millis {
        Ok(Duration::from_millis(value))
    } else {
        Ok(Duration::from_secs(value))
    }
}
