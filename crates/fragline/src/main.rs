//! `fragline`: send and receive self-describing media frames over UDP.
//!
//! `send` fragments one payload (or event) into MTU-sized datagrams,
//! `recv` reassembles them and reports each frame with its format, and
//! `session` prints the attributes both ends agree on up front.

mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "fragline",
    version,
    about = "Send and receive fragmented media frames over UDP",
    long_about = "Send and receive fragmented media frames over UDP.\n\n\
        Each frame is split into datagrams no larger than the MTU. A format \
        descriptor travels inline the first time it is used and is then \
        referenced by a 3-bit version. Tag and custom events ride in place \
        of a payload. A lost datagram costs only the frame it belongs to.",
    after_help = "Set FRAGLINE_LOG (e.g. fragline_frame=trace) for per-crate log levels."
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). Per-packet logs start at debug.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}
