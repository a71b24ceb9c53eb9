use fragline_frame::SessionDescription;

use crate::cmd::{parse_session, SessionArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_session, OutputFormat};

pub fn run(args: SessionArgs, format: OutputFormat) -> CliResult<i32> {
    let session = match args.parse.as_deref() {
        Some(attrs) => parse_session(Some(attrs))?,
        None => SessionDescription {
            descriptor: args.descriptor,
            mtu: args.mtu,
            clock_rate: args.clock_rate,
        },
    };

    print_session(&session, format);
    Ok(SUCCESS)
}
