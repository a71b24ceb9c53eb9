use std::fs;

use fragline_frame::{EventKind, FrameFlags, FrameWriter, LogicalFrame, TypedEvent};
use fragline_transport::{UdpConfig, UdpTransport};
use tracing::info;

use crate::cmd::{parse_session, SendArgs};
use crate::exit::{frame_error, io_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_send_summary, OutputFormat, SendSummary};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let event = args.event.as_deref().map(parse_event).transpose()?;
    let frames = build_frames(&payload, &args, event)?;

    let mut config = parse_session(args.session.as_deref())?.payloader_config();
    if let Some(mtu) = args.mtu {
        config.mtu = mtu;
    }
    let mtu = config.mtu;

    let transport = UdpTransport::connect(args.bind, args.dest, UdpConfig::default())
        .map_err(|err| transport_error("connect failed", err))?;
    let mut writer = FrameWriter::with_config(transport, config)
        .map_err(|err| frame_error("invalid configuration", err))?;

    let mut summary = SendSummary {
        bytes: payload.len(),
        mtu,
        ..SendSummary::default()
    };
    for frame in &frames {
        summary.packets += writer
            .write_frame(frame)
            .map_err(|err| frame_error("send failed", err))?;
        summary.frames += 1;
    }

    info!(
        dest = %args.dest,
        frames = summary.frames,
        packets = summary.packets,
        "payload sent"
    );
    print_send_summary(&summary, format);
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

fn parse_event(input: &str) -> CliResult<TypedEvent> {
    let (kind, body) = input
        .split_once(':')
        .ok_or_else(|| CliError::new(USAGE, "--event must be KIND:BODY"))?;
    let kind: EventKind = kind
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("--event: {err}")))?;
    Ok(TypedEvent::new(kind, body))
}

fn build_frames(
    payload: &[u8],
    args: &SendArgs,
    event: Option<TypedEvent>,
) -> CliResult<Vec<LogicalFrame>> {
    let frame_size = match args.frame_size {
        Some(0) => return Err(CliError::new(USAGE, "--frame-size must be greater than zero")),
        Some(size) => size,
        None => payload.len().max(1),
    };

    let mut frames: Vec<LogicalFrame> = payload
        .chunks(frame_size)
        .enumerate()
        .map(|(index, chunk)| {
            let flags = if args.delta && index > 0 {
                FrameFlags::DELTA_UNIT
            } else {
                FrameFlags::empty()
            };
            LogicalFrame::new(chunk.to_vec())
                .with_flags(flags)
                .with_timestamp(args.timestamp_step.wrapping_mul(index as u32))
        })
        .collect();

    if let Some(event) = event {
        frames.push(LogicalFrame::event(event));
    }
    // A descriptor-only send still announces the format.
    if frames.is_empty() && args.descriptor.is_some() {
        frames.push(LogicalFrame::default());
    }
    if let (Some(descriptor), Some(first)) = (&args.descriptor, frames.first_mut()) {
        first.descriptor = Some(descriptor.as_str().into());
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        args: SendArgs,
    }

    fn args(extra: &[&str]) -> SendArgs {
        let mut argv = vec!["send", "127.0.0.1:5004"];
        argv.extend_from_slice(extra);
        Harness::try_parse_from(argv).unwrap().args
    }

    #[test]
    fn payload_is_split_into_frames() {
        let args = args(&["--frame-size", "4", "--delta", "--descriptor", "text/plain"]);
        let frames = build_frames(b"0123456789", &args, None).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[2].payload.as_ref(), b"89");
        assert_eq!(frames[0].descriptor.as_ref().unwrap().as_str(), "text/plain");
        assert!(frames[1].descriptor.is_none());
        assert!(frames[0].flags.is_empty());
        assert_eq!(frames[1].flags, FrameFlags::DELTA_UNIT);
        assert_eq!(frames[2].timestamp, 6000);
    }

    #[test]
    fn event_follows_payload() {
        let args = args(&[]);
        let event = parse_event("tag:title=x").unwrap();
        let frames = build_frames(b"abc", &args, Some(event)).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].event.as_ref().unwrap().kind, EventKind::Tag);
    }

    #[test]
    fn descriptor_without_payload_still_sends() {
        let args = args(&["--descriptor", "fmt"]);
        let frames = build_frames(b"", &args, None).unwrap();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload.is_empty());
    }

    #[test]
    fn rejects_bad_event_and_frame_size() {
        assert_eq!(parse_event("nocolon").unwrap_err().code, USAGE);
        assert_eq!(parse_event("eos:x").unwrap_err().code, USAGE);
        let args = args(&["--frame-size", "0"]);
        assert_eq!(build_frames(b"x", &args, None).unwrap_err().code, USAGE);
    }
}
