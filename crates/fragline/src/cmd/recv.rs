use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fragline_frame::{FrameError, FrameReader};
use fragline_transport::{TransportError, UdpConfig, UdpTransport};
use tracing::info;

use crate::cmd::{parse_duration, parse_session, RecvArgs};
use crate::exit::{frame_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, TIMEOUT};
use crate::output::{print_reassembled, print_stats, OutputFormat};

/// How often a blocked receive wakes up to check for Ctrl-C.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: RecvArgs, format: OutputFormat) -> CliResult<i32> {
    let idle_timeout = args.timeout.as_deref().map(parse_duration).transpose()?;
    let mut config = parse_session(args.session.as_deref())?.depayloader_config();
    config.max_frame_size = args.max_frame_size;

    let transport = UdpTransport::bind_with_config(
        args.bind,
        UdpConfig {
            read_timeout: Some(POLL_INTERVAL),
            ..UdpConfig::default()
        },
    )
    .map_err(|err| transport_error("bind failed", err))?;
    let local = transport
        .local_addr()
        .map_err(|err| transport_error("bind failed", err))?;
    info!(%local, "receiving");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut reader = FrameReader::with_config(transport, config);
    let mut printed = 0usize;
    let mut last_activity = Instant::now();

    while running.load(Ordering::SeqCst) {
        let out = match reader.read() {
            Ok(out) => out,
            Err(err) if is_poll_timeout(&err) => {
                if idle_timeout.is_some_and(|limit| last_activity.elapsed() >= limit) {
                    finish(&reader, &args, format);
                    return Err(CliError::new(TIMEOUT, "receive timed out"));
                }
                continue;
            }
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        last_activity = Instant::now();
        print_reassembled(&out, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    finish(&reader, &args, format);
    Ok(SUCCESS)
}

fn finish(reader: &FrameReader<UdpTransport>, args: &RecvArgs, format: OutputFormat) {
    let stats = reader.stats();
    info!(
        packets = stats.packets,
        frames = stats.frames,
        events = stats.events,
        dropped = stats.dropped(),
        "receive finished"
    );
    if args.stats {
        print_stats(stats, format);
    }
}

fn is_poll_timeout(err: &FrameError) -> bool {
    matches!(
        err,
        FrameError::Transport(TransportError::Io(io))
            if matches!(io.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
    )
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
