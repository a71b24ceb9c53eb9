//! stderr logging for the `fragline` binary.
//!
//! `--log-level` sets the floor for every crate. The framing and transport
//! crates log each packet at debug and each fragment at trace, so
//! `FRAGLINE_LOG` can raise (or silence) one layer without flooding the
//! rest, e.g. `FRAGLINE_LOG=fragline_frame=trace`.

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Environment variable holding per-crate log directives.
pub const LOG_ENV: &str = "FRAGLINE_LOG";

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    /// Adds one line per datagram sent or received.
    Debug,
    /// Adds one line per fragment accepted.
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

/// Build the target filter from the CLI level and optional directives.
///
/// Directives use the `target=level` list syntax. Unparseable directives
/// are ignored with a note on stderr so a typo never stops a transfer.
fn build_filter(level: LogLevel, directives: Option<&str>) -> Targets {
    let base = Targets::new().with_default(level.as_filter());
    let Some(directives) = directives.map(str::trim).filter(|d| !d.is_empty()) else {
        return base;
    };

    match directives.parse::<Targets>() {
        Ok(extra) => base.with_targets(extra),
        Err(err) => {
            eprintln!("warning: ignoring {LOG_ENV}={directives:?}: {err}");
            base
        }
    }
}

/// Send library and CLI logs to stderr; stdout carries frames and reports.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let directives = std::env::var(LOG_ENV).ok();
    let filter = build_filter(level, directives.as_deref());

    // Targets stay visible so frame and transport lines can be told apart.
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn level_applies_to_every_crate() {
        let filter = build_filter(LogLevel::Warn, None);
        assert!(filter.would_enable("fragline_frame::depayloader", &Level::WARN));
        assert!(!filter.would_enable("fragline_transport::udp", &Level::INFO));
        assert!(!filter.would_enable("fragline::cmd::recv", &Level::INFO));
    }

    #[test]
    fn directives_raise_one_crate() {
        let filter = build_filter(LogLevel::Info, Some("fragline_frame=trace"));
        assert!(filter.would_enable("fragline_frame::depayloader", &Level::TRACE));
        assert!(!filter.would_enable("fragline_transport::udp", &Level::DEBUG));
        assert!(filter.would_enable("fragline::cmd::send", &Level::INFO));
    }

    #[test]
    fn bad_directives_fall_back_to_level() {
        let filter = build_filter(LogLevel::Error, Some("fragline_frame=loud"));
        assert!(filter.would_enable("fragline_frame::payloader", &Level::ERROR));
        assert!(!filter.would_enable("fragline_frame::payloader", &Level::WARN));
    }

    #[test]
    fn blank_directives_are_ignored() {
        let filter = build_filter(LogLevel::Debug, Some("  "));
        assert!(filter.would_enable("fragline_transport::udp", &Level::DEBUG));
        assert!(!filter.would_enable("fragline_transport::udp", &Level::TRACE));
    }
}
