use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fragline_frame::{FrameFlags, Reassembled, ReassemblyStats, SessionDescription};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ReceivedOutput<'a> {
    Frame {
        version: u8,
        descriptor: &'a str,
        format_changed: bool,
        flags: String,
        timestamp: u32,
        payload_size: usize,
        payload: String,
    },
    Event {
        kind: &'static str,
        body: &'a str,
    },
}

pub fn print_reassembled(out: &Reassembled, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let record = match out {
                Reassembled::Frame(frame) => ReceivedOutput::Frame {
                    version: frame.version.get(),
                    descriptor: frame.descriptor.as_str(),
                    format_changed: frame.format_changed,
                    flags: flag_names(frame.flags),
                    timestamp: frame.timestamp,
                    payload_size: frame.payload.len(),
                    payload: payload_preview(frame.payload.as_ref()),
                },
                Reassembled::Event(event) => ReceivedOutput::Event {
                    kind: event.kind.name(),
                    body: &event.body,
                },
            };
            println!(
                "{}",
                serde_json::to_string(&record).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            match out {
                Reassembled::Frame(frame) => {
                    table
                        .set_header(vec!["VERSION", "FORMAT", "FLAGS", "SIZE", "PAYLOAD"])
                        .add_row(vec![
                            frame.version.to_string(),
                            frame.descriptor.to_string(),
                            flag_names(frame.flags),
                            frame.payload.len().to_string(),
                            payload_preview(frame.payload.as_ref()),
                        ]);
                }
                Reassembled::Event(event) => {
                    table
                        .set_header(vec!["EVENT", "BODY"])
                        .add_row(vec![event.kind.to_string(), event.body.clone()]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => match out {
            Reassembled::Frame(frame) => println!(
                "frame version={} format={:?} flags={} size={} payload={}",
                frame.version,
                frame.descriptor.as_str(),
                flag_names(frame.flags),
                frame.payload.len(),
                payload_preview(frame.payload.as_ref())
            ),
            Reassembled::Event(event) => println!("event kind={} body={}", event.kind, event.body),
        },
        OutputFormat::Raw => match out {
            Reassembled::Frame(frame) => print_raw(frame.payload.as_ref()),
            Reassembled::Event(event) => print_raw(event.body.as_bytes()),
        },
    }
}

#[derive(Debug, Default, Serialize)]
pub struct SendSummary {
    pub frames: usize,
    pub packets: usize,
    pub bytes: usize,
    pub mtu: usize,
}

pub fn print_send_summary(summary: &SendSummary, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(summary).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_header(vec!["FRAMES", "PACKETS", "BYTES", "MTU"])
                .add_row(vec![
                    summary.frames.to_string(),
                    summary.packets.to_string(),
                    summary.bytes.to_string(),
                    summary.mtu.to_string(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => println!(
            "sent frames={} packets={} bytes={} mtu={}",
            summary.frames, summary.packets, summary.bytes, summary.mtu
        ),
    }
}

pub fn print_stats(stats: &ReassemblyStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(stats).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.load_preset(UTF8_FULL).set_header(vec!["COUNTER", "VALUE"]);
            for (name, value) in [
                ("packets", stats.packets),
                ("frames", stats.frames),
                ("events", stats.events),
                ("discontinuities", stats.discontinuities),
                ("dropped", stats.dropped()),
            ] {
                table.add_row(vec![name.to_string(), value.to_string()]);
            }
            println!("{table}");
        }
        // Raw output carries payload bytes only.
        OutputFormat::Raw => {}
        OutputFormat::Pretty => println!(
            "packets={} frames={} events={} discontinuities={} dropped={}",
            stats.packets,
            stats.frames,
            stats.events,
            stats.discontinuities,
            stats.dropped()
        ),
    }
}

pub fn print_session(session: &SessionDescription, format: OutputFormat) {
    match format {
        OutputFormat::Json => match session.to_json() {
            Ok(json) => println!("{json}"),
            Err(_) => println!("{{}}"),
        },
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["ATTRIBUTE", "VALUE"])
                .add_row(vec![
                    "descriptor".to_string(),
                    session.descriptor.clone().unwrap_or_default(),
                ])
                .add_row(vec!["mtu".to_string(), session.mtu.to_string()])
                .add_row(vec!["clock-rate".to_string(), session.clock_rate.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => println!("{}", session.to_attributes()),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn flag_names(flags: FrameFlags) -> String {
    flags
        .iter_names()
        .map(|(name, _)| name.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("|")
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_names_are_joined() {
        assert_eq!(flag_names(FrameFlags::empty()), "");
        assert_eq!(
            flag_names(FrameFlags::DELTA_UNIT | FrameFlags::MEDIA3),
            "delta_unit|media3"
        );
    }

    #[test]
    fn binary_payload_is_summarised() {
        assert_eq!(payload_preview(b"text"), "text");
        assert_eq!(payload_preview(&[0xff, 0x00]), "<binary 2 bytes>");
    }
}
