//! End-to-end sender/receiver scenarios over the packet API and loopback.

use fragline_frame::{
    Depayloader, DepayloaderConfig, EventKind, FormatVersion, FrameError, FrameReader,
    FrameWriter, LogicalFrame, PacketHeader, Payloader, PayloaderConfig, SessionDescription,
    TransportPacket, TypedEvent,
};
use fragline_transport::{loopback, UdpConfig, UdpTransport};
use std::time::Duration;

fn payloader(mtu: usize) -> Payloader {
    Payloader::new(PayloaderConfig {
        mtu,
        ..PayloaderConfig::default()
    })
    .unwrap()
}

#[test]
fn small_frame_is_one_packet() {
    let mut pay = payloader(100);
    let packets = pay.encode(&LogicalFrame::new(vec![0x11; 10])).unwrap();

    assert_eq!(packets.len(), 1);
    assert!(packets[0].marker);
    assert_eq!(packets[0].header.offset, 0);
    assert!(!packets[0].header.caps_inline);
}

#[test]
fn large_frame_splits_into_92_byte_chunks() {
    let mut pay = payloader(100);
    let packets = pay.encode(&LogicalFrame::new(vec![0x22; 300])).unwrap();

    let offsets: Vec<u32> = packets.iter().map(|p| p.header.offset).collect();
    assert_eq!(offsets, [0, 92, 184, 276]);
    assert_eq!(
        packets.iter().map(|p| p.marker).collect::<Vec<_>>(),
        [false, false, false, true]
    );
}

#[test]
fn first_descriptor_is_inlined_and_cached() {
    let descriptor = "video/x-raw,width=64";
    assert_eq!(descriptor.len(), 20);

    let mut pay = payloader(1400);
    let mut depay = Depayloader::default();

    let frame = LogicalFrame::new(&b"frame-bytes"[..]).with_descriptor(descriptor);
    let packets = pay.encode(&frame).unwrap();
    assert_eq!(packets.len(), 1);
    assert!(packets[0].header.caps_inline);
    assert_eq!(packets[0].header.version.get(), 1);
    assert_eq!(packets[0].payload[0], 21);

    let out = depay
        .on_packet(packets[0].clone())
        .unwrap()
        .and_then(|r| r.into_frame())
        .unwrap();
    assert_eq!(out.payload.as_ref(), b"frame-bytes");
    assert_eq!(out.descriptor.as_str(), descriptor);
    assert_eq!(
        depay
            .cache()
            .lookup(FormatVersion::new(1).unwrap())
            .unwrap()
            .as_str(),
        descriptor
    );
}

#[test]
fn unannounced_version_is_dropped_then_recovers() {
    let mut depay = Depayloader::new(DepayloaderConfig {
        initial_descriptor: Some("session".into()),
        ..DepayloaderConfig::default()
    });

    let stray = TransportPacket {
        header: PacketHeader {
            version: FormatVersion::new(5).unwrap(),
            ..PacketHeader::default()
        },
        marker: true,
        discont: false,
        timestamp: 0,
        payload: bytes::Bytes::from_static(b"orphan"),
    };
    let err = depay.on_packet(stray).unwrap_err();
    assert!(matches!(err, FrameError::MissingFormatVersion(5)));
    assert!(err.is_recoverable());

    let mut pay = Payloader::new(PayloaderConfig {
        mtu: 1400,
        initial_descriptor: Some("session".into()),
    })
    .unwrap();
    let packets = pay.encode(&LogicalFrame::new(&b"good"[..])).unwrap();
    let out = depay
        .on_packet(packets[0].clone())
        .unwrap()
        .and_then(|r| r.into_frame())
        .unwrap();
    assert_eq!(out.payload.as_ref(), b"good");
    assert_eq!(out.version, FormatVersion::OUT_OF_BAND);
}

#[test]
fn session_attributes_drive_both_ends() {
    let attrs = SessionDescription::new(Some("audio/x-opus"), 120).to_attributes();
    let session = SessionDescription::from_attributes(&attrs).unwrap();

    let (sink, source) = loopback();
    let mut writer = FrameWriter::with_config(sink, session.payloader_config()).unwrap();
    let mut reader = FrameReader::with_config(source, session.depayloader_config());

    writer
        .write_frame(&LogicalFrame::new(vec![7u8; 500]).with_timestamp(3000))
        .unwrap();
    writer
        .write_frame(&LogicalFrame::event(TypedEvent::new(
            EventKind::CustomDownstream,
            "marker, id=4",
        )))
        .unwrap();
    writer
        .write_frame(&LogicalFrame::new(&b"switched"[..]).with_descriptor("audio/x-raw"))
        .unwrap();

    let first = reader.read().unwrap().into_frame().unwrap();
    assert_eq!(first.payload.len(), 500);
    assert_eq!(first.descriptor.as_str(), "audio/x-opus");
    assert_eq!(first.timestamp, 3000);
    assert!(!first.format_changed);

    let event = reader.read().unwrap().into_event().unwrap();
    assert_eq!(event.kind, EventKind::CustomDownstream);

    let switched = reader.read().unwrap().into_frame().unwrap();
    assert_eq!(switched.descriptor.as_str(), "audio/x-raw");
    assert!(switched.format_changed);
    assert_eq!(reader.depayloader().active_version().unwrap().get(), 1);
}

#[test]
fn lost_announcement_surfaces_as_missing_version() {
    let (mut sink, source) = loopback();
    // The first datagram carries the inlined descriptor.
    sink.drop_sequences([0]);
    let mut writer = FrameWriter::new(sink).unwrap();
    let mut reader = FrameReader::new(source);

    writer
        .write_frame(&LogicalFrame::new(&b"a"[..]).with_descriptor("fmt"))
        .unwrap();
    writer.write_frame(&LogicalFrame::new(&b"b"[..])).unwrap();
    writer
        .write_frame(&LogicalFrame::new(&b"c"[..]).with_descriptor("fmt-2"))
        .unwrap();

    let out = reader.read().unwrap().into_frame().unwrap();
    assert_eq!(out.payload.as_ref(), b"c");
    assert_eq!(reader.stats().missing_versions, 1);
}

#[test]
fn rotation_wrap_replaces_oldest_descriptors() {
    let mut pay = payloader(1400);
    let mut depay = Depayloader::default();
    let descriptors: Vec<String> = (0..9).map(|n| format!("video/x-test, n={n}")).collect();

    let mut versions = Vec::new();
    for (n, descriptor) in descriptors.iter().enumerate() {
        let frame = LogicalFrame::new(vec![n as u8; 32]).with_descriptor(descriptor.as_str());
        let packets = pay.encode(&frame).unwrap();
        assert_eq!(packets.len(), 1);
        versions.push(packets[0].header.version.get());

        let out = depay
            .on_packet(packets[0].clone())
            .unwrap()
            .and_then(|r| r.into_frame())
            .unwrap();
        assert_eq!(out.descriptor.as_str(), descriptor);
        assert_eq!(out.payload.as_ref(), &[n as u8; 32][..]);
        assert!(out.format_changed);
    }
    assert_eq!(versions, [1, 2, 3, 4, 5, 6, 7, 1, 2]);

    let slot = |v: u8| {
        depay
            .cache()
            .lookup(FormatVersion::new(v).unwrap())
            .unwrap()
            .as_str()
            .to_owned()
    };
    assert_eq!(slot(1), descriptors[7]);
    assert_eq!(slot(2), descriptors[8]);
    assert_eq!(slot(3), descriptors[2]);

    // A plain frame keeps the newest format.
    let packets = pay.encode(&LogicalFrame::new(&b"steady"[..])).unwrap();
    assert!(!packets[0].header.caps_inline);
    let out = depay
        .on_packet(packets[0].clone())
        .unwrap()
        .and_then(|r| r.into_frame())
        .unwrap();
    assert_eq!(out.descriptor.as_str(), descriptors[8]);
    assert!(!out.format_changed);
}

#[test]
fn event_body_with_trailing_nul_arrives_unchanged() {
    let (sink, source) = loopback();
    let mut writer = FrameWriter::new(sink).unwrap();
    let mut reader = FrameReader::new(source);

    let sent = TypedEvent::new(EventKind::CustomBoth, "payload\0");
    writer.write_frame(&LogicalFrame::event(sent.clone())).unwrap();

    let got = reader.read().unwrap().into_event().unwrap();
    assert_eq!(got, sent);
    assert_eq!(got.body.len(), 8);
}

#[test]
fn oversized_udp_datagram_never_yields_a_partial_frame() {
    let localhost = "127.0.0.1:0".parse().unwrap();
    let receiver = UdpTransport::bind_with_config(
        localhost,
        UdpConfig {
            read_timeout: Some(Duration::from_secs(2)),
            max_datagram_size: 64,
            ..UdpConfig::default()
        },
    )
    .unwrap();
    let sender =
        UdpTransport::connect(localhost, receiver.local_addr().unwrap(), UdpConfig::default())
            .unwrap();

    let session = PayloaderConfig {
        mtu: 200,
        initial_descriptor: Some("session".into()),
    };
    let mut writer = FrameWriter::with_config(sender, session).unwrap();
    let mut reader = FrameReader::with_config(
        receiver,
        DepayloaderConfig {
            initial_descriptor: Some("session".into()),
            ..DepayloaderConfig::default()
        },
    );

    // 150 bytes plus both headers does not fit in 64.
    assert_eq!(writer.write_frame(&LogicalFrame::new(vec![0xab; 150])).unwrap(), 1);
    writer.write_frame(&LogicalFrame::new(&b"tail"[..])).unwrap();

    let out = reader.read().unwrap().into_frame().unwrap();
    assert_eq!(out.payload.as_ref(), b"tail");
    assert_eq!(out.descriptor.as_str(), "session");
    assert_eq!(reader.stats().malformed, 1);
    assert_eq!(reader.stats().frames, 1);
}
