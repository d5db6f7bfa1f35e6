use mavroute::dialect::basic::{messages, BasicDialect, BasicMessage};
use mavroute::prelude::*;
use mavroute::protocol::Parser;

fn sample_messages() -> Vec<BasicMessage> {
    vec![
        BasicMessage::Heartbeat(messages::Heartbeat {
            custom_mode: 0x01020304,
            mavtype: 2,
            autopilot: 3,
            base_mode: 81,
            system_status: 4,
            mavlink_version: 3,
        }),
        BasicMessage::CommandLong(messages::CommandLong {
            params: [1.0, -2.0, 3.5, 0.0, 0.0, 0.0, 0.0],
            command: 400,
            target_system: 1,
            target_component: 1,
            confirmation: 0,
        }),
        BasicMessage::CommandAck(messages::CommandAck {
            command: 400,
            result: 0,
        }),
    ]
}

fn parse_all(parser: &mut Parser<BasicDialect>, bytes: &[u8]) -> Vec<Frame<BasicMessage>> {
    parser.consume(bytes, |err| panic!("unexpected parser error: {err:?}"))
}

#[test]
fn round_trip_both_versions() {
    for version in [MavLinkVersion::V1, MavLinkVersion::V2] {
        for (sequence, message) in sample_messages().into_iter().enumerate() {
            let frame =
                Frame::pack::<BasicDialect>(version, sequence as u8, 42, 17, &message).unwrap();

            let mut parser = Parser::<BasicDialect>::new();
            let parsed = parse_all(&mut parser, &frame.to_bytes());

            assert_eq!(parsed, vec![frame.clone()], "{version:?} {message:?}");
            assert_eq!(parsed[0].message, Some(message));
        }
    }
}

#[test]
fn truncated_v2_payloads_round_trip() {
    // COMMAND_ACK with result 0 ends in a zero byte that gets truncated on
    // the wire; decoding zero-extends it back.
    let message = BasicMessage::CommandAck(messages::CommandAck {
        command: 0x0102,
        result: 0,
    });
    let frame = Frame::pack::<BasicDialect>(MavLinkVersion::V2, 0, 1, 1, &message).unwrap();
    assert_eq!(frame.payload.len(), 2);

    let mut parser = Parser::<BasicDialect>::new();
    let parsed = parse_all(&mut parser, &frame.to_bytes());
    assert_eq!(parsed[0].message, Some(message));
}

#[test]
fn frames_separated_by_garbage_are_recovered() {
    let first = Frame::pack::<BasicDialect>(
        MavLinkVersion::V2,
        0,
        1,
        1,
        &sample_messages()[0],
    )
    .unwrap();
    let second = Frame::pack::<BasicDialect>(
        MavLinkVersion::V1,
        1,
        1,
        1,
        &sample_messages()[2],
    )
    .unwrap();

    let mut bytes = vec![0x00, 0x42, 0x7F];
    bytes.extend_from_slice(&first.to_bytes());
    bytes.extend_from_slice(&[0x13, 0x37]);
    bytes.extend_from_slice(&second.to_bytes());
    bytes.extend_from_slice(&[0xAB]);

    let mut parser = Parser::<BasicDialect>::new();
    let parsed = parse_all(&mut parser, &bytes);
    assert_eq!(parsed, vec![first, second]);
}

#[test]
fn stream_without_start_markers_produces_nothing() {
    let garbage: Vec<u8> = (0..2048u32).map(|i| (i * 7 % 0xFD) as u8).collect();

    let mut parser = Parser::<BasicDialect>::new();
    let parsed = parse_all(&mut parser, &garbage);
    assert!(parsed.is_empty());
    assert!(parser.is_idle());
}

#[test]
fn byte_at_a_time_parsing_matches_chunked() {
    let frame = Frame::pack::<BasicDialect>(
        MavLinkVersion::V2,
        200,
        13,
        37,
        &sample_messages()[1],
    )
    .unwrap();
    let bytes = frame.to_bytes();

    let mut parser = Parser::<BasicDialect>::new();
    let mut parsed = Vec::new();
    for &byte in &bytes {
        parsed.extend(parse_all(&mut parser, &[byte]));
    }
    assert_eq!(parsed, vec![frame]);
}

#[test]
fn delivered_frames_always_verify() {
    // Every frame leaving the parser satisfies the checksum invariant.
    for version in [MavLinkVersion::V1, MavLinkVersion::V2] {
        for message in sample_messages() {
            let frame = Frame::pack::<BasicDialect>(version, 0, 9, 9, &message).unwrap();
            let mut parser = Parser::<BasicDialect>::new();
            for parsed in parse_all(&mut parser, &frame.to_bytes()) {
                let crc_extra = match &message {
                    BasicMessage::Heartbeat(_) => 50,
                    BasicMessage::CommandLong(_) => 152,
                    BasicMessage::CommandAck(_) => 143,
                };
                assert!(parsed.checksum_valid(crc_extra));
            }
        }
    }
}
